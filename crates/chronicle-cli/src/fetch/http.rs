//! Tracker REST APIs over HTTP.
//!
//! `tracking_url` is the tracker's issue API root:
//!
//! | tracker  | example |
//! |----------|---------|
//! | GitHub   | `https://api.github.com/repos/<owner>/<repo>/issues` |
//! | Jira     | `https://issues.apache.org/jira/rest/api/2` |
//! | Bugzilla | `https://bugzilla.mozilla.org` |

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use chronicle_core::{source::IssueSource, tracker::TrackerKind};
use reqwest::{
  Client, RequestBuilder, Response,
  header::{AUTHORIZATION, HeaderMap},
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::FetchError;
use crate::settings::Settings;

const ATTEMPTS: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_secs(2);
const RATE_LIMIT_SLACK: i64 = 10;
const GITHUB_PAGE: usize = 100;
const JIRA_PAGE: usize = 50;
const BUGZILLA_PAGE: usize = 50;

#[derive(Debug, Clone)]
enum Auth {
  Anonymous,
  Token(String),
  Basic { user: String, password: String },
}

#[derive(Debug, Clone)]
pub struct HttpSource {
  client:  Client,
  tracker: TrackerKind,
  base:    String,
  auth:    Auth,
}

impl HttpSource {
  pub fn new(settings: &Settings) -> Result<Self, FetchError> {
    let base = settings
      .tracking_url
      .clone()
      .ok_or(FetchError::NoTrackingUrl)?;

    let mut builder = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("chronicle/", env!("CARGO_PKG_VERSION")));
    if let Some(proxy) = settings.proxy_url() {
      builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(FetchError::Client)?);
    }
    let client = builder.build().map_err(FetchError::Client)?;

    let auth = match (&settings.token, &settings.issue_user, &settings.issue_password) {
      (Some(token), ..) => Auth::Token(token.clone()),
      (None, Some(user), Some(password)) => Auth::Basic {
        user:     user.clone(),
        password: password.clone(),
      },
      _ => Auth::Anonymous,
    };

    Ok(Self {
      client,
      tracker: settings.tracker,
      base,
      auth,
    })
  }

  fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.auth {
      Auth::Anonymous => req,
      Auth::Token(token) => req.header(AUTHORIZATION, format!("token {token}")),
      Auth::Basic { user, password } => req.basic_auth(user, Some(password)),
    }
  }

  /// `GET url` with up to [`ATTEMPTS`] tries, honouring GitHub's rate
  /// limit headers on success.
  async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
    let mut attempt = 1;
    loop {
      debug!(url, attempt, "sending request");
      match self.send(url, query).await {
        Ok(value) => return Ok(value),
        Err(error) if attempt < ATTEMPTS => {
          warn!(url, attempt, %error, "request failed, retrying");
          attempt += 1;
          tokio::time::sleep(RETRY_PAUSE).await;
        }
        Err(error) => return Err(error),
      }
    }
  }

  async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
    let http_err = |source| FetchError::Http {
      url: url.to_owned(),
      source,
    };
    let resp: Response = self
      .authorize(self.client.get(url).query(query))
      .send()
      .await
      .map_err(http_err)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_owned(),
        status,
      });
    }

    let wait = rate_limit_wait(resp.headers(), Utc::now());
    let value = resp.json::<Value>().await.map_err(http_err)?;
    if let Some(wait) = wait {
      info!(seconds = wait.as_secs(), "API rate limit reached, waiting");
      tokio::time::sleep(wait).await;
    }
    Ok(value)
  }

  /// Concatenate every page of a GitHub list endpoint.
  async fn github_pages(
    &self,
    url: &str,
    extra: &[(&str, String)],
  ) -> Result<Vec<Value>, FetchError> {
    let mut items = Vec::new();
    for page in 1.. {
      let mut query = extra.to_vec();
      query.push(("page", page.to_string()));
      query.push(("per_page", GITHUB_PAGE.to_string()));
      let batch = match self.get(url, &query).await? {
        Value::Array(batch) => batch,
        other => {
          return Err(FetchError::NotAList {
            url:   url.to_owned(),
            found: kind(&other),
          });
        }
      };
      let done = batch.len() < GITHUB_PAGE;
      items.extend(batch);
      if done {
        break;
      }
    }
    Ok(items)
  }

  async fn list_github(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>, FetchError> {
    let mut query = vec![
      ("state", "all".to_owned()),
      ("sort", "updated".to_owned()),
      ("direction", "asc".to_owned()),
    ];
    if let Some(since) = since {
      query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    let issues = self.github_pages(&self.base, &query).await?;
    Ok(issues.iter().filter_map(|i| id_of(i, "number")).collect())
  }

  async fn list_jira(
    &self,
    project: &str,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<String>, FetchError> {
    let jql = match since {
      Some(since) => format!(
        "project = \"{project}\" AND updatedDate >= \"{}\" ORDER BY updatedDate ASC",
        since.format("%Y/%m/%d %H:%M")
      ),
      None => format!("project = \"{project}\" ORDER BY updatedDate ASC"),
    };
    let url = format!("{}/search", self.base);
    let mut keys: Vec<String> = Vec::new();
    loop {
      let query = [
        ("jql", jql.clone()),
        ("startAt", keys.len().to_string()),
        ("maxResults", JIRA_PAGE.to_string()),
        ("fields", "updated".to_owned()),
      ];
      let page = self.get(&url, &query).await?;
      let batch: Vec<String> = page
        .get("issues")
        .and_then(Value::as_array)
        .map(|issues| issues.iter().filter_map(|i| id_of(i, "key")).collect())
        .unwrap_or_default();
      let total = page.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
      let empty = batch.is_empty();
      keys.extend(batch);
      if empty || keys.len() >= total {
        break;
      }
    }
    Ok(keys)
  }

  async fn list_bugzilla(
    &self,
    product: &str,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<String>, FetchError> {
    let url = format!("{}/rest/bug", self.base);
    let mut ids: Vec<String> = Vec::new();
    loop {
      let mut query = vec![
        ("product", product.to_owned()),
        ("include_fields", "id".to_owned()),
        ("limit", BUGZILLA_PAGE.to_string()),
        ("offset", ids.len().to_string()),
      ];
      if let Some(since) = since {
        query.push((
          "last_change_time",
          since.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
      }
      let page = self.get(&url, &query).await?;
      let batch: Vec<String> = page
        .get("bugs")
        .and_then(Value::as_array)
        .map(|bugs| bugs.iter().filter_map(|b| id_of(b, "id")).collect())
        .unwrap_or_default();
      let done = batch.len() < BUGZILLA_PAGE;
      ids.extend(batch);
      if done {
        break;
      }
    }
    Ok(ids)
  }
}

impl IssueSource for HttpSource {
  type Error = FetchError;

  async fn list_issues(
    &self,
    project: &str,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<String>, FetchError> {
    match self.tracker {
      TrackerKind::GitHub => self.list_github(since).await,
      TrackerKind::Jira => self.list_jira(project, since).await,
      TrackerKind::Bugzilla => self.list_bugzilla(project, since).await,
    }
  }

  async fn fetch_issue(&self, id: &str) -> Result<Value, FetchError> {
    match self.tracker {
      TrackerKind::GitHub => self.get(&format!("{}/{id}", self.base), &[]).await,
      TrackerKind::Jira => {
        let url = format!("{}/issue/{id}", self.base);
        self.get(&url, &[("expand", "changelog".to_owned())]).await
      }
      TrackerKind::Bugzilla => self.get(&format!("{}/rest/bug/{id}", self.base), &[]).await,
    }
  }

  async fn fetch_events(&self, id: &str) -> Result<Option<Value>, FetchError> {
    match self.tracker {
      TrackerKind::GitHub => {
        let url = format!("{}/{id}/events", self.base);
        Ok(Some(Value::Array(self.github_pages(&url, &[]).await?)))
      }
      TrackerKind::Jira => Ok(None),
      TrackerKind::Bugzilla => {
        let url = format!("{}/rest/bug/{id}/history", self.base);
        self.get(&url, &[]).await.map(Some)
      }
    }
  }

  async fn fetch_comments(&self, id: &str) -> Result<Option<Value>, FetchError> {
    match self.tracker {
      TrackerKind::GitHub => {
        let url = format!("{}/{id}/comments", self.base);
        Ok(Some(Value::Array(self.github_pages(&url, &[]).await?)))
      }
      TrackerKind::Jira => Ok(None),
      TrackerKind::Bugzilla => {
        let url = format!("{}/rest/bug/{id}/comment", self.base);
        self.get(&url, &[]).await.map(Some)
      }
    }
  }
}

/// How long to pause when GitHub reports at most one request left:
/// until the reset instant plus ten seconds.
fn rate_limit_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse::<i64>().ok())
  };
  let remaining = header("X-RateLimit-Remaining")?;
  if remaining > 1 {
    return None;
  }
  let reset = header("X-RateLimit-Reset")?;
  let secs = reset - now.timestamp() + RATE_LIMIT_SLACK;
  Some(Duration::from_secs(secs.max(0) as u64))
}

fn id_of(value: &Value, key: &str) -> Option<String> {
  match value.get(key)? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}
