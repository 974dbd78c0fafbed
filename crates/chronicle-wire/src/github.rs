//! GitHub-shaped JSON: the v3 REST `issues`, `issues/{n}/events` and
//! `issues/{n}/comments` payloads.

use chronicle_core::{
  Result,
  person::RawPerson,
  raw::{
    Capabilities, IssueId, IssueSkeleton, ParsedIssue, RawBundle, RawComment, RawEvent,
    RawField, RawValue, WireAdapter,
  },
  tracker::TrackerKind,
};
use serde::Deserialize;
use serde_json::Value;

use crate::json::{decode, id_hint, maybe_timestamp, text, timestamp};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiUser {
  login: String,
  #[serde(default)]
  name:  Option<String>,
  #[serde(default)]
  email: Option<String>,
}

impl From<ApiUser> for RawPerson {
  fn from(u: ApiUser) -> Self {
    RawPerson {
      login: u.login,
      name:  u.name,
      email: u.email,
    }
  }
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
  name: String,
}

#[derive(Debug, Deserialize)]
struct ApiMilestone {
  title: String,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
  number:       u64,
  #[serde(default)]
  html_url:     Option<String>,
  title:        String,
  #[serde(default)]
  body:         Option<String>,
  state:        String,
  #[serde(default)]
  user:         Option<ApiUser>,
  #[serde(default)]
  assignee:     Option<ApiUser>,
  #[serde(default)]
  labels:       Vec<ApiLabel>,
  #[serde(default)]
  milestone:    Option<ApiMilestone>,
  created_at:   String,
  #[serde(default)]
  updated_at:   Option<String>,
  #[serde(default)]
  pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiRename {
  from: String,
  to:   String,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
  id:         u64,
  event:      String,
  created_at: String,
  #[serde(default)]
  actor:      Option<ApiUser>,
  #[serde(default)]
  commit_id:  Option<String>,
  #[serde(default)]
  label:      Option<ApiLabel>,
  #[serde(default)]
  assignee:   Option<ApiUser>,
  #[serde(default)]
  milestone:  Option<ApiMilestone>,
  #[serde(default)]
  rename:     Option<ApiRename>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
  id:         u64,
  #[serde(default)]
  user:       Option<ApiUser>,
  #[serde(default)]
  body:       Option<String>,
  created_at: String,
  #[serde(default)]
  updated_at: Option<String>,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubAdapter;

impl WireAdapter for GitHubAdapter {
  fn tracker(&self) -> TrackerKind { TrackerKind::GitHub }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      recency_cursor:    true,
      events_endpoint:   true,
      comments_endpoint: true,
    }
  }

  fn parse(&self, raw: &RawBundle) -> Result<ParsedIssue> {
    let hint = id_hint(&raw.issue, &["number"]);
    let issue: ApiIssue = decode(&raw.issue, &hint, "issue")?;
    let id = IssueId::new(TrackerKind::GitHub, issue.number.to_string());
    let ext = id.external_id.clone();

    let fields = vec![
      RawField::new("title", Some(RawValue::Text(issue.title))),
      RawField::new("body", text(issue.body)),
      RawField::new("state", Some(RawValue::Text(issue.state))),
      RawField::new(
        "labels",
        Some(RawValue::List(issue.labels.into_iter().map(|l| l.name).collect())),
      ),
      RawField::new("milestone", text(issue.milestone.map(|m| m.title))),
      RawField::new("assignee", issue.assignee.map(|a| RawValue::Person(a.into()))),
    ];

    let skeleton = IssueSkeleton {
      id: id.clone(),
      url: issue.html_url,
      created_at: timestamp(&issue.created_at, &ext, "created_at")?,
      updated_at: maybe_timestamp(issue.updated_at.as_deref()),
      reporter: issue.user.map(Into::into),
      is_pull_request: issue.pull_request.is_some(),
      fields,
    };

    let events = match &raw.events {
      Some(value) => decode::<Vec<ApiEvent>>(value, &ext, "events")?
        .into_iter()
        .map(|e| event(&id, e))
        .collect::<Result<_>>()?,
      None => Vec::new(),
    };

    let comments = match &raw.comments {
      Some(value) => decode::<Vec<ApiComment>>(value, &ext, "comments")?
        .into_iter()
        .map(|c| comment(&id, c))
        .collect::<Result<_>>()?,
      None => Vec::new(),
    };

    Ok(ParsedIssue {
      skeleton,
      events,
      comments,
    })
  }
}

/// Lift an event's payload into old/new slots. Action-only events such as
/// `closed` or `subscribed` carry no values.
fn event(issue: &IssueId, e: ApiEvent) -> Result<RawEvent> {
  let person = |u: Option<ApiUser>| u.map(|u| RawValue::Person(u.into()));
  let label = |l: Option<ApiLabel>| l.map(|l| RawValue::Text(l.name));
  let milestone = |m: Option<ApiMilestone>| m.map(|m| RawValue::Text(m.title));

  let (old, new) = match e.event.as_str() {
    "renamed" => match e.rename {
      Some(r) => (Some(RawValue::Text(r.from)), Some(RawValue::Text(r.to))),
      None => (None, None),
    },
    "labeled" => (None, label(e.label)),
    "unlabeled" => (label(e.label), None),
    "assigned" => (None, person(e.assignee)),
    "unassigned" => (person(e.assignee), None),
    "milestoned" => (None, milestone(e.milestone)),
    "demilestoned" => (milestone(e.milestone), None),
    _ => (None, None),
  };

  Ok(RawEvent {
    issue_id: issue.clone(),
    external_id: e.id.to_string(),
    timestamp: timestamp(&e.created_at, &issue.external_id, "event created_at")?,
    name: e.event,
    old,
    new,
    sequence: Some(e.id),
    author: e.actor.map(Into::into),
    commit: e.commit_id,
  })
}

fn comment(issue: &IssueId, c: ApiComment) -> Result<RawComment> {
  let created_at = timestamp(&c.created_at, &issue.external_id, "comment created_at")?;
  Ok(RawComment {
    issue_id: issue.clone(),
    external_id: c.id.to_string(),
    author: c.user.map(Into::into),
    body: c.body.unwrap_or_default(),
    created_at,
    edited_at: maybe_timestamp(c.updated_at.as_deref()).filter(|t| *t != created_at),
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn bundle() -> RawBundle {
    RawBundle {
      issue:    json!({
        "number": 1347,
        "html_url": "https://github.com/octo/hello/issues/1347",
        "title": "Found a bug",
        "body": "I'm having a problem with this.",
        "state": "closed",
        "user": { "login": "octocat" },
        "assignee": { "login": "hubot", "name": "Hubot" },
        "labels": [{ "name": "bug" }, { "name": "p1" }],
        "milestone": null,
        "created_at": "2011-04-22T13:33:48Z",
        "updated_at": "2011-04-23T13:33:48Z"
      }),
      events:   Some(json!([
        {
          "id": 6430295168u64,
          "event": "labeled",
          "created_at": "2011-04-22T13:40:00Z",
          "actor": { "login": "octocat" },
          "commit_id": null,
          "label": { "name": "bug", "color": "d73a4a" }
        },
        {
          "id": 6430295169u64,
          "event": "closed",
          "created_at": "2011-04-23T13:33:48Z",
          "actor": { "login": "hubot" },
          "commit_id": "6dcb09b5b57875f334f61aebed695e2e4193db5e"
        },
        {
          "id": 6430295170u64,
          "event": "renamed",
          "created_at": "2011-04-22T14:00:00Z",
          "actor": { "login": "octocat" },
          "rename": { "from": "Bug", "to": "Found a bug" }
        }
      ])),
      comments: Some(json!([
        {
          "id": 1,
          "user": { "login": "hubot" },
          "body": "Me too",
          "created_at": "2011-04-22T13:35:00Z",
          "updated_at": "2011-04-22T13:35:00Z"
        }
      ])),
    }
  }

  #[test]
  fn parses_issue_events_and_comments() {
    let parsed = GitHubAdapter.parse(&bundle()).unwrap();
    let skel = &parsed.skeleton;
    assert_eq!(skel.id, IssueId::new(TrackerKind::GitHub, "1347"));
    assert_eq!(skel.reporter.as_ref().unwrap().login, "octocat");
    assert!(!skel.is_pull_request);

    let labels = skel.fields.iter().find(|f| f.name == "labels").unwrap();
    assert_eq!(
      labels.value,
      Some(RawValue::List(vec!["bug".into(), "p1".into()]))
    );

    assert_eq!(parsed.events.len(), 3);
    let labeled = &parsed.events[0];
    assert_eq!(labeled.name, "labeled");
    assert_eq!(labeled.new, Some(RawValue::text("bug")));
    assert_eq!(labeled.sequence, Some(6430295168));

    let closed = &parsed.events[1];
    assert_eq!((closed.old.as_ref(), closed.new.as_ref()), (None, None));
    assert_eq!(
      closed.commit.as_deref(),
      Some("6dcb09b5b57875f334f61aebed695e2e4193db5e")
    );

    assert_eq!(parsed.events[2].old, Some(RawValue::text("Bug")));
    assert_eq!(parsed.comments[0].edited_at, None);
  }

  #[test]
  fn pull_requests_are_flagged() {
    let mut raw = bundle();
    raw.issue["pull_request"] = json!({ "url": "https://api.github.com/repos/octo/hello/pulls/1347" });
    assert!(GitHubAdapter.parse(&raw).unwrap().skeleton.is_pull_request);
  }

  #[test]
  fn missing_created_at_is_malformed() {
    let mut raw = bundle();
    raw.issue.as_object_mut().unwrap().remove("created_at");
    let err = GitHubAdapter.parse(&raw).unwrap_err();
    assert!(matches!(
      err,
      chronicle_core::Error::MalformedRecord { ref external_id, .. } if external_id == "1347"
    ));
  }
}
