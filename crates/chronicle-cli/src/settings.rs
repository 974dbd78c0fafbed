//! Layered configuration: TOML file, then `CHRONICLE_*` environment
//! variables, then command-line overrides.
//!
//! ```toml
//! tracker      = "jira"
//! tracking_url = "https://issues.apache.org/jira/rest/api/2"
//! project      = "ZOOKEEPER"
//! workers      = 8
//!
//! [people.aliases]
//! "phunt" = "phunt1"
//! ```

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use chronicle_core::tracker::TrackerKind;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to load configuration: {0}")]
  Load(#[from] config::ConfigError),

  #[error("`{set}` is set but `{missing}` is not")]
  Incomplete {
    set:     &'static str,
    missing: &'static str,
  },

  #[error("`workers` must be at least 1")]
  NoWorkers,

  #[error("the {0} backend does not support API tokens")]
  TokenUnsupported(TrackerKind),

  #[error("`tracking_url` is required unless `dump_dir` is set")]
  NoTrackingUrl,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeopleSettings {
  /// Raw author login -> canonical login.
  #[serde(default)]
  pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub tracker:        TrackerKind,
  pub tracking_url:   Option<String>,
  pub project:        String,
  pub token:          Option<String>,
  pub issue_user:     Option<String>,
  pub issue_password: Option<String>,
  pub proxy_host:     Option<String>,
  pub proxy_port:     Option<u16>,
  pub proxy_user:     Option<String>,
  pub proxy_password: Option<String>,
  #[serde(default = "default_database")]
  pub database:       PathBuf,
  #[serde(default = "default_workers")]
  pub workers:        usize,
  #[serde(default = "default_log_level")]
  pub log_level:      String,
  pub dump_dir:       Option<PathBuf>,
  #[serde(default)]
  pub people:         PeopleSettings,
  #[serde(default = "default_listen")]
  pub listen:         String,
}

fn default_database() -> PathBuf { PathBuf::from("chronicle.db") }

fn default_workers() -> usize { 4 }

fn default_log_level() -> String { "info".to_owned() }

fn default_listen() -> String { "127.0.0.1:8088".to_owned() }

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
  pub log_level: Option<String>,
  pub workers:   Option<usize>,
  pub dump_dir:  Option<PathBuf>,
}

impl Settings {
  /// Load and normalise settings. Validation is separate so that
  /// read-only commands can run against an incomplete fetch setup.
  pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CHRONICLE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .set_override_option("log_level", overrides.log_level)?
      .set_override_option("workers", overrides.workers.map(|w| w as u64))?
      .set_override_option(
        "dump_dir",
        overrides.dump_dir.map(|d| d.to_string_lossy().into_owned()),
      )?
      .build()?;

    let settings: Settings = settings.try_deserialize()?;
    Ok(settings.normalized())
  }

  fn normalized(mut self) -> Self {
    self.tracking_url = self
      .tracking_url
      .map(|url| url.trim_end_matches('/').to_owned());
    self.proxy_host = self.proxy_host.map(|host| {
      host
        .strip_prefix("http://")
        .map_or(host.clone(), str::to_owned)
    });
    self.database = expand_tilde(&self.database);
    self.dump_dir = self.dump_dir.map(|d| expand_tilde(&d));
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    paired(
      ("issue_user", &self.issue_user),
      ("issue_password", &self.issue_password),
    )?;
    paired(
      ("proxy_user", &self.proxy_user),
      ("proxy_password", &self.proxy_password),
    )?;
    paired(
      ("proxy_host", &self.proxy_host),
      ("proxy_port", &self.proxy_port),
    )?;
    if self.workers == 0 {
      return Err(ConfigError::NoWorkers);
    }
    if self.tracker == TrackerKind::Jira && self.token.is_some() {
      return Err(ConfigError::TokenUnsupported(self.tracker));
    }
    if self.dump_dir.is_none() && self.tracking_url.is_none() {
      return Err(ConfigError::NoTrackingUrl);
    }
    Ok(())
  }

  /// `http://[user:password@]host:port`, when a proxy is configured.
  pub fn proxy_url(&self) -> Option<String> {
    let host = self.proxy_host.as_deref()?;
    let port = self.proxy_port?;
    Some(match (&self.proxy_user, &self.proxy_password) {
      (Some(user), Some(password)) => format!("http://{user}:{password}@{host}:{port}"),
      _ => format!("http://{host}:{port}"),
    })
  }
}

fn paired<A, B>(
  (a_name, a): (&'static str, &Option<A>),
  (b_name, b): (&'static str, &Option<B>),
) -> Result<(), ConfigError> {
  match (a.is_some(), b.is_some()) {
    (true, false) => Err(ConfigError::Incomplete {
      set:     a_name,
      missing: b_name,
    }),
    (false, true) => Err(ConfigError::Incomplete {
      set:     b_name,
      missing: a_name,
    }),
    _ => Ok(()),
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
