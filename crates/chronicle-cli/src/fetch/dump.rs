//! Raw JSON read from a directory of earlier API responses.
//!
//! Layout: `<id>.issue.json`, plus optional `<id>.events.json` and
//! `<id>.comments.json` for trackers with separate endpoints.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use chronicle_core::source::IssueSource;
use serde_json::Value;

use super::FetchError;

const ISSUE_SUFFIX: &str = ".issue.json";

#[derive(Debug, Clone)]
pub struct DumpSource {
  dir: PathBuf,
}

impl DumpSource {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  fn path(&self, id: &str, kind: &str) -> PathBuf { self.dir.join(format!("{id}.{kind}.json")) }
}

async fn read_json(path: &Path) -> Result<Option<Value>, FetchError> {
  let bytes = match tokio::fs::read(path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(FetchError::Io {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  serde_json::from_slice(&bytes)
    .map(Some)
    .map_err(|source| FetchError::Json {
      origin: path.display().to_string(),
      source,
    })
}

impl IssueSource for DumpSource {
  type Error = FetchError;

  /// Every dumped issue, sorted by id. Dumps carry no recency cursor, so
  /// `since` is ignored; unchanged issues are caught by fingerprint.
  async fn list_issues(
    &self,
    _project: &str,
    _since: Option<DateTime<Utc>>,
  ) -> Result<Vec<String>, FetchError> {
    let io_err = |source| FetchError::Io {
      path: self.dir.clone(),
      source,
    };
    let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
      let name = entry.file_name();
      if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(ISSUE_SUFFIX)) {
        ids.push(id.to_owned());
      }
    }
    ids.sort();
    Ok(ids)
  }

  async fn fetch_issue(&self, id: &str) -> Result<Value, FetchError> {
    let path = self.path(id, "issue");
    read_json(&path).await?.ok_or_else(|| FetchError::Io {
      path,
      source: ErrorKind::NotFound.into(),
    })
  }

  async fn fetch_events(&self, id: &str) -> Result<Option<Value>, FetchError> {
    read_json(&self.path(id, "events")).await
  }

  async fn fetch_comments(&self, id: &str) -> Result<Option<Value>, FetchError> {
    read_json(&self.path(id, "comments")).await
  }
}
