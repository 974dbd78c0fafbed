//! Error type for `chronicle-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] chronicle_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row no longer decodes into an issue.
  #[error("corrupt record for {issue}: {reason}")]
  Corrupt { issue: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
