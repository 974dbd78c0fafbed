//! Fetch collaborators: where raw tracker JSON comes from.

pub mod dump;
pub mod http;

use std::path::PathBuf;

pub use dump::DumpSource;
pub use http::HttpSource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request to {url} failed: {source}")]
  Http {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} answered {status}")]
  Status {
    url:    String,
    status: reqwest::StatusCode,
  },

  #[error("{url} returned {found}, expected a list")]
  NotAList { url: String, found: &'static str },

  #[error("cannot read {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON in {origin}: {source}")]
  Json {
    origin: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("cannot build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("no tracking_url configured")]
  NoTrackingUrl,
}
