//! The fetch collaborator seam.
//!
//! Implemented outside the core (HTTP, dump directories). The core only sees
//! the complete in-memory [`RawBundle`] a source hands over.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::raw::{Capabilities, RawBundle};

/// Where raw tracker JSON comes from.
///
/// Retry, pagination, authentication and rate limiting are the
/// implementation's business.
pub trait IssueSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// External ids of the project's issues, oldest update first. `since`
  /// restricts the listing to issues updated at or after that instant when
  /// the tracker supports a recency cursor.
  fn list_issues<'a>(
    &'a self,
    project: &'a str,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn fetch_issue<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Value, Self::Error>> + Send + 'a;

  /// `None` when the issue has no separately stored events.
  fn fetch_events<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  /// `None` when the issue has no separately stored comments.
  fn fetch_comments<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;
}

/// Fetch everything one issue needs, consulting only the endpoints the
/// tracker actually has. Any failure fails the whole bundle, so no partial
/// issue is ever processed.
pub async fn fetch_bundle<S: IssueSource>(
  source: &S,
  capabilities: Capabilities,
  id: &str,
) -> Result<RawBundle, S::Error> {
  let issue = source.fetch_issue(id).await?;
  let events = if capabilities.events_endpoint {
    source.fetch_events(id).await?
  } else {
    None
  };
  let comments = if capabilities.comments_endpoint {
    source.fetch_comments(id).await?
  } else {
    None
  };
  Ok(RawBundle {
    issue,
    events,
    comments,
  })
}
