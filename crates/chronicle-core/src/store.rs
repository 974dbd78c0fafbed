//! The persistence collaborator seam.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{assemble::Issue, raw::IssueId, tracker::TrackerKind};

/// What [`IssueStore::upsert_issue`] did.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpsertOutcome {
  Inserted,
  Updated,
  /// The stored record already had the same content; nothing was written.
  Unchanged,
}

/// Paging parameters for [`IssueStore::list_issues`].
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
  pub tracker: Option<TrackerKind>,
  pub project: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

/// A short listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
  pub id:         IssueId,
  pub project:    String,
  pub title:      Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Storage for assembled issues.
///
/// Writes are upserts keyed on [`IssueId`]: repeated runs update existing
/// records instead of duplicating them.
pub trait IssueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or replace an issue with its events and comments.
  fn upsert_issue<'a>(
    &'a self,
    project: &'a str,
    issue: &'a Issue,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + 'a;

  fn get_issue<'a>(
    &'a self,
    id: &'a IssueId,
  ) -> impl Future<Output = Result<Option<Issue>, Self::Error>> + Send + 'a;

  fn list_issues<'a>(
    &'a self,
    query: &'a IssueQuery,
  ) -> impl Future<Output = Result<Vec<IssueSummary>, Self::Error>> + Send + 'a;

  /// Newest `updated_at` stored for the project; the recency cursor for
  /// the next incremental run.
  fn latest_update<'a>(
    &'a self,
    tracker: TrackerKind,
    project: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  /// Remember an issue that failed to collect. The recency cursor may move
  /// past it, so the next run retries it from this list instead.
  fn mark_pending<'a>(
    &'a self,
    tracker: TrackerKind,
    project: &'a str,
    external_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn clear_pending<'a>(
    &'a self,
    tracker: TrackerKind,
    project: &'a str,
    external_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// External ids marked pending for the project, sorted.
  fn pending_issues<'a>(
    &'a self,
    tracker: TrackerKind,
    project: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
