//! The raw intermediate representation produced by wire adapters.
//!
//! Everything here is still in tracker terminology: field names are native,
//! values are uncoerced. Only structure has been translated.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, person::RawPerson, tracker::TrackerKind};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The identity of an issue: immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueId {
  pub tracker:     TrackerKind,
  pub external_id: String,
}

impl IssueId {
  pub fn new(tracker: TrackerKind, external_id: impl Into<String>) -> Self {
    Self {
      tracker,
      external_id: external_id.into(),
    }
  }
}

impl fmt::Display for IssueId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.tracker, self.external_id)
  }
}

// ─── Raw values ──────────────────────────────────────────────────────────────

/// An uncoerced value as the tracker reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawValue {
  Text(String),
  List(Vec<String>),
  Person(RawPerson),
}

impl RawValue {
  pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }

  /// Best-effort textual rendering, used for unknown fields and error text.
  pub fn render(&self) -> String {
    match self {
      Self::Text(s) => s.clone(),
      Self::List(items) => items.join(", "),
      Self::Person(p) => p.login.clone(),
    }
  }
}

/// A native issue field and its current value (`None` when null).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
  pub name:  String,
  pub value: Option<RawValue>,
}

impl RawField {
  pub fn new(name: impl Into<String>, value: Option<RawValue>) -> Self {
    Self {
      name: name.into(),
      value,
    }
  }
}

// ─── Raw records ─────────────────────────────────────────────────────────────

/// Issue attributes that are not subject to rewinding, plus the current
/// values of all rewindable fields in native form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSkeleton {
  pub id:              IssueId,
  pub url:             Option<String>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      Option<DateTime<Utc>>,
  pub reporter:        Option<RawPerson>,
  pub is_pull_request: bool,
  pub fields:          Vec<RawField>,
}

/// One field mutation in tracker terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
  pub issue_id:    IssueId,
  pub external_id: String,
  /// Native field or action name (`"Fix Version"`, `"labeled"`, ...).
  pub name:        String,
  pub old:         Option<RawValue>,
  pub new:         Option<RawValue>,
  pub timestamp:   DateTime<Utc>,
  /// Tracker-assigned ordering key, when the tracker has one.
  pub sequence:    Option<u64>,
  pub author:      Option<RawPerson>,
  /// Commit referenced by the event (GitHub only).
  pub commit:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
  pub issue_id:    IssueId,
  pub external_id: String,
  pub author:      Option<RawPerson>,
  pub body:        String,
  pub created_at:  DateTime<Utc>,
  pub edited_at:   Option<DateTime<Utc>>,
}

// ─── Adapter contract ────────────────────────────────────────────────────────

/// Raw JSON for one issue as handed over by a fetch collaborator.
///
/// `events` and `comments` are `None` when the tracker embeds them in the
/// issue payload (or when there were none to fetch).
#[derive(Debug, Clone, Default)]
pub struct RawBundle {
  pub issue:    Value,
  pub events:   Option<Value>,
  pub comments: Option<Value>,
}

/// The structural translation of one [`RawBundle`].
#[derive(Debug, Clone)]
pub struct ParsedIssue {
  pub skeleton: IssueSkeleton,
  pub events:   Vec<RawEvent>,
  pub comments: Vec<RawComment>,
}

/// What a tracker's API lets a fetcher do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
  /// Issues can be listed by last-update time, enabling incremental runs.
  pub recency_cursor:    bool,
  /// Events come from a separate endpoint rather than the issue payload.
  pub events_endpoint:   bool,
  /// Comments come from a separate endpoint rather than the issue payload.
  pub comments_endpoint: bool,
}

/// Translates one tracker family's JSON into the raw IR.
///
/// Adapters never interpret event semantics: they rename, re-type and pass
/// everything else through. A missing required field yields
/// [`crate::Error::MalformedRecord`] naming the offending external id.
pub trait WireAdapter: Send + Sync {
  fn tracker(&self) -> TrackerKind;

  fn capabilities(&self) -> Capabilities;

  fn parse(&self, raw: &RawBundle) -> Result<ParsedIssue>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn issue_id_display() {
    let id = IssueId::new(TrackerKind::Jira, "ZOOKEEPER-1");
    assert_eq!(id.to_string(), "jira:ZOOKEEPER-1");
  }

  #[test]
  fn render_joins_lists() {
    let v = RawValue::List(vec!["a".into(), "b".into()]);
    assert_eq!(v.render(), "a, b");
    assert_eq!(RawValue::Person(RawPerson::login("x")).render(), "x");
  }
}
