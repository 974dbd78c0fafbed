//! The Issue Assembler and the immutable [`Issue`] record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  Result,
  event::{ChangeEvent, Comment},
  field::{Field, IssueState},
  person::Person,
  raw::{IssueId, IssueSkeleton},
  rewind::{self, Rewind},
  vocabulary::VOCABULARY_VERSION,
};

/// A fully reconstructed issue. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  id:                 IssueId,
  url:                Option<String>,
  created_at:         DateTime<Utc>,
  updated_at:         Option<DateTime<Utc>>,
  reporter:           Option<Person>,
  is_pull_request:    bool,
  vocabulary_version: u32,
  original_state:     IssueState,
  current_state:      IssueState,
  gaps:               BTreeSet<Field>,
  events:             Vec<ChangeEvent>,
  comments:           Vec<Comment>,
}

impl Issue {
  pub fn id(&self) -> &IssueId { &self.id }

  pub fn url(&self) -> Option<&str> { self.url.as_deref() }

  pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

  pub fn updated_at(&self) -> Option<DateTime<Utc>> { self.updated_at }

  pub fn reporter(&self) -> Option<&Person> { self.reporter.as_ref() }

  pub fn is_pull_request(&self) -> bool { self.is_pull_request }

  pub fn vocabulary_version(&self) -> u32 { self.vocabulary_version }

  pub fn original_state(&self) -> &IssueState { &self.original_state }

  pub fn current_state(&self) -> &IssueState { &self.current_state }

  /// Fields whose value at creation could not be recovered.
  pub fn gaps(&self) -> &BTreeSet<Field> { &self.gaps }

  /// Change events in canonical order.
  pub fn events(&self) -> &[ChangeEvent] { &self.events }

  /// Comments, oldest first.
  pub fn comments(&self) -> &[Comment] { &self.comments }

  /// The issue's field values as of `at`.
  pub fn state_at(&self, at: DateTime<Utc>) -> IssueState {
    rewind::state_at(&self.original_state, &self.events, at)
  }

  /// Events and comments merged by time. Events win ties.
  pub fn timeline(&self) -> Vec<TimelineEntry<'_>> {
    let mut entries: Vec<TimelineEntry<'_>> = self
      .events
      .iter()
      .map(TimelineEntry::Event)
      .chain(self.comments.iter().map(TimelineEntry::Comment))
      .collect();
    entries.sort_by_key(|e| e.timestamp());
    entries
  }
}

/// One item of an issue's merged timeline.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry<'a> {
  Event(&'a ChangeEvent),
  Comment(&'a Comment),
}

impl TimelineEntry<'_> {
  pub fn timestamp(&self) -> DateTime<Utc> {
    match self {
      Self::Event(e) => e.timestamp,
      Self::Comment(c) => c.created_at,
    }
  }
}

/// Merge the pieces of one issue into an [`Issue`].
///
/// Fails with [`Error::Assembly`] when an event or comment belongs to another
/// issue, or when events or comments are out of order. Either means an
/// adapter or the normalizer is broken.
pub fn assemble(
  skeleton: IssueSkeleton,
  reporter: Option<Person>,
  current_state: IssueState,
  rewound: Rewind,
  events: Vec<ChangeEvent>,
  comments: Vec<Comment>,
) -> Result<Issue> {
  let id = skeleton.id;

  if let Some(e) = events.iter().find(|e| e.issue_id != id) {
    return Err(Error::Assembly(format!(
      "event {} belongs to {}, not {id}",
      e.external_id, e.issue_id
    )));
  }
  if let Some(c) = comments.iter().find(|c| c.issue_id != id) {
    return Err(Error::Assembly(format!(
      "comment {} belongs to {}, not {id}",
      c.external_id, c.issue_id
    )));
  }
  if let Some(pair) = events.windows(2).find(|w| w[0].timestamp > w[1].timestamp) {
    return Err(Error::Assembly(format!(
      "events of {id} out of order at {}",
      pair[1].external_id
    )));
  }
  if let Some(pair) = comments.windows(2).find(|w| w[0].created_at > w[1].created_at) {
    return Err(Error::Assembly(format!(
      "comments of {id} out of order at {}",
      pair[1].external_id
    )));
  }

  Ok(Issue {
    id,
    url: skeleton.url,
    created_at: skeleton.created_at,
    updated_at: skeleton.updated_at,
    reporter,
    is_pull_request: skeleton.is_pull_request,
    vocabulary_version: VOCABULARY_VERSION,
    original_state: rewound.original,
    current_state,
    gaps: rewound.gaps,
    events,
    comments,
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{field::FieldValue, tracker::TrackerKind};

  fn t(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn skeleton() -> IssueSkeleton {
    IssueSkeleton {
      id:              IssueId::new(TrackerKind::Jira, "ZOOKEEPER-7"),
      url:             Some("https://issues.example.org/browse/ZOOKEEPER-7".into()),
      created_at:      t(0),
      updated_at:      Some(t(50)),
      reporter:        None,
      is_pull_request: false,
      fields:          Vec::new(),
    }
  }

  fn status_event(issue: &str, id: &str, secs: i64) -> ChangeEvent {
    ChangeEvent {
      issue_id:    IssueId::new(TrackerKind::Jira, issue),
      external_id: id.into(),
      field:       Field::Status,
      old_value:   Some(FieldValue::Enum("Open".into())),
      new_value:   Some(FieldValue::Enum("Resolved".into())),
      timestamp:   t(secs),
      author:      None,
      commit:      None,
    }
  }

  fn comment(id: &str, secs: i64) -> Comment {
    Comment {
      issue_id:    IssueId::new(TrackerKind::Jira, "ZOOKEEPER-7"),
      external_id: id.into(),
      author:      Some(Person::new("pat")),
      body:        "ack".into(),
      created_at:  t(secs),
      edited_at:   None,
    }
  }

  #[test]
  fn assembles_and_exposes_history() {
    let current = IssueState::new().with(Field::Status, FieldValue::Enum("Resolved".into()));
    let events = vec![status_event("ZOOKEEPER-7", "100%%0", 10)];
    let rewound = rewind::rewind(&current, &events);
    let issue = assemble(
      skeleton(),
      Some(Person::new("pat")),
      current.clone(),
      rewound,
      events,
      vec![comment("c1", 5), comment("c2", 10)],
    )
    .unwrap();

    assert_eq!(issue.vocabulary_version(), VOCABULARY_VERSION);
    assert_eq!(
      issue.original_state().get(&Field::Status),
      Some(&FieldValue::Enum("Open".into()))
    );
    assert_eq!(issue.state_at(t(99)), current);

    let kinds: Vec<_> = issue
      .timeline()
      .iter()
      .map(|e| match e {
        TimelineEntry::Event(_) => "event",
        TimelineEntry::Comment(_) => "comment",
      })
      .collect();
    assert_eq!(kinds, ["comment", "event", "comment"]);
  }

  #[test]
  fn foreign_event_is_an_assembly_error() {
    let err = assemble(
      skeleton(),
      None,
      IssueState::new(),
      Rewind::default(),
      vec![status_event("ZOOKEEPER-8", "1%%0", 1)],
      Vec::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Assembly(_)));
    assert_eq!(err.severity(), crate::Severity::Bug);
  }

  #[test]
  fn unsorted_comments_are_rejected() {
    let err = assemble(
      skeleton(),
      None,
      IssueState::new(),
      Rewind::default(),
      Vec::new(),
      vec![comment("late", 9), comment("early", 1)],
    )
    .unwrap_err();
    assert!(err.to_string().contains("early"));
  }

  #[test]
  fn timeline_serializes_with_type_tags() {
    let issue = assemble(
      skeleton(),
      None,
      IssueState::new(),
      Rewind::default(),
      Vec::new(),
      vec![comment("c1", 1)],
    )
    .unwrap();
    let json = serde_json::to_value(issue.timeline()).unwrap();
    assert_eq!(json[0]["type"], "comment");
    assert_eq!(json[0]["external_id"], "c1");
  }
}
