//! Canonical change events and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  field::{Field, FieldValue},
  person::Person,
  raw::IssueId,
};

/// One atomic field mutation in canonical terms.
///
/// For set-of-text fields `new_value` is the element added and `old_value`
/// the element removed, both as [`FieldValue::Text`]. For every other kind
/// they are full before/after values; `None` means unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub issue_id:    IssueId,
  pub external_id: String,
  pub field:       Field,
  pub old_value:   Option<FieldValue>,
  pub new_value:   Option<FieldValue>,
  pub timestamp:   DateTime<Utc>,
  pub author:      Option<Person>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub commit:      Option<String>,
}

impl ChangeEvent {
  /// Whether the rewinder inverts this event. Unknown fields only appear in
  /// the timeline.
  pub fn is_rewindable(&self) -> bool { !self.field.is_unknown() }
}

/// A comment on an issue. Comments never take part in rewinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub issue_id:    IssueId,
  pub external_id: String,
  pub author:      Option<Person>,
  pub body:        String,
  pub created_at:  DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edited_at:   Option<DateTime<Utc>>,
}
