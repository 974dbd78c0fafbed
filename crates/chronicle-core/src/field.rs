//! Canonical fields, their value kinds, and issue state snapshots.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::person::Person;

// ─── Field ───────────────────────────────────────────────────────────────────

/// Prefix used for fields outside the canonical vocabulary.
pub const UNKNOWN_PREFIX: &str = "unknown:";

/// A tracker-agnostic issue attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Field {
  Title,
  Description,
  Environment,
  OriginalEstimate,
  Status,
  Priority,
  Severity,
  Resolution,
  IssueType,
  Platform,
  Milestone,
  Parent,
  DueDate,
  Labels,
  Components,
  AffectsVersions,
  FixVersions,
  Links,
  Assignee,
  /// A tracker field with no canonical mapping; holds the original name.
  Unknown(String),
}

impl Field {
  /// Every canonical field, in declaration order.
  pub const CANONICAL: [Field; 19] = [
    Field::Title,
    Field::Description,
    Field::Environment,
    Field::OriginalEstimate,
    Field::Status,
    Field::Priority,
    Field::Severity,
    Field::Resolution,
    Field::IssueType,
    Field::Platform,
    Field::Milestone,
    Field::Parent,
    Field::DueDate,
    Field::Labels,
    Field::Components,
    Field::AffectsVersions,
    Field::FixVersions,
    Field::Links,
    Field::Assignee,
  ];

  pub fn unknown(original: impl Into<String>) -> Self { Self::Unknown(original.into()) }

  /// The value kind that governs how changes to this field are inverted.
  /// `None` for unknown fields, whose inverse is undefined.
  pub fn kind(&self) -> Option<FieldKind> {
    Some(match self {
      Self::Title | Self::Description | Self::Environment | Self::OriginalEstimate => {
        FieldKind::Text
      }
      Self::Status
      | Self::Priority
      | Self::Severity
      | Self::Resolution
      | Self::IssueType
      | Self::Platform
      | Self::Milestone
      | Self::Parent => FieldKind::Enum,
      Self::DueDate => FieldKind::Date,
      Self::Labels
      | Self::Components
      | Self::AffectsVersions
      | Self::FixVersions
      | Self::Links => FieldKind::TextSet,
      Self::Assignee => FieldKind::Person,
      Self::Unknown(_) => return None,
    })
  }

  pub fn is_unknown(&self) -> bool { matches!(self, Self::Unknown(_)) }

  fn canonical_name(&self) -> Option<&'static str> {
    Some(match self {
      Self::Title => "title",
      Self::Description => "description",
      Self::Environment => "environment",
      Self::OriginalEstimate => "original_estimate",
      Self::Status => "status",
      Self::Priority => "priority",
      Self::Severity => "severity",
      Self::Resolution => "resolution",
      Self::IssueType => "issue_type",
      Self::Platform => "platform",
      Self::Milestone => "milestone",
      Self::Parent => "parent",
      Self::DueDate => "due_date",
      Self::Labels => "labels",
      Self::Components => "components",
      Self::AffectsVersions => "affects_versions",
      Self::FixVersions => "fix_versions",
      Self::Links => "links",
      Self::Assignee => "assignee",
      Self::Unknown(_) => return None,
    })
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Unknown(original) => write!(f, "{UNKNOWN_PREFIX}{original}"),
      known => f.write_str(known.canonical_name().unwrap_or_default()),
    }
  }
}

/// Error returned when a string is neither a canonical field name nor an
/// `unknown:`-tagged name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a canonical field name: {0:?}")]
pub struct ParseFieldError(pub String);

impl FromStr for Field {
  type Err = ParseFieldError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(original) = s.strip_prefix(UNKNOWN_PREFIX) {
      return Ok(Self::Unknown(original.to_owned()));
    }
    Self::CANONICAL
      .into_iter()
      .find(|f| f.canonical_name() == Some(s))
      .ok_or_else(|| ParseFieldError(s.to_owned()))
  }
}

impl From<Field> for String {
  fn from(field: Field) -> Self { field.to_string() }
}

impl TryFrom<String> for Field {
  type Error = ParseFieldError;

  fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

// ─── Value kinds ─────────────────────────────────────────────────────────────

/// The semantic type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum FieldKind {
  #[strum(serialize = "scalar-text")]
  #[serde(rename = "scalar-text")]
  Text,
  #[strum(serialize = "scalar-enum")]
  #[serde(rename = "scalar-enum")]
  Enum,
  #[strum(serialize = "scalar-date")]
  #[serde(rename = "scalar-date")]
  Date,
  #[strum(serialize = "set-of-text")]
  #[serde(rename = "set-of-text")]
  TextSet,
  #[strum(serialize = "person-reference")]
  #[serde(rename = "person-reference")]
  Person,
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A typed field value.
///
/// State snapshots hold a `Set` for set-of-text fields. Change events on
/// those fields instead carry single elements as `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
  Text(String),
  Enum(String),
  Date(DateTime<Utc>),
  Person(Person),
  Set(BTreeSet<String>),
  /// Uninterpreted text from an unknown field.
  Raw(String),
}

impl FieldValue {
  /// The text payload of a scalar value, used for set elements.
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) | Self::Enum(s) | Self::Raw(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_set(&self) -> Option<&BTreeSet<String>> {
    match self {
      Self::Set(s) => Some(s),
      _ => None,
    }
  }

  pub fn set<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::Set(items.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) | Self::Enum(s) | Self::Raw(s) => f.write_str(s),
      Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
      Self::Person(p) => f.write_str(&p.login),
      Self::Set(items) => {
        let joined: Vec<&str> = items.iter().map(String::as_str).collect();
        write!(f, "{{{}}}", joined.join(", "))
      }
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// A snapshot of canonical field values. An absent field is "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueState(BTreeMap<Field, FieldValue>);

impl IssueState {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, field: &Field) -> Option<&FieldValue> { self.0.get(field) }

  /// Builder-style insert, handy for constructing fixtures.
  pub fn with(mut self, field: Field, value: FieldValue) -> Self {
    self.0.insert(field, value);
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldValue)> { self.0.iter() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  // Mutation stays inside the crate: published states are immutable.

  pub(crate) fn set(&mut self, field: Field, value: Option<FieldValue>) {
    match value {
      Some(v) => {
        self.0.insert(field, v);
      }
      None => {
        self.0.remove(&field);
      }
    }
  }

  /// Run `update` on the element set of a set-of-text field. An unset (or
  /// mistyped) slot starts out empty; the slot always ends up a `Set`.
  pub(crate) fn update_set<R>(
    &mut self,
    field: &Field,
    update: impl FnOnce(&mut BTreeSet<String>) -> R,
  ) -> R {
    let mut items = match self.0.remove(field) {
      Some(FieldValue::Set(items)) => items,
      _ => BTreeSet::new(),
    };
    let out = update(&mut items);
    self.0.insert(field.clone(), FieldValue::Set(items));
    out
  }
}

impl FromIterator<(Field, FieldValue)> for IssueState {
  fn from_iter<T: IntoIterator<Item = (Field, FieldValue)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}
