//! Error types for `chronicle-core`.
//!
//! The variants mirror how far a failure reaches: a malformed record skips one
//! issue, a coercion failure drops one event, an assembly failure skips one
//! issue and points at a bug upstream of the assembler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A required structural field is missing or has the wrong JSON type.
  #[error("malformed record {external_id}: {reason}")]
  MalformedRecord { external_id: String, reason: String },

  /// An event value could not be coerced into its field's value kind.
  #[error("cannot coerce {value:?} for field {field} in event {event_id}: {reason}")]
  ValueCoercion {
    event_id: String,
    field:    String,
    value:    String,
    reason:   String,
  },

  /// An internal invariant of the assembled record does not hold.
  #[error("assembly error: {0}")]
  Assembly(String),

  #[error("unknown tracker kind: {0:?}")]
  UnknownTracker(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// How loudly a per-issue failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  /// Dirty tracker data; skip and move on.
  Skip,
  /// An adapter or normalizer produced inconsistent output.
  Bug,
}

impl Error {
  pub fn malformed(external_id: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::MalformedRecord {
      external_id: external_id.into(),
      reason:      reason.into(),
    }
  }

  pub fn severity(&self) -> Severity {
    match self {
      Self::Assembly(_) => Severity::Bug,
      _ => Severity::Skip,
    }
  }

  /// Short, stable label used when aggregating failures in a run summary.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::MalformedRecord { .. } => "malformed_record",
      Self::ValueCoercion { .. } => "value_coercion",
      Self::Assembly(_) => "assembly",
      Self::UnknownTracker(_) => "unknown_tracker",
      Self::Serialization(_) => "serialization",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
