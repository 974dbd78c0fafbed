//! Encoding helpers between Chronicle types and the text stored in SQLite
//! columns.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z`) so that
//! string order is time order. Records are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use chronicle_core::{
  assemble::Issue,
  event::{ChangeEvent, Comment},
  field::Field,
  raw::IssueId,
  store::IssueSummary,
  tracker::TrackerKind,
};
use serde_json::Value;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Issue records ───────────────────────────────────────────────────────────

/// Column values for one row of `issues`, prepared outside the database
/// thread.
pub struct IssueRow {
  pub tracker:            &'static str,
  pub external_id:        String,
  pub title:              Option<String>,
  pub created_at:         String,
  pub updated_at:         Option<String>,
  pub vocabulary_version: i64,
  pub record_json:        String,
}

pub struct EventRow {
  pub external_id: String,
  pub field:       String,
  pub timestamp:   String,
  pub json:        String,
}

pub struct CommentRow {
  pub external_id: String,
  pub created_at:  String,
  pub json:        String,
}

/// Split an issue into its header row plus event and comment rows.
pub fn encode_issue(issue: &Issue) -> Result<(IssueRow, Vec<EventRow>, Vec<CommentRow>)> {
  let mut record = serde_json::to_value(issue)?;
  if let Value::Object(map) = &mut record {
    map.remove("events");
    map.remove("comments");
  }

  let row = IssueRow {
    tracker:            issue.id().tracker.as_str(),
    external_id:        issue.id().external_id.clone(),
    title:              issue.current_state().get(&Field::Title).map(ToString::to_string),
    created_at:         encode_dt(issue.created_at()),
    updated_at:         issue.updated_at().map(encode_dt),
    vocabulary_version: i64::from(issue.vocabulary_version()),
    record_json:        record.to_string(),
  };

  let events = issue
    .events()
    .iter()
    .map(|e| {
      Ok(EventRow {
        external_id: e.external_id.clone(),
        field:       e.field.to_string(),
        timestamp:   encode_dt(e.timestamp),
        json:        serde_json::to_string(e)?,
      })
    })
    .collect::<Result<_>>()?;

  let comments = issue
    .comments()
    .iter()
    .map(|c| {
      Ok(CommentRow {
        external_id: c.external_id.clone(),
        created_at:  encode_dt(c.created_at),
        json:        serde_json::to_string(c)?,
      })
    })
    .collect::<Result<_>>()?;

  Ok((row, events, comments))
}

/// Reassemble a stored issue from its header JSON and its item rows, which
/// must be in stored position order.
pub fn decode_issue(record_json: &str, events: &[String], comments: &[String]) -> Result<Issue> {
  let mut record: Value = serde_json::from_str(record_json)?;
  let events: Vec<ChangeEvent> = events
    .iter()
    .map(|e| serde_json::from_str(e))
    .collect::<Result<_, _>>()?;
  let comments: Vec<Comment> = comments
    .iter()
    .map(|c| serde_json::from_str(c))
    .collect::<Result<_, _>>()?;

  let Value::Object(map) = &mut record else {
    return Err(Error::Corrupt {
      issue:  "<unknown>".into(),
      reason: "record is not a JSON object".into(),
    });
  };
  map.insert("events".into(), serde_json::to_value(events)?);
  map.insert("comments".into(), serde_json::to_value(comments)?);
  Ok(serde_json::from_value(record)?)
}

// ─── Summaries ───────────────────────────────────────────────────────────────

/// Raw `issues` columns for a listing row.
pub struct RawSummary {
  pub tracker:     String,
  pub external_id: String,
  pub project:     String,
  pub title:       Option<String>,
  pub created_at:  String,
  pub updated_at:  Option<String>,
}

impl RawSummary {
  pub fn decode(self) -> Result<IssueSummary> {
    Ok(IssueSummary {
      id:         IssueId::new(TrackerKind::parse(&self.tracker)?, self.external_id),
      project:    self.project,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
      updated_at: self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
