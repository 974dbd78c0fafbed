//! The Event Normalizer: maps raw, tracker-named records onto the canonical
//! vocabulary and orders events deterministically.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{
  Error,
  Result,
  event::{ChangeEvent, Comment},
  field::{FieldKind, FieldValue, IssueState},
  person::{PeopleResolver, RawPerson},
  raw::{RawComment, RawEvent, RawField, RawValue},
  tracker::TrackerKind,
  vocabulary::{self, Mapping, SetEncoding},
};

// ─── Dates ───────────────────────────────────────────────────────────────────

/// Parse a tracker timestamp. Accepts RFC 3339, Jira's
/// `2013-03-14T09:03:12.000+0000`, naive `YYYY-MM-DD HH:MM:SS[.f]` (taken
/// as UTC) and plain dates (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
    return Some(dt.and_utc());
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Events that survived coercion, in canonical order, plus the ones that
/// did not (always [`Error::ValueCoercion`]).
#[derive(Debug, Default)]
pub struct NormalizedEvents {
  pub events:  Vec<ChangeEvent>,
  pub dropped: Vec<Error>,
}

/// Current state in canonical terms, plus the fields whose current value
/// could not be coerced (those are left unset).
#[derive(Debug, Default)]
pub struct NormalizedState {
  pub state:    IssueState,
  pub rejected: Vec<Error>,
}

// ─── Normalizer ──────────────────────────────────────────────────────────────

/// Normalizes the records of one tracker family.
pub struct Normalizer<'a> {
  tracker: TrackerKind,
  people:  &'a dyn PeopleResolver,
}

impl<'a> Normalizer<'a> {
  pub fn new(tracker: TrackerKind, people: &'a dyn PeopleResolver) -> Self {
    Self { tracker, people }
  }

  /// Canonicalize an issue's current field values. Native fields outside
  /// the vocabulary are not part of the state. Several native fields may
  /// feed one set-of-text field (Bugzilla's `blocks` and `depends_on`);
  /// their elements are united.
  pub fn state(&self, issue_id: &str, fields: &[RawField]) -> NormalizedState {
    let mut out = NormalizedState::default();
    for raw in fields {
      let Some(mapping) = vocabulary::lookup(self.tracker, &raw.name) else {
        tracing::trace!(issue = issue_id, field = %raw.name, "field outside vocabulary");
        continue;
      };
      let Some(kind) = mapping.field.kind() else { continue };

      if kind == FieldKind::TextSet {
        let items = elements(raw.value.as_ref(), &mapping);
        out.state.update_set(&mapping.field, |set| set.extend(items));
        continue;
      }

      match self.scalar(kind, &mapping, raw.value.as_ref()) {
        Ok(value) => out.state.set(mapping.field, value),
        Err(reason) => out.rejected.push(Error::ValueCoercion {
          event_id: issue_id.to_owned(),
          field: mapping.field.to_string(),
          value: raw.value.as_ref().map(RawValue::render).unwrap_or_default(),
          reason,
        }),
      }
    }
    out
  }

  /// Canonicalize and order an issue's events.
  ///
  /// Events are sorted stably by timestamp, then by the tracker's sequence
  /// number when present; anything left tied keeps fetch order. A raw event
  /// on a set-of-text field may expand into several element-level events.
  pub fn events(&self, raw: &[RawEvent]) -> NormalizedEvents {
    let mut ordered: Vec<&RawEvent> = raw.iter().collect();
    ordered.sort_by_key(|e| (e.timestamp, e.sequence));

    let mut out = NormalizedEvents::default();
    for event in ordered {
      match self.event(event) {
        Ok(mut events) => out.events.append(&mut events),
        Err(err) => out.dropped.push(err),
      }
    }
    out
  }

  /// Canonicalize comments, ordered by creation time (stable).
  pub fn comments(&self, raw: &[RawComment]) -> Vec<Comment> {
    let mut comments: Vec<Comment> = raw
      .iter()
      .map(|c| Comment {
        issue_id:    c.issue_id.clone(),
        external_id: c.external_id.clone(),
        author:      c.author.as_ref().map(|p| self.people.resolve(p)),
        body:        c.body.clone(),
        created_at:  c.created_at,
        edited_at:   c.edited_at,
      })
      .collect();
    comments.sort_by_key(|c| c.created_at);
    comments
  }

  fn event(&self, raw: &RawEvent) -> Result<Vec<ChangeEvent>> {
    let mapping = vocabulary::resolve(self.tracker, &raw.name);

    let (old, new) = match (mapping.implied, &raw.old, &raw.new) {
      (Some(implied), None, None) => (
        Some(RawValue::text(implied.old)),
        Some(RawValue::text(implied.new)),
      ),
      _ => (raw.old.clone(), raw.new.clone()),
    };

    let template = ChangeEvent {
      issue_id:    raw.issue_id.clone(),
      external_id: raw.external_id.clone(),
      field:       mapping.field.clone(),
      old_value:   None,
      new_value:   None,
      timestamp:   raw.timestamp,
      author:      raw.author.as_ref().map(|p| self.people.resolve(p)),
      commit:      raw.commit.clone(),
    };

    let Some(kind) = mapping.field.kind() else {
      return Ok(vec![ChangeEvent {
        old_value: old.as_ref().and_then(raw_text),
        new_value: new.as_ref().and_then(raw_text),
        ..template
      }]);
    };

    if kind == FieldKind::TextSet {
      return Ok(expand_set(template, &mapping, old.as_ref(), new.as_ref()));
    }

    let coerce = |value: Option<&RawValue>| {
      self
        .scalar(kind, &mapping, value)
        .map_err(|reason| Error::ValueCoercion {
          event_id: raw.external_id.clone(),
          field: mapping.field.to_string(),
          value: value.map(RawValue::render).unwrap_or_default(),
          reason,
        })
    };
    Ok(vec![ChangeEvent {
      old_value: coerce(old.as_ref())?,
      new_value: coerce(new.as_ref())?,
      ..template
    }])
  }

  /// Coerce one scalar or person value. `Ok(None)` means "unset".
  fn scalar(
    &self,
    kind: FieldKind,
    mapping: &Mapping,
    value: Option<&RawValue>,
  ) -> Result<Option<FieldValue>, String> {
    let Some(value) = value else { return Ok(None) };

    if kind == FieldKind::Person {
      let raw = match value {
        RawValue::Person(p) => p.clone(),
        RawValue::Text(s) => RawPerson::login(s.as_str()),
        RawValue::List(_) => return Err("expected a single person".into()),
      };
      if raw.login.trim().is_empty() {
        return Ok(None);
      }
      return Ok(Some(FieldValue::Person(self.people.resolve(&raw))));
    }

    let text = match value {
      RawValue::Text(s) => s.as_str(),
      RawValue::List(_) => return Err(format!("expected a single {kind} value")),
      RawValue::Person(_) => return Err(format!("expected {kind}, found a person")),
    };
    if text.trim().is_empty() {
      return Ok(None);
    }

    Ok(Some(match kind {
      FieldKind::Text => FieldValue::Text(text.to_owned()),
      FieldKind::Enum => FieldValue::Enum(enum_value(mapping, text.trim())?),
      FieldKind::Date => FieldValue::Date(
        parse_date(text).ok_or_else(|| "unrecognised date format".to_owned())?,
      ),
      FieldKind::TextSet | FieldKind::Person => {
        return Err(format!("{kind} is not a scalar kind"));
      }
    }))
  }
}

/// Check an enum value against the mapping's closed value set, if any.
/// Matching is case-insensitive; the vocabulary's spelling wins.
fn enum_value(mapping: &Mapping, value: &str) -> Result<String, String> {
  if mapping.allowed.is_empty() {
    return Ok(value.to_owned());
  }
  mapping
    .allowed
    .iter()
    .find(|a| a.eq_ignore_ascii_case(value))
    .map(|a| (*a).to_owned())
    .ok_or_else(|| format!("not one of {}", mapping.allowed.join("/")))
}

fn raw_text(value: &RawValue) -> Option<FieldValue> {
  let text = value.render();
  (!text.trim().is_empty()).then_some(FieldValue::Raw(text))
}

/// The elements named by one raw value of a set-of-text field.
fn elements(value: Option<&RawValue>, mapping: &Mapping) -> Vec<String> {
  let items: Vec<String> = match value {
    None => Vec::new(),
    Some(RawValue::Text(s)) => mapping
      .encoding
      .split(s)
      .into_iter()
      .map(str::to_owned)
      .collect(),
    Some(RawValue::List(items)) => items
      .iter()
      .map(|i| i.trim())
      .filter(|i| !i.is_empty())
      .map(str::to_owned)
      .collect(),
    Some(RawValue::Person(p)) => vec![p.login.trim().to_owned()],
  };
  match mapping.element_prefix {
    Some(prefix) => items.into_iter().map(|i| format!("{prefix}{i}")).collect(),
    None => items,
  }
}

/// Turn one raw set change into element-level events, pairing the k-th
/// removed element with the k-th added one. Expanded events share the raw
/// event's timestamp and get `#k` suffixed ids.
fn expand_set(
  template: ChangeEvent,
  mapping: &Mapping,
  old: Option<&RawValue>,
  new: Option<&RawValue>,
) -> Vec<ChangeEvent> {
  let mut removed = elements(old, mapping);
  let mut added = elements(new, mapping);

  if let SetEncoding::Snapshot(_) = mapping.encoding {
    let before: BTreeSet<String> = removed.into_iter().collect();
    let after: BTreeSet<String> = added.into_iter().collect();
    removed = before.difference(&after).cloned().collect();
    added = after.difference(&before).cloned().collect();
  }

  let count = removed.len().max(added.len());
  let mut removed = removed.into_iter();
  let mut added = added.into_iter();
  (0..count)
    .map(|k| ChangeEvent {
      external_id: if count > 1 {
        format!("{}#{k}", template.external_id)
      } else {
        template.external_id.clone()
      },
      old_value: removed.next().map(FieldValue::Text),
      new_value: added.next().map(FieldValue::Text),
      ..template.clone()
    })
    .collect()
}
