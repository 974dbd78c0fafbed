//! The State Rewinder.
//!
//! Starting from an issue's current state, the rewinder walks the ordered
//! event list backwards and undoes every change, yielding the state the issue
//! had when it was created. The inverse of each event depends only on the
//! value kind of its field; nothing here knows which tracker an event came
//! from.
//!
//! All functions are pure: they take a snapshot and an event slice and return
//! a fresh state.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  event::ChangeEvent,
  field::{Field, FieldKind, FieldValue, IssueState},
};

// ─── Output ──────────────────────────────────────────────────────────────────

/// An event whose recorded `new_value` did not match the working value at
/// its position. The event was applied anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewindInconsistency {
  pub event_id: String,
  pub field:    Field,
  /// What the event says the field was after it happened.
  pub expected: Option<FieldValue>,
  /// What the working state actually held at that point.
  pub found:    Option<FieldValue>,
}

impl fmt::Display for RewindInconsistency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let show = |v: &Option<FieldValue>| {
      v.as_ref().map_or_else(|| "<unset>".to_owned(), ToString::to_string)
    };
    write!(
      f,
      "event {} on {}: expected {}, found {}",
      self.event_id,
      self.field,
      show(&self.expected),
      show(&self.found)
    )
  }
}

/// The result of rewinding one issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewind {
  pub original: IssueState,
  pub warnings: Vec<RewindInconsistency>,
  /// Fields a rewind step cleared and no earlier event restored. Their value
  /// at creation cannot be recovered and no default is assumed.
  pub gaps:     BTreeSet<Field>,
}

// ─── Backward pass ───────────────────────────────────────────────────────────

/// Undo `events` (in chronological order) starting from `current`.
///
/// Unknown fields are skipped. A mismatch between an event and the working
/// state is recorded as a warning and the event is still undone, trusting
/// the event stream over the snapshot.
pub fn rewind(current: &IssueState, events: &[ChangeEvent]) -> Rewind {
  let mut working = current.clone();
  let mut warnings = Vec::new();
  let mut cleared = BTreeSet::new();

  for event in events.iter().rev() {
    let Some(kind) = event.field.kind() else { continue };

    if kind == FieldKind::TextSet {
      let added = element(&event.new_value);
      let removed = element(&event.old_value);
      let present = working.update_set(&event.field, |set| {
        let present = added.is_none_or(|a| set.remove(a));
        if let Some(r) = removed {
          set.insert(r.to_owned());
        }
        present
      });
      if !present {
        warnings.push(RewindInconsistency {
          event_id: event.external_id.clone(),
          field:    event.field.clone(),
          expected: event.new_value.clone(),
          found:    None,
        });
      }
      continue;
    }

    let found = working.get(&event.field);
    if found != event.new_value.as_ref() {
      warnings.push(RewindInconsistency {
        event_id: event.external_id.clone(),
        field:    event.field.clone(),
        expected: event.new_value.clone(),
        found:    found.cloned(),
      });
    }
    if event.old_value.is_none() {
      cleared.insert(event.field.clone());
    }
    working.set(event.field.clone(), event.old_value.clone());
  }

  let gaps = cleared
    .into_iter()
    .filter(|f| working.get(f).is_none())
    .collect();
  Rewind {
    original: working,
    warnings,
    gaps,
  }
}

// ─── Forward pass ────────────────────────────────────────────────────────────

/// Apply `events` forwards, in chronological order, starting from
/// `original`. The inverse of [`rewind`] for consistent event streams.
pub fn replay(original: &IssueState, events: &[ChangeEvent]) -> IssueState {
  let mut working = original.clone();
  for event in events {
    apply(&mut working, event);
  }
  working
}

/// The state as of `at`: `original` with every event up to and including
/// `at` applied.
pub fn state_at(
  original: &IssueState,
  events: &[ChangeEvent],
  at: DateTime<Utc>,
) -> IssueState {
  let mut working = original.clone();
  for event in events.iter().take_while(|e| e.timestamp <= at) {
    apply(&mut working, event);
  }
  working
}

fn apply(working: &mut IssueState, event: &ChangeEvent) {
  match event.field.kind() {
    None => {}
    Some(FieldKind::TextSet) => {
      let added = element(&event.new_value);
      let removed = element(&event.old_value);
      working.update_set(&event.field, |set| {
        if let Some(r) = removed {
          set.remove(r);
        }
        if let Some(a) = added {
          set.insert(a.to_owned());
        }
      });
    }
    Some(_) => working.set(event.field.clone(), event.new_value.clone()),
  }
}

/// The element carried by a set-of-text event value.
fn element(value: &Option<FieldValue>) -> Option<&str> {
  value.as_ref().and_then(FieldValue::as_text)
}
