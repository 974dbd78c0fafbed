//! Per-issue processing: adapter, normalizer, rewinder, assembler.
//!
//! Nothing in here can abort a batch. Every failure becomes a typed
//! [`IssueOutcome::Skipped`] for the driver to tally.

use tracing::{debug, error, warn};

use crate::{
  Error,
  Severity,
  assemble::{Issue, assemble},
  normalize::Normalizer,
  person::PeopleResolver,
  raw::{RawBundle, WireAdapter},
  rewind::{RewindInconsistency, rewind},
};

/// A successfully reconstructed issue plus the non-fatal problems met on
/// the way.
#[derive(Debug)]
pub struct Processed {
  pub issue:    Issue,
  /// Events (and current field values) that failed coercion.
  pub dropped:  Vec<Error>,
  pub warnings: Vec<RewindInconsistency>,
}

#[derive(Debug)]
pub enum IssueOutcome {
  Processed(Box<Processed>),
  Skipped { external_id: String, error: Error },
}

/// Run one raw issue through the whole core.
pub fn process_issue(
  adapter: &dyn WireAdapter,
  people: &dyn PeopleResolver,
  external_id: &str,
  bundle: &RawBundle,
) -> IssueOutcome {
  let skipped = |error: Error| {
    match error.severity() {
      Severity::Bug => error!(issue = external_id, %error, "issue skipped (bug)"),
      Severity::Skip => warn!(issue = external_id, %error, "issue skipped"),
    }
    IssueOutcome::Skipped {
      external_id: external_id.to_owned(),
      error,
    }
  };

  let parsed = match adapter.parse(bundle) {
    Ok(parsed) => parsed,
    Err(e) => return skipped(e),
  };

  let normalizer = Normalizer::new(adapter.tracker(), people);
  let state = normalizer.state(external_id, &parsed.skeleton.fields);
  let normalized = normalizer.events(&parsed.events);
  let comments = normalizer.comments(&parsed.comments);

  let mut dropped = state.rejected;
  dropped.extend(normalized.dropped);
  for error in &dropped {
    warn!(issue = external_id, %error, "dropped value");
  }

  let rewound = rewind(&state.state, &normalized.events);
  for w in &rewound.warnings {
    warn!(issue = external_id, inconsistency = %w, "rewind inconsistency");
  }
  let warnings = rewound.warnings.clone();

  let reporter = parsed.skeleton.reporter.as_ref().map(|p| people.resolve(p));
  match assemble(
    parsed.skeleton,
    reporter,
    state.state,
    rewound,
    normalized.events,
    comments,
  ) {
    Ok(issue) => {
      debug!(
        issue = external_id,
        events = issue.events().len(),
        comments = issue.comments().len(),
        gaps = issue.gaps().len(),
        "issue processed"
      );
      IssueOutcome::Processed(Box::new(Processed {
        issue,
        dropped,
        warnings,
      }))
    }
    Err(e) => skipped(e),
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::{
    Result,
    field::{Field, FieldValue},
    person::{AliasResolver, RawPerson},
    raw::{Capabilities, IssueId, IssueSkeleton, ParsedIssue, RawEvent, RawField, RawValue},
    tracker::TrackerKind,
  };

  /// Hands back a canned parse, or a malformed-record error.
  struct Canned(Option<ParsedIssue>);

  impl WireAdapter for Canned {
    fn tracker(&self) -> TrackerKind { TrackerKind::GitHub }

    fn capabilities(&self) -> Capabilities {
      Capabilities {
        recency_cursor:    true,
        events_endpoint:   true,
        comments_endpoint: true,
      }
    }

    fn parse(&self, _raw: &RawBundle) -> Result<ParsedIssue> {
      self.0.clone().ok_or_else(|| Error::malformed("42", "missing created_at"))
    }
  }

  fn parsed(event_issue: &str) -> ParsedIssue {
    let id = IssueId::new(TrackerKind::GitHub, "42");
    let at = |s| Utc.timestamp_opt(s, 0).unwrap();
    ParsedIssue {
      skeleton: IssueSkeleton {
        id:              id.clone(),
        url:             None,
        created_at:      at(0),
        updated_at:      Some(at(9)),
        reporter:        Some(RawPerson::login("octocat")),
        is_pull_request: false,
        fields:          vec![
          RawField::new("state", Some(RawValue::text("closed"))),
          RawField::new("title", Some(RawValue::text("Crash on start"))),
        ],
      },
      events:   vec![
        RawEvent {
          issue_id:    IssueId::new(TrackerKind::GitHub, event_issue),
          external_id: "1".into(),
          name:        "closed".into(),
          old:         None,
          new:         None,
          timestamp:   at(5),
          sequence:    Some(1),
          author:      None,
          commit:      Some("abc123".into()),
        },
        RawEvent {
          issue_id:    id,
          external_id: "2".into(),
          name:        "renamed".into(),
          old:         Some(RawValue::text("Crash")),
          new:         Some(RawValue::text("Crash on start")),
          timestamp:   at(3),
          sequence:    Some(2),
          author:      None,
          commit:      None,
        },
      ],
      comments: Vec::new(),
    }
  }

  #[test]
  fn processes_an_issue_end_to_end() {
    let people = AliasResolver::default();
    let outcome = process_issue(
      &Canned(Some(parsed("42"))),
      &people,
      "42",
      &RawBundle::default(),
    );
    let IssueOutcome::Processed(done) = outcome else {
      panic!("expected a processed issue");
    };
    let original = done.issue.original_state();
    assert_eq!(original.get(&Field::Status), Some(&FieldValue::Enum("open".into())));
    assert_eq!(original.get(&Field::Title), Some(&FieldValue::Text("Crash".into())));
    assert_eq!(done.issue.reporter().unwrap().login, "octocat");
    assert!(done.warnings.is_empty() && done.dropped.is_empty());
  }

  #[test]
  fn malformed_record_skips_the_issue() {
    let people = AliasResolver::default();
    let outcome = process_issue(&Canned(None), &people, "42", &RawBundle::default());
    assert!(matches!(
      outcome,
      IssueOutcome::Skipped { error: Error::MalformedRecord { .. }, .. }
    ));
  }

  #[test]
  fn identity_mismatch_skips_with_bug_severity() {
    let people = AliasResolver::default();
    let outcome = process_issue(
      &Canned(Some(parsed("43"))),
      &people,
      "42",
      &RawBundle::default(),
    );
    let IssueOutcome::Skipped { error, .. } = outcome else {
      panic!("expected a skip");
    };
    assert_eq!(error.severity(), Severity::Bug);
  }
}
