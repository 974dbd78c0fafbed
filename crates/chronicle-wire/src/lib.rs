//! Wire adapters for Chronicle.
//!
//! Each adapter translates one tracker family's JSON into the raw IR of
//! [`chronicle_core::raw`]. Adapters are pure and synchronous; fetching the
//! JSON is somebody else's job.
//!
//! The set of trackers is closed: [`Adapter`] is selected once from a
//! [`TrackerKind`] and dispatches by match.
//!
//! ```no_run
//! use chronicle_core::raw::{RawBundle, WireAdapter};
//! use chronicle_wire::Adapter;
//!
//! let adapter = Adapter::from_tag("jira").unwrap();
//! let parsed = adapter.parse(&RawBundle::default());
//! ```

pub mod bugzilla;
pub mod github;
pub mod jira;
mod json;

pub use bugzilla::BugzillaAdapter;
use chronicle_core::{
  Result,
  raw::{Capabilities, ParsedIssue, RawBundle, WireAdapter},
  tracker::TrackerKind,
};
pub use github::GitHubAdapter;
pub use jira::JiraAdapter;

/// The tracker registry.
#[derive(Debug, Clone, Copy)]
pub enum Adapter {
  GitHub(GitHubAdapter),
  Jira(JiraAdapter),
  Bugzilla(BugzillaAdapter),
}

impl Adapter {
  pub fn for_tracker(kind: TrackerKind) -> Self {
    match kind {
      TrackerKind::GitHub => Self::GitHub(GitHubAdapter),
      TrackerKind::Jira => Self::Jira(JiraAdapter),
      TrackerKind::Bugzilla => Self::Bugzilla(BugzillaAdapter),
    }
  }

  /// Select an adapter by its configuration tag (`"github"`, `"jira"`,
  /// `"bugzilla"`).
  pub fn from_tag(tag: &str) -> Result<Self> { TrackerKind::parse(tag).map(Self::for_tracker) }
}

impl WireAdapter for Adapter {
  fn tracker(&self) -> TrackerKind {
    match self {
      Self::GitHub(a) => a.tracker(),
      Self::Jira(a) => a.tracker(),
      Self::Bugzilla(a) => a.tracker(),
    }
  }

  fn capabilities(&self) -> Capabilities {
    match self {
      Self::GitHub(a) => a.capabilities(),
      Self::Jira(a) => a.capabilities(),
      Self::Bugzilla(a) => a.capabilities(),
    }
  }

  fn parse(&self, raw: &RawBundle) -> Result<ParsedIssue> {
    match self {
      Self::GitHub(a) => a.parse(raw),
      Self::Jira(a) => a.parse(raw),
      Self::Bugzilla(a) => a.parse(raw),
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn every_tracker_has_an_adapter() {
    for kind in TrackerKind::iter() {
      assert_eq!(Adapter::for_tracker(kind).tracker(), kind);
    }
  }

  #[test]
  fn unknown_tags_are_rejected() {
    assert!(matches!(
      Adapter::from_tag("redmine"),
      Err(chronicle_core::Error::UnknownTracker(_))
    ));
    assert_eq!(Adapter::from_tag(" GitHub ").unwrap().tracker(), TrackerKind::GitHub);
  }

  #[test]
  fn jira_embeds_events_and_comments() {
    let caps = Adapter::for_tracker(TrackerKind::Jira).capabilities();
    assert!(!caps.events_endpoint && !caps.comments_endpoint);
  }
}
