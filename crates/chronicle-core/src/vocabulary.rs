//! The canonical field vocabulary: a fixed, versioned lookup from each
//! tracker's native field and action names to canonical [`Field`]s.
//!
//! Supporting a new tracker means adding a table here and a wire adapter;
//! the rewinder never changes.

use crate::{field::Field, tracker::TrackerKind};

/// Bumped whenever a mapping changes meaning. Stored alongside assembled
/// issues so consumers can tell which table produced them.
pub const VOCABULARY_VERSION: u32 = 1;

/// How a tracker encodes values of a set-of-text field in its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetEncoding {
  /// Each value is exactly one element.
  Element,
  /// Each value lists several added/removed elements.
  Delimited(&'static str),
  /// Old and new values are the complete sets before and after the change.
  Snapshot(&'static str),
}

impl SetEncoding {
  /// Split one textual value into its elements.
  pub fn split<'a>(&self, value: &'a str) -> Vec<&'a str> {
    let parts: Vec<&str> = match self {
      Self::Element => vec![value],
      Self::Delimited(sep) | Self::Snapshot(sep) => value.split(sep).collect(),
    };
    parts
      .into_iter()
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .collect()
  }
}

/// A change the tracker records only as an action, without values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpliedChange {
  pub old: &'static str,
  pub new: &'static str,
}

/// How one native name maps onto the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
  pub field:          Field,
  pub encoding:       SetEncoding,
  pub implied:        Option<ImpliedChange>,
  /// Closed value set for enums; empty means open.
  pub allowed:        &'static [&'static str],
  /// Prepended to every set element (`"blocks "` turns `"12"` into a link).
  pub element_prefix: Option<&'static str>,
}

impl Mapping {
  fn to(field: Field) -> Self {
    Self {
      field,
      encoding: SetEncoding::Element,
      implied: None,
      allowed: &[],
      element_prefix: None,
    }
  }

  fn encoded(mut self, encoding: SetEncoding) -> Self {
    self.encoding = encoding;
    self
  }

  fn implied(mut self, old: &'static str, new: &'static str) -> Self {
    self.implied = Some(ImpliedChange { old, new });
    self
  }

  fn allowed(mut self, values: &'static [&'static str]) -> Self {
    self.allowed = values;
    self
  }

  fn prefixed(mut self, prefix: &'static str) -> Self {
    self.element_prefix = Some(prefix);
    self
  }
}

const GITHUB_STATES: &[&str] = &["open", "closed"];

/// Look up a native name. `None` means the name is outside the vocabulary
/// and the caller should tag it `unknown:<name>`.
pub fn lookup(tracker: TrackerKind, name: &str) -> Option<Mapping> {
  match tracker {
    TrackerKind::GitHub => github(name),
    TrackerKind::Jira => jira(name),
    TrackerKind::Bugzilla => bugzilla(name),
  }
}

/// Look up a native name, falling back to an `unknown:` field.
pub fn resolve(tracker: TrackerKind, name: &str) -> Mapping {
  lookup(tracker, name).unwrap_or_else(|| Mapping::to(Field::unknown(name)))
}

fn github(name: &str) -> Option<Mapping> {
  Some(match name {
    "title" | "renamed" => Mapping::to(Field::Title),
    "body" => Mapping::to(Field::Description),
    "state" => Mapping::to(Field::Status).allowed(GITHUB_STATES),
    "closed" => Mapping::to(Field::Status)
      .allowed(GITHUB_STATES)
      .implied("open", "closed"),
    "reopened" => Mapping::to(Field::Status)
      .allowed(GITHUB_STATES)
      .implied("closed", "open"),
    "labels" | "labeled" | "unlabeled" => Mapping::to(Field::Labels),
    "assignee" | "assigned" | "unassigned" => Mapping::to(Field::Assignee),
    "milestone" | "milestoned" | "demilestoned" => Mapping::to(Field::Milestone),
    _ => return None,
  })
}

fn jira(name: &str) -> Option<Mapping> {
  Some(match name {
    "summary" => Mapping::to(Field::Title),
    "description" => Mapping::to(Field::Description),
    "environment" => Mapping::to(Field::Environment),
    "timeoriginalestimate" => Mapping::to(Field::OriginalEstimate),
    "status" => Mapping::to(Field::Status),
    "priority" => Mapping::to(Field::Priority),
    "resolution" => Mapping::to(Field::Resolution),
    "issuetype" => Mapping::to(Field::IssueType),
    "parent" | "Parent" => Mapping::to(Field::Parent),
    "duedate" => Mapping::to(Field::DueDate),
    "labels" | "Labels" => {
      Mapping::to(Field::Labels).encoded(SetEncoding::Snapshot(" "))
    }
    "components" | "Component" => Mapping::to(Field::Components),
    "versions" | "Version" => Mapping::to(Field::AffectsVersions),
    "fixVersions" | "Fix Version" => Mapping::to(Field::FixVersions),
    "issuelinks" | "Link" => Mapping::to(Field::Links),
    "assignee" => Mapping::to(Field::Assignee),
    _ => return None,
  })
}

fn bugzilla(name: &str) -> Option<Mapping> {
  let list = SetEncoding::Delimited(",");
  Some(match name {
    "summary" | "short_desc" => Mapping::to(Field::Title),
    "description" => Mapping::to(Field::Description),
    "op_sys" => Mapping::to(Field::Environment),
    "platform" | "rep_platform" => Mapping::to(Field::Platform),
    "status" | "bug_status" => Mapping::to(Field::Status),
    "resolution" => Mapping::to(Field::Resolution),
    "severity" | "bug_severity" => Mapping::to(Field::Severity),
    "priority" => Mapping::to(Field::Priority),
    "type" => Mapping::to(Field::IssueType),
    "target_milestone" => Mapping::to(Field::Milestone),
    "deadline" => Mapping::to(Field::DueDate),
    "keywords" => Mapping::to(Field::Labels).encoded(list),
    "component" => Mapping::to(Field::Components).encoded(list),
    "version" => Mapping::to(Field::AffectsVersions).encoded(list),
    "depends_on" => Mapping::to(Field::Links)
      .encoded(list)
      .prefixed("depends on "),
    "blocks" => Mapping::to(Field::Links).encoded(list).prefixed("blocks "),
    "dupe_of" => Mapping::to(Field::Links)
      .encoded(list)
      .prefixed("duplicates "),
    "assigned_to" | "assigned_to_detail" => Mapping::to(Field::Assignee),
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn jira_changelog_and_issue_names_agree() {
    assert_eq!(
      lookup(TrackerKind::Jira, "Fix Version").unwrap().field,
      lookup(TrackerKind::Jira, "fixVersions").unwrap().field,
    );
    assert_eq!(
      lookup(TrackerKind::Jira, "Labels").unwrap().encoding,
      SetEncoding::Snapshot(" ")
    );
  }

  #[test]
  fn github_close_implies_status_values() {
    let m = lookup(TrackerKind::GitHub, "closed").unwrap();
    assert_eq!(m.field, Field::Status);
    assert_eq!(
      m.implied,
      Some(ImpliedChange {
        old: "open",
        new: "closed",
      })
    );
  }

  #[test]
  fn unrecognized_names_resolve_to_unknown() {
    assert_eq!(lookup(TrackerKind::GitHub, "subscribed"), None);
    let m = resolve(TrackerKind::Bugzilla, "cc");
    assert_eq!(m.field, Field::unknown("cc"));
  }

  #[test]
  fn bugzilla_links_carry_their_effect() {
    let m = lookup(TrackerKind::Bugzilla, "blocks").unwrap();
    assert_eq!(m.field, Field::Links);
    assert_eq!(m.element_prefix, Some("blocks "));
  }

  #[test]
  fn split_trims_and_drops_empties() {
    assert_eq!(SetEncoding::Delimited(",").split("a, b,,c "), vec!["a", "b", "c"]);
    assert_eq!(SetEncoding::Snapshot(" ").split(" x  y"), vec!["x", "y"]);
    assert_eq!(SetEncoding::Element.split(" one two "), vec!["one two"]);
    assert!(SetEncoding::Element.split("  ").is_empty());
  }
}
