//! The closed set of supported tracker families.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::Error;

/// A tracker family. Each variant has exactly one wire adapter.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TrackerKind {
  GitHub,
  Jira,
  Bugzilla,
}

impl TrackerKind {
  /// Parse a tracker tag, mapping failure onto the core error type.
  pub fn parse(tag: &str) -> Result<Self, Error> {
    tag.trim().parse().map_err(|_| Error::UnknownTracker(tag.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}
