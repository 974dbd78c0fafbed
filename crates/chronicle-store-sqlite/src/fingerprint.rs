//! Content fingerprints for change detection.

use chronicle_core::assemble::Issue;
use sha2::{Digest, Sha256};

use crate::Result;

/// SHA-256 over the issue's canonical JSON, hex encoded.
///
/// Field maps are ordered and events and comments keep their canonical
/// order, so equal issues always hash equal.
pub fn fingerprint(issue: &Issue) -> Result<String> {
  let bytes = serde_json::to_vec(issue)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tests::sample_issue;

  #[test]
  fn equal_issues_hash_equal() {
    let a = fingerprint(&sample_issue("1", "open")).unwrap();
    let b = fingerprint(&sample_issue("1", "open")).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn any_change_changes_the_hash() {
    let a = fingerprint(&sample_issue("1", "open")).unwrap();
    let b = fingerprint(&sample_issue("1", "closed")).unwrap();
    assert_ne!(a, b);
  }
}
