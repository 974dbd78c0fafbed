//! People: the authors, reporters and assignees referenced by issues.
//!
//! The core never decides on its own that two author strings name the same
//! person. That is the job of a [`PeopleResolver`].

use std::{
  cmp::Ordering,
  collections::BTreeMap,
  hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A person exactly as a tracker describes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPerson {
  pub login: String,
  pub name:  Option<String>,
  pub email: Option<String>,
}

impl RawPerson {
  pub fn login(login: impl Into<String>) -> Self {
    Self {
      login: login.into(),
      ..Self::default()
    }
  }
}

/// A canonical person. Identity is the login alone: `name` and `email` are
/// descriptive and differ between an issue payload and its changelog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub login: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

impl Person {
  pub fn new(login: impl Into<String>) -> Self {
    Self {
      login: login.into(),
      name:  None,
      email: None,
    }
  }
}

impl PartialEq for Person {
  fn eq(&self, other: &Self) -> bool { self.login == other.login }
}

impl Eq for Person {}

impl Hash for Person {
  fn hash<H: Hasher>(&self, state: &mut H) { self.login.hash(state) }
}

impl PartialOrd for Person {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Person {
  fn cmp(&self, other: &Self) -> Ordering { self.login.cmp(&other.login) }
}

/// Turns raw author strings into canonical [`Person`]s.
///
/// Implementations must be deterministic: the same input always yields the
/// same person, so rewinding is reproducible across runs.
pub trait PeopleResolver: Send + Sync {
  fn resolve(&self, raw: &RawPerson) -> Person;
}

/// Default resolver: trims logins, applies a configured alias table and
/// undoes the `" at "` / `" dot "` address obfuscation some trackers apply.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
  aliases: BTreeMap<String, String>,
}

impl AliasResolver {
  pub fn new(aliases: BTreeMap<String, String>) -> Self {
    let aliases = aliases
      .into_iter()
      .map(|(from, to)| (from.trim().to_owned(), to.trim().to_owned()))
      .collect();
    Self { aliases }
  }
}

impl PeopleResolver for AliasResolver {
  fn resolve(&self, raw: &RawPerson) -> Person {
    let login = raw.login.trim();
    let login = self.aliases.get(login).map_or(login, String::as_str);
    Person {
      login: login.to_owned(),
      name:  raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned),
      email: raw.email.as_deref().and_then(deobfuscate_email),
    }
  }
}

/// `"jane at example dot org"` → `"jane@example.org"`. Placeholder values
/// such as `"null"` or empty strings mean "no address".
fn deobfuscate_email(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
    return None;
  }
  Some(trimmed.replace(" at ", "@").replace(" dot ", "."))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trims_and_keeps_details() {
    let resolver = AliasResolver::default();
    let person = resolver.resolve(&RawPerson {
      login: "  alice ".into(),
      name:  Some("Alice Liddell".into()),
      email: Some("alice@example.com".into()),
    });
    assert_eq!(person.login, "alice");
    assert_eq!(person.name.as_deref(), Some("Alice Liddell"));
    assert_eq!(person.email.as_deref(), Some("alice@example.com"));
  }

  #[test]
  fn aliases_collapse_logins() {
    let resolver = AliasResolver::new(BTreeMap::from([(
      "alice@corp.example".to_owned(),
      "alice".to_owned(),
    )]));
    let a = resolver.resolve(&RawPerson::login("alice@corp.example"));
    let b = resolver.resolve(&RawPerson::login("alice"));
    assert_eq!(a, b);
  }

  #[test]
  fn undoes_address_obfuscation() {
    let resolver = AliasResolver::default();
    let person = resolver.resolve(&RawPerson {
      login: "bob".into(),
      name:  None,
      email: Some("bob at apache dot org".into()),
    });
    assert_eq!(person.email.as_deref(), Some("bob@apache.org"));
  }

  #[test]
  fn identity_ignores_details() {
    use std::collections::hash_map::DefaultHasher;

    let bare = Person::new("dev@example.org");
    let detailed = Person {
      login: "dev@example.org".into(),
      name:  Some("Dev".into()),
      email: Some("dev@example.org".into()),
    };
    assert_eq!(bare, detailed);
    assert_eq!(bare.cmp(&detailed), Ordering::Equal);

    let hash = |p: &Person| {
      let mut h = DefaultHasher::new();
      p.hash(&mut h);
      h.finish()
    };
    assert_eq!(hash(&bare), hash(&detailed));
    assert_ne!(bare, Person::new("someone-else"));
  }

  #[test]
  fn null_placeholder_is_no_email() {
    let resolver = AliasResolver::default();
    let person = resolver.resolve(&RawPerson {
      login: "carol".into(),
      name:  Some("  ".into()),
      email: Some("null".into()),
    });
    assert_eq!(person.email, None);
    assert_eq!(person.name, None);
  }
}
