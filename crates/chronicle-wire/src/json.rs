//! Small helpers shared by the adapters.

use chrono::{DateTime, Utc};
use chronicle_core::{Error, Result, normalize::parse_date, raw::RawValue};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Deserialize `value` into a wire type, reporting any shape mismatch as a
/// malformed record for `external_id`.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value, external_id: &str, what: &str) -> Result<T> {
  T::deserialize(value).map_err(|e| Error::malformed(external_id, format!("{what}: {e}")))
}

/// A required timestamp.
pub(crate) fn timestamp(raw: &str, external_id: &str, what: &str) -> Result<DateTime<Utc>> {
  parse_date(raw)
    .ok_or_else(|| Error::malformed(external_id, format!("{what}: unparseable timestamp {raw:?}")))
}

/// An optional timestamp; garbage counts as absent.
pub(crate) fn maybe_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> { raw.and_then(parse_date) }

/// Best-effort id for error messages, read before the payload is decoded.
pub(crate) fn id_hint(value: &Value, keys: &[&str]) -> String {
  keys
    .iter()
    .find_map(|k| match value.get(k)? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
    .unwrap_or_else(|| "<unknown>".to_owned())
}

pub(crate) fn text(value: Option<String>) -> Option<RawValue> { value.map(RawValue::Text) }

/// Trackers disagree on whether "no value" is `null` or `""`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> { value.filter(|s| !s.is_empty()) }

/// Some fields are a string on one server version and a list on another.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

impl OneOrMany {
  pub(crate) fn into_vec(self) -> Vec<String> {
    match self {
      Self::One(s) => vec![s],
      Self::Many(v) => v,
    }
  }
}

/// Accept either `T` itself or a `{ key: [T, ...] }` envelope around it.
pub(crate) fn unwrap_envelope<'a>(value: &'a Value, key: &str) -> &'a Value {
  match value.get(key).and_then(Value::as_array).and_then(|a| a.first()) {
    Some(inner) => inner,
    None => value,
  }
}
