//! Bugzilla-shaped JSON: the 5.x REST `bug`, `bug/{id}/history` and
//! `bug/{id}/comment` payloads.

use chronicle_core::{
  Result,
  person::RawPerson,
  raw::{
    Capabilities, IssueId, IssueSkeleton, ParsedIssue, RawBundle, RawComment, RawEvent,
    RawField, RawValue, WireAdapter,
  },
  tracker::TrackerKind,
};
use serde::Deserialize;
use serde_json::Value;

use crate::json::{
  OneOrMany, decode, id_hint, maybe_timestamp, non_empty, text, timestamp, unwrap_envelope,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiUserDetail {
  name:      String,
  #[serde(default)]
  email:     Option<String>,
  #[serde(default)]
  real_name: Option<String>,
}

impl From<ApiUserDetail> for RawPerson {
  fn from(u: ApiUserDetail) -> Self {
    RawPerson {
      login: u.name,
      name:  non_empty(u.real_name),
      email: u.email,
    }
  }
}

#[derive(Debug, Deserialize)]
struct ApiBug {
  id:                 u64,
  #[serde(default)]
  summary:            Option<String>,
  #[serde(default)]
  status:             Option<String>,
  #[serde(default)]
  resolution:         Option<String>,
  #[serde(default)]
  severity:           Option<String>,
  #[serde(default)]
  priority:           Option<String>,
  #[serde(default, rename = "type")]
  bug_type:           Option<String>,
  #[serde(default)]
  component:          Option<OneOrMany>,
  #[serde(default)]
  version:            Option<OneOrMany>,
  #[serde(default)]
  target_milestone:   Option<String>,
  #[serde(default)]
  op_sys:             Option<String>,
  #[serde(default)]
  platform:           Option<String>,
  #[serde(default)]
  deadline:           Option<String>,
  #[serde(default)]
  keywords:           Vec<String>,
  #[serde(default)]
  depends_on:         Vec<u64>,
  #[serde(default)]
  blocks:             Vec<u64>,
  #[serde(default)]
  dupe_of:            Option<u64>,
  #[serde(default)]
  assigned_to:        Option<String>,
  #[serde(default)]
  assigned_to_detail: Option<ApiUserDetail>,
  #[serde(default)]
  creator:            Option<String>,
  #[serde(default)]
  creator_detail:     Option<ApiUserDetail>,
  creation_time:      String,
  #[serde(default)]
  last_change_time:   Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChange {
  field_name: String,
  #[serde(default)]
  removed:    Option<String>,
  #[serde(default)]
  added:      Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiHistory {
  when:    String,
  #[serde(default)]
  who:     Option<String>,
  #[serde(default)]
  changes: Vec<ApiChange>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
  id:            u64,
  #[serde(default)]
  count:         u64,
  #[serde(default)]
  creator:       Option<String>,
  #[serde(default)]
  text:          String,
  creation_time: String,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct BugzillaAdapter;

impl WireAdapter for BugzillaAdapter {
  fn tracker(&self) -> TrackerKind { TrackerKind::Bugzilla }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      recency_cursor:    true,
      events_endpoint:   true,
      comments_endpoint: true,
    }
  }

  fn parse(&self, raw: &RawBundle) -> Result<ParsedIssue> {
    let payload = unwrap_envelope(&raw.issue, "bugs");
    let hint = id_hint(payload, &["id"]);
    let bug: ApiBug = decode(payload, &hint, "bug")?;
    let id = IssueId::new(TrackerKind::Bugzilla, bug.id.to_string());
    let ext = id.external_id.clone();

    let comments: Vec<ApiComment> = match &raw.comments {
      Some(value) => decode(comment_list(value, &ext), &ext, "comments")?,
      None => Vec::new(),
    };
    let histories: Vec<ApiHistory> = match &raw.events {
      Some(value) => decode(history_list(value), &ext, "history")?,
      None => Vec::new(),
    };

    // Bugzilla has no description field; comment 0 plays that role.
    let description = comments
      .iter()
      .find(|c| c.count == 0)
      .map(|c| c.text.clone());

    let issue_type = issue_type(bug.bug_type.as_deref(), bug.severity.as_deref());
    let ids = |v: Vec<u64>| Some(RawValue::List(v.into_iter().map(|n| n.to_string()).collect()));
    let assignee = match (bug.assigned_to_detail, non_empty(bug.assigned_to)) {
      (Some(detail), _) => Some(RawPerson::from(detail)),
      (None, Some(login)) => Some(RawPerson::login(login)),
      (None, None) => None,
    };

    let fields = vec![
      RawField::new("summary", text(bug.summary)),
      RawField::new("description", text(description)),
      RawField::new("status", text(bug.status)),
      RawField::new("resolution", text(non_empty(bug.resolution))),
      RawField::new("severity", text(bug.severity)),
      RawField::new("priority", text(bug.priority)),
      RawField::new("type", Some(RawValue::text(issue_type))),
      RawField::new(
        "component",
        Some(RawValue::List(bug.component.map(OneOrMany::into_vec).unwrap_or_default())),
      ),
      RawField::new(
        "version",
        Some(RawValue::List(bug.version.map(OneOrMany::into_vec).unwrap_or_default())),
      ),
      RawField::new("target_milestone", text(bug.target_milestone)),
      RawField::new("op_sys", text(bug.op_sys)),
      RawField::new("platform", text(bug.platform)),
      RawField::new("deadline", text(bug.deadline)),
      RawField::new("keywords", Some(RawValue::List(bug.keywords))),
      RawField::new("depends_on", ids(bug.depends_on)),
      RawField::new("blocks", ids(bug.blocks)),
      RawField::new("dupe_of", ids(bug.dupe_of.into_iter().collect())),
      RawField::new("assigned_to", assignee.map(RawValue::Person)),
    ];

    let reporter = match (bug.creator_detail, non_empty(bug.creator)) {
      (Some(detail), _) => Some(detail.into()),
      (None, Some(login)) => Some(RawPerson::login(login)),
      (None, None) => None,
    };

    let skeleton = IssueSkeleton {
      id: id.clone(),
      url: None,
      created_at: timestamp(&bug.creation_time, &ext, "creation_time")?,
      updated_at: maybe_timestamp(bug.last_change_time.as_deref()),
      reporter,
      is_pull_request: false,
      fields,
    };

    let mut events = Vec::new();
    for (j, history) in histories.into_iter().enumerate() {
      let when = timestamp(&history.when, &ext, "history when")?;
      let author = non_empty(history.who).map(RawPerson::login);
      for (i, change) in history.changes.into_iter().enumerate() {
        let value = |v: Option<String>| {
          non_empty(v).map(|v| match change.field_name.as_str() {
            "assigned_to" => RawValue::Person(RawPerson::login(v)),
            "type" => RawValue::Text(self::issue_type(Some(&v), None)),
            _ => RawValue::Text(v),
          })
        };
        events.push(RawEvent {
          issue_id: id.clone(),
          external_id: format!("{ext}%%{i}%%{j}"),
          old: value(change.removed),
          new: value(change.added),
          name: change.field_name,
          timestamp: when,
          sequence: None,
          author: author.clone(),
          commit: None,
        });
      }
    }

    let comments = comments
      .into_iter()
      .filter(|c| c.count != 0)
      .map(|c| -> Result<RawComment> {
        Ok(RawComment {
          issue_id: id.clone(),
          external_id: c.id.to_string(),
          author: non_empty(c.creator).map(RawPerson::login),
          body: c.text,
          created_at: timestamp(&c.creation_time, &ext, "comment creation_time")?,
          edited_at: None,
        })
      })
      .collect::<Result<_>>()?;

    Ok(ParsedIssue {
      skeleton,
      events,
      comments,
    })
  }
}

/// Bugzilla 5.1+ has a `type` field; older servers only mark enhancements
/// through the severity. Applied to current values and history alike.
fn issue_type(bug_type: Option<&str>, severity: Option<&str>) -> String {
  match bug_type {
    Some(t) if t.eq_ignore_ascii_case("defect") => "Bug".to_owned(),
    Some(t) if t.eq_ignore_ascii_case("enhancement") => "Enhancement".to_owned(),
    Some(t) if !t.is_empty() => t.to_owned(),
    _ if severity.is_some_and(|s| s.eq_ignore_ascii_case("enhancement")) => {
      "Enhancement".to_owned()
    }
    _ => "Bug".to_owned(),
  }
}

/// `{"bugs": [{"history": [...]}]}` or a bare history array.
fn history_list(value: &Value) -> &Value {
  unwrap_envelope(value, "bugs")
    .get("history")
    .unwrap_or(value)
}

/// `{"bugs": {"<id>": {"comments": [...]}}}` or a bare comment array.
fn comment_list<'a>(value: &'a Value, id: &str) -> &'a Value {
  value
    .get("bugs")
    .and_then(|b| b.get(id))
    .and_then(|b| b.get("comments"))
    .unwrap_or(value)
}

#[cfg(test)]
mod tests {
  use chronicle_core::{
    field::{Field, FieldValue},
    person::AliasResolver,
    pipeline::{IssueOutcome, Processed, process_issue},
    rewind::replay,
  };
  use serde_json::json;

  use super::*;

  fn process(raw: &RawBundle) -> Box<Processed> {
    match process_issue(&BugzillaAdapter, &AliasResolver::default(), "35", raw) {
      IssueOutcome::Processed(processed) => processed,
      IssueOutcome::Skipped { error, .. } => panic!("skipped: {error}"),
    }
  }

  fn bundle() -> RawBundle {
    RawBundle {
      issue:    json!({ "bugs": [{
        "id": 35,
        "summary": "Crash when saving",
        "status": "RESOLVED",
        "resolution": "FIXED",
        "severity": "major",
        "priority": "P2",
        "component": "Editor",
        "version": "2.0",
        "target_milestone": "---",
        "op_sys": "Linux",
        "platform": "x86_64",
        "keywords": ["crash", "regression"],
        "depends_on": [12],
        "blocks": [],
        "dupe_of": null,
        "assigned_to": "dev@example.org",
        "assigned_to_detail": { "name": "dev@example.org", "email": "dev@example.org", "real_name": "Dev" },
        "creator": "qa@example.org",
        "creation_time": "2016-01-01T10:00:00Z",
        "last_change_time": "2016-02-01T10:00:00Z"
      }] }),
      events:   Some(json!({ "bugs": [{ "id": 35, "history": [
        { "when": "2016-01-02T10:00:00Z", "who": "dev@example.org", "changes": [
          { "field_name": "status", "removed": "NEW", "added": "ASSIGNED" },
          { "field_name": "assigned_to", "removed": "nobody@example.org", "added": "dev@example.org" }
        ] },
        { "when": "2016-01-05T10:00:00Z", "who": "dev@example.org", "changes": [
          { "field_name": "keywords", "removed": "", "added": "crash, regression" }
        ] }
      ] }] })),
      comments: Some(json!({ "bugs": { "35": { "comments": [
        { "id": 900, "count": 0, "creator": "qa@example.org", "text": "Steps to reproduce...",
          "creation_time": "2016-01-01T10:00:00Z" },
        { "id": 901, "count": 1, "creator": "dev@example.org", "text": "Confirmed.",
          "creation_time": "2016-01-02T09:00:00Z" }
      ] } } })),
    }
  }

  #[test]
  fn description_comes_from_comment_zero() {
    let parsed = BugzillaAdapter.parse(&bundle()).unwrap();
    let description = parsed
      .skeleton
      .fields
      .iter()
      .find(|f| f.name == "description")
      .and_then(|f| f.value.clone());
    assert_eq!(description, Some(RawValue::text("Steps to reproduce...")));
    assert_eq!(parsed.comments.len(), 1);
    assert_eq!(parsed.comments[0].external_id, "901");
  }

  #[test]
  fn history_ids_encode_change_and_entry_index() {
    let parsed = BugzillaAdapter.parse(&bundle()).unwrap();
    let ids: Vec<_> = parsed.events.iter().map(|e| e.external_id.as_str()).collect();
    assert_eq!(ids, ["35%%0%%0", "35%%1%%0", "35%%0%%1"]);
    assert!(parsed.events.iter().all(|e| e.sequence.is_none()));

    assert_eq!(
      parsed.events[1].old,
      Some(RawValue::Person(RawPerson::login("nobody@example.org")))
    );
    // Empty strings are "no value".
    assert_eq!(parsed.events[2].old, None);
  }

  #[test]
  fn skeleton_carries_reporter_and_assignee() {
    let parsed = BugzillaAdapter.parse(&bundle()).unwrap();
    let skel = &parsed.skeleton;
    assert_eq!(skel.id.external_id, "35");
    assert_eq!(skel.reporter.as_ref().unwrap().login, "qa@example.org");
    let assignee = skel.fields.iter().find(|f| f.name == "assigned_to").unwrap();
    let Some(RawValue::Person(p)) = &assignee.value else {
      panic!("assignee should be a person");
    };
    assert_eq!(p.name.as_deref(), Some("Dev"));
  }

  #[test]
  fn issue_type_falls_back_to_severity() {
    assert_eq!(issue_type(None, Some("enhancement")), "Enhancement");
    assert_eq!(issue_type(None, Some("major")), "Bug");
    assert_eq!(issue_type(Some("defect"), Some("enhancement")), "Bug");
    assert_eq!(issue_type(Some("task"), None), "task");
  }

  #[test]
  fn accepts_bare_payloads() {
    let mut raw = bundle();
    raw.issue = raw.issue["bugs"][0].clone();
    raw.events = Some(json!([]));
    raw.comments = None;
    let parsed = BugzillaAdapter.parse(&raw).unwrap();
    assert!(parsed.events.is_empty() && parsed.comments.is_empty());
  }

  #[test]
  fn assignee_history_matches_detailed_current_assignee() {
    let mut raw = bundle();
    raw.issue["bugs"][0]["status"] = json!("ASSIGNED");
    let processed = process(&raw);
    let issue = &processed.issue;

    assert!(processed.warnings.is_empty(), "{:?}", processed.warnings);
    assert_eq!(
      issue.original_state().get(&Field::Assignee),
      Some(&FieldValue::Person(chronicle_core::person::Person::new(
        "nobody@example.org"
      )))
    );
    assert_eq!(
      &replay(issue.original_state(), issue.events()),
      issue.current_state()
    );
  }

  #[test]
  fn type_history_uses_the_current_value_vocabulary() {
    let mut raw = bundle();
    raw.issue["bugs"][0]["status"] = json!("ASSIGNED");
    raw.issue["bugs"][0]["type"] = json!("enhancement");
    raw.events = Some(json!([
      { "when": "2016-01-03T10:00:00Z", "who": "qa@example.org", "changes": [
        { "field_name": "type", "removed": "defect", "added": "enhancement" }
      ] }
    ]));

    let parsed = BugzillaAdapter.parse(&raw).unwrap();
    assert_eq!(parsed.events[0].old, Some(RawValue::text("Bug")));
    assert_eq!(parsed.events[0].new, Some(RawValue::text("Enhancement")));

    let processed = process(&raw);
    assert!(processed.warnings.is_empty(), "{:?}", processed.warnings);
    assert_eq!(
      processed.issue.original_state().get(&Field::IssueType),
      Some(&FieldValue::Enum("Bug".into()))
    );
  }
}
