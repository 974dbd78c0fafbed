//! Jira-shaped JSON: `issue/{key}?expand=changelog` with comments embedded in
//! `fields.comment`.

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

use crate::json::{decode, id_hint, maybe_timestamp, text, timestamp};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
  #[serde(default)]
  name:          Option<String>,
  #[serde(default)]
  key:           Option<String>,
  #[serde(default)]
  account_id:    Option<String>,
  #[serde(default)]
  display_name:  Option<String>,
  #[serde(default)]
  email_address: Option<String>,
}

impl ApiUser {
  /// Server installs identify users by `name`; cloud only by `accountId`.
  fn into_person(self) -> Option<RawPerson> {
    let login = self.name.or(self.key).or(self.account_id)?;
    Some(RawPerson {
      login,
      name: self.display_name,
      email: self.email_address,
    })
  }
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
  name: String,
}

#[derive(Debug, Deserialize)]
struct ApiKeyed {
  key: String,
}

#[derive(Debug, Deserialize)]
struct ApiLinkType {
  inward:  String,
  outward: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiLink {
  #[serde(rename = "type")]
  link_type:     ApiLinkType,
  #[serde(default)]
  outward_issue: Option<ApiKeyed>,
  #[serde(default)]
  inward_issue:  Option<ApiKeyed>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
  id:      String,
  #[serde(default)]
  author:  Option<ApiUser>,
  #[serde(default)]
  body:    Option<String>,
  created: String,
  #[serde(default)]
  updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiCommentPage {
  #[serde(default)]
  comments: Vec<ApiComment>,
}

#[derive(Debug, Deserialize)]
struct ApiFields {
  created:              String,
  #[serde(default)]
  updated:              Option<String>,
  #[serde(default)]
  reporter:             Option<ApiUser>,
  #[serde(default)]
  summary:              Option<String>,
  #[serde(default)]
  description:          Option<String>,
  #[serde(default)]
  environment:          Option<String>,
  #[serde(default)]
  timeoriginalestimate: Option<i64>,
  #[serde(default)]
  status:               Option<ApiNamed>,
  #[serde(default)]
  priority:             Option<ApiNamed>,
  #[serde(default)]
  resolution:           Option<ApiNamed>,
  #[serde(default)]
  issuetype:            Option<ApiNamed>,
  #[serde(default)]
  parent:               Option<ApiKeyed>,
  #[serde(default)]
  duedate:              Option<String>,
  #[serde(default)]
  labels:               Vec<String>,
  #[serde(default)]
  components:           Vec<ApiNamed>,
  #[serde(default)]
  versions:             Vec<ApiNamed>,
  #[serde(default, rename = "fixVersions")]
  fix_versions:         Vec<ApiNamed>,
  #[serde(default)]
  issuelinks:           Vec<ApiLink>,
  #[serde(default)]
  assignee:             Option<ApiUser>,
  #[serde(default)]
  comment:              Option<ApiCommentPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
  field:       String,
  #[serde(default)]
  from:        Option<String>,
  #[serde(default)]
  from_string: Option<String>,
  #[serde(default)]
  to:          Option<String>,
  #[serde(default)]
  to_string:   Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiHistory {
  id:      String,
  #[serde(default)]
  author:  Option<ApiUser>,
  created: String,
  #[serde(default)]
  items:   Vec<ApiItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiChangelog {
  #[serde(default)]
  histories: Vec<ApiHistory>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
  key:       String,
  #[serde(default, rename = "self")]
  self_url:  Option<String>,
  fields:    ApiFields,
  #[serde(default)]
  changelog: Option<ApiChangelog>,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct JiraAdapter;

impl WireAdapter for JiraAdapter {
  fn tracker(&self) -> TrackerKind { TrackerKind::Jira }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      recency_cursor:    true,
      events_endpoint:   false,
      comments_endpoint: false,
    }
  }

  fn parse(&self, raw: &RawBundle) -> Result<ParsedIssue> {
    let hint = id_hint(&raw.issue, &["key", "id"]);
    let issue: ApiIssue = decode(&raw.issue, &hint, "issue")?;
    let id = IssueId::new(TrackerKind::Jira, issue.key.as_str());
    let key = issue.key;
    let f = issue.fields;

    // A separately fetched changelog or comment page wins over the
    // embedded one.
    let changelog = match &raw.events {
      Some(value) => decode::<ApiChangelog>(value, &key, "changelog")?,
      None => issue.changelog.unwrap_or_default(),
    };
    let comment_page = match &raw.comments {
      Some(value) => decode::<ApiCommentPage>(value, &key, "comments")?,
      None => f.comment.unwrap_or_default(),
    };

    let names = |v: Vec<ApiNamed>| Some(RawValue::List(v.into_iter().map(|n| n.name).collect()));
    let name = |v: Option<ApiNamed>| v.map(|n| RawValue::Text(n.name));

    let links = f
      .issuelinks
      .into_iter()
      .filter_map(|l| match (l.outward_issue, l.inward_issue) {
        (Some(out), _) => Some((l.link_type.outward, out.key)),
        (None, Some(inw)) => Some((l.link_type.inward, inw.key)),
        (None, None) => None,
      })
      .filter(|(_, target)| *target != key)
      .map(|(effect, target)| format!("{effect} {target}"))
      .collect();

    let fields = vec![
      RawField::new("summary", text(f.summary)),
      RawField::new("description", text(f.description)),
      RawField::new("environment", text(f.environment)),
      RawField::new(
        "timeoriginalestimate",
        f.timeoriginalestimate.map(|s| RawValue::Text(s.to_string())),
      ),
      RawField::new("status", name(f.status)),
      RawField::new("priority", name(f.priority)),
      RawField::new("resolution", name(f.resolution)),
      RawField::new("issuetype", name(f.issuetype)),
      RawField::new("parent", f.parent.map(|p| RawValue::Text(p.key))),
      RawField::new("duedate", text(f.duedate)),
      RawField::new("labels", Some(RawValue::List(f.labels))),
      RawField::new("components", names(f.components)),
      RawField::new("versions", names(f.versions)),
      RawField::new("fixVersions", names(f.fix_versions)),
      RawField::new("issuelinks", Some(RawValue::List(links))),
      RawField::new(
        "assignee",
        f.assignee.and_then(ApiUser::into_person).map(RawValue::Person),
      ),
    ];

    let skeleton = IssueSkeleton {
      id: id.clone(),
      url: issue.self_url,
      created_at: timestamp(&f.created, &key, "created")?,
      updated_at: maybe_timestamp(f.updated.as_deref()),
      reporter: f.reporter.and_then(ApiUser::into_person),
      is_pull_request: false,
      fields,
    };

    let mut events = Vec::new();
    for history in changelog.histories {
      let when = timestamp(&history.created, &key, "history created")?;
      let sequence = history.id.parse().ok();
      let author = history.author.and_then(ApiUser::into_person);
      for (i, item) in history.items.into_iter().enumerate() {
        let (old, new) = item_values(&item);
        events.push(RawEvent {
          issue_id: id.clone(),
          external_id: format!("{}%%{i}", history.id),
          name: item.field,
          old,
          new,
          timestamp: when,
          sequence,
          author: author.clone(),
          commit: None,
        });
      }
    }

    let comments = comment_page
      .comments
      .into_iter()
      .map(|c| -> Result<RawComment> {
        let created_at = timestamp(&c.created, &key, "comment created")?;
        Ok(RawComment {
          issue_id: id.clone(),
          external_id: c.id,
          author: c.author.and_then(ApiUser::into_person),
          body: c.body.unwrap_or_default(),
          created_at,
          edited_at: maybe_timestamp(c.updated.as_deref()).filter(|t| *t != created_at),
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

/// Pick the changelog representation that matches the issue JSON: user
/// keys for the assignee, `"<effect> <key>"` for links, plain
/// `YYYY-MM-DD` for due dates and display strings for everything else.
fn item_values(item: &ApiItem) -> (Option<RawValue>, Option<RawValue>) {
  match item.field.as_str() {
    "assignee" => {
      let person = |login: &Option<String>, display: &Option<String>| {
        login.as_ref().map(|l| {
          RawValue::Person(RawPerson {
            login: l.clone(),
            name:  display.clone(),
            email: None,
          })
        })
      };
      (
        person(&item.from, &item.from_string),
        person(&item.to, &item.to_string),
      )
    }
    "duedate" => (
      item.from.clone().map(RawValue::Text),
      item.to.clone().map(RawValue::Text),
    ),
    "Link" => (
      link(item.from.as_deref(), item.from_string.as_deref()),
      link(item.to.as_deref(), item.to_string.as_deref()),
    ),
    _ => (
      item.from_string.clone().map(RawValue::Text),
      item.to_string.clone().map(RawValue::Text),
    ),
  }
}

/// `("ZK-12", "This issue is blocked by ZK-12")` → `"is blocked by ZK-12"`.
fn link(target: Option<&str>, description: Option<&str>) -> Option<RawValue> {
  let target = target?;
  let effect = description
    .map(|d| d.trim())
    .map(|d| d.strip_prefix("This issue ").unwrap_or(d))
    .map(|d| d.strip_suffix(target).unwrap_or(d).trim())
    .filter(|d| !d.is_empty());
  Some(RawValue::Text(match effect {
    Some(effect) => format!("{effect} {target}"),
    None => target.to_owned(),
  }))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use chronicle_core::{
    field::{Field, FieldValue},
    person::AliasResolver,
    pipeline::{IssueOutcome, Processed, process_issue},
  };
  use serde_json::json;

  use super::*;

  fn process(issue: serde_json::Value) -> Box<Processed> {
    let raw = RawBundle {
      issue,
      ..RawBundle::default()
    };
    match process_issue(&JiraAdapter, &AliasResolver::default(), "ZOOKEEPER-1", &raw) {
      IssueOutcome::Processed(processed) => processed,
      IssueOutcome::Skipped { error, .. } => panic!("skipped: {error}"),
    }
  }

  fn issue() -> serde_json::Value {
    json!({
      "id": "12345",
      "key": "ZOOKEEPER-1",
      "self": "https://issues.apache.org/jira/rest/api/2/issue/12345",
      "fields": {
        "created": "2008-06-06T00:14:11.000+0000",
        "updated": "2010-05-01T09:00:00.000+0000",
        "reporter": { "name": "phunt", "displayName": "Patrick Hunt", "emailAddress": "phunt at apache dot org" },
        "summary": "Initial ZooKeeper code import",
        "description": null,
        "status": { "name": "Closed" },
        "priority": { "name": "Major" },
        "resolution": { "name": "Fixed" },
        "issuetype": { "name": "Task" },
        "labels": ["import"],
        "components": [{ "name": "server" }],
        "versions": [],
        "fixVersions": [{ "name": "3.0.0" }],
        "timeoriginalestimate": 3600,
        "assignee": { "name": "mahadev", "displayName": "Mahadev Konar" },
        "issuelinks": [
          { "type": { "name": "Blocker", "inward": "is blocked by", "outward": "blocks" },
            "outwardIssue": { "key": "ZOOKEEPER-2" } },
          { "type": { "name": "Reference", "inward": "is related to", "outward": "relates to" },
            "inwardIssue": { "key": "ZOOKEEPER-1" } }
        ],
        "comment": { "comments": [
          { "id": "100", "author": { "name": "mahadev" }, "body": "Done.",
            "created": "2008-06-07T10:00:00.000+0000", "updated": "2008-06-07T11:00:00.000+0000" }
        ] }
      },
      "changelog": { "histories": [
        { "id": "555", "author": { "name": "phunt" }, "created": "2008-06-08T12:00:00.000+0000",
          "items": [
            { "field": "status", "from": "1", "fromString": "Open", "to": "6", "toString": "Closed" },
            { "field": "assignee", "from": null, "fromString": null, "to": "mahadev", "toString": "Mahadev Konar" },
            { "field": "Link", "from": null, "fromString": null, "to": "ZOOKEEPER-2", "toString": "This issue blocks ZOOKEEPER-2" }
          ] }
      ] }
    })
  }

  #[test]
  fn parses_fields_and_links() {
    let parsed = JiraAdapter
      .parse(&RawBundle {
        issue: issue(),
        ..RawBundle::default()
      })
      .unwrap();
    let skel = &parsed.skeleton;
    assert_eq!(skel.id.external_id, "ZOOKEEPER-1");
    assert_eq!(skel.reporter.as_ref().unwrap().login, "phunt");

    let field = |n: &str| skel.fields.iter().find(|f| f.name == n).unwrap().value.clone();
    assert_eq!(field("status"), Some(RawValue::text("Closed")));
    assert_eq!(field("description"), None);
    assert_eq!(field("timeoriginalestimate"), Some(RawValue::text("3600")));
    // The self-link is dropped.
    assert_eq!(
      field("issuelinks"),
      Some(RawValue::List(vec!["blocks ZOOKEEPER-2".into()]))
    );
  }

  #[test]
  fn changelog_items_become_events() {
    let parsed = JiraAdapter
      .parse(&RawBundle {
        issue: issue(),
        ..RawBundle::default()
      })
      .unwrap();
    let ids: Vec<_> = parsed.events.iter().map(|e| e.external_id.as_str()).collect();
    assert_eq!(ids, ["555%%0", "555%%1", "555%%2"]);
    assert!(parsed.events.iter().all(|e| e.sequence == Some(555)));

    assert_eq!(parsed.events[0].old, Some(RawValue::text("Open")));
    assert_eq!(
      parsed.events[1].new,
      Some(RawValue::Person(RawPerson {
        login: "mahadev".into(),
        name:  Some("Mahadev Konar".into()),
        email: None,
      }))
    );
    assert_eq!(parsed.events[2].new, Some(RawValue::text("blocks ZOOKEEPER-2")));
  }

  #[test]
  fn embedded_comments_are_parsed() {
    let parsed = JiraAdapter
      .parse(&RawBundle {
        issue: issue(),
        ..RawBundle::default()
      })
      .unwrap();
    assert_eq!(parsed.comments.len(), 1);
    assert_eq!(parsed.comments[0].body, "Done.");
    assert!(parsed.comments[0].edited_at.is_some());
  }

  #[test]
  fn missing_fields_object_names_the_key() {
    let err = JiraAdapter
      .parse(&RawBundle {
        issue: json!({ "key": "ZOOKEEPER-9" }),
        ..RawBundle::default()
      })
      .unwrap_err();
    assert!(err.to_string().contains("ZOOKEEPER-9"));
  }

  #[test]
  fn link_effects_are_extracted() {
    assert_eq!(
      link(Some("ZK-3"), Some("This issue is duplicated by ZK-3")),
      Some(RawValue::text("is duplicated by ZK-3"))
    );
    assert_eq!(link(Some("ZK-3"), None), Some(RawValue::text("ZK-3")));
    assert_eq!(link(None, Some("This issue blocks ZK-3")), None);
  }

  #[test]
  fn assignee_details_do_not_raise_warnings() {
    let mut raw = issue();
    raw["fields"]["assignee"]["emailAddress"] = json!("mahadev at apache dot org");
    let processed = process(raw);
    assert!(processed.warnings.is_empty(), "{:?}", processed.warnings);
    assert_eq!(processed.issue.original_state().get(&Field::Assignee), None);
  }

  #[test]
  fn due_date_changes_use_plain_dates() {
    let mut raw = issue();
    raw["fields"]["duedate"] = json!("2016-06-01");
    raw["changelog"]["histories"] = json!([
      { "id": "556", "author": { "name": "phunt" }, "created": "2016-05-10T12:00:00.000+0000",
        "items": [
          { "field": "duedate", "from": "2016-05-20", "fromString": "2016-05-20 00:00:00.0",
            "to": "2016-06-01", "toString": "2016-06-01 00:00:00.0" }
        ] }
    ]);

    let parsed = JiraAdapter
      .parse(&RawBundle {
        issue: raw.clone(),
        ..RawBundle::default()
      })
      .unwrap();
    assert_eq!(parsed.events[0].old, Some(RawValue::text("2016-05-20")));

    let processed = process(raw);
    assert!(processed.dropped.is_empty(), "{:?}", processed.dropped);
    assert_eq!(processed.issue.events().len(), 1);
    assert_eq!(
      processed.issue.original_state().get(&Field::DueDate),
      Some(&FieldValue::Date(
        Utc.with_ymd_and_hms(2016, 5, 20, 0, 0, 0).unwrap()
      ))
    );
  }
}
