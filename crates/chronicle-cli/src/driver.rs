//! The collection run: list, fetch, process and store issues with a
//! bounded number of concurrent workers.

use std::{
  collections::{BTreeMap, HashSet},
  fmt,
  sync::Arc,
};

use anyhow::Context as _;
use chronicle_core::{
  Severity,
  person::PeopleResolver,
  pipeline::{IssueOutcome, process_issue},
  raw::WireAdapter,
  source::{IssueSource, fetch_bundle},
  store::{IssueStore, UpsertOutcome},
  tracker::TrackerKind,
};
use chronicle_wire::Adapter;
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{Instrument as _, error, info, info_span, warn};
use uuid::Uuid;

// ─── Summary ─────────────────────────────────────────────────────────────────

/// What happened to one listed issue.
#[derive(Debug)]
enum Outcome {
  Stored {
    upsert:   UpsertOutcome,
    dropped:  usize,
    warnings: usize,
  },
  Skipped {
    reason: &'static str,
    bug:    bool,
  },
}

impl Outcome {
  /// Whether the failure may clear up on its own. Bad records are not
  /// retried: a fix on the tracker bumps `updated_at` and relists them.
  fn is_transient(&self) -> bool {
    matches!(self, Outcome::Skipped { reason: "fetch" | "store", .. })
  }
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
  pub run_id:         Uuid,
  pub listed:         usize,
  /// Earlier failures retried on top of the listing.
  pub retried:        usize,
  pub inserted:       usize,
  pub updated:        usize,
  pub unchanged:      usize,
  pub skipped:        usize,
  pub dropped_events: usize,
  pub warnings:       usize,
  /// Skip counts keyed by error kind (`malformed_record`, `fetch`, ...).
  pub skip_reasons:   BTreeMap<&'static str, usize>,
  /// Skips caused by inconsistent adapter or normalizer output.
  pub bugs:           usize,
}

impl RunSummary {
  fn new(run_id: Uuid) -> Self {
    Self {
      run_id,
      ..Self::default()
    }
  }

  fn record(&mut self, outcome: Outcome) {
    match outcome {
      Outcome::Stored {
        upsert,
        dropped,
        warnings,
      } => {
        match upsert {
          UpsertOutcome::Inserted => self.inserted += 1,
          UpsertOutcome::Updated => self.updated += 1,
          UpsertOutcome::Unchanged => self.unchanged += 1,
        }
        self.dropped_events += dropped;
        self.warnings += warnings;
      }
      Outcome::Skipped { reason, bug } => {
        self.skipped += 1;
        *self.skip_reasons.entry(reason).or_default() += 1;
        if bug {
          self.bugs += 1;
        }
      }
    }
  }

  /// Whether the run surfaced a bug rather than just dirty data.
  pub fn has_bugs(&self) -> bool { self.bugs > 0 }
}

impl fmt::Display for RunSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "run {}", self.run_id)?;
    writeln!(f, "  listed          {}", self.listed)?;
    writeln!(f, "  retried         {}", self.retried)?;
    writeln!(f, "  inserted        {}", self.inserted)?;
    writeln!(f, "  updated         {}", self.updated)?;
    writeln!(f, "  unchanged       {}", self.unchanged)?;
    writeln!(f, "  skipped         {}", self.skipped)?;
    for (reason, count) in &self.skip_reasons {
      writeln!(f, "    {reason:<14}{count}")?;
    }
    writeln!(f, "  dropped events  {}", self.dropped_events)?;
    write!(f, "  warnings        {}", self.warnings)
  }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Everything a collection run needs. Cheap to clone into worker tasks.
pub struct Collector<Src, St, P> {
  pub source:  Arc<Src>,
  pub store:   Arc<St>,
  pub people:  Arc<P>,
  pub adapter: Adapter,
  pub project: String,
  pub workers: usize,
}

impl<Src, St, P> Collector<Src, St, P>
where
  Src: IssueSource + 'static,
  St: IssueStore + 'static,
  P: PeopleResolver + 'static,
{
  /// Run one collection pass. Per-issue failures are tallied in the
  /// summary; only listing and cursor lookups can fail the run.
  pub async fn run(&self) -> anyhow::Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let tracker = self.adapter.tracker();
    let span = info_span!("collect", %run_id, %tracker, project = %self.project);
    self.run_inner(run_id).instrument(span).await
  }

  async fn run_inner(&self, run_id: Uuid) -> anyhow::Result<RunSummary> {
    let tracker = self.adapter.tracker();
    let since = if self.adapter.capabilities().recency_cursor {
      self
        .store
        .latest_update(tracker, &self.project)
        .await
        .context("failed to read the recency cursor")?
    } else {
      None
    };

    let mut ids = self
      .source
      .list_issues(&self.project, since)
      .await
      .context("failed to list issues")?;
    info!(count = ids.len(), ?since, "listed issues");

    let mut summary = RunSummary::new(run_id);
    summary.listed = ids.len();

    let pending = self
      .store
      .pending_issues(tracker, &self.project)
      .await
      .context("failed to read pending issues")?;
    let listed: HashSet<String> = ids.iter().cloned().collect();
    for id in pending {
      if !listed.contains(&id) {
        summary.retried += 1;
        ids.push(id);
      }
    }
    if summary.retried > 0 {
      info!(count = summary.retried, "retrying earlier failures");
    }

    let permits = Arc::new(Semaphore::new(self.workers.max(1)));
    let mut tasks = JoinSet::new();
    for id in ids {
      let permit = permits
        .clone()
        .acquire_owned()
        .await
        .context("worker pool closed")?;
      let source = Arc::clone(&self.source);
      let store = Arc::clone(&self.store);
      let people = Arc::clone(&self.people);
      let adapter = self.adapter;
      let project = self.project.clone();
      tasks.spawn(
        async move {
          let outcome = collect_one(&*source, &*store, &*people, adapter, &project, &id).await;
          track_pending(&*store, adapter.tracker(), &project, &id, &outcome).await;
          drop(permit);
          outcome
        }
        .in_current_span(),
      );
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(outcome) => summary.record(outcome),
        Err(e) => {
          error!(error = %e, "worker task failed");
          summary.record(Outcome::Skipped {
            reason: "panic",
            bug:    true,
          });
        }
      }
    }

    info!(
      inserted = summary.inserted,
      updated = summary.updated,
      unchanged = summary.unchanged,
      skipped = summary.skipped,
      dropped_events = summary.dropped_events,
      warnings = summary.warnings,
      "collection finished"
    );
    Ok(summary)
  }
}

/// Keep the pending list in step with the outcome. Failing to update it
/// only costs a retry, so errors are logged and not propagated.
async fn track_pending<St: IssueStore>(
  store: &St,
  tracker: TrackerKind,
  project: &str,
  id: &str,
  outcome: &Outcome,
) {
  let result = match outcome {
    Outcome::Stored { .. } => store.clear_pending(tracker, project, id).await,
    _ if outcome.is_transient() => store.mark_pending(tracker, project, id).await,
    Outcome::Skipped { .. } => return,
  };
  if let Err(e) = result {
    error!(issue = id, error = %e, "failed to update pending issues");
  }
}

async fn collect_one<Src, St, P>(
  source: &Src,
  store: &St,
  people: &P,
  adapter: Adapter,
  project: &str,
  id: &str,
) -> Outcome
where
  Src: IssueSource,
  St: IssueStore,
  P: PeopleResolver,
{
  let bundle = match fetch_bundle(source, adapter.capabilities(), id).await {
    Ok(bundle) => bundle,
    Err(e) => {
      warn!(issue = id, error = %e, "fetch failed, skipping issue");
      return Outcome::Skipped {
        reason: "fetch",
        bug:    false,
      };
    }
  };

  let processed = match process_issue(&adapter, people, id, &bundle) {
    IssueOutcome::Processed(processed) => processed,
    IssueOutcome::Skipped { error, .. } => {
      return Outcome::Skipped {
        reason: error.kind(),
        bug:    error.severity() == Severity::Bug,
      };
    }
  };

  match store.upsert_issue(project, &processed.issue).await {
    Ok(upsert) => Outcome::Stored {
      upsert,
      dropped: processed.dropped.len(),
      warnings: processed.warnings.len(),
    },
    Err(e) => {
      error!(issue = id, error = %e, "failed to store issue");
      Outcome::Skipped {
        reason: "store",
        bug:    false,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
  };

  use chrono::{DateTime, Utc};
  use chronicle_core::{person::AliasResolver, raw::IssueId, store::IssueStore};
  use chronicle_store_sqlite::SqliteStore;
  use serde_json::{Value, json};

  use super::*;

  /// An in-memory source: issue JSON plus separately stored events.
  /// Listing honours `since` inclusively, as GitHub does.
  #[derive(Default)]
  struct Canned {
    issues:    BTreeMap<String, (Value, Option<Value>)>,
    /// Ids whose next issue fetch fails.
    fail_once: Mutex<BTreeSet<String>>,
    fetched:   Mutex<Vec<String>>,
  }

  impl IssueSource for Canned {
    type Error = std::io::Error;

    async fn list_issues(
      &self,
      _project: &str,
      since: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, Self::Error> {
      let recent = |issue: &Value| {
        let updated = issue["updated_at"]
          .as_str()
          .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        match (since, updated) {
          (Some(since), Some(updated)) => updated >= since,
          _ => true,
        }
      };
      Ok(
        self
          .issues
          .iter()
          .filter(|(_, (issue, _))| recent(issue))
          .map(|(id, _)| id.clone())
          .collect(),
      )
    }

    async fn fetch_issue(&self, id: &str) -> Result<Value, Self::Error> {
      self.fetched.lock().unwrap().push(id.to_owned());
      if self.fail_once.lock().unwrap().remove(id) {
        return Err(std::io::Error::other(format!("connection reset fetching {id}")));
      }
      self
        .issues
        .get(id)
        .map(|(issue, _)| issue.clone())
        .ok_or_else(|| std::io::Error::other(format!("no issue {id}")))
    }

    async fn fetch_events(&self, id: &str) -> Result<Option<Value>, Self::Error> {
      Ok(self.issues.get(id).and_then(|(_, events)| events.clone()))
    }

    async fn fetch_comments(&self, _id: &str) -> Result<Option<Value>, Self::Error> {
      Ok(None)
    }
  }

  fn github_issue(number: u64, state: &str) -> Value {
    json!({
      "number": number,
      "title": "Found a bug",
      "state": state,
      "user": { "login": "octocat" },
      "labels": [],
      "created_at": "2011-04-22T13:33:48Z",
      "updated_at": "2011-04-23T13:33:48Z"
    })
  }

  fn closed_event() -> Value {
    json!([{
      "id": 1,
      "event": "closed",
      "created_at": "2011-04-23T13:33:48Z",
      "actor": { "login": "hubot" }
    }])
  }

  async fn collector(source: Canned) -> Collector<Canned, SqliteStore, AliasResolver> {
    Collector {
      source:  Arc::new(source),
      store:   Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      people:  Arc::new(AliasResolver::default()),
      adapter: Adapter::for_tracker(TrackerKind::GitHub),
      project: "hello".into(),
      workers: 2,
    }
  }

  #[tokio::test]
  async fn collects_and_tallies() {
    let mut source = Canned::default();
    source
      .issues
      .insert("1".into(), (github_issue(1, "closed"), Some(closed_event())));
    source.issues.insert("2".into(), (github_issue(2, "open"), Some(json!([]))));
    source
      .issues
      .insert("3".into(), (json!({ "number": 3, "title": "no dates" }), None));

    let collector = collector(source).await;
    let summary = collector.run().await.unwrap();

    assert_eq!(summary.listed, 3);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.skip_reasons.get("malformed_record"), Some(&1));
    assert!(!summary.has_bugs());

    let stored = collector
      .store
      .get_issue(&IssueId::new(TrackerKind::GitHub, "1"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(stored.events().len(), 1);
  }

  #[tokio::test]
  async fn second_run_is_unchanged() {
    let mut source = Canned::default();
    source
      .issues
      .insert("1".into(), (github_issue(1, "closed"), Some(closed_event())));
    let collector = collector(source).await;

    collector.run().await.unwrap();
    let again = collector.run().await.unwrap();
    assert_eq!(again.unchanged, 1);
    assert_eq!(again.inserted, 0);
  }

  #[tokio::test]
  async fn failed_fetch_is_retried_after_the_cursor_moves_on() {
    let mut older = github_issue(1, "open");
    older["updated_at"] = json!("2011-04-22T20:00:00Z");
    let mut source = Canned::default();
    source.issues.insert("1".into(), (older, Some(json!([]))));
    source
      .issues
      .insert("2".into(), (github_issue(2, "closed"), Some(closed_event())));
    source.fail_once.lock().unwrap().insert("1".into());
    let collector = collector(source).await;

    let first = collector.run().await.unwrap();
    assert_eq!(first.inserted, 1);
    assert_eq!(first.skip_reasons.get("fetch"), Some(&1));
    assert_eq!(
      collector.store.pending_issues(TrackerKind::GitHub, "hello").await.unwrap(),
      ["1"]
    );

    collector.source.fetched.lock().unwrap().clear();
    let second = collector.run().await.unwrap();
    assert_eq!(second.listed, 1);
    assert_eq!(second.retried, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(second.unchanged, 1);
    assert!(collector.source.fetched.lock().unwrap().contains(&"1".to_owned()));
    assert!(
      collector
        .store
        .pending_issues(TrackerKind::GitHub, "hello")
        .await
        .unwrap()
        .is_empty()
    );
    assert!(
      collector
        .store
        .get_issue(&IssueId::new(TrackerKind::GitHub, "1"))
        .await
        .unwrap()
        .is_some()
    );
  }

  #[tokio::test]
  async fn malformed_records_are_not_retried() {
    let mut source = Canned::default();
    source
      .issues
      .insert("3".into(), (json!({ "number": 3, "title": "no dates" }), None));
    let collector = collector(source).await;

    let summary = collector.run().await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(
      collector
        .store
        .pending_issues(TrackerKind::GitHub, "hello")
        .await
        .unwrap()
        .is_empty()
    );
  }

  #[test]
  fn summary_counts_bugs_separately() {
    let mut summary = RunSummary::default();
    summary.record(Outcome::Skipped {
      reason: "assembly",
      bug:    true,
    });
    summary.record(Outcome::Skipped {
      reason: "fetch",
      bug:    false,
    });
    summary.record(Outcome::Stored {
      upsert:   UpsertOutcome::Updated,
      dropped:  2,
      warnings: 1,
    });

    assert!(summary.has_bugs());
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.dropped_events, 2);
    let text = summary.to_string();
    assert!(text.contains("assembly"));
    assert!(text.contains("dropped events  2"));
  }
}
