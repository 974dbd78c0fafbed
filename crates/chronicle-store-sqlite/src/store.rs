//! [`SqliteStore`], the SQLite implementation of [`IssueStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use chronicle_core::{
  assemble::Issue,
  raw::IssueId,
  store::{IssueQuery, IssueStore, IssueSummary, UpsertOutcome},
  tracker::TrackerKind,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error,
  Result,
  encode::{RawSummary, decode_dt, decode_issue, encode_dt, encode_issue},
  fingerprint::fingerprint,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An issue store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── IssueStore impl ─────────────────────────────────────────────────────────

impl IssueStore for SqliteStore {
  type Error = Error;

  async fn upsert_issue(&self, project: &str, issue: &Issue) -> Result<UpsertOutcome> {
    let hash = fingerprint(issue)?;
    let (row, events, comments) = encode_issue(issue)?;
    let project = project.to_owned();
    let stored_at = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
          .query_row(
            "SELECT fingerprint FROM issues WHERE tracker = ?1 AND external_id = ?2",
            rusqlite::params![row.tracker, row.external_id],
            |r| r.get(0),
          )
          .optional()?;

        let outcome = match existing {
          Some(stored) if stored == hash => return Ok(UpsertOutcome::Unchanged),
          Some(_) => UpsertOutcome::Updated,
          None => UpsertOutcome::Inserted,
        };

        tx.execute(
          "INSERT INTO issues (
             tracker, external_id, project, title, created_at, updated_at,
             vocabulary_version, fingerprint, record_json, stored_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (tracker, external_id) DO UPDATE SET
             project            = excluded.project,
             title              = excluded.title,
             created_at         = excluded.created_at,
             updated_at         = excluded.updated_at,
             vocabulary_version = excluded.vocabulary_version,
             fingerprint        = excluded.fingerprint,
             record_json        = excluded.record_json,
             stored_at          = excluded.stored_at",
          rusqlite::params![
            row.tracker,
            row.external_id,
            project,
            row.title,
            row.created_at,
            row.updated_at,
            row.vocabulary_version,
            hash,
            row.record_json,
            stored_at,
          ],
        )?;

        // Items are replaced wholesale: a re-fetch may drop or reorder them.
        tx.execute(
          "DELETE FROM events WHERE tracker = ?1 AND issue_external_id = ?2",
          rusqlite::params![row.tracker, row.external_id],
        )?;
        tx.execute(
          "DELETE FROM comments WHERE tracker = ?1 AND issue_external_id = ?2",
          rusqlite::params![row.tracker, row.external_id],
        )?;

        {
          let mut insert_event = tx.prepare(
            "INSERT INTO events (
               tracker, issue_external_id, external_id, position, field, timestamp, event_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for (position, e) in events.iter().enumerate() {
            insert_event.execute(rusqlite::params![
              row.tracker,
              row.external_id,
              e.external_id,
              position as i64,
              e.field,
              e.timestamp,
              e.json,
            ])?;
          }

          let mut insert_comment = tx.prepare(
            "INSERT INTO comments (
               tracker, issue_external_id, external_id, position, created_at, comment_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for (position, c) in comments.iter().enumerate() {
            insert_comment.execute(rusqlite::params![
              row.tracker,
              row.external_id,
              c.external_id,
              position as i64,
              c.created_at,
              c.json,
            ])?;
          }
        }

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    tracing::debug!(issue = %issue.id(), %outcome, "upserted issue");
    Ok(outcome)
  }

  async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>> {
    let tracker = id.tracker.as_str();
    let external_id = id.external_id.clone();

    let found = self
      .conn
      .call(move |conn| {
        let record: Option<String> = conn
          .query_row(
            "SELECT record_json FROM issues WHERE tracker = ?1 AND external_id = ?2",
            rusqlite::params![tracker, external_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(record) = record else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT event_json FROM events
           WHERE tracker = ?1 AND issue_external_id = ?2
           ORDER BY position",
        )?;
        let events = stmt
          .query_map(rusqlite::params![tracker, external_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut stmt = conn.prepare(
          "SELECT comment_json FROM comments
           WHERE tracker = ?1 AND issue_external_id = ?2
           ORDER BY position",
        )?;
        let comments = stmt
          .query_map(rusqlite::params![tracker, external_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Some((record, events, comments)))
      })
      .await?;

    found
      .map(|(record, events, comments)| {
        decode_issue(&record, &events, &comments).map_err(|e| Error::Corrupt {
          issue:  id.to_string(),
          reason: e.to_string(),
        })
      })
      .transpose()
  }

  async fn list_issues(&self, query: &IssueQuery) -> Result<Vec<IssueSummary>> {
    let tracker = query.tracker.map(TrackerKind::as_str);
    let project = query.project.clone();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map_or(-1, |l| l as i64);
    let offset = query.offset.unwrap_or(0) as i64;

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT tracker, external_id, project, title, created_at, updated_at
           FROM issues
           WHERE (?1 IS NULL OR tracker = ?1)
             AND (?2 IS NULL OR project = ?2)
           ORDER BY created_at, tracker, external_id
           LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![tracker, project, limit, offset], |r| {
            Ok(RawSummary {
              tracker:     r.get(0)?,
              external_id: r.get(1)?,
              project:     r.get(2)?,
              title:       r.get(3)?,
              created_at:  r.get(4)?,
              updated_at:  r.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.into_iter().map(RawSummary::decode).collect()
  }

  async fn latest_update(
    &self,
    tracker: TrackerKind,
    project: &str,
  ) -> Result<Option<DateTime<Utc>>> {
    let project = project.to_owned();
    let latest: Option<String> = self
      .conn
      .call(move |conn| {
        let latest = conn.query_row(
          "SELECT MAX(updated_at) FROM issues WHERE tracker = ?1 AND project = ?2",
          rusqlite::params![tracker.as_str(), project],
          |r| r.get(0),
        )?;
        Ok(latest)
      })
      .await?;

    latest.as_deref().map(decode_dt).transpose()
  }

  async fn mark_pending(
    &self,
    tracker: TrackerKind,
    project: &str,
    external_id: &str,
  ) -> Result<()> {
    let project = project.to_owned();
    let external_id = external_id.to_owned();
    let marked_at = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pending (tracker, project, external_id, marked_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (tracker, project, external_id) DO NOTHING",
          rusqlite::params![tracker.as_str(), project, external_id, marked_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear_pending(
    &self,
    tracker: TrackerKind,
    project: &str,
    external_id: &str,
  ) -> Result<()> {
    let project = project.to_owned();
    let external_id = external_id.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM pending WHERE tracker = ?1 AND project = ?2 AND external_id = ?3",
          rusqlite::params![tracker.as_str(), project, external_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn pending_issues(&self, tracker: TrackerKind, project: &str) -> Result<Vec<String>> {
    let project = project.to_owned();
    let ids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT external_id FROM pending
           WHERE tracker = ?1 AND project = ?2
           ORDER BY external_id",
        )?;
        let ids = stmt
          .query_map(rusqlite::params![tracker.as_str(), project], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }
}
