//! SQL schema for the Chronicle SQLite store.
//!
//! Executed once at connection startup. The schema version lives in
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per issue identity. `record_json` holds the assembled issue
-- without its events and comments, which live in their own tables.
CREATE TABLE IF NOT EXISTS issues (
    tracker            TEXT NOT NULL,   -- 'github' | 'jira' | 'bugzilla'
    external_id        TEXT NOT NULL,
    project            TEXT NOT NULL,
    title              TEXT,
    created_at         TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at         TEXT,
    vocabulary_version INTEGER NOT NULL,
    fingerprint        TEXT NOT NULL,   -- SHA-256 of the full record
    record_json        TEXT NOT NULL,
    stored_at          TEXT NOT NULL,
    PRIMARY KEY (tracker, external_id)
);

CREATE TABLE IF NOT EXISTS events (
    tracker           TEXT NOT NULL,
    issue_external_id TEXT NOT NULL,
    external_id       TEXT NOT NULL,
    position          INTEGER NOT NULL, -- canonical order within the issue
    field             TEXT NOT NULL,
    timestamp         TEXT NOT NULL,
    event_json        TEXT NOT NULL,
    PRIMARY KEY (tracker, issue_external_id, external_id),
    FOREIGN KEY (tracker, issue_external_id)
        REFERENCES issues(tracker, external_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS comments (
    tracker           TEXT NOT NULL,
    issue_external_id TEXT NOT NULL,
    external_id       TEXT NOT NULL,
    position          INTEGER NOT NULL,
    created_at        TEXT NOT NULL,
    comment_json      TEXT NOT NULL,
    PRIMARY KEY (tracker, issue_external_id, external_id),
    FOREIGN KEY (tracker, issue_external_id)
        REFERENCES issues(tracker, external_id) ON DELETE CASCADE
);

-- Issues whose last collection attempt failed before they were stored.
-- Retried on the next run regardless of the recency cursor.
CREATE TABLE IF NOT EXISTS pending (
    tracker     TEXT NOT NULL,
    project     TEXT NOT NULL,
    external_id TEXT NOT NULL,
    marked_at   TEXT NOT NULL,
    PRIMARY KEY (tracker, project, external_id)
);

CREATE INDEX IF NOT EXISTS issues_project_idx ON issues(tracker, project, updated_at);
CREATE INDEX IF NOT EXISTS events_field_idx   ON events(field);

PRAGMA user_version = 2;
";
