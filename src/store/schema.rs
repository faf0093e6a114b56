//! SQL schema for the SQLite event store.

/// Idempotent DDL, executed on every open.
///
/// Rows are append-only per `(id, revision)`; the current state of an id is
/// its highest revision.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS incident_event (
    id            TEXT    NOT NULL,   -- UUIDv5 of the item guid
    revision      INTEGER NOT NULL,   -- 1-based, +1 per content change
    url           TEXT    NOT NULL,
    title         TEXT    NOT NULL,
    region        TEXT    NOT NULL,
    description   TEXT    NOT NULL,
    publish_time  TEXT    NOT NULL,   -- RFC 3339 UTC
    create_time   TEXT    NOT NULL,   -- RFC 3339 UTC
    content_hash  BLOB    NOT NULL,   -- SHA-256, 32 bytes
    PRIMARY KEY (id, revision)
);

CREATE INDEX IF NOT EXISTS incident_event_publish_idx ON incident_event(publish_time);

PRAGMA user_version = 1;
";

pub const SELECT_LATEST: &str = "
SELECT e.id, e.revision, e.url, e.title, e.region, e.description,
       e.publish_time, e.create_time, e.content_hash
FROM incident_event e
JOIN (SELECT id, MAX(revision) AS revision FROM incident_event GROUP BY id) latest
  ON latest.id = e.id AND latest.revision = e.revision";

pub const UPSERT: &str = "
INSERT OR REPLACE INTO incident_event (
    id, revision, url, title, region, description,
    publish_time, create_time, content_hash
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
