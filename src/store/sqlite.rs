use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::schema::{SCHEMA, SELECT_LATEST, UPSERT};
use crate::event::{ContentHash, Event};
use crate::reconcile::{EventCreator, EventLister};

/// SQLite bounds the number of host parameters per statement.
const FILTER_CHUNK: usize = 500;

/// Event store backed by a single SQLite file.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteEventStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .with_context(|| format!("open sqlite database {}", path.display()))?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .context("open in-memory sqlite database")?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .context("apply sqlite schema")?;
        Ok(Self { conn })
    }

    /// Number of stored rows across all revisions.
    pub async fn row_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .call(|conn| {
                let n = conn.query_row("SELECT COUNT(*) FROM incident_event", [], |r| r.get(0))?;
                Ok(n)
            })
            .await?;
        Ok(n.max(0) as usize)
    }

    async fn select(&self, sql: String, params: Vec<String>) -> Result<Vec<RawEvent>> {
        let raws = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), RawEvent::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(raws)
    }
}

#[async_trait]
impl EventLister for SqliteEventStore {
    async fn list_unique_events(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        if ids.is_empty() {
            let raws = self.select(SELECT_LATEST.to_string(), Vec::new()).await?;
            return raws.into_iter().map(RawEvent::decode).collect();
        }

        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(FILTER_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("{SELECT_LATEST}\nWHERE e.id IN ({placeholders})");
            let params = chunk.iter().map(encode_uuid).collect();
            for raw in self.select(sql, params).await? {
                out.push(raw.decode()?);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl EventCreator for SqliteEventStore {
    /// Writes every event in one transaction; nothing is stored on failure.
    async fn create_events(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let rows: Vec<RawEvent> = events.iter().map(RawEvent::encode).collect();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(UPSERT)?;
                    for r in &rows {
                        stmt.execute(rusqlite::params![
                            r.id,
                            r.revision,
                            r.url,
                            r.title,
                            r.region,
                            r.description,
                            r.publish_time,
                            r.create_time,
                            r.content_hash,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .with_context(|| format!("insert {} events", events.len()))?;
        Ok(())
    }
}

// ─── row encoding ───────────────────────────────────────────────────────────

fn encode_uuid(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

fn encode_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("bad timestamp {s:?}"))
}

/// One row as SQLite sees it.
struct RawEvent {
    id: String,
    revision: i64,
    url: String,
    title: String,
    region: String,
    description: String,
    publish_time: String,
    create_time: String,
    content_hash: Vec<u8>,
}

impl RawEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            revision: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            region: row.get(4)?,
            description: row.get(5)?,
            publish_time: row.get(6)?,
            create_time: row.get(7)?,
            content_hash: row.get(8)?,
        })
    }

    fn encode(evt: &Event) -> Self {
        Self {
            id: encode_uuid(&evt.id),
            revision: i64::from(evt.revision),
            url: evt.url.clone(),
            title: evt.title.clone(),
            region: evt.region.clone(),
            description: evt.description.clone(),
            publish_time: encode_dt(evt.publish_time),
            create_time: encode_dt(evt.create_time),
            content_hash: evt.content_hash.as_bytes().to_vec(),
        }
    }

    fn decode(self) -> Result<Event> {
        let id = Uuid::parse_str(&self.id).with_context(|| format!("bad event id {:?}", self.id))?;
        let revision = u32::try_from(self.revision)
            .map_err(|_| anyhow!("event {id}: revision {} out of range", self.revision))?;
        let content_hash = ContentHash::from_slice(&self.content_hash)
            .ok_or_else(|| anyhow!("event {id}: content hash is {} bytes", self.content_hash.len()))?;
        Ok(Event {
            id,
            url: self.url,
            title: self.title,
            description: self.description,
            region: self.region,
            publish_time: decode_dt(&self.publish_time)?,
            create_time: decode_dt(&self.create_time)?,
            content_hash,
            revision,
        })
    }
}
