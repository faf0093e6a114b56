//! # Reconciliation
//! Brings a store in line with a fresh feed snapshot, one pass at a time.
//!
//! Per pass:
//! 1. list every item from the source, deduplicated by id (latest publish
//!    time wins);
//! 2. list the store's current record for each of those ids;
//! 3. unchanged content hash → nothing; changed → revision + 1 (keeping the
//!    stored `create_time`); new → 1;
//! 4. write everything marked in one bulk `create_events` call.
//!
//! The store is expected to upsert by `(id, revision)`; re-creating an id
//! with a higher revision is how an update is expressed.

mod lister;

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event::{dedup_latest, ContentHash, Event};

pub use lister::FeedLister;

/// Lists events using an optional id filter.
#[async_trait]
pub trait EventLister: Send + Sync {
    /// An empty `ids` slice means "all".
    async fn list_unique_events(&self, ids: &[Uuid]) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait EventCreator: Send + Sync {
    async fn create_events(&self, events: &[Event]) -> Result<()>;
}

/// Target of a reconciliation pass.
pub trait EventStore: EventLister + EventCreator {}

impl<T: EventLister + EventCreator + ?Sized> EventStore for T {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Unique ids in the snapshot.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpdateSummary {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

struct Stored {
    revision: u32,
    content_hash: ContentHash,
    /// First observation, kept across revisions.
    create_time: DateTime<Utc>,
}

#[derive(Default)]
struct Scratch {
    ids: Vec<Uuid>,
    /// Latest stored revision per id.
    existing: HashMap<Uuid, Stored>,
    writes: Vec<Event>,
}

impl Scratch {
    fn clear(&mut self) {
        self.ids.clear();
        self.existing.clear();
        self.writes.clear();
    }
}

/// Runs reconciliation passes. Passes on one instance are serialized; the
/// scratch buffers are reused between passes and cleared at the start of
/// each, so a failed pass leaves nothing behind for the next.
pub struct Updater {
    scratch: Mutex<Scratch>,
}

impl Default for Updater {
    fn default() -> Self {
        Self::new()
    }
}

impl Updater {
    pub fn new() -> Self {
        Self {
            scratch: Mutex::new(Scratch {
                ids: Vec::with_capacity(1000),
                existing: HashMap::with_capacity(1000),
                writes: Vec::with_capacity(1000),
            }),
        }
    }

    pub async fn update<S, T>(&self, source: &S, target: &T) -> Result<UpdateSummary>
    where
        S: EventLister + ?Sized,
        T: EventStore + ?Sized,
    {
        let mut scratch = self.scratch.lock().await;
        scratch.clear();
        counter!("reconcile_passes_total").increment(1);

        let res = pass(&mut scratch, source, target).await;
        scratch.clear();

        match &res {
            Ok(summary) => {
                counter!("reconcile_written_total").increment(summary.written() as u64);
                gauge!("reconcile_last_run_ts").set(Utc::now().timestamp() as f64);
                tracing::info!(
                    fetched = summary.fetched,
                    created = summary.created,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    "reconcile pass"
                );
            }
            Err(e) => {
                counter!("reconcile_errors_total").increment(1);
                tracing::warn!(error = %format!("{e:#}"), "reconcile pass failed");
            }
        }
        res
    }
}

async fn pass<S, T>(scratch: &mut Scratch, source: &S, target: &T) -> Result<UpdateSummary>
where
    S: EventLister + ?Sized,
    T: EventStore + ?Sized,
{
    let mut fresh = source
        .list_unique_events(&[])
        .await
        .context("update events")?;
    dedup_latest(&mut fresh);

    let mut summary = UpdateSummary {
        fetched: fresh.len(),
        ..Default::default()
    };
    if fresh.is_empty() {
        return Ok(summary);
    }

    scratch.ids.extend(fresh.iter().map(|e| e.id));
    let stored = target
        .list_unique_events(&scratch.ids)
        .await
        .context("fetch existing events")?;
    for evt in stored {
        // A store may hand back several revisions; the highest one counts.
        let newer = scratch
            .existing
            .get(&evt.id)
            .map_or(true, |cur| evt.revision >= cur.revision);
        if newer {
            scratch.existing.insert(
                evt.id,
                Stored {
                    revision: evt.revision,
                    content_hash: evt.content_hash,
                    create_time: evt.create_time,
                },
            );
        }
    }

    for mut evt in fresh {
        match scratch.existing.get(&evt.id) {
            Some(prev) if prev.content_hash == evt.content_hash => {
                summary.unchanged += 1;
                continue;
            }
            Some(prev) => {
                evt.revision = prev.revision + 1;
                evt.create_time = prev.create_time;
                summary.updated += 1;
            }
            None => {
                evt.revision = 1;
                summary.created += 1;
            }
        }
        scratch.writes.push(evt);
    }

    if !scratch.writes.is_empty() {
        tracing::debug!(records = scratch.writes.len(), "creating records");
        target
            .create_events(&scratch.writes)
            .await
            .context("create events")?;
    }
    Ok(summary)
}
