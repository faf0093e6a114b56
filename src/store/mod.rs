//! Event stores: an in-process map and a SQLite file.
//!
//! Both keep every revision and list only the highest revision per id.

mod schema;
mod sqlite;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::event::Event;
use crate::reconcile::{EventCreator, EventLister};

pub use sqlite::SqliteEventStore;

/// Volatile store, used when no database path is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    records: RwLock<BTreeMap<Uuid, BTreeMap<u32, Event>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Every stored revision of `id`, oldest first.
    pub fn revisions(&self, id: Uuid) -> Vec<Event> {
        self.records
            .read()
            .get(&id)
            .map(|revs| revs.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventLister for MemoryEventStore {
    async fn list_unique_events(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        let records = self.records.read();
        let latest = |revs: &BTreeMap<u32, Event>| revs.values().next_back().cloned();
        let out = if ids.is_empty() {
            records.values().filter_map(latest).collect()
        } else {
            ids.iter()
                .filter_map(|id| records.get(id))
                .filter_map(latest)
                .collect()
        };
        Ok(out)
    }
}

#[async_trait]
impl EventCreator for MemoryEventStore {
    async fn create_events(&self, events: &[Event]) -> Result<()> {
        let mut records = self.records.write();
        for evt in events {
            records
                .entry(evt.id)
                .or_default()
                .insert(evt.revision, evt.clone());
        }
        Ok(())
    }
}
