use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::FeedError;
use crate::event::{dedup_latest, events_from_items, Event};
use crate::feed::FeedSource;
use crate::reconcile::EventLister;
use crate::regions::Regions;

/// Exposes the feeds of a fixed set of regions as an [`EventLister`].
///
/// Every listing fetches all regions concurrently and fails as a whole on
/// the first region error; the remaining fetches are aborted.
pub struct FeedLister {
    regions: Vec<(&'static str, String)>,
    source: Arc<dyn FeedSource>,
}

impl FeedLister {
    pub fn new<S: AsRef<str>>(
        registry: &Regions,
        selection: &[S],
        source: Arc<dyn FeedSource>,
    ) -> Result<Self, FeedError> {
        let regions = registry
            .resolve(selection)?
            .into_iter()
            .map(|id| (id, registry.source_url(id)))
            .collect();
        Ok(Self { regions, source })
    }

    pub fn regions(&self) -> Vec<&'static str> {
        self.regions.iter().map(|(id, _)| *id).collect()
    }

    async fn fetch_all(&self) -> Result<Vec<Event>> {
        let mut set = JoinSet::new();
        for &(region, ref url) in &self.regions {
            let url = url.clone();
            let source = self.source.clone();
            set.spawn(async move {
                let items = source
                    .fetch(region, &url)
                    .await
                    .map_err(|e| FeedError::fetch(region, &e))?;
                events_from_items(items, region, Utc::now())
            });
        }

        let mut out = Vec::with_capacity(2000);
        while let Some(joined) = set.join_next().await {
            // Returning drops the set, which aborts the fetches still running.
            let batch = joined.map_err(|e| anyhow!("region fetch task failed: {e}"))??;
            out.extend(batch);
        }
        Ok(out)
    }
}

#[async_trait]
impl EventLister for FeedLister {
    async fn list_unique_events(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        if !ids.is_empty() {
            bail!("feed cannot filter by id");
        }
        let mut events = self.fetch_all().await?;
        dedup_latest(&mut events);
        Ok(events)
    }
}
