use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::collector::latch::FatalLatch;
use crate::error::FeedError;
use crate::event::{events_from_items, Event};
use crate::feed::FeedSource;

/// Polls one region and forwards items it has not forwarded before.
///
/// The seen-set lives as long as the worker and is private to its region.
pub(crate) struct RegionWorker {
    pub(crate) region: &'static str,
    pub(crate) url: String,
    pub(crate) source: Arc<dyn FeedSource>,
    pub(crate) ingress: mpsc::Sender<Event>,
    pub(crate) send_timeout: Duration,
    pub(crate) refresh_interval: Duration,
    pub(crate) seen: HashSet<Uuid>,
}

impl RegionWorker {
    /// Runs until the latch fires (returns the latched error) or a fetch,
    /// parse or hand-off fails (returns that error).
    pub(crate) async fn run(mut self, latch: &FatalLatch) -> Result<(), FeedError> {
        tracing::info!(region = self.region, url = %self.url, "region worker started");
        loop {
            let forwarded = self.poll_once(latch).await?;
            tracing::debug!(region = self.region, forwarded, seen = self.seen.len(), "poll done");

            tokio::select! {
                biased;
                _ = latch.fired() => return Err(latch.error()),
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }
        }
    }

    /// Fetches the region once and forwards unseen events to the ingress.
    ///
    /// The ingress holds one item, so a send completes as soon as the slot is
    /// free. `send_timeout` bounds the wait for that slot, not for the
    /// dispatcher to take the item.
    async fn poll_once(&mut self, latch: &FatalLatch) -> Result<usize, FeedError> {
        let items = tokio::select! {
            biased;
            _ = latch.fired() => return Err(latch.error()),
            res = self.source.fetch(self.region, &self.url) => {
                res.map_err(|e| FeedError::fetch(self.region, &e))?
            }
        };
        let events = events_from_items(items, self.region, Utc::now())?;

        let mut forwarded = 0usize;
        for event in events {
            if self.seen.contains(&event.id) {
                continue;
            }
            let id = event.id;
            tokio::select! {
                biased;
                _ = latch.fired() => return Err(latch.error()),
                sent = tokio::time::timeout(self.send_timeout, self.ingress.send(event)) => match sent {
                    Ok(Ok(())) => {}
                    // The receiver only goes away after teardown.
                    Ok(Err(_)) => return Err(latch.error()),
                    Err(_) => {
                        return Err(FeedError::SendTimeout {
                            region: self.region.to_string(),
                            timeout: self.send_timeout,
                        })
                    }
                }
            }
            self.seen.insert(id);
            forwarded += 1;
        }

        counter!("collector_forwarded_total", "region" => self.region).increment(forwarded as u64);
        Ok(forwarded)
    }
}
