//! # Collector
//! Live ingestion and broadcast engine.
//!
//! One worker per selected region polls its feed, drops items it has already
//! forwarded, and hands the rest to a single dispatch loop through a bounded
//! ingress. The dispatch loop offers each item to every subscriber before
//! taking the next one.
//!
//! Any worker failure (fetch, parse, or an ingress hand-off that exceeds the
//! send timeout) is latched once and tears the whole engine down: workers
//! stop at their next suspension point and every subscriber receives the
//! same error. There is no per-region degradation.
//!
//! Lifecycle: `Idle` until the first subscription, then `Running` until it
//! either faults (`Faulted`) or is shut down (`Stopped`). Neither terminal
//! state can be left.

mod hub;
mod latch;
mod subscription;
mod worker;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::FeedError;
use crate::event::Event;
use crate::feed::FeedSource;
use crate::regions::{Regions, DEFAULT_URL_TEMPLATE};

use hub::Hub;
use latch::FatalLatch;
use worker::RegionWorker;

pub use subscription::Subscription;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Region ids, or a single `all`.
    pub regions: Vec<String>,
    /// Feed URL template, see [`crate::regions`].
    pub url_template: String,
    /// Upper bound on one ingress hand-off before the engine faults.
    pub send_timeout: Duration,
    /// Pause between two polls of the same region.
    pub refresh_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            regions: vec![crate::regions::ALL_REGIONS.to_string()],
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            send_timeout: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Running,
    Faulted,
    Stopped,
}

pub(crate) struct Inner {
    pub(crate) latch: FatalLatch,
    hub: Hub,
    started: AtomicBool,
    ingress_tx: mpsc::Sender<Event>,
    ingress_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    regions: Vec<(&'static str, String)>,
    source: Arc<dyn FeedSource>,
    send_timeout: Duration,
    refresh_interval: Duration,
    tasks: TaskTracker,
}

/// Handle to a live engine. Clones share the same engine.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<Inner>,
}

impl Collector {
    /// Validate the region selection and prepare (but not start) the engine.
    pub fn new(config: CollectorConfig, source: Arc<dyn FeedSource>) -> Result<Self, FeedError> {
        let registry = Regions::new(config.url_template);
        let regions = registry
            .resolve(&config.regions)?
            .into_iter()
            .map(|id| (id, registry.source_url(id)))
            .collect();

        let (ingress_tx, ingress_rx) = mpsc::channel(1);
        let tasks = TaskTracker::new();
        // Closed up front so `wait` returns at once when nothing was started.
        tasks.close();

        Ok(Self {
            inner: Arc::new(Inner {
                latch: FatalLatch::new(),
                hub: Hub::default(),
                started: AtomicBool::new(false),
                ingress_tx,
                ingress_rx: Mutex::new(Some(ingress_rx)),
                regions,
                source,
                send_timeout: config.send_timeout,
                refresh_interval: config.refresh_interval,
                tasks,
            }),
        })
    }

    /// Region ids this engine polls, in selection order.
    pub fn regions(&self) -> Vec<&'static str> {
        self.inner.regions.iter().map(|(id, _)| *id).collect()
    }

    pub fn state(&self) -> CollectorState {
        let inner = &self.inner;
        if inner.latch.fault().is_some() {
            CollectorState::Faulted
        } else if inner.latch.is_fired() {
            CollectorState::Stopped
        } else if inner.started.load(Ordering::Acquire) {
            CollectorState::Running
        } else {
            CollectorState::Idle
        }
    }

    /// The latched fatal error, if the engine faulted.
    pub fn error(&self) -> Option<FeedError> {
        self.inner.latch.fault().cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.len()
    }

    /// Register a subscriber and start the engine if this is the first one.
    ///
    /// Must be called from within a Tokio runtime. Fails at once if `cancel`
    /// already fired or the engine has shut down. The subscriber sees only
    /// items broadcast after this call returns.
    pub fn subscribe(&self, cancel: &CancellationToken) -> Result<Subscription, FeedError> {
        if cancel.is_cancelled() {
            return Err(FeedError::Cancelled);
        }
        if self.inner.latch.is_fired() {
            return Err(self.inner.latch.error());
        }

        let sub_cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(1);
        let id = self.inner.hub.register(tx, sub_cancel.clone());
        tracing::debug!(subscriber = id, "subscribed");
        self.start();

        Ok(Subscription {
            id,
            rx,
            cancel: sub_cancel,
            inner: self.inner.clone(),
        })
    }

    /// Stop every worker and release every subscriber with `Cancelled`.
    pub fn shutdown(&self) {
        self.inner.latch.shutdown();
    }

    /// Wait for all engine tasks to finish after a fault or shutdown.
    pub async fn wait(&self) {
        self.inner.tasks.wait().await;
    }

    fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(ingress_rx) = self.inner.ingress_rx.lock().take() else {
            return;
        };

        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            hub::run_dispatch(&inner.hub, &inner.latch, ingress_rx).await;
            tracing::debug!("dispatch loop stopped");
        });

        for &(region, ref url) in &self.inner.regions {
            let worker = RegionWorker {
                region,
                url: url.clone(),
                source: self.inner.source.clone(),
                ingress: self.inner.ingress_tx.clone(),
                send_timeout: self.inner.send_timeout,
                refresh_interval: self.inner.refresh_interval,
                seen: HashSet::with_capacity(1000),
            };
            let inner = self.inner.clone();
            self.inner.tasks.spawn(async move {
                let region = worker.region;
                if let Err(err) = worker.run(&inner.latch).await {
                    if inner.latch.trip(err.clone()) {
                        tracing::error!(region, error = %err, "collector faulted");
                    } else {
                        tracing::debug!(region, error = %err, "region worker stopped");
                    }
                }
            });
        }
        tracing::info!(regions = self.inner.regions.len(), "collector running");
    }
}
