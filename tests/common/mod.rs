// tests/common/mod.rs
//
// Shared fakes for integration tests. Not every test binary uses every
// helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use police_feed::feed::{FeedSource, RawItem};

pub const PUB_DATE: &str = "Wed, 15 Feb 2023 21:18:03 +0100";

type Batch = std::result::Result<Vec<RawItem>, String>;

/// Feed source driven by the test: each `fetch` for a region returns the
/// next scripted batch for it, and waits for one if none is queued yet.
/// Once the script handle is dropped, fetches pend forever.
pub struct ScriptedSource {
    feeds: HashMap<String, Mutex<mpsc::UnboundedReceiver<Batch>>>,
    calls: AtomicUsize,
}

/// Producer side of a [`ScriptedSource`].
pub struct Script {
    feeds: HashMap<String, mpsc::UnboundedSender<Batch>>,
}

impl ScriptedSource {
    pub fn new(regions: &[&str]) -> (Arc<Self>, Script) {
        let mut rxs = HashMap::new();
        let mut txs = HashMap::new();
        for region in regions {
            let (tx, rx) = mpsc::unbounded_channel();
            rxs.insert(region.to_string(), Mutex::new(rx));
            txs.insert(region.to_string(), tx);
        }
        (
            Arc::new(Self {
                feeds: rxs,
                calls: AtomicUsize::new(0),
            }),
            Script { feeds: txs },
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, region_id: &str, _url: &str) -> Result<Vec<RawItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let feed = self
            .feeds
            .get(region_id)
            .ok_or_else(|| anyhow!("unscripted region {region_id}"))?;
        let mut rx = feed.lock().await;
        match rx.recv().await {
            Some(Ok(items)) => Ok(items),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl Script {
    pub fn push(&self, region: &str, items: Vec<RawItem>) {
        self.feeds[region].send(Ok(items)).expect("source dropped");
    }

    pub fn fail(&self, region: &str, msg: &str) {
        self.feeds[region]
            .send(Err(msg.to_string()))
            .expect("source dropped");
    }
}

/// A feed item whose guid is derived from `slug`.
pub fn item(slug: &str, title: &str) -> RawItem {
    let url = format!("https://polisen.se/aktuellt/handelser/2023/februari/15/{slug}/");
    RawItem {
        guid: url.clone(),
        link: url,
        title: title.to_string(),
        description: format!("{title} description"),
        pub_date: PUB_DATE.to_string(),
    }
}

/// Source that serves the same fixed items for every region, every time.
pub struct StaticSource {
    pub items: Vec<RawItem>,
    pub fail_region: Option<&'static str>,
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch(&self, region_id: &str, _url: &str) -> Result<Vec<RawItem>> {
        if self.fail_region == Some(region_id) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
