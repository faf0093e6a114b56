// src/feed/mod.rs
pub mod http;
pub mod rss;

use anyhow::Result;

/// One `<item>` of a region feed, before ids and hashes are derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub guid: String,
    pub link: String,
    pub title: String,
    pub description: String,
    /// RFC 2822 text as published.
    pub pub_date: String,
}

/// Produces the current batch of raw items for a region.
///
/// Transport failures, non-success statuses and undecodable bodies are
/// errors. A [`crate::error::FeedError::Status`] returned inside the
/// `anyhow::Error` is preserved as-is by the collector.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, region_id: &str, url: &str) -> Result<Vec<RawItem>>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
impl<T: FeedSource + ?Sized> FeedSource for std::sync::Arc<T> {
    async fn fetch(&self, region_id: &str, url: &str) -> Result<Vec<RawItem>> {
        (**self).fetch(region_id, url).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
