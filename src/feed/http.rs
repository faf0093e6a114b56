use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;

use crate::error::FeedError;
use crate::feed::{rss, FeedSource, RawItem};

/// Fetches region feeds over HTTP and decodes them as RSS.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("police-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, region_id: &str, url: &str) -> Result<Vec<RawItem>> {
        counter!("feed_fetch_total", "region" => region_id.to_string()).increment(1);

        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = ?e, region = region_id, url, "feed http error");
                counter!("feed_fetch_errors_total", "region" => region_id.to_string())
                    .increment(1);
                return Err(e).context("get rss feed");
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("feed_fetch_errors_total", "region" => region_id.to_string()).increment(1);
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = resp.text().await.context("read rss body")?;
        rss::parse_items(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
