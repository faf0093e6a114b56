use anyhow::{Context, Result};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::feed::RawItem;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    guid: Option<Guid>,
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// `<guid isPermaLink="true">…</guid>`; the attribute is not needed.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Decode an RSS 2.0 document into raw items, in document order.
pub fn parse_items(xml: &str) -> Result<Vec<RawItem>> {
    let t0 = std::time::Instant::now();
    let rss: Rss = from_str(xml).context("parsing rss xml")?;

    let out: Vec<RawItem> = rss
        .channel
        .item
        .into_iter()
        .map(|it| {
            let link = it.link.unwrap_or_default().trim().to_string();
            let guid = it
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| link.clone());
            RawItem {
                guid,
                link,
                title: it.title.unwrap_or_default(),
                description: it.description.unwrap_or_default(),
                pub_date: it.pub_date.unwrap_or_default(),
            }
        })
        .collect();

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("feed_parse_ms").record(ms);
    counter!("feed_events_parsed_total").increment(out.len() as u64);
    Ok(out)
}
