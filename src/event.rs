//! # Event
//! Identity, content hash and revision of a single incident.
//!
//! - `id` is a UUIDv5 over the item's guid (its canonical article URL), so
//!   every fetch of the same incident yields the same id.
//! - `content_hash` covers only title and description. Publish and fetch
//!   times are left out so that re-fetch jitter never bumps a revision.
//! - `revision` is 0 on a freshly fetched event and is assigned by the
//!   reconciliation pass (1 on first persistence, +1 per content change).

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::FeedError;
use crate::feed::RawItem;

static EVENT_ID_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"policefeed.v1.PoliceEvent.ID"));

/// Deterministic event id for a canonical item URL (or feed guid).
pub fn event_id(url: &str) -> Uuid {
    Uuid::new_v5(&EVENT_ID_NAMESPACE, url.as_bytes())
}

/// SHA-256 digest over an event's substantive text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentHash(#[serde(with = "hex::serde")] [u8; 32]);

impl ContentHash {
    pub fn of(title: &str, description: &str) -> Self {
        let mut hasher = Sha256::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        hasher.update((title.len() as u64).to_le_bytes());
        hasher.update(title.as_bytes());
        hasher.update((description.len() as u64).to_le_bytes());
        hasher.update(description.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub description: String,
    pub region: String,
    pub publish_time: DateTime<Utc>,
    /// First local observation.
    pub create_time: DateTime<Utc>,
    pub content_hash: ContentHash,
    /// 0 until persisted.
    pub revision: u32,
}

impl Event {
    /// Build an unpersisted event; id and content hash are derived here.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        region: impl Into<String>,
        publish_time: DateTime<Utc>,
        create_time: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        let title = title.into();
        let description = description.into();
        Self {
            id: event_id(&url),
            content_hash: ContentHash::of(&title, &description),
            url,
            title,
            description,
            region: region.into(),
            publish_time,
            create_time,
            revision: 0,
        }
    }

    /// Convert a raw feed item observed at `now` in `region`.
    pub fn from_item(item: RawItem, region: &str, now: DateTime<Utc>) -> Result<Self, FeedError> {
        let publish_time = parse_publish_time(&item.pub_date)?;
        let url = if item.guid.is_empty() {
            item.link
        } else {
            item.guid
        };
        Ok(Self::new(
            url,
            item.title,
            item.description,
            region,
            publish_time,
            now,
        ))
    }
}

/// Parse an RSS `pubDate` (RFC 2822, numeric offset or `GMT`).
pub fn parse_publish_time(value: &str) -> Result<DateTime<Utc>, FeedError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FeedError::PublishTime {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Convert a whole batch; a single malformed item fails the batch.
pub fn events_from_items(
    items: Vec<RawItem>,
    region: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Event>, FeedError> {
    items
        .into_iter()
        .map(|item| Event::from_item(item, region, now))
        .collect()
}

/// Keep one event per id: the most recently published one.
///
/// The result is ordered by id bytes. Equal publish times keep the earlier
/// input position, so the outcome is reproducible for a given input.
pub fn dedup_latest(events: &mut Vec<Event>) {
    events.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| b.publish_time.cmp(&a.publish_time))
    });
    events.dedup_by_key(|e| e.id);
}
