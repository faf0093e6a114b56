// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod metrics;
pub mod reconcile;
pub mod regions;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::collector::{Collector, CollectorConfig, CollectorState, Subscription};
pub use crate::error::FeedError;
pub use crate::event::Event;
pub use crate::reconcile::{EventCreator, EventLister, EventStore, FeedLister, UpdateSummary, Updater};
