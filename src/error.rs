//! Error types for the ingestion engine.
//!
//! [`FeedError`] is `Clone` because the collector latches a single fatal
//! error and hands the same value to every subscriber and worker it wakes.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("unknown region {region}, choose one or more of {valid}")]
    UnknownRegion { region: String, valid: String },

    #[error("fetch feed for region {region}: {reason}")]
    Fetch { region: String, reason: String },

    #[error("unexpected response code {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("parse publish time {value:?}: {reason}")]
    PublishTime { value: String, reason: String },

    #[error("region {region}: ingress send timed out after {timeout:?}")]
    SendTimeout { region: String, timeout: Duration },

    #[error("cancelled")]
    Cancelled,
}

impl FeedError {
    /// Wrap an opaque source failure for `region`, keeping the whole chain.
    pub fn fetch(region: &str, err: &anyhow::Error) -> Self {
        // A status error raised by the source stays a status error.
        if let Some(inner) = err.downcast_ref::<FeedError>() {
            return inner.clone();
        }
        FeedError::Fetch {
            region: region.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }
}
