use once_cell::sync::OnceCell;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::FeedError;

/// First-error-wins shutdown latch shared by workers, the dispatch loop and
/// every subscription.
///
/// Tripping stores the error exactly once and then fires the engine token.
/// A plain [`FatalLatch::shutdown`] fires the token without storing an
/// error, so waiters observe [`FeedError::Cancelled`].
#[derive(Debug, Default)]
pub(crate) struct FatalLatch {
    error: OnceCell<FeedError>,
    token: CancellationToken,
}

impl FatalLatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Latch `err` if nothing was latched yet. Returns true for the single
    /// caller whose error won. Cancellation is never latched.
    pub(crate) fn trip(&self, err: FeedError) -> bool {
        if err.is_cancelled() {
            return false;
        }
        if self.error.set(err).is_err() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub(crate) fn shutdown(&self) {
        self.token.cancel();
    }

    /// The latched error, or `Cancelled` after a plain shutdown.
    pub(crate) fn error(&self) -> FeedError {
        self.error.get().cloned().unwrap_or(FeedError::Cancelled)
    }

    pub(crate) fn fault(&self) -> Option<&FeedError> {
        self.error.get()
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn fired(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_err(region: &str) -> FeedError {
        FeedError::Fetch {
            region: region.into(),
            reason: "boom".into(),
        }
    }

    #[test]
    fn first_error_wins() {
        let latch = FatalLatch::new();
        assert!(!latch.is_fired());
        assert!(latch.trip(fetch_err("skane")));
        assert!(!latch.trip(fetch_err("gotland")));
        assert!(latch.is_fired());
        assert_eq!(latch.error(), fetch_err("skane"));
    }

    #[test]
    fn shutdown_is_not_a_fault() {
        let latch = FatalLatch::new();
        latch.shutdown();
        assert!(latch.is_fired());
        assert!(latch.fault().is_none());
        assert_eq!(latch.error(), FeedError::Cancelled);
        assert!(!latch.trip(FeedError::Cancelled));
    }

    #[tokio::test]
    async fn trip_wakes_waiters() {
        let latch = std::sync::Arc::new(FatalLatch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move {
                latch.fired().await;
                latch.error()
            })
        };
        latch.trip(fetch_err("halland"));
        assert_eq!(waiter.await.unwrap(), fetch_err("halland"));
    }
}
