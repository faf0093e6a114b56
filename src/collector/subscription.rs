use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collector::Inner;
use crate::error::FeedError;
use crate::event::Event;

/// Pull side of one live subscriber.
///
/// Dropping the subscription cancels it; the hub stops offering it items
/// and prunes it after the item in flight.
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) rx: mpsc::Receiver<Event>,
    pub(crate) cancel: CancellationToken,
    pub(crate) inner: Arc<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next broadcast item.
    ///
    /// Errors are terminal: after the engine fires every call returns the
    /// latched error, and after this subscriber's own cancellation every
    /// call returns [`FeedError::Cancelled`].
    pub async fn recv(&mut self) -> Result<Event, FeedError> {
        tokio::select! {
            biased;
            _ = self.inner.latch.fired() => Err(self.inner.latch.error()),
            _ = self.cancel.cancelled() => Err(FeedError::Cancelled),
            next = self.rx.recv() => next.ok_or_else(|| self.inner.latch.error()),
        }
    }

    /// Stop receiving. Equivalent to cancelling the token passed to
    /// `subscribe`, scoped to this subscription only.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
