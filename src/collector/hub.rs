use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collector::latch::FatalLatch;
use crate::error::FeedError;
use crate::event::Event;

#[derive(Clone)]
struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn is_gone(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// Registration list plus fan-out of each ingress item to every subscriber.
///
/// Delivery is in registration order and one subscriber at a time, so a
/// subscriber that neither reads nor cancels holds up everyone registered
/// after it. The read guard is dropped before each send, which lets
/// `register` run while a dispatch is in flight.
#[derive(Default)]
pub(crate) struct Hub {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Hub {
    pub(crate) fn register(&self, tx: mpsc::Sender<Event>, cancel: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.write();
        subs.push(Subscriber { id, tx, cancel });
        gauge!("collector_subscribers").set(subs.len() as f64);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Offer `event` to every subscriber registered when the broadcast
    /// starts. Returns how many took it, or the latched error once the
    /// engine has fired.
    pub(crate) async fn broadcast(&self, event: &Event, latch: &FatalLatch) -> Result<usize, FeedError> {
        // Subscribers registering mid-broadcast are appended past this bound
        // and only see the next item.
        let bound = self.subscribers.read().len();
        let mut delivered = 0usize;
        for idx in 0..bound {
            let sub = {
                let subs = self.subscribers.read();
                match subs.get(idx) {
                    Some(s) => s.clone(),
                    None => break,
                }
            };

            tokio::select! {
                biased;
                _ = latch.fired() => return Err(latch.error()),
                _ = sub.cancel.cancelled() => {
                    tracing::debug!(subscriber = sub.id, "skip cancelled subscriber");
                }
                sent = sub.tx.send(event.clone()) => {
                    if sent.is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        counter!("collector_delivered_total").increment(delivered as u64);
        self.prune();
        Ok(delivered)
    }

    /// Drop subscribers whose cancellation fired or whose receiver is gone.
    /// Runs between items so indices stay stable during a broadcast.
    pub(crate) fn prune(&self) -> usize {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| !s.is_gone());
        let removed = before - subs.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = subs.len(), "pruned subscribers");
            gauge!("collector_subscribers").set(subs.len() as f64);
        }
        removed
    }
}

/// Single-writer dispatch loop: one ingress item at a time, fully fanned
/// out before the next is taken.
pub(crate) async fn run_dispatch(hub: &Hub, latch: &FatalLatch, mut ingress: mpsc::Receiver<Event>) {
    loop {
        let event = tokio::select! {
            biased;
            _ = latch.fired() => return,
            next = ingress.recv() => match next {
                Some(event) => event,
                None => return,
            },
        };
        match hub.broadcast(&event, latch).await {
            Ok(n) => tracing::debug!(id = %event.id, region = %event.region, delivered = n, "broadcast"),
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ev(url: &str) -> Event {
        Event::new(url, "t", "d", "skane", Utc::now(), Utc::now())
    }

    #[tokio::test]
    async fn delivers_in_registration_order_to_all() {
        let hub = Hub::default();
        let latch = FatalLatch::new();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(1);
        hub.register(tx1, CancellationToken::new());
        hub.register(tx2, CancellationToken::new());

        assert_eq!(hub.broadcast(&ev("x"), &latch).await.unwrap(), 2);
        assert_eq!(rx1.recv().await.unwrap().url, "x");
        assert_eq!(rx2.recv().await.unwrap().url, "x");
    }

    #[tokio::test]
    async fn cancelled_and_dropped_subscribers_are_pruned() {
        let hub = Hub::default();
        let latch = FatalLatch::new();
        let gone = CancellationToken::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, rx2) = mpsc::channel(1);
        let (tx3, mut rx3) = mpsc::channel(1);
        hub.register(tx1, gone.clone());
        hub.register(tx2, CancellationToken::new());
        hub.register(tx3, CancellationToken::new());
        gone.cancel();
        drop(rx2);

        assert_eq!(hub.broadcast(&ev("y"), &latch).await.unwrap(), 1);
        assert_eq!(rx3.recv().await.unwrap().url, "y");
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn stuck_subscriber_is_released_by_latch() {
        let hub = Hub::default();
        let latch = std::sync::Arc::new(FatalLatch::new());
        let (tx, _rx) = mpsc::channel(1);
        hub.register(tx, CancellationToken::new());
        // Fill the only slot; the second send blocks.
        hub.broadcast(&ev("a"), &latch).await.unwrap();

        let trip = {
            let latch = latch.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                latch.trip(FeedError::Fetch {
                    region: "skane".into(),
                    reason: "down".into(),
                });
            })
        };
        let err = hub.broadcast(&ev("b"), &latch).await.unwrap_err();
        trip.await.unwrap();
        assert!(matches!(err, FeedError::Fetch { .. }));
    }

    #[tokio::test]
    async fn registration_during_broadcast_waits_for_next_item() {
        use std::sync::Arc;

        let hub = Arc::new(Hub::default());
        let latch = Arc::new(FatalLatch::new());
        let (tx1, mut rx1) = mpsc::channel(1);
        hub.register(tx1, CancellationToken::new());
        hub.broadcast(&ev("a"), &latch).await.unwrap();

        // `b` blocks on the full slot of the first subscriber.
        let in_flight = {
            let (hub, latch) = (hub.clone(), latch.clone());
            tokio::spawn(async move { hub.broadcast(&ev("b"), &latch).await })
        };
        tokio::task::yield_now().await;

        let (tx2, mut rx2) = mpsc::channel(1);
        hub.register(tx2, CancellationToken::new());

        assert_eq!(rx1.recv().await.unwrap().url, "a");
        assert_eq!(rx1.recv().await.unwrap().url, "b");
        assert_eq!(in_flight.await.unwrap().unwrap(), 1);
        assert!(rx2.try_recv().is_err(), "late subscriber got the in-flight item");

        assert_eq!(hub.broadcast(&ev("c"), &latch).await.unwrap(), 2);
        assert_eq!(rx2.recv().await.unwrap().url, "c");
    }
}
