//! In-process fan-out bus that replays its last value to late subscribers.
//!
//! [`ReplayBus`] wraps a `tokio::sync::broadcast` channel together with the
//! most recently published value. A new subscriber first receives that value
//! (if anything was published yet) and then every later publication, so
//! observers that attach between two publications never see silence.

use std::sync::{Mutex, PoisonError};

use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// Broadcast primitive with replay-latest semantics.
///
/// Publishing and subscribing both happen under the same lock, so a
/// subscriber receives each value exactly once: either as its replayed
/// initial value or through the channel, never both.
pub struct ReplayBus<T> {
    last: Mutex<Option<T>>,
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> ReplayBus<T> {
    /// Create a bus with a specific channel capacity.
    ///
    /// Receivers that fall more than `capacity` values behind skip ahead;
    /// only the newest value matters to a display.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            last: Mutex::new(None),
            sender,
        }
    }

    /// Store `value` as the latest and send it to every current subscriber.
    pub fn publish(&self, value: T) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(value.clone());
        // Zero receivers is fine: the value is still replayed to the next one.
        let _ = self.sender.send(value);
    }

    /// Subscribe, starting with the latest value if one was published.
    pub fn subscribe(&self) -> ReplayReceiver<T> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        ReplayReceiver {
            replay: last.clone(),
            rx: self.sender.subscribe(),
        }
    }

    /// The most recently published value.
    pub fn latest(&self) -> Option<T> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for ReplayBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving half handed out by [`ReplayBus::subscribe`].
pub struct ReplayReceiver<T> {
    replay: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> ReplayReceiver<T> {
    /// Wait for the next value. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }

        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Replay receiver lagged, skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next value if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }

        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Adapt the receiver into a [`Stream`] that ends when the bus is dropped.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |mut rx| async move {
            let value = rx.recv().await?;
            Some((value, rx))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = ReplayBus::default();
        let mut rx = bus.subscribe();

        bus.publish(7u32);

        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_value() {
        let bus = ReplayBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish("snapshot".to_string());

        assert_eq!(rx1.recv().await.as_deref(), Some("snapshot"));
        assert_eq!(rx2.recv().await.as_deref(), Some("snapshot"));
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn late_subscriber_gets_latest_once() {
        let bus = ReplayBus::default();
        bus.publish(1u32);
        bus.publish(2u32);

        let mut late = bus.subscribe();
        assert_eq!(late.recv().await, Some(2));
        assert_eq!(late.try_recv(), None);

        bus.publish(3);
        assert_eq!(late.recv().await, Some(3));
    }

    #[test]
    fn subscriber_before_first_publish_sees_nothing() {
        let bus: ReplayBus<u32> = ReplayBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(rx.try_recv(), None);
        assert_eq!(bus.latest(), None);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = ReplayBus::default();
        bus.publish(Some(5u8));
        assert_eq!(bus.latest(), Some(Some(5)));
    }

    #[tokio::test]
    async fn lagging_receiver_skips_to_newer_values() {
        let bus = ReplayBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..10u32 {
            bus.publish(i);
        }
        assert_eq!(rx.recv().await, Some(8));
        assert_eq!(rx.recv().await, Some(9));
    }

    #[tokio::test]
    async fn stream_ends_when_bus_dropped() {
        let bus = ReplayBus::default();
        bus.publish(1u32);
        let stream = bus.subscribe().into_stream();
        bus.publish(2);
        drop(bus);

        let values: Vec<u32> = stream.collect().await;
        assert_eq!(values, [1, 2]);
    }
}
