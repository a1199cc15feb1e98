//! Closable single-kind broadcast channel.
//!
//! Uses [`tokio::sync::broadcast`] for fan-out delivery. Records are wrapped
//! in an [`Arc`] once at publish time, so every subscriber observes the same
//! immutable instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::ChannelError;
use crate::subscription::Subscription;

/// Point-in-time view of a channel's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    /// Records accepted by [`Channel::publish`] since creation.
    pub published: u64,
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Whether [`Channel::close`] has been called.
    pub closed: bool,
}

/// Broadcast channel for a single record type.
///
/// Delivery is best effort: a record reaches the subscribers registered at
/// the moment it is published and nobody else. Publishing with no
/// subscribers succeeds and has no effect.
///
/// The sender lives behind a read-write lock. Publish and subscribe take
/// the read side; [`close`](Self::close) takes the write side and drops the
/// sender, so a publish racing a close either lands before it or fails with
/// [`ChannelError::Closed`].
pub struct Channel<T> {
    label: &'static str,
    capacity: usize,
    sender: RwLock<Option<broadcast::Sender<Arc<T>>>>,
    published: AtomicU64,
}

impl<T> Channel<T>
where
    T: Send + Sync + 'static,
{
    /// Create an open channel.
    ///
    /// `capacity` bounds how far a single subscriber may fall behind before
    /// it starts losing its oldest undelivered records. Other subscribers
    /// are unaffected by one subscriber lagging.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(label: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            label,
            capacity,
            sender: RwLock::new(Some(sender)),
            published: AtomicU64::new(0),
        }
    }

    /// Label used in logs and errors.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Deliver `record` to every currently registered subscriber.
    ///
    /// Never blocks and never waits for subscribers to consume.
    pub fn publish(&self, record: T) -> Result<(), ChannelError> {
        self.publish_shared(Arc::new(record))
    }

    /// Deliver an already shared record.
    ///
    /// Subscribers receive clones of this exact [`Arc`].
    pub fn publish_shared(&self, record: Arc<T>) -> Result<(), ChannelError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(self.closed_error());
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        // A send error only means nobody is listening right now.
        let delivered = sender.send(record).unwrap_or(0);
        tracing::trace!(channel = self.label, delivered, "record published");
        Ok(())
    }

    /// Register a new subscriber.
    ///
    /// The subscription yields records published after this call; earlier
    /// records are never replayed.
    pub fn subscribe(&self) -> Result<Subscription<T>, ChannelError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(self.closed_error());
        };

        let receiver = sender.subscribe();
        tracing::debug!(
            channel = self.label,
            subscribers = sender.receiver_count(),
            "subscriber registered"
        );
        Ok(Subscription::new(self.label, receiver))
    }

    /// Close the channel.
    ///
    /// Active subscribers drain what was already delivered to them and then
    /// observe end-of-sequence. Closing an already closed channel is a no-op.
    pub fn close(&self) {
        let sender = self.sender.write().take();
        if let Some(sender) = sender {
            tracing::debug!(
                channel = self.label,
                subscribers = sender.receiver_count(),
                published = self.total_published(),
                "channel closed"
            );
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Number of subscribers currently registered. Zero once closed.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total number of records accepted since creation.
    #[must_use]
    pub fn total_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Snapshot of the channel's counters.
    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        let guard = self.sender.read();
        ChannelStats {
            published: self.total_published(),
            subscribers: guard.as_ref().map_or(0, broadcast::Sender::receiver_count),
            closed: guard.is_none(),
        }
    }

    fn closed_error(&self) -> ChannelError {
        ChannelError::Closed {
            channel: self.label,
        }
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.sender.read();
        f.debug_struct("Channel")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field(
                "subscriber_count",
                &guard.as_ref().map_or(0, broadcast::Sender::receiver_count),
            )
            .field("closed", &guard.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_succeeds() {
        let channel = Channel::new("test", 16);
        channel.publish(1_u32).expect("publish should succeed");
        assert_eq!(channel.total_published(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_receives_published_record() {
        let channel = Channel::new("test", 16);
        let mut sub = channel.subscribe().unwrap();

        channel.publish("hello".to_string()).unwrap();

        let record = sub.try_recv().unwrap().expect("should receive record");
        assert_eq!(record.as_str(), "hello");
    }

    #[test]
    fn subscribers_share_the_same_instance() {
        let channel = Channel::new("test", 16);
        let mut sub1 = channel.subscribe().unwrap();
        let mut sub2 = channel.subscribe().unwrap();

        channel.publish(vec![1, 2, 3]).unwrap();

        let a = sub1.try_recv().unwrap().unwrap();
        let b = sub2.try_recv().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn publish_shared_delivers_the_callers_arc() {
        let channel = Channel::new("test", 16);
        let mut sub = channel.subscribe().unwrap();

        let record = Arc::new(5_u64);
        channel.publish_shared(Arc::clone(&record)).unwrap();

        let received = sub.try_recv().unwrap().unwrap();
        assert!(Arc::ptr_eq(&record, &received));
    }

    #[test]
    fn late_subscriber_sees_no_replay() {
        let channel = Channel::new("test", 16);
        channel.publish(1_u8).unwrap();

        let mut sub = channel.subscribe().unwrap();
        assert!(sub.try_recv().unwrap().is_none());

        channel.publish(2).unwrap();
        assert_eq!(sub.try_recv().unwrap().as_deref(), Some(&2));
    }

    #[test]
    fn subscriber_count_tracks_active_subscriptions() {
        let channel: Channel<u8> = Channel::new("test", 16);
        assert_eq!(channel.subscriber_count(), 0);

        let sub1 = channel.subscribe().unwrap();
        let _sub2 = channel.subscribe().unwrap();
        assert_eq!(channel.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn close_rejects_publish_and_subscribe() {
        let channel = Channel::new("perf", 16);
        channel.close();

        assert!(channel.is_closed());
        assert_eq!(
            channel.publish(1_u32),
            Err(ChannelError::Closed { channel: "perf" })
        );
        assert!(matches!(
            channel.subscribe(),
            Err(ChannelError::Closed { channel: "perf" })
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let channel: Channel<u8> = Channel::new("test", 4);
        channel.close();
        channel.close();
        assert!(channel.is_closed());
    }

    #[test]
    fn rejected_publish_is_not_counted() {
        let channel = Channel::new("test", 4);
        channel.publish(1_u8).unwrap();
        channel.close();
        let _ = channel.publish(2);

        assert_eq!(
            channel.stats(),
            ChannelStats {
                published: 1,
                subscribers: 0,
                closed: true,
            }
        );
    }

    #[test]
    fn debug_reports_state() {
        let channel: Channel<u8> = Channel::new("layout_shift", 8);
        let rendered = format!("{channel:?}");
        assert!(rendered.contains("layout_shift"));
        assert!(rendered.contains("closed: false"));
    }
}
