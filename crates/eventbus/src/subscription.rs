//! Subscriber handle for a [`Channel`](crate::Channel).

use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::ChannelError;

/// Independent, ordered view of one channel.
///
/// Records arrive in publish order. Dropping the handle (or calling
/// [`unsubscribe`](Self::unsubscribe)) stops delivery to this subscriber
/// without touching any other.
///
/// A subscriber that falls more than the channel capacity behind loses its
/// oldest undelivered records. That loss is visible only here, through
/// [`lagged`](Self::lagged).
pub struct Subscription<T> {
    channel: &'static str,
    receiver: broadcast::Receiver<Arc<T>>,
    lagged: u64,
}

impl<T> Subscription<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(channel: &'static str, receiver: broadcast::Receiver<Arc<T>>) -> Self {
        Self {
            channel,
            receiver,
            lagged: 0,
        }
    }

    /// Label of the channel this subscription reads from.
    #[must_use]
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Receive the next record, waiting asynchronously.
    ///
    /// Returns `None` once the channel is closed and everything delivered
    /// before the close has been drained.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next record without waiting.
    ///
    /// `Ok(None)` means nothing is pending right now. `Err` means the
    /// channel is closed and fully drained.
    pub fn try_recv(&mut self) -> Result<Option<Arc<T>>, ChannelError> {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => return Ok(Some(record)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(ChannelError::Closed {
                        channel: self.channel,
                    });
                }
            }
        }
    }

    /// Number of records this subscriber has missed by lagging.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Stop receiving. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        tracing::debug!(channel = self.channel, "subscriber unsubscribed");
    }

    /// Turn the subscription into a [`Stream`] that ends when the channel
    /// closes.
    ///
    /// Lag is logged and skipped; the stream keeps going with the oldest
    /// record still buffered.
    pub fn into_stream(self) -> impl Stream<Item = Arc<T>> + Send + Unpin + 'static {
        let channel = self.channel;
        BroadcastStream::new(self.receiver).filter_map(move |item| match item {
            Ok(record) => Some(record),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(channel, missed, "subscriber stream lagged");
                None
            }
        })
    }

    fn record_lag(&mut self, missed: u64) {
        self.lagged = self.lagged.saturating_add(missed);
        tracing::warn!(
            channel = self.channel,
            missed,
            total = self.lagged,
            "subscriber lagged"
        );
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("pending", &self.receiver.len())
            .field("lagged", &self.lagged)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Channel;

    #[tokio::test]
    async fn recv_yields_records_then_end_of_sequence() {
        let channel = Channel::new("test", 16);
        let mut sub = channel.subscribe().unwrap();

        channel.publish(1_u32).unwrap();
        channel.publish(2).unwrap();
        channel.close();

        assert_eq!(sub.recv().await.as_deref(), Some(&1));
        assert_eq!(sub.recv().await.as_deref(), Some(&2));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn recv_wakes_on_publish_from_another_task() {
        let channel = Arc::new(Channel::new("test", 16));
        let mut sub = channel.subscribe().unwrap();

        let producer = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.publish("late".to_string()).unwrap();
        });

        let record = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("should not time out")
            .expect("should receive record");
        assert_eq!(record.as_str(), "late");
    }

    #[test]
    fn try_recv_reports_closed_after_drain() {
        let channel = Channel::new("errors", 16);
        let mut sub = channel.subscribe().unwrap();
        channel.publish(7_i32).unwrap();
        channel.close();

        assert_eq!(sub.try_recv().unwrap().as_deref(), Some(&7));
        assert_eq!(
            sub.try_recv(),
            Err(ChannelError::Closed { channel: "errors" })
        );
    }

    #[test]
    fn lagging_subscriber_only_affects_itself() {
        let channel = Channel::new("test", 2);
        let mut slow = channel.subscribe().unwrap();
        let mut fast = channel.subscribe().unwrap();

        channel.publish(1_u32).unwrap();
        assert_eq!(fast.try_recv().unwrap().as_deref(), Some(&1));
        channel.publish(2).unwrap();
        assert_eq!(fast.try_recv().unwrap().as_deref(), Some(&2));
        channel.publish(3).unwrap();
        assert_eq!(fast.try_recv().unwrap().as_deref(), Some(&3));

        // `slow` never read; the oldest record fell out of its window.
        assert_eq!(slow.try_recv().unwrap().as_deref(), Some(&2));
        assert_eq!(slow.lagged(), 1);
        assert_eq!(fast.lagged(), 0);
    }

    #[test]
    fn unsubscribe_releases_the_slot() {
        let channel: Channel<u8> = Channel::new("test", 4);
        let sub = channel.subscribe().unwrap();
        assert_eq!(channel.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn into_stream_ends_when_channel_closes() {
        let channel = Channel::new("test", 16);
        let stream = channel.subscribe().unwrap().into_stream();

        channel.publish(1_u32).unwrap();
        channel.publish(2).unwrap();
        channel.close();

        let collected: Vec<u32> = stream.map(|record| *record).collect().await;
        assert_eq!(collected, vec![1, 2]);
    }
}
