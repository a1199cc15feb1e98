//! Channel error types.

/// Errors raised by [`Channel`](crate::Channel) and
/// [`Subscription`](crate::Subscription) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel has been closed; it accepts no more publishes or
    /// subscriptions and delivers nothing further.
    #[error("channel '{channel}' is closed")]
    Closed {
        /// Label of the closed channel.
        channel: &'static str,
    },
}

impl ChannelError {
    /// Label of the channel that produced this error.
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Closed { channel } => channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_error_names_the_channel() {
        let err = ChannelError::Closed { channel: "paint" };
        assert_eq!(err.to_string(), "channel 'paint' is closed");
        assert_eq!(err.channel(), "paint");
    }
}
