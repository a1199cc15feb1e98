//! Error types for the telemetry bus.

use beacon_eventbus::ChannelError;

use crate::record::MetricKind;

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to producers and subscribers.
///
/// All errors are local to the offending call. Nothing here is transient,
/// so nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel for `kind` was closed by [`TelemetryBus::dispose`].
    ///
    /// [`TelemetryBus::dispose`]: crate::TelemetryBus::dispose
    #[error("{kind} channel is closed")]
    ClosedChannel {
        /// Kind whose channel is closed.
        kind: MetricKind,
    },

    /// A record built from untyped input lacks a required field or has an
    /// ill-typed one.
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord {
        /// Kind that was being built.
        kind: MetricKind,
        /// What was wrong with the input.
        reason: String,
    },

    /// The process-wide bus already exists and cannot be reconfigured.
    #[error("telemetry bus is already initialized")]
    AlreadyInitialized,

    /// Configuration is invalid.
    #[error("Configuration error: {message}")]
    InvalidConfig {
        /// The error message.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Map a channel error onto the kind that owns the channel.
    pub(crate) fn from_channel(kind: MetricKind, err: ChannelError) -> Self {
        match err {
            ChannelError::Closed { .. } => Self::ClosedChannel { kind },
        }
    }

    /// Whether this error means the bus has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedChannel { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_channel_message_names_kind() {
        let err = Error::from_channel(
            MetricKind::PageLoad,
            ChannelError::Closed {
                channel: "page_load",
            },
        );
        assert_eq!(err.to_string(), "page_load channel is closed");
        assert!(err.is_closed());
    }

    #[test]
    fn malformed_record_message() {
        let err = Error::MalformedRecord {
            kind: MetricKind::Error,
            reason: "missing field `error`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed error record: missing field `error`"
        );
        assert!(!err.is_closed());
    }
}
