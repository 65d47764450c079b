// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::encoding::EncodingError;

/// Errors raised by broker services and the messaging builder.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The configured broker type has no registered driver
    #[error("Unsupported broker type: {0}")]
    UnsupportedBrokerType(String),

    /// Connection-level failure
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// An operation required a connection that is not established
    #[error("Broker is not connected")]
    NotConnected,

    /// A send could not be completed
    #[error("Failed to send message to {destination}: {reason}")]
    SendFailed {
        destination: String,
        reason: String,
    },

    /// Payload could not be encoded or decoded
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A reconnection callback failed
    #[error("Reconnection callback failed: {0}")]
    Reconnection(String),

    /// The broker configuration is malformed
    #[error("Invalid broker configuration: {0}")]
    InvalidConfig(String),
}
