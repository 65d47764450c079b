// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::messaging::MessagingError;

/// Request/response correlation errors.
#[derive(Debug, Error)]
pub enum RrcError {
    /// The wait exceeded the per-request deadline
    #[error("Request timed out waiting for a response")]
    Timeout,

    /// The referenced session id is unknown or already destroyed
    #[error("Request/response session not found: {0}")]
    SessionNotFound(String),

    /// Creating another session would exceed the configured limit
    #[error("Session limit exceeded (max_sessions: {max})")]
    SessionLimitExceeded { max: usize },

    /// The controller was stopped while a caller was waiting
    #[error("Request/response controller is shut down")]
    Closed,

    /// The request could not be published or the reply queue bound
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    /// The request/response configuration is malformed
    #[error("Invalid request/response configuration: {0}")]
    InvalidConfig(String),
}
