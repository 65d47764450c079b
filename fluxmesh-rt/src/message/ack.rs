// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Positive acknowledgement callback, fired once when a message has been
/// durably handled.
pub type AckCallback = Box<dyn FnOnce() + Send>;

/// Negative acknowledgement callback, fired once with the settlement
/// outcome.
pub type NackCallback = Box<dyn FnOnce(NackOutcome) + Send>;

/// Settlement outcome carried by a negative acknowledgement.
///
/// Mirrors the broker-side settlement outcomes: `Failed` asks the broker to
/// redeliver, `Rejected` routes the message to a dead-letter destination
/// where one is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NackOutcome {
    /// Message was handled after all
    Accepted,
    /// Processing failed; the broker may redeliver
    Failed,
    /// Message is undeliverable; dead-letter if configured
    Rejected,
}

impl fmt::Display for NackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "ACCEPTED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{name}")
    }
}
