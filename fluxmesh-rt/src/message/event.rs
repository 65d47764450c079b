// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::message::Message;

/// Tagged envelope carried by every component queue.
///
/// Component queues never carry bare [`Message`]s; timers and cache
/// expirations share the same delivery path so a component instance sees
/// all of its work in one ordered stream.
#[derive(Debug)]
pub enum Event {
    /// A message traversing the flow
    Message(Message),
    /// A timer managed by the timer manager has fired
    Timer {
        /// Identifier the timer was scheduled under
        id: String,
        /// Payload supplied when the timer was scheduled
        payload: Value,
    },
    /// A cache entry has expired
    CacheExpiry {
        /// Key of the expired entry
        key: String,
        /// Value the entry held at expiry
        value: Value,
    },
}

impl Event {
    /// Consume the event, returning the message if this is a message event.
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Timer { .. } => "timer",
            Self::CacheExpiry { .. } => "cache_expiry",
        }
    }
}
