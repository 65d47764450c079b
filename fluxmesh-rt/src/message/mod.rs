//! Message and event types carried through flows.
//!
//! - [`Message`] - the traversal unit: payload, topic, user properties,
//!   `previous` slot, user data, and deferred ack/nack callbacks
//! - [`Event`] - tagged envelope placed on component queues
//! - [`NackOutcome`] - negative acknowledgement outcomes

pub mod ack;
pub mod event;
#[allow(clippy::module_inception)]
pub mod message;

pub use ack::{AckCallback, NackCallback, NackOutcome};
pub use event::Event;
pub use message::{IterationFrame, Message};
