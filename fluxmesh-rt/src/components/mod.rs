//! Built-in components.
//!
//! General-purpose stages (`pass_through`, `iterate`, `message_filter`,
//! `user_processor`), the broker edge components (`broker_input`,
//! `broker_output`), the `timer_input` source, the `error_input` head of
//! error flows, and two small test-support components (`fail`,
//! `give_ack_output`).

pub mod broker_input;
pub mod broker_output;
pub mod error_input;
pub mod fail;
pub mod general;
pub mod timer_input;

pub use broker_input::BrokerInput;
pub use broker_output::BrokerOutput;
pub use error_input::ErrorInput;
pub use fail::Fail;
pub use general::{GiveAckOutput, Iterate, MessageFilter, PassThrough, UserProcessor};
pub use timer_input::TimerInput;

use crate::component::ComponentRegistry;

/// Install every built-in component into `registry`.
pub fn register_builtins(registry: &ComponentRegistry) {
    general::register(registry);
    broker_input::register(registry);
    broker_output::register(registry);
    timer_input::register(registry);
    error_input::register(registry);
    fail::register(registry);
}
