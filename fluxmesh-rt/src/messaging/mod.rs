//! Broker abstraction and the in-process development broker.
//!
//! The runtime talks to messaging services only through the
//! [`BrokerService`] capability trait. Production drivers are external
//! adapters registered with the [`MessagingServiceBuilder`] by type name;
//! the bundled [`DevBroker`] implements the full interface in process and
//! backs development, tests, and `dev_mode` deployments.

pub mod builder;
pub mod dev_broker;
pub mod error;
pub mod traits;
pub mod types;

pub use builder::{BrokerFactory, MessagingServiceBuilder, SharedBrokerStore};
pub use dev_broker::DevBroker;
pub use error::MessagingError;
pub use traits::BrokerService;
pub use types::{
    subscription_to_regex, BrokerConfig, BrokerMessage, ConnectionStatus, ReconnectionCallback,
    SendContext,
};
