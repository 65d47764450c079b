//! # fluxmesh-rt - Configuration-Driven Event-Processing Runtime
//!
//! Connects to a message broker, routes incoming messages through
//! user-defined pipelines of processing stages, and publishes results
//! back to the broker. Operators describe **apps** (groupings of
//! pipelines) and **flows** (ordered pipelines of **components**) in
//! declarative configuration; at runtime the engine materializes them
//! into concurrent worker groups that exchange messages over bounded
//! queues.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fluxmesh_rt::connector::Connector;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = json!({
//!         "apps": [{
//!             "name": "echo",
//!             "broker": {
//!                 "broker_type": "dev_broker",
//!                 "queue_name": "echo-queue",
//!                 "input_enabled": true,
//!                 "output_enabled": true,
//!                 "payload_format": "json",
//!             },
//!             "components": [{
//!                 "component_name": "echo",
//!                 "component_module": "pass_through",
//!                 "subscriptions": [{"topic": "demo/>"}],
//!             }],
//!         }]
//!     });
//!
//!     let connector = Connector::new(&config).await?;
//!     connector.run();
//!     connector.wait_for_flows().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! ## Core Runtime
//! - [`message`] - Message, Event envelope, ack/nack callbacks
//! - [`component`] - Component trait, worker groups, registry
//! - [`flow`] - Flow assembly and the subscription router
//! - [`app`] / [`connector`] - App synthesis and top-level lifecycle
//!
//! ## Data Plumbing
//! - [`expression`] - `source:path` evaluator, templates, invoke calls
//! - [`transform`] - copy/append/map/reduce/filter pre-invoke operators
//!
//! ## Messaging
//! - [`messaging`] - Broker capability trait, dev broker, builder
//! - [`rrc`] - Request/response correlation and sessions
//! - [`components`] - Built-in components (broker edges included)
//!
//! ## Services
//! - [`timer`] / [`cache`] / [`storage`] / [`logging`] - Ancillary
//!   connector services
//! - [`testkit`] - Flow instrumentation for tests
//! - [`util`] - Identifiers, deep merge, payload codec

pub mod app;
pub mod cache;
pub mod component;
pub mod components;
pub mod connector;
pub mod expression;
pub mod flow;
pub mod logging;
pub mod message;
pub mod messaging;
pub mod rrc;
pub mod storage;
pub mod testkit;
pub mod timer;
pub mod transform;
pub mod util;

// Re-export commonly used types
pub use app::{App, AppError};
pub use component::{
    Component, ComponentConfig, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
pub use connector::{Connector, ConnectorError};
pub use expression::{Evaluator, Expression, ExpressionError, InvokeRegistry, SourceExpression};
pub use flow::{Flow, FlowError, SubscriptionRouter};
pub use message::{Event, Message, NackOutcome};
pub use messaging::{
    BrokerService, ConnectionStatus, DevBroker, MessagingError, MessagingServiceBuilder,
    SharedBrokerStore,
};
pub use rrc::{RequestOptions, RequestOutcome, RequestResponseController, RrcError, SessionManager};
pub use transform::{TransformError, TransformPipeline};
pub use util::{ComponentIdentity, RequestId, SessionId};
