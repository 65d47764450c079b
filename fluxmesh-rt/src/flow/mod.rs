//! Flow assembly: ordered component groups wired over bounded queues.

pub mod error;
#[allow(clippy::module_inception)]
pub mod flow;
pub mod router;

pub use error::FlowError;
pub use flow::{Flow, FlowBuildParams};
pub use router::{RouteEntry, RouterRoutes, SubscriptionRouter, ROUTER_MODULE};
