//! Top-level lifecycle: configuration parsing, app construction, error
//! routing, and shutdown.

#[allow(clippy::module_inception)]
pub mod connector;
pub mod error;

pub use connector::{Connector, ConnectorBuilder};
pub use error::ConnectorError;
