//! Apps: named bundles of flows with shared configuration.

#[allow(clippy::module_inception)]
pub mod app;
pub mod error;
pub mod schema;

pub use app::{App, AppBuildParams};
pub use error::AppError;
pub use schema::ConfigSchema;
