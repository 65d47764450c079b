//! The component execution runtime.
//!
//! A configured component expands into `num_instances` worker instances
//! sharing one bounded input queue. Each worker dequeues events and runs
//! the per-message sequence: input transforms, input selection, `invoke`,
//! post-invoke routing. Components are resolved by name through the
//! [`ComponentRegistry`]; user components register their own constructors.

pub mod config;
pub mod context;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod traits;

pub use config::ComponentConfig;
pub use context::{ComponentContext, ErrorReporter, OutputTarget};
pub use error::ComponentError;
pub use registry::ComponentRegistry;
pub use runtime::ComponentGroup;
pub use traits::{Component, ComponentBuildContext, ComponentFactory, InvokeResult};
