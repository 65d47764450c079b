// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::expression::ExpressionError;
use crate::messaging::MessagingError;
use crate::transform::TransformError;

/// Errors raised while building or running components.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The component configuration is malformed (fails startup)
    #[error("Component configuration error: {0}")]
    Config(String),

    /// No constructor is registered under the requested module name
    #[error("Unknown component module: {0}")]
    UnknownModule(String),

    /// The component could not be constructed or started
    #[error("Component initialization failed: {0}")]
    Initialization(String),

    /// Per-message failure raised by a component's invoke
    #[error("{0}")]
    Runtime(String),

    /// Expression evaluation failed during selection or configuration
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// A transform failed while preparing the message
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A broker operation failed
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl ComponentError {
    /// Short classification embedded in error payloads under
    /// `error.exception`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::UnknownModule(_) => "ConfigError",
            Self::Initialization(_) => "InitializationError",
            Self::Runtime(_) => "RuntimeError",
            Self::Expression(_) => "ExpressionError",
            Self::Transform(_) => "TransformError",
            Self::Messaging(_) => "MessagingError",
        }
    }
}
