// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::flow::FlowError;

/// Errors raised while building an app.
#[derive(Debug, Error)]
pub enum AppError {
    /// The app definition is malformed or fails schema validation
    #[error("App configuration error: {0}")]
    Config(String),

    /// One of the app's flows failed to build
    #[error(transparent)]
    Flow(#[from] FlowError),
}
