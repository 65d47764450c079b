// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::component::ComponentError;

/// Errors raised while assembling or stopping a flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The flow definition is malformed
    #[error("Flow configuration error: {0}")]
    Config(String),

    /// A component of the flow failed to build
    #[error(transparent)]
    Component(#[from] ComponentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = FlowError::Config("flow needs a name".to_string());
        assert!(error.to_string().contains("flow needs a name"));
    }
}
