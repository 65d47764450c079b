// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::app::AppError;
use crate::component::ComponentError;
use crate::flow::FlowError;
use crate::storage::StorageError;

/// Errors raised while building or driving a connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The top-level configuration is malformed
    #[error("Connector configuration error: {0}")]
    Config(String),

    /// An app failed to build
    #[error(transparent)]
    App(#[from] AppError),

    /// A flow failed to build
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// A component failed to build
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// A storage backend failed to build
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A named flow does not exist
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(ConnectorError::UnknownFlow("f".to_string())
            .to_string()
            .contains("Unknown flow: f"));
    }
}
