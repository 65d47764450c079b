//! Expression evaluation error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors raised while parsing or evaluating expressions.
///
/// Parse-time variants (`UnknownSource`, `NotAddressable`,
/// `InvalidInvoke`) surface as configuration errors at startup; the rest
/// occur per message and are routed to the error flow.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// The `<source>` tag of an expression is not recognized
    #[error("Unknown expression source: {0}")]
    UnknownSource(String),

    /// A sequence was indexed past its end
    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The expression cannot be written through (e.g. `static:`)
    #[error("Expression source is not addressable: {0}")]
    NotAddressable(String),

    /// A value had the wrong shape for the requested operation
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// `self:<attr>` referenced an attribute the component does not expose
    #[error("Unknown component attribute: {0}")]
    UnknownSelfAttribute(String),

    /// An invoke descriptor referenced an unregistered module
    #[error("Unknown invoke module: {0}")]
    UnknownModule(String),

    /// An invoke descriptor referenced a function its module does not have
    #[error("Unknown invoke function: {module}.{function}")]
    UnknownFunction { module: String, function: String },

    /// An invoke descriptor was malformed
    #[error("Invalid invoke descriptor: {0}")]
    InvalidInvoke(String),

    /// An invoke function rejected its arguments
    #[error("Invoke function {module}.{function} failed: {reason}")]
    Function {
        module: String,
        function: String,
        reason: String,
    },

    /// A template placeholder could not be rendered
    #[error("Template error: {0}")]
    Template(String),
}
