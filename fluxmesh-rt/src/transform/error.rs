// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::expression::ExpressionError;

/// Transform configuration and evaluation errors.
///
/// Configuration variants carry the index of the offending transform in
/// the `input_transforms` list and fail startup; `Expression` occurs per
/// message.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform definition has no `type` field
    #[error("Transform at index {index} does not have a type")]
    MissingType { index: usize },

    /// The transform type is not one of the known operators
    #[error("Transform at index {index} has an unknown type: {type_name}")]
    UnknownType { index: usize, type_name: String },

    /// A required field of the transform definition is missing
    #[error("Transform at index {index} does not have a {field}")]
    MissingField { index: usize, field: &'static str },

    /// The transform definition is otherwise malformed
    #[error("Transform at index {index} is invalid: {reason}")]
    Invalid { index: usize, reason: String },

    /// Expression evaluation failed while applying the transform
    #[error("Transform at index {index} failed: {source}")]
    Expression {
        index: usize,
        #[source]
        source: ExpressionError,
    },
}
