//! Append transform: append a value to a sequence, initializing or
//! overwriting a non-sequence destination.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::TransformError;
use super::traits::{parse_dest, parse_source, TransformStep};
use crate::expression::{Evaluator, Expression, SourceExpression};
use crate::message::Message;
use crate::util::ComponentIdentity;

/// Evaluate `source_expression` and append the result to the sequence at
/// `dest_expression`.
pub struct AppendTransform {
    index: usize,
    source: SourceExpression,
    dest: Expression,
}

impl AppendTransform {
    pub fn from_config(config: &Value, index: usize) -> Result<Self, TransformError> {
        let source = parse_source(
            config,
            index,
            "source expression",
            "source_expression",
            Some("source_value"),
        )?;
        let dest = parse_dest(config, index, "dest expression", "dest_expression")?;
        Ok(Self {
            index,
            source,
            dest,
        })
    }
}

impl TransformStep for AppendTransform {
    fn apply(
        &self,
        evaluator: &Evaluator,
        message: &mut Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<(), TransformError> {
        let wrap = |source| TransformError::Expression {
            index: self.index,
            source,
        };

        let value = evaluator
            .evaluate_source(&self.source, message, identity)
            .map_err(wrap)?;
        let current = evaluator.evaluate(&self.dest, message, identity).map_err(wrap)?;

        let combined = match current {
            Value::Array(mut items) => {
                items.push(value);
                Value::Array(items)
            }
            // Initialize, or overwrite a non-sequence destination
            _ => Value::Array(vec![value]),
        };
        evaluator.set(&self.dest, message, combined).map_err(wrap)
    }
}
