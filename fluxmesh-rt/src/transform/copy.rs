//! Copy transform: copy a value from one field to another.

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

/// Evaluate `source_expression` (or take the literal `source_value`) and
/// set the result at `dest_expression`.
pub struct CopyTransform {
    index: usize,
    source: SourceExpression,
    dest: Expression,
}

impl CopyTransform {
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

impl TransformStep for CopyTransform {
    fn apply(
        &self,
        evaluator: &Evaluator,
        message: &mut Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<(), TransformError> {
        let value = evaluator
            .evaluate_source(&self.source, message, identity)
            .map_err(|source| TransformError::Expression {
                index: self.index,
                source,
            })?;
        evaluator
            .set(&self.dest, message, value)
            .map_err(|source| TransformError::Expression {
                index: self.index,
                source,
            })
    }
}
