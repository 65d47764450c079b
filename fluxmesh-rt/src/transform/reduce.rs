//! Reduce transform: fold a source list into a single value.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::TransformError;
use super::traits::{parse_dest, parse_source, TransformStep};
use crate::expression::{Evaluator, Expression, SourceExpression};
use crate::message::{IterationFrame, Message};
use crate::util::ComponentIdentity;

/// Fold `source_list_expression` into one value.
///
/// For each element, `source_expression` (default: the element itself)
/// produces the current value, then `accumulator_function` is evaluated
/// with `accumulated_value` and `current_value` bound; the final
/// accumulator is written at `dest_expression`.
pub struct ReduceTransform {
    index: usize,
    source_list: Expression,
    source: SourceExpression,
    initial_value: Value,
    accumulator: SourceExpression,
    dest: Expression,
}

impl ReduceTransform {
    pub fn from_config(config: &Value, index: usize) -> Result<Self, TransformError> {
        let source_list_raw = config
            .get("source_list_expression")
            .and_then(Value::as_str)
            .ok_or(TransformError::MissingField {
                index,
                field: "source list expression",
            })?;
        let source_list =
            Expression::parse(source_list_raw).map_err(|e| TransformError::Invalid {
                index,
                reason: e.to_string(),
            })?;

        let source = match config.get("source_expression") {
            Some(_) => parse_source(config, index, "source expression", "source_expression", None)?,
            None => SourceExpression::Expression(Expression::Item(Vec::new())),
        };

        let accumulator_raw = config
            .get("accumulator_function")
            .ok_or(TransformError::MissingField {
                index,
                field: "accumulator function",
            })?;
        let accumulator =
            SourceExpression::parse(accumulator_raw).map_err(|e| TransformError::Invalid {
                index,
                reason: e.to_string(),
            })?;

        let initial_value = config.get("initial_value").cloned().unwrap_or(Value::Null);
        let dest = parse_dest(config, index, "dest expression", "dest_expression")?;

        Ok(Self {
            index,
            source_list,
            source,
            initial_value,
            accumulator,
            dest,
        })
    }
}

impl TransformStep for ReduceTransform {
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

        let items = match evaluator
            .evaluate(&self.source_list, message, identity)
            .map_err(wrap)?
        {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(TransformError::Invalid {
                    index: self.index,
                    reason: format!("source list expression did not produce a list: {other}"),
                })
            }
        };

        let mut accumulated = self.initial_value.clone();
        for (position, item) in items.into_iter().enumerate() {
            message.set_iteration(Some(IterationFrame {
                item,
                index: position,
            }));
            let current = evaluator
                .evaluate_source(&self.source, message, identity)
                .map_err(wrap)?;
            message.set_reduce_frame(Some((accumulated, current)));
            accumulated = evaluator
                .evaluate_source(&self.accumulator, message, identity)
                .map_err(wrap)?;
        }
        message.set_iteration(None);
        message.set_reduce_frame(None);

        evaluator.set(&self.dest, message, accumulated).map_err(wrap)
    }
}
