//! Filter transform: keep only the elements of a source list whose
//! predicate evaluates truthy.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::TransformError;
use super::traits::{parse_dest, TransformStep};
use crate::expression::{Evaluator, Expression, SourceExpression};
use crate::message::{IterationFrame, Message};
use crate::util::ComponentIdentity;

/// Evaluate `filter_function` for each `(index, item)` of
/// `source_list_expression` and write the kept elements at
/// `dest_list_expression`.
pub struct FilterTransform {
    index: usize,
    source_list: Expression,
    predicate: SourceExpression,
    dest_list: Expression,
}

impl FilterTransform {
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

        let predicate_raw = config
            .get("filter_function")
            .ok_or(TransformError::MissingField {
                index,
                field: "filter function",
            })?;
        let predicate =
            SourceExpression::parse(predicate_raw).map_err(|e| TransformError::Invalid {
                index,
                reason: e.to_string(),
            })?;

        let dest_list = parse_dest(config, index, "dest list expression", "dest_list_expression")?;

        Ok(Self {
            index,
            source_list,
            predicate,
            dest_list,
        })
    }
}

impl TransformStep for FilterTransform {
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

        let mut kept = Vec::new();
        for (position, item) in items.into_iter().enumerate() {
            message.set_iteration(Some(IterationFrame {
                item: item.clone(),
                index: position,
            }));
            if evaluator
                .evaluate_truthy(&self.predicate, message, identity)
                .map_err(wrap)?
            {
                kept.push(item);
            }
        }
        message.set_iteration(None);

        evaluator
            .set(&self.dest_list, message, Value::Array(kept))
            .map_err(wrap)
    }
}
