//! Map transform: evaluate an expression for each element of a source
//! list and write the results element-by-element under a destination list.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::TransformError;
use super::traits::{extend_expression, parse_dest, parse_source, relative_path, TransformStep};
use crate::expression::{Evaluator, Expression, SourceExpression};
use crate::message::{IterationFrame, Message};
use crate::util::ComponentIdentity;

/// For each `(index, item)` of `source_list_expression`, evaluate
/// `source_expression` with `item`/`index` bindings and write the result at
/// `dest_list_expression[index].dest_expression`.
pub struct MapTransform {
    index: usize,
    source_list: Expression,
    source: SourceExpression,
    dest_list: Expression,
    dest: Vec<String>,
}

impl MapTransform {
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
        let source = parse_source(
            config,
            index,
            "source expression",
            "source_expression",
            Some("source_value"),
        )?;
        let dest_list = parse_dest(config, index, "dest list expression", "dest_list_expression")?;
        let dest = config
            .get("dest_expression")
            .and_then(Value::as_str)
            .map(relative_path)
            .unwrap_or_default();

        Ok(Self {
            index,
            source_list,
            source,
            dest_list,
            dest,
        })
    }
}

impl TransformStep for MapTransform {
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

        for (position, item) in items.into_iter().enumerate() {
            message.set_iteration(Some(IterationFrame {
                item,
                index: position,
            }));
            let value = evaluator
                .evaluate_source(&self.source, message, identity)
                .map_err(wrap)?;

            let mut segments = vec![position.to_string()];
            segments.extend(self.dest.iter().cloned());
            let target = extend_expression(&self.dest_list, segments, self.index)?;
            evaluator.set(&target, message, value).map_err(wrap)?;
        }
        message.set_iteration(None);
        Ok(())
    }
}
