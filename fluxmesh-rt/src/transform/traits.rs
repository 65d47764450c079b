//! The transform operator trait and shared definition-parsing helpers.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::TransformError;
use crate::expression::{Evaluator, Expression, SourceExpression};
use crate::message::Message;
use crate::util::ComponentIdentity;

/// One compiled transform operator.
///
/// Operators are compiled from their configuration once at startup and
/// applied per message in declaration order.
pub trait TransformStep: Send + Sync {
    /// Rewrite `message` in place.
    fn apply(
        &self,
        evaluator: &Evaluator,
        message: &mut Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<(), TransformError>;
}

/// Read the configured source: `source_expression` or a literal
/// `source_value` (expression wins when both are present).
pub(crate) fn parse_source(
    config: &Value,
    index: usize,
    field: &'static str,
    key: &str,
    value_key: Option<&str>,
) -> Result<SourceExpression, TransformError> {
    if let Some(raw) = config.get(key) {
        return SourceExpression::parse(raw).map_err(|e| TransformError::Invalid {
            index,
            reason: e.to_string(),
        });
    }
    if let Some(value_key) = value_key {
        if let Some(value) = config.get(value_key) {
            return Ok(SourceExpression::literal(value.clone()));
        }
    }
    Err(TransformError::MissingField { index, field })
}

/// Read a required destination expression; it must be addressable.
pub(crate) fn parse_dest(
    config: &Value,
    index: usize,
    field: &'static str,
    key: &str,
) -> Result<Expression, TransformError> {
    let raw = config
        .get(key)
        .and_then(Value::as_str)
        .ok_or(TransformError::MissingField { index, field })?;
    let expression = Expression::parse(raw).map_err(|e| TransformError::Invalid {
        index,
        reason: e.to_string(),
    })?;
    if !expression.is_addressable() {
        return Err(TransformError::Invalid {
            index,
            reason: format!("{key} is not addressable: {raw}"),
        });
    }
    Ok(expression)
}

/// Extend an addressable expression with additional path segments
/// (used by the list transforms to address individual elements).
pub(crate) fn extend_expression(
    expression: &Expression,
    extra: impl IntoIterator<Item = String>,
    index: usize,
) -> Result<Expression, TransformError> {
    let mut extended = expression.clone();
    let path = match &mut extended {
        Expression::Payload(path)
        | Expression::UserProperties(path)
        | Expression::Previous(path)
        | Expression::UserData { path, .. } => path,
        other => {
            return Err(TransformError::Invalid {
                index,
                reason: format!("cannot address elements under {other:?}"),
            })
        }
    };
    path.extend(extra);
    Ok(extended)
}

/// Split a relative dot path (`my_obj.item`) into segments.
pub(crate) fn relative_path(text: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('.').map(str::to_string).collect()
    }
}
