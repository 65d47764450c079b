//! Per-component configuration records.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::{json, Value};

// Layer 3: Internal module imports
use super::error::ComponentError;
use crate::expression::SourceExpression;
use crate::messaging::types::Subscription;

/// Default depth of a component group's input queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 100;

/// One entry of a flow's `components` list, validated at startup.
#[derive(Clone)]
pub struct ComponentConfig {
    /// Configured instance name
    pub component_name: String,
    /// Registry key of the component constructor
    pub component_module: String,
    /// Component-local configuration mapping
    pub component_config: Value,
    /// Raw `input_transforms` list (compiled by the runtime)
    pub input_transforms: Vec<Value>,
    /// Parsed `input_selection`; `previous` when absent
    pub input_selection: Option<SourceExpression>,
    /// Parallel worker instances sharing one input queue
    pub num_instances: usize,
    /// Input queue depth
    pub queue_depth: usize,
    /// Topic subscriptions consumed by the subscription router
    pub subscriptions: Vec<Subscription>,
    /// Component-level request/response configuration
    pub broker_request_response: Option<Value>,
    /// Session-scoped request/response configuration
    pub multi_session_request_response: Option<Value>,
}

impl ComponentConfig {
    /// Parse one `components` list entry.
    ///
    /// `component_module` names the constructor in the component registry;
    /// `component_class` is accepted as an alias and wins when both are
    /// present.
    pub fn from_value(value: &Value) -> Result<Self, ComponentError> {
        let mapping = value
            .as_object()
            .ok_or_else(|| ComponentError::Config("component entry must be a mapping".to_string()))?;

        let component_name = mapping
            .get("component_name")
            .or_else(|| mapping.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Config("component entry is missing component_name".to_string())
            })?
            .to_string();

        let component_module = mapping
            .get("component_class")
            .or_else(|| mapping.get("component_module"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Config(format!(
                    "component {component_name} needs component_module or component_class"
                ))
            })?
            .to_string();

        let input_transforms = match mapping.get("input_transforms") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(transforms)) => transforms.clone(),
            Some(other) => {
                return Err(ComponentError::Config(format!(
                    "input_transforms of {component_name} must be a sequence, got {other}"
                )))
            }
        };

        // input_selection must be a mapping with source_expression or
        // source_value; a bare string or list is a configuration error
        let input_selection = match mapping
            .get("input_selection")
            .or_else(|| mapping.get("component_input"))
        {
            None | Some(Value::Null) => None,
            Some(Value::Object(selection)) => {
                if let Some(expression) = selection.get("source_expression") {
                    Some(
                        SourceExpression::parse(expression)
                            .map_err(|e| ComponentError::Config(e.to_string()))?,
                    )
                } else if let Some(literal) = selection.get("source_value") {
                    Some(SourceExpression::literal(literal.clone()))
                } else {
                    return Err(ComponentError::Config(format!(
                        "input_selection of {component_name} needs source_expression or source_value"
                    )));
                }
            }
            Some(other) => {
                return Err(ComponentError::Config(format!(
                    "input_selection of {component_name} must be a mapping, got {other}"
                )))
            }
        };

        let num_instances = mapping
            .get("num_instances")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1) as usize;
        let queue_depth = mapping
            .get("queue_depth")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_QUEUE_DEPTH as u64)
            .max(1) as usize;

        let subscriptions = match mapping.get("subscriptions") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ComponentError::Config(format!("bad subscriptions: {e}")))?,
        };

        Ok(Self {
            component_name,
            component_module,
            component_config: mapping
                .get("component_config")
                .cloned()
                .unwrap_or_else(|| json!({})),
            input_transforms,
            input_selection,
            num_instances,
            queue_depth,
            subscriptions,
            broker_request_response: mapping.get("broker_request_response").cloned(),
            multi_session_request_response: mapping
                .get("multi_session_request_response")
                .cloned(),
        })
    }
}
