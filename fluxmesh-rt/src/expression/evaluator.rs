//! Expression evaluation and write-back against a message.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::error::ExpressionError;
use super::functions::{coerce_value, is_truthy};
use super::invoke::{parse_evaluate_expression, InvokeDescriptor, InvokeRegistry};
use super::parser::{Expression, SourceExpression};
use super::template;
use crate::message::Message;
use crate::util::ComponentIdentity;

/// Resolves expressions against a message and writes values back through
/// the same addressing.
///
/// Cheap to clone; clones share the invoke registry.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::expression::{Evaluator, Expression};
/// use fluxmesh_rt::message::Message;
/// use serde_json::json;
///
/// let evaluator = Evaluator::new();
/// let message = Message::new(json!({"key3": [1, 2, 3]}));
///
/// let expr = Expression::parse("input.payload:key3.1").unwrap();
/// let value = evaluator.evaluate(&expr, &message, None).unwrap();
/// assert_eq!(value, json!(2));
/// ```
#[derive(Clone)]
pub struct Evaluator {
    registry: InvokeRegistry,
}

impl Evaluator {
    /// Create an evaluator with the built-in invoke modules.
    pub fn new() -> Self {
        Self {
            registry: InvokeRegistry::with_builtins(),
        }
    }

    /// Create an evaluator sharing an existing invoke registry.
    pub fn with_registry(registry: InvokeRegistry) -> Self {
        Self { registry }
    }

    /// The shared invoke registry.
    pub fn registry(&self) -> &InvokeRegistry {
        &self.registry
    }

    /// Evaluate a parsed expression against `message`.
    pub fn evaluate(
        &self,
        expression: &Expression,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        match expression {
            Expression::Payload(path) => get_path(message.payload(), path),
            Expression::Topic => Ok(message
                .topic()
                .map(|t| Value::String(t.to_string()))
                .unwrap_or(Value::Null)),
            Expression::TopicLevels(path) => {
                let levels = Value::Array(
                    message
                        .topic_levels()
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                );
                get_path(&levels, path)
            }
            Expression::UserProperties(path) => {
                let properties = Value::Object(message.user_properties().clone());
                get_path(&properties, path)
            }
            Expression::Static(literal) => Ok(Value::String(literal.clone())),
            Expression::Template(text) => self
                .render_template(text, message, identity)
                .map(Value::String),
            Expression::Previous(path) => match message.previous() {
                Some(previous) => get_path(previous, path),
                None => Ok(Value::Null),
            },
            Expression::UserData { namespace, path } => {
                match message.user_data().get(namespace) {
                    Some(data) => get_path(data, path),
                    None => Ok(Value::Null),
                }
            }
            Expression::SelfAttr(attr) => match identity {
                Some(identity) => identity
                    .attribute(attr)
                    .ok_or_else(|| ExpressionError::UnknownSelfAttribute(attr.clone())),
                None => Ok(Value::Null),
            },
            Expression::Item(path) => match message.iteration() {
                Some(frame) => get_path(&frame.item, path),
                None => Ok(Value::Null),
            },
            Expression::Index => Ok(message
                .iteration()
                .map(|frame| Value::from(frame.index))
                .unwrap_or(Value::Null)),
            Expression::AccumulatedValue => Ok(message
                .reduce_frame()
                .map(|(accumulated, _)| accumulated.clone())
                .unwrap_or(Value::Null)),
            Expression::CurrentValue => Ok(message
                .reduce_frame()
                .map(|(_, current)| current.clone())
                .unwrap_or(Value::Null)),
        }
    }

    /// Evaluate a configured source: expression, invoke descriptor, or
    /// literal.
    pub fn evaluate_source(
        &self,
        source: &SourceExpression,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        match source {
            SourceExpression::Expression(expression) => {
                self.evaluate(expression, message, identity)
            }
            SourceExpression::Invoke(descriptor) => {
                self.resolve_invoke(descriptor, message, identity)
            }
            SourceExpression::Literal(value) => Ok(value.clone()),
        }
    }

    /// Parse and evaluate an expression string in one step.
    pub fn evaluate_str(
        &self,
        text: &str,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        let expression = Expression::parse(text)?;
        self.evaluate(&expression, message, identity)
    }

    /// Write `value` back through an addressable expression.
    ///
    /// Intermediate mappings are created as needed; sequences written past
    /// their end are padded with nulls. Writing through a non-container
    /// intermediate leaves the data unchanged.
    pub fn set(
        &self,
        expression: &Expression,
        message: &mut Message,
        value: Value,
    ) -> Result<(), ExpressionError> {
        match expression {
            Expression::Payload(path) => {
                set_path(message.payload_mut(), path, value);
                Ok(())
            }
            Expression::Topic => match value {
                Value::String(topic) => {
                    message.set_topic(topic);
                    Ok(())
                }
                other => Err(ExpressionError::TypeMismatch {
                    expected: "string topic",
                    found: other.to_string(),
                }),
            },
            Expression::UserProperties(path) => {
                if path.is_empty() {
                    match value {
                        Value::Object(map) => {
                            message.set_user_properties(map);
                            Ok(())
                        }
                        other => Err(ExpressionError::TypeMismatch {
                            expected: "mapping of user properties",
                            found: other.to_string(),
                        }),
                    }
                } else {
                    let mut properties = Value::Object(message.user_properties().clone());
                    set_path(&mut properties, path, value);
                    if let Value::Object(map) = properties {
                        message.set_user_properties(map);
                    }
                    Ok(())
                }
            }
            Expression::Previous(path) => {
                if path.is_empty() {
                    message.set_previous(value);
                } else {
                    let mut previous = message.previous().cloned().unwrap_or(Value::Null);
                    set_path(&mut previous, path, value);
                    message.set_previous(previous);
                }
                Ok(())
            }
            Expression::UserData { namespace, path } => {
                if path.is_empty() {
                    message.user_data_mut().insert(namespace.clone(), value);
                } else {
                    let mut data = message
                        .user_data()
                        .get(namespace)
                        .cloned()
                        .unwrap_or(Value::Null);
                    set_path(&mut data, path, value);
                    message.user_data_mut().insert(namespace.clone(), data);
                }
                Ok(())
            }
            other => Err(ExpressionError::NotAddressable(format!("{other:?}"))),
        }
    }

    /// Parse and set through an expression string in one step.
    pub fn set_str(
        &self,
        text: &str,
        message: &mut Message,
        value: Value,
    ) -> Result<(), ExpressionError> {
        let expression = Expression::parse(text)?;
        self.set(&expression, message, value)
    }

    /// Render a `template:` body, substituting `{{...}}` placeholders.
    pub fn render_template(
        &self,
        text: &str,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<String, ExpressionError> {
        template::render(self, text, message, identity)
    }

    /// Execute an invoke descriptor, resolving `evaluate_expression(...)`
    /// parameters and nested descriptors inner-first.
    pub fn resolve_invoke(
        &self,
        descriptor: &InvokeDescriptor,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        let positional = descriptor
            .params
            .positional
            .iter()
            .map(|param| self.resolve_param(param, message, identity))
            .collect::<Result<Vec<_>, _>>()?;

        let mut keyword = Map::new();
        for (name, param) in &descriptor.params.keyword {
            keyword.insert(name.clone(), self.resolve_param(param, message, identity)?);
        }

        self.registry
            .call(&descriptor.module, &descriptor.function, &positional, &keyword)
    }

    /// Resolve a configuration value: invoke descriptors and
    /// `evaluate_expression(...)` strings are evaluated against the
    /// message, everything else passes through.
    pub fn resolve_config_value(
        &self,
        value: &Value,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        self.resolve_param(value, message, identity)
    }

    /// Evaluate an expression and report its truthiness.
    pub fn evaluate_truthy(
        &self,
        source: &SourceExpression,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<bool, ExpressionError> {
        Ok(is_truthy(&self.evaluate_source(source, message, identity)?))
    }

    fn resolve_param(
        &self,
        param: &Value,
        message: &Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<Value, ExpressionError> {
        match param {
            Value::String(text) => match parse_evaluate_expression(text) {
                Some((expression, coercion)) => {
                    let value = self.evaluate_str(&expression, message, identity)?;
                    match coercion {
                        Some(target) => coerce_value(value, target),
                        None => Ok(value),
                    }
                }
                None => Ok(param.clone()),
            },
            Value::Object(_) => match InvokeDescriptor::from_value(param)? {
                Some(descriptor) => self.resolve_invoke(&descriptor, message, identity),
                None => Ok(param.clone()),
            },
            other => Ok(other.clone()),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk a dot path. Missing mapping keys yield null; indexing a sequence
/// past its end is an error.
fn get_path(root: &Value, path: &[String]) -> Result<Value, ExpressionError> {
    let mut current = root;
    for segment in path {
        match current {
            Value::Array(items) => {
                let index: usize = match segment.parse() {
                    Ok(index) => index,
                    Err(_) => return Ok(Value::Null),
                };
                match items.get(index) {
                    Some(item) => current = item,
                    None => {
                        return Err(ExpressionError::IndexOutOfRange {
                            index,
                            len: items.len(),
                        })
                    }
                }
            }
            Value::Object(map) => match map.get(segment) {
                Some(value) => current = value,
                None => return Ok(Value::Null),
            },
            _ => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

/// Write through a dot path, creating intermediate containers. The
/// container kind is chosen by the next segment: numeric segments create
/// sequences, everything else mappings. Writing through an existing
/// non-container value is a silent no-op.
fn set_path(root: &mut Value, path: &[String], value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }

    let mut current = root;
    for (position, segment) in path.iter().enumerate() {
        let last = position == path.len() - 1;
        let index: Option<usize> = segment.parse().ok();

        // Materialize the container this segment needs
        match (index, &mut *current) {
            (Some(_), Value::Array(_)) => {}
            (Some(_), Value::Null) => *current = Value::Array(Vec::new()),
            (None, Value::Object(_)) => {}
            (None, Value::Null) => *current = Value::Object(Map::new()),
            _ => return,
        }

        match (index, &mut *current) {
            (Some(index), Value::Array(items)) => {
                while items.len() <= index {
                    items.push(Value::Null);
                }
                if last {
                    items[index] = value;
                    return;
                }
                current = &mut items[index];
            }
            (None, Value::Object(map)) => {
                if last {
                    map.insert(segment.clone(), value);
                    return;
                }
                current = map.entry(segment.clone()).or_insert(Value::Null);
            }
            _ => return,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complex_message() -> Message {
        Message::new(json!({
            "key1": "value1",
            "key2": 2,
            "key3": [1, 2, 3],
            "key4": {"subkey1": "subvalue1", "subkey2": 4},
        }))
    }

    #[test]
    fn test_get_whole_payload() {
        let evaluator = Evaluator::new();
        let message = complex_message();
        assert_eq!(
            evaluator
                .evaluate_str("input.payload", &message, None)
                .unwrap(),
            *message.payload()
        );
        // Dangling colon addresses the whole object too
        assert_eq!(
            evaluator
                .evaluate_str("input.payload:", &message, None)
                .unwrap(),
            *message.payload()
        );
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let evaluator = Evaluator::new();
        let message = complex_message();
        assert_eq!(
            evaluator
                .evaluate_str("input.payload:key4.subkey1", &message, None)
                .unwrap(),
            json!("subvalue1")
        );
        assert_eq!(
            evaluator
                .evaluate_str("input.payload:key3.1", &message, None)
                .unwrap(),
            json!(2)
        );
    }

    #[test]
    fn test_index_out_of_bounds_is_error() {
        let evaluator = Evaluator::new();
        let message = complex_message();
        assert!(matches!(
            evaluator.evaluate_str("input.payload:key3.3", &message, None),
            Err(ExpressionError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_missing_mapping_key_is_null() {
        let evaluator = Evaluator::new();
        let message = complex_message();
        assert_eq!(
            evaluator
                .evaluate_str("input.payload:missing.deeper", &message, None)
                .unwrap(),
            json!(null)
        );
    }

    #[test]
    fn test_topic_and_levels() {
        let evaluator = Evaluator::new();
        let message = Message::new(json!(null)).with_topic("a/valid/topic");
        assert_eq!(
            evaluator.evaluate_str("input.topic", &message, None).unwrap(),
            json!("a/valid/topic")
        );
        assert_eq!(
            evaluator
                .evaluate_str("input.topic_levels", &message, None)
                .unwrap(),
            json!(["a", "valid", "topic"])
        );
        assert_eq!(
            evaluator
                .evaluate_str("input.topic_levels:1", &message, None)
                .unwrap(),
            json!("valid")
        );
    }

    #[test]
    fn test_static_and_previous() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!("p"));
        assert_eq!(
            evaluator
                .evaluate_str("static:static_value", &message, None)
                .unwrap(),
            json!("static_value")
        );
        assert_eq!(
            evaluator.evaluate_str("previous", &message, None).unwrap(),
            json!(null)
        );
        message.set_previous(json!({"a": 1}));
        assert_eq!(
            evaluator.evaluate_str("previous:a", &message, None).unwrap(),
            json!(1)
        );
    }

    #[test]
    fn test_self_attributes() {
        let evaluator = Evaluator::new();
        let message = Message::new(json!(null));
        let identity = ComponentIdentity {
            instance: "i".to_string(),
            flow: "f".to_string(),
            component: "c".to_string(),
            component_index: 1,
        };
        assert_eq!(
            evaluator
                .evaluate_str("self:name", &message, Some(&identity))
                .unwrap(),
            json!("c")
        );
        assert_eq!(
            evaluator
                .evaluate_str("self:component_index", &message, Some(&identity))
                .unwrap(),
            json!(1)
        );
        assert!(evaluator
            .evaluate_str("self:bogus", &message, Some(&identity))
            .is_err());
    }

    #[test]
    fn test_set_user_data_and_add_more() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!("p"));

        evaluator
            .set_str(
                "user_data.data1",
                &mut message,
                json!({"key1": "value1", "key2": "value2"}),
            )
            .unwrap();
        evaluator
            .set_str("user_data.data1:key3", &mut message, json!("value3"))
            .unwrap();

        assert_eq!(
            evaluator
                .evaluate_str("user_data.data1", &message, None)
                .unwrap(),
            json!({"key1": "value1", "key2": "value2", "key3": "value3"})
        );
    }

    #[test]
    fn test_set_overwrites() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!("p"));

        evaluator
            .set_str("user_data.data1", &mut message, json!([1, 2, 3]))
            .unwrap();
        evaluator
            .set_str("user_data.data1", &mut message, json!([4, 5, 6]))
            .unwrap();
        assert_eq!(
            evaluator
                .evaluate_str("user_data.data1", &message, None)
                .unwrap(),
            json!([4, 5, 6])
        );
    }

    #[test]
    fn test_set_list_padding() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!({"key1": "value1", "key2": 2}));

        evaluator
            .set_str("input.payload:key7.1", &mut message, json!(5))
            .unwrap();
        evaluator
            .set_str("input.payload:key7.3.1", &mut message, json!(6))
            .unwrap();

        assert_eq!(
            evaluator
                .evaluate_str("input.payload:key7", &message, None)
                .unwrap(),
            json!([null, 5, null, [null, 6]])
        );
    }

    #[test]
    fn test_set_through_scalar_is_silent_noop() {
        let evaluator = Evaluator::new();
        let mut message = complex_message();

        evaluator
            .set_str("input.payload:key3.1.1", &mut message, json!(5))
            .unwrap();
        assert_eq!(
            evaluator
                .evaluate_str("input.payload:key3", &message, None)
                .unwrap(),
            json!([1, 2, 3])
        );
    }

    #[test]
    fn test_set_whole_payload_topic_properties() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!("old"));

        evaluator
            .set_str("input.payload", &mut message, json!({"new": true}))
            .unwrap();
        assert_eq!(message.payload(), &json!({"new": true}));

        evaluator
            .set_str("input.topic", &mut message, json!("a/b"))
            .unwrap();
        assert_eq!(message.topic(), Some("a/b"));

        evaluator
            .set_str("input.user_properties", &mut message, json!({"k": "v"}))
            .unwrap();
        assert_eq!(
            evaluator
                .evaluate_str("input.user_properties:k", &message, None)
                .unwrap(),
            json!("v")
        );
    }

    #[test]
    fn test_set_not_addressable() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!(null));
        assert!(matches!(
            evaluator.set_str("static:x", &mut message, json!(1)),
            Err(ExpressionError::NotAddressable(_))
        ));
    }

    #[test]
    fn test_get_set_roundtrip() {
        let evaluator = Evaluator::new();
        let mut message = Message::new(json!({}));
        let cases = [
            ("input.payload:a.b.c", json!("deep")),
            ("user_data.ns:list.2", json!(42)),
            ("previous:x", json!({"nested": [1, 2]})),
        ];
        for (path, value) in cases {
            evaluator.set_str(path, &mut message, value.clone()).unwrap();
            assert_eq!(evaluator.evaluate_str(path, &message, None).unwrap(), value);
        }
    }

    #[test]
    fn test_resolve_invoke_with_evaluate_expression() {
        let evaluator = Evaluator::new();
        let message = Message::new(json!({"my_list": [1, 2, 3]}));

        let descriptor = InvokeDescriptor::from_value(&json!({
            "invoke": {
                "module": "invoke_functions",
                "function": "equal",
                "params": {
                    "positional": ["evaluate_expression(input.payload:my_list.1)", 2],
                },
            }
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            evaluator.resolve_invoke(&descriptor, &message, None).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_resolve_nested_invoke_inner_first() {
        let evaluator = Evaluator::new();
        let message = Message::new(json!(null));

        let descriptor = InvokeDescriptor::from_value(&json!({
            "invoke": {
                "module": "invoke_functions",
                "function": "add",
                "params": {
                    "positional": [
                        {"invoke": {
                            "module": "invoke_functions",
                            "function": "multiply",
                            "params": {"positional": [2, 3]},
                        }},
                        4,
                    ],
                },
            }
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            evaluator.resolve_invoke(&descriptor, &message, None).unwrap(),
            json!(10)
        );
    }

    #[test]
    fn test_evaluate_expression_coercion() {
        let evaluator = Evaluator::new();
        let message = Message::new(json!({"n": "7"}));

        let descriptor = InvokeDescriptor::from_value(&json!({
            "invoke": {
                "module": "invoke_functions",
                "function": "add",
                "params": {
                    "positional": ["evaluate_expression(input.payload:n, int)", 1],
                },
            }
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            evaluator.resolve_invoke(&descriptor, &message, None).unwrap(),
            json!(8)
        );
    }
}
