//! Parsing of `<source>:<path>` expression strings.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::ExpressionError;
use super::invoke::InvokeDescriptor;

/// A parsed data-selection expression.
///
/// The `<path>` component is a dot-separated walk: each step is either a
/// mapping key or a sequence index. An empty path (including the dangling
/// colon form `input.payload:`) addresses the whole object of the source.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::expression::Expression;
///
/// let expr = Expression::parse("input.payload:my_array.3.name").unwrap();
/// assert!(matches!(expr, Expression::Payload(_)));
///
/// assert!(Expression::parse("invalid_type:name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// `input.payload[:path]`
    Payload(Vec<String>),
    /// `input.topic`
    Topic,
    /// `input.topic_levels[:path]`
    TopicLevels(Vec<String>),
    /// `input.user_properties[:path]`
    UserProperties(Vec<String>),
    /// `static:<literal>`
    Static(String),
    /// `template:<text>`
    Template(String),
    /// `previous[:path]`
    Previous(Vec<String>),
    /// `user_data.<namespace>[:path]`
    UserData {
        namespace: String,
        path: Vec<String>,
    },
    /// `self:<attr>`
    SelfAttr(String),
    /// `item[:path]` inside a list transform
    Item(Vec<String>),
    /// `index` inside a list transform
    Index,
    /// `accumulated_value` inside a reduce transform
    AccumulatedValue,
    /// `current_value` inside a reduce transform
    CurrentValue,
}

fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').map(str::to_string).collect()
    }
}

impl Expression {
    /// Parse an expression string.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnknownSource`] when the `<source>` tag is
    /// not recognized. This is a configuration error and is surfaced at
    /// startup by the callers that compile expressions.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        // static: and template: consume the remainder verbatim (it may
        // itself contain colons and dots)
        if let Some(literal) = text.strip_prefix("static:") {
            return Ok(Self::Static(literal.to_string()));
        }
        if let Some(template) = text.strip_prefix("template:") {
            return Ok(Self::Template(template.to_string()));
        }
        if let Some(attr) = text.strip_prefix("self:") {
            return Ok(Self::SelfAttr(attr.to_string()));
        }

        let (source, path) = match text.split_once(':') {
            Some((source, path)) => (source, split_path(path)),
            None => (text, Vec::new()),
        };

        match source {
            "input.payload" => Ok(Self::Payload(path)),
            "input.topic" => Ok(Self::Topic),
            "input.topic_levels" => Ok(Self::TopicLevels(path)),
            "input.user_properties" => Ok(Self::UserProperties(path)),
            "previous" => Ok(Self::Previous(path)),
            "item" => Ok(Self::Item(path)),
            "index" => Ok(Self::Index),
            "accumulated_value" => Ok(Self::AccumulatedValue),
            "current_value" => Ok(Self::CurrentValue),
            other => {
                if let Some(namespace) = other.strip_prefix("user_data.") {
                    if !namespace.is_empty() && !namespace.contains('.') {
                        return Ok(Self::UserData {
                            namespace: namespace.to_string(),
                            path,
                        });
                    }
                }
                Err(ExpressionError::UnknownSource(text.to_string()))
            }
        }
    }

    /// Whether a value can be written back through this expression.
    pub fn is_addressable(&self) -> bool {
        matches!(
            self,
            Self::Payload(_)
                | Self::Topic
                | Self::UserProperties(_)
                | Self::Previous(_)
                | Self::UserData { .. }
        )
    }
}

/// A configured data source: an expression string, an `invoke` descriptor,
/// or a literal value (`source_value`).
#[derive(Debug, Clone, PartialEq)]
pub enum SourceExpression {
    /// A parsed `<source>:<path>` expression
    Expression(Expression),
    /// A dynamic `invoke` call
    Invoke(InvokeDescriptor),
    /// A literal value used verbatim
    Literal(Value),
}

impl SourceExpression {
    /// Parse a configuration value into a source expression.
    ///
    /// Strings are parsed as expressions, mappings with an `invoke` key
    /// become descriptors; anything else is rejected.
    pub fn parse(value: &Value) -> Result<Self, ExpressionError> {
        match value {
            Value::String(text) => Expression::parse(text).map(Self::Expression),
            Value::Object(_) => match InvokeDescriptor::from_value(value)? {
                Some(descriptor) => Ok(Self::Invoke(descriptor)),
                None => Err(ExpressionError::InvalidInvoke(
                    "mapping without an invoke key".to_string(),
                )),
            },
            other => Err(ExpressionError::UnknownSource(other.to_string())),
        }
    }

    /// Wrap a literal value.
    pub fn literal(value: Value) -> Self {
        Self::Literal(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload_with_path() {
        let expr = Expression::parse("input.payload:key1.subkey1").unwrap();
        assert_eq!(
            expr,
            Expression::Payload(vec!["key1".to_string(), "subkey1".to_string()])
        );
    }

    #[test]
    fn test_parse_dangling_colon_is_whole_object() {
        assert_eq!(
            Expression::parse("input.payload:").unwrap(),
            Expression::Payload(vec![])
        );
    }

    #[test]
    fn test_parse_bare_sources() {
        assert_eq!(Expression::parse("input.topic").unwrap(), Expression::Topic);
        assert_eq!(
            Expression::parse("input.topic_levels").unwrap(),
            Expression::TopicLevels(vec![])
        );
        assert_eq!(
            Expression::parse("previous").unwrap(),
            Expression::Previous(vec![])
        );
        assert_eq!(Expression::parse("index").unwrap(), Expression::Index);
    }

    #[test]
    fn test_parse_static_keeps_remainder_verbatim() {
        assert_eq!(
            Expression::parse("static:a:b.c").unwrap(),
            Expression::Static("a:b.c".to_string())
        );
    }

    #[test]
    fn test_parse_user_data_namespace() {
        assert_eq!(
            Expression::parse("user_data.temp:payload.greeting").unwrap(),
            Expression::UserData {
                namespace: "temp".to_string(),
                path: vec!["payload".to_string(), "greeting".to_string()],
            }
        );
        assert_eq!(
            Expression::parse("user_data.output").unwrap(),
            Expression::UserData {
                namespace: "output".to_string(),
                path: vec![],
            }
        );
    }

    #[test]
    fn test_parse_self_attribute() {
        assert_eq!(
            Expression::parse("self:component_index").unwrap(),
            Expression::SelfAttr("component_index".to_string())
        );
    }

    #[test]
    fn test_parse_item_subpath() {
        assert_eq!(
            Expression::parse("item:one").unwrap(),
            Expression::Item(vec!["one".to_string()])
        );
    }

    #[test]
    fn test_unknown_source_is_error() {
        assert!(Expression::parse("invalid_expression").is_err());
        assert!(Expression::parse("invalid_type:invalid_name").is_err());
        // Path syntax on the source side is not a valid source tag
        assert!(Expression::parse("input.payload.invalid_name").is_err());
        assert!(Expression::parse("user_data.").is_err());
    }

    #[test]
    fn test_addressability() {
        assert!(Expression::parse("input.payload").unwrap().is_addressable());
        assert!(Expression::parse("user_data.x").unwrap().is_addressable());
        assert!(!Expression::parse("static:x").unwrap().is_addressable());
        assert!(!Expression::parse("template:x").unwrap().is_addressable());
        assert!(!Expression::parse("index").unwrap().is_addressable());
    }

    #[test]
    fn test_source_expression_from_string() {
        let src = SourceExpression::parse(&json!("input.payload:text")).unwrap();
        assert!(matches!(src, SourceExpression::Expression(_)));
    }

    #[test]
    fn test_source_expression_from_invoke_mapping() {
        let src = SourceExpression::parse(&json!({
            "invoke": {
                "module": "invoke_functions",
                "function": "add",
                "params": {"positional": [5, 6]},
            }
        }))
        .unwrap();
        assert!(matches!(src, SourceExpression::Invoke(_)));
    }

    #[test]
    fn test_source_expression_rejects_bare_list() {
        assert!(SourceExpression::parse(&json!([1, 2])).is_err());
    }
}
