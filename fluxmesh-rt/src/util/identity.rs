// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
// (none)

/// Where a component instance lives inside the runtime.
///
/// Read by `self:<attr>` expressions and embedded in error payloads under
/// the `location` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentity {
    /// Connector instance name
    pub instance: String,
    /// Flow the component belongs to
    pub flow: String,
    /// Configured component name
    pub component: String,
    /// Zero-based index among the component's parallel instances
    pub component_index: usize,
}

impl ComponentIdentity {
    /// Attribute lookup used by `self:<attr>` expressions.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.component.clone())),
            "component_index" | "index" => Some(Value::from(self.component_index)),
            "flow" | "flow_name" => Some(Value::String(self.flow.clone())),
            "instance" | "instance_name" => Some(Value::String(self.instance.clone())),
            _ => None,
        }
    }

    /// The `location` mapping embedded in error payloads.
    pub fn location(&self) -> Value {
        let mut map = Map::new();
        map.insert("instance".to_string(), Value::String(self.instance.clone()));
        map.insert("flow".to_string(), Value::String(self.flow.clone()));
        map.insert(
            "component".to_string(),
            Value::String(self.component.clone()),
        );
        map.insert(
            "component_index".to_string(),
            Value::from(self.component_index),
        );
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ComponentIdentity {
        ComponentIdentity {
            instance: "test_instance".to_string(),
            flow: "test_flow".to_string(),
            component: "pass_through".to_string(),
            component_index: 2,
        }
    }

    #[test]
    fn test_attribute_lookup() {
        let id = identity();
        assert_eq!(id.attribute("name"), Some(json!("pass_through")));
        assert_eq!(id.attribute("component_index"), Some(json!(2)));
        assert_eq!(id.attribute("flow"), Some(json!("test_flow")));
        assert_eq!(id.attribute("nonsense"), None);
    }

    #[test]
    fn test_location_shape() {
        assert_eq!(
            identity().location(),
            json!({
                "instance": "test_instance",
                "flow": "test_flow",
                "component": "pass_through",
                "component_index": 2,
            })
        );
    }
}
