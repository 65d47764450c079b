//! Schema validation for app-scoped configuration.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::AppError;

/// Declares the parameters an app accepts in its `app_config` block.
///
/// Required parameters must be present; optional ones receive their
/// declared default.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::app::ConfigSchema;
/// use serde_json::json;
///
/// let schema = ConfigSchema::from_value(&json!({
///     "config_parameters": [
///         {"name": "endpoint", "required": true},
///         {"name": "retries", "default": 3},
///     ]
/// })).unwrap();
///
/// let mut config = json!({"endpoint": "demo"});
/// schema.apply(&mut config).unwrap();
/// assert_eq!(config["retries"], json!(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    parameters: Vec<SchemaParameter>,
}

#[derive(Debug, Clone)]
struct SchemaParameter {
    name: String,
    required: bool,
    default: Option<Value>,
}

impl ConfigSchema {
    /// Parse a schema block (`{"config_parameters": [...]}`).
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let entries = value
            .get("config_parameters")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::Config("app schema needs a config_parameters list".to_string())
            })?;

        let mut parameters = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AppError::Config("schema parameter needs a name".to_string())
                })?
                .to_string();
            parameters.push(SchemaParameter {
                name,
                required: entry
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                default: entry.get("default").cloned(),
            });
        }
        Ok(Self { parameters })
    }

    /// Validate `app_config` in place: enforce required parameters and
    /// fill in defaults.
    pub fn apply(&self, app_config: &mut Value) -> Result<(), AppError> {
        let mapping = app_config
            .as_object_mut()
            .ok_or_else(|| AppError::Config("app_config must be a mapping".to_string()))?;

        for parameter in &self.parameters {
            if mapping.contains_key(&parameter.name) {
                continue;
            }
            match (&parameter.default, parameter.required) {
                (Some(default), _) => {
                    mapping.insert(parameter.name.clone(), default.clone());
                }
                (None, true) => {
                    return Err(AppError::Config(format!(
                        "app_config is missing required parameter: {}",
                        parameter.name
                    )))
                }
                (None, false) => {}
            }
        }
        Ok(())
    }
}
