//! Dynamic `invoke` descriptors and the module registry backing them.
//!
//! Configuration files call whitelisted functions through descriptors:
//!
//! ```yaml
//! invoke:
//!   module: invoke_functions
//!   function: equal
//!   params:
//!     positional:
//!       - evaluate_expression(input.payload:my_list.1)
//!       - 2
//! ```
//!
//! Parameter values equal to `evaluate_expression(<expr>[, <type>])` are
//! replaced with the evaluated expression; nested descriptors resolve
//! inner-first. Modules are plain name-to-function tables registered at
//! build time, so the set of callable functions is a fixed whitelist.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::error::ExpressionError;
use super::functions::{builtin_module, CoercionType, MODULE_NAME};

/// Signature of a registered invoke function.
pub type InvokeFn = fn(&[Value], &Map<String, Value>) -> Result<Value, ExpressionError>;

/// A named set of invoke functions.
pub struct InvokeModule {
    functions: HashMap<String, InvokeFn>,
}

impl InvokeModule {
    pub fn new(functions: HashMap<String, InvokeFn>) -> Self {
        Self { functions }
    }

    /// Call `function` with the given arguments.
    ///
    /// `module_name` is only used to label errors.
    pub fn call(
        &self,
        module_name: &str,
        function: &str,
        positional: &[Value],
        keyword: &Map<String, Value>,
    ) -> Result<Value, ExpressionError> {
        let target = self
            .functions
            .get(function)
            .ok_or_else(|| ExpressionError::UnknownFunction {
                module: module_name.to_string(),
                function: function.to_string(),
            })?;
        target(positional, keyword)
    }
}

/// Registry of invoke modules, shared by every evaluator in a connector.
///
/// Cheap to clone; clones share the same module table.
#[derive(Clone)]
pub struct InvokeRegistry {
    modules: Arc<DashMap<String, Arc<InvokeModule>>>,
}

impl InvokeRegistry {
    /// Create a registry containing only the built-in `invoke_functions`
    /// module.
    pub fn with_builtins() -> Self {
        let modules = DashMap::new();
        modules.insert(MODULE_NAME.to_string(), Arc::new(builtin_module()));
        Self {
            modules: Arc::new(modules),
        }
    }

    /// Register (or replace) a module under `name`.
    pub fn register_module(&self, name: impl Into<String>, module: InvokeModule) {
        self.modules.insert(name.into(), Arc::new(module));
    }

    /// Call `module.function` with resolved arguments.
    pub fn call(
        &self,
        module: &str,
        function: &str,
        positional: &[Value],
        keyword: &Map<String, Value>,
    ) -> Result<Value, ExpressionError> {
        let entry = self
            .modules
            .get(module)
            .ok_or_else(|| ExpressionError::UnknownModule(module.to_string()))?;
        entry.call(module, function, positional, keyword)
    }
}

impl Default for InvokeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Positional and keyword parameters of an invoke descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeParams {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

/// A parsed `invoke` configuration block.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDescriptor {
    pub module: String,
    pub function: String,
    pub params: InvokeParams,
}

impl InvokeDescriptor {
    /// Try to parse a configuration value as an invoke descriptor.
    ///
    /// Returns `Ok(None)` when the value is not a mapping with an `invoke`
    /// key, and an error when it is but the descriptor is malformed.
    pub fn from_value(value: &Value) -> Result<Option<Self>, ExpressionError> {
        let Some(invoke) = value.get("invoke") else {
            return Ok(None);
        };
        let Some(invoke) = invoke.as_object() else {
            return Err(ExpressionError::InvalidInvoke(
                "invoke block must be a mapping".to_string(),
            ));
        };

        let module = invoke
            .get("module")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExpressionError::InvalidInvoke("invoke block is missing a module".to_string())
            })?;
        let function = invoke
            .get("function")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExpressionError::InvalidInvoke("invoke block is missing a function".to_string())
            })?;

        let mut params = InvokeParams::default();
        if let Some(raw_params) = invoke.get("params") {
            let Some(raw_params) = raw_params.as_object() else {
                return Err(ExpressionError::InvalidInvoke(
                    "invoke params must be a mapping".to_string(),
                ));
            };
            if let Some(positional) = raw_params.get("positional") {
                params.positional = positional
                    .as_array()
                    .cloned()
                    .ok_or_else(|| {
                        ExpressionError::InvalidInvoke(
                            "positional params must be a sequence".to_string(),
                        )
                    })?;
            }
            if let Some(keyword) = raw_params.get("keyword") {
                params.keyword = keyword
                    .as_object()
                    .cloned()
                    .ok_or_else(|| {
                        ExpressionError::InvalidInvoke(
                            "keyword params must be a mapping".to_string(),
                        )
                    })?;
            }
        }

        Ok(Some(Self {
            module: module.to_string(),
            function: function.to_string(),
            params,
        }))
    }
}

/// Recognize an `evaluate_expression(<expr>[, <type>])` parameter value.
///
/// Returns the inner expression text and the optional coercion type.
pub(crate) fn parse_evaluate_expression(
    text: &str,
) -> Option<(String, Option<CoercionType>)> {
    let inner = text
        .strip_prefix("evaluate_expression(")?
        .strip_suffix(')')?;

    // A trailing ", <type>" selects a coercion; anything else is part of
    // the expression itself.
    if let Some((expr, maybe_type)) = inner.rsplit_once(',') {
        if let Ok(coercion) = CoercionType::from_str(maybe_type.trim()) {
            return Some((expr.trim().to_string(), Some(coercion)));
        }
    }
    Some((inner.trim().to_string(), None))
}
