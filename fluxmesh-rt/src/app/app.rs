//! App construction: config merging and flow materialization.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use super::error::AppError;
use super::schema::ConfigSchema;
use crate::component::{ComponentRegistry, ErrorReporter};
use crate::expression::Evaluator;
use crate::flow::{Flow, FlowBuildParams, ROUTER_MODULE};
use crate::messaging::MessagingServiceBuilder;
use crate::util::deep_merge;

/// Shared services an app is built against.
pub struct AppBuildParams<'a> {
    pub instance_name: &'a str,
    pub evaluator: &'a Evaluator,
    pub registry: &'a ComponentRegistry,
    pub messaging: &'a MessagingServiceBuilder,
    pub errors: &'a ErrorReporter,
    pub cancel: &'a CancellationToken,
}

/// A named bundle of flows plus shared configuration.
///
/// Two construction modes:
/// - *explicit*: the configuration carries a `flows` list;
/// - *simplified*: the configuration carries a `broker` block and a flat
///   `components` list, and the app synthesizes the implicit flow
///   (broker input, optional router, components, optional broker output).
///
/// Code-level defaults (an app shipped as part of a program) deep-merge
/// with the runtime-supplied configuration: mappings merge recursively,
/// lists concatenate code-first, scalars are overridden by the runtime
/// value.
pub struct App {
    name: String,
    app_info: Value,
    app_config: Value,
    flows: Vec<Flow>,
}

impl App {
    /// Build an app from runtime configuration and optional code-level
    /// defaults.
    pub async fn build(
        app_info: &Value,
        code_config: Option<&Value>,
        params: &AppBuildParams<'_>,
    ) -> Result<Self, AppError> {
        let merged = match code_config {
            Some(defaults) => deep_merge(defaults.clone(), app_info.clone()),
            None => app_info.clone(),
        };

        let name = merged
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Config("app needs a name".to_string()))?
            .to_string();

        // Validate the app-scoped parameter block against the app's
        // schema, if one is declared
        let mut app_config = merged.get("app_config").cloned().unwrap_or_else(|| json!({}));
        if let Some(schema_value) = merged.get("app_schema") {
            let schema = ConfigSchema::from_value(schema_value)?;
            schema.apply(&mut app_config)?;
        }

        let flow_values = Self::flow_configs(&name, &merged)?;
        let app_broker = merged.get("broker").cloned();

        let mut flows = Vec::with_capacity(flow_values.len());
        for flow_value in &flow_values {
            let flow_params = FlowBuildParams {
                instance_name: params.instance_name,
                evaluator: params.evaluator,
                registry: params.registry,
                messaging: params.messaging,
                app_broker: app_broker.as_ref(),
                app_config: &app_config,
                errors: params.errors,
                cancel: params.cancel,
            };
            flows.push(Flow::build(flow_value, &flow_params).await?);
        }

        debug!(app = %name, flows = flows.len(), "app assembled");
        Ok(Self {
            name,
            app_info: merged,
            app_config,
            flows,
        })
    }

    /// Resolve the flow list: explicit `flows`, or the synthesized
    /// implicit flow of a simplified app.
    fn flow_configs(name: &str, merged: &Value) -> Result<Vec<Value>, AppError> {
        if let Some(flows) = merged.get("flows").and_then(Value::as_array) {
            if !flows.is_empty() {
                return Ok(flows.clone());
            }
        }

        let components = merged
            .get("components")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::Config(format!("app {name} needs flows or components"))
            })?;
        if components.is_empty() {
            return Err(AppError::Config(format!("app {name} has no components")));
        }

        let broker = merged.get("broker").cloned().unwrap_or_else(|| json!({}));
        let input_enabled = broker
            .get("input_enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let output_enabled = broker
            .get("output_enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut synthesized = Vec::new();
        if input_enabled {
            // The shared broker input binds every component's
            // subscriptions; the router then fans messages back out
            let aggregated: Vec<Value> = components
                .iter()
                .filter_map(|component| component.get("subscriptions"))
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect();
            synthesized.push(json!({
                "component_name": "_broker_input",
                "component_module": "broker_input",
                "component_config": broker.clone(),
                "subscriptions": aggregated,
            }));
            if components.len() > 1 {
                synthesized.push(json!({
                    "component_name": "_router",
                    "component_module": ROUTER_MODULE,
                }));
            }
        }
        synthesized.extend(components.iter().cloned());
        if output_enabled {
            synthesized.push(json!({
                "component_name": "_broker_output",
                "component_module": "broker_output",
                "component_config": broker,
            }));
        }

        Ok(vec![json!({
            "name": format!("{name}_implicit_flow"),
            "components": synthesized,
        })])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The merged (code defaults + runtime) configuration.
    pub fn app_info(&self) -> &Value {
        &self.app_info
    }

    /// The schema-validated `app_config` block.
    pub fn app_config(&self) -> &Value {
        &self.app_config
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Start every flow.
    pub fn start(&self) {
        for flow in &self.flows {
            flow.start();
        }
    }

    /// Stop every flow within `grace` per worker.
    pub async fn stop(&self, grace: Duration) {
        for flow in &self.flows {
            flow.stop(grace).await;
        }
    }
}
