//! One flow: ordered component groups connected by bounded queues.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use super::error::FlowError;
use super::router::{RouteEntry, RouterRoutes, SubscriptionRouter, ROUTER_MODULE};
use crate::component::runtime::GroupBuildParams;
use crate::component::{
    ComponentConfig, ComponentGroup, ComponentRegistry, ErrorReporter, OutputTarget,
};
use crate::components::error_input::ErrorInput;
use crate::expression::Evaluator;
use crate::message::Event;
use crate::messaging::MessagingServiceBuilder;

/// Shared services a flow is built against.
pub struct FlowBuildParams<'a> {
    pub instance_name: &'a str,
    pub evaluator: &'a Evaluator,
    pub registry: &'a ComponentRegistry,
    pub messaging: &'a MessagingServiceBuilder,
    pub app_broker: Option<&'a Value>,
    pub app_config: &'a Value,
    pub errors: &'a ErrorReporter,
    pub cancel: &'a CancellationToken,
}

/// An ordered pipeline of component groups.
///
/// Built from a flow configuration mapping, wired end to end over bounded
/// queues; the previous group's output target points at the next group's
/// input queue. Stopping is two-phase: signal the stop token, then join
/// every worker with a bounded grace window.
pub struct Flow {
    name: String,
    config: Value,
    groups: Vec<ComponentGroup>,
    cancel: CancellationToken,
}

impl Flow {
    /// Build a flow from its configuration mapping.
    pub async fn build(config: &Value, params: &FlowBuildParams<'_>) -> Result<Self, FlowError> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| FlowError::Config("flow needs a name".to_string()))?
            .to_string();

        let component_values = config
            .get("components")
            .and_then(Value::as_array)
            .ok_or_else(|| FlowError::Config(format!("flow {name} has no components")))?;
        if component_values.is_empty() {
            return Err(FlowError::Config(format!("flow {name} has no components")));
        }

        let flow_config = config.get("flow_config").cloned().unwrap_or_else(|| json!({}));
        let cancel = params.cancel.child_token();

        let mut component_configs = Vec::with_capacity(component_values.len());
        for value in component_values {
            component_configs.push(ComponentConfig::from_value(value)?);
        }

        // The router (used by simplified apps) is wired after every group
        // exists, through a shared route table
        let routes = RouterRoutes::new();
        let mut router_index = None;

        let mut groups = Vec::with_capacity(component_configs.len());
        for (index, component_config) in component_configs.iter().enumerate() {
            let factory_override = if component_config.component_module == ROUTER_MODULE {
                router_index = Some(index);
                let routes = routes.clone();
                let factory: crate::component::ComponentFactory = Arc::new(
                    move |_build: &crate::component::ComponentBuildContext<'_>| {
                        Ok(Box::new(SubscriptionRouter::new(routes.clone()))
                            as Box<dyn crate::component::Component>)
                    },
                );
                Some(factory)
            } else {
                None
            };

            let group_params = GroupBuildParams {
                instance_name: params.instance_name,
                flow_name: &name,
                evaluator: params.evaluator,
                registry: params.registry,
                messaging: params.messaging,
                app_broker: params.app_broker,
                app_config: params.app_config,
                flow_config: &flow_config,
                errors: params.errors,
                cancel: &cancel,
                factory_override,
            };
            groups.push(ComponentGroup::build(component_config, &group_params).await?);
        }

        // Linear wiring: each group feeds the next; the last one drops
        for index in 0..groups.len().saturating_sub(1) {
            let next_sender = groups[index + 1].input_sender();
            groups[index].set_next(OutputTarget::Queue(next_sender));
        }

        // Populate router dispatch entries from the downstream groups'
        // subscriptions
        if let Some(router_index) = router_index {
            let mut entries = Vec::new();
            for group in groups.iter().skip(router_index + 1) {
                let topics: Vec<String> = group
                    .subscriptions()
                    .iter()
                    .map(|s| s.topic.clone())
                    .collect();
                if topics.is_empty() {
                    continue;
                }
                entries.push(RouteEntry::new(
                    group.name().to_string(),
                    &topics,
                    group.input_sender(),
                )?);
            }
            routes.set_entries(entries);
        }

        debug!(flow = %name, groups = groups.len(), "flow assembled");
        Ok(Self {
            name,
            config: config.clone(),
            groups,
            cancel,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw flow configuration (used for flags like `test_ignore`).
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Input queue of the first component group.
    pub fn input_sender(&self) -> Option<mpsc::Sender<Event>> {
        self.groups.first().map(ComponentGroup::input_sender)
    }

    pub fn groups(&self) -> &[ComponentGroup] {
        &self.groups
    }

    /// Redirect the terminal group's output (used by test sinks).
    pub fn set_output_target(&self, target: OutputTarget) {
        if let Some(last) = self.groups.last() {
            last.set_next(target);
        }
    }

    /// Whether this flow is the designated error handler.
    pub fn is_error_flow(&self) -> bool {
        self.config
            .get("components")
            .and_then(Value::as_array)
            .and_then(|components| components.first())
            .and_then(|first| {
                first
                    .get("component_module")
                    .or_else(|| first.get("component_class"))
            })
            .and_then(Value::as_str)
            .map(|module| module == ErrorInput::MODULE_NAME)
            .unwrap_or(false)
    }

    /// Start every worker.
    pub fn start(&self) {
        for group in &self.groups {
            group.start();
        }
    }

    /// Two-phase stop: fire the stop signal, then drain groups in
    /// dependency order (sources first) within `grace` each.
    pub async fn stop(&self, grace: Duration) {
        self.cancel.cancel();
        for group in &self.groups {
            group.stop(grace).await;
        }
        debug!(flow = %self.name, "flow stopped");
    }
}
