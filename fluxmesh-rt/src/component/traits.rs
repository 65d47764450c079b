//! The component contract.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use super::config::ComponentConfig;
use super::context::ComponentContext;
use super::error::ComponentError;
use crate::message::Message;
use crate::messaging::MessagingServiceBuilder;

/// Result of one `invoke` call.
#[derive(Debug)]
pub enum InvokeResult {
    /// Store the value in `previous` and forward the message downstream
    Emit(Value),
    /// Stop propagation and acknowledge the message
    Discard,
    /// The component routed the message itself (e.g. iterate, router)
    Handled,
}

/// A unit of per-message work.
///
/// Implementations keep their own state; the runtime creates one instance
/// per configured worker, so `&mut self` access is uncontended.
#[async_trait]
pub trait Component: Send {
    /// One-time startup hook, called before the worker loop begins.
    /// Broker-backed components connect here.
    async fn start(&mut self, _ctx: &ComponentContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Per-message work. `data` is the evaluated input selection.
    ///
    /// Errors are converted into an error message dispatched to the error
    /// flow, and the original message is nacked (`Rejected` by default).
    async fn invoke(
        &mut self,
        message: &mut Message,
        data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError>;

    /// Source components produce messages here instead of reading the
    /// input queue. Must poll with a bounded internal timeout and return
    /// `Ok(None)` when nothing arrived, so the worker can observe the stop
    /// signal.
    async fn next_message(
        &mut self,
        _ctx: &ComponentContext,
    ) -> Result<Option<Message>, ComponentError> {
        Ok(None)
    }

    /// Whether this component is a source (feeds the flow).
    fn is_source(&self) -> bool {
        false
    }

    /// Timer events scheduled for this component.
    async fn handle_timer(
        &mut self,
        _id: &str,
        _payload: Value,
        _ctx: &ComponentContext,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Cache-expiry events delivered to this component.
    async fn handle_cache_expiry(
        &mut self,
        _key: &str,
        _value: Value,
        _ctx: &ComponentContext,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Cooperative shutdown hook, called after the worker loop exits.
    async fn stop_component(&mut self) {}
}

/// Everything a component constructor may need.
pub struct ComponentBuildContext<'a> {
    /// The validated component configuration
    pub config: &'a ComponentConfig,
    /// The app's `broker` block, if any (broker components merge their
    /// local settings over it)
    pub app_broker: Option<&'a Value>,
    /// Builder for broker services, sharing the connector's store
    pub messaging: &'a MessagingServiceBuilder,
}

impl ComponentBuildContext<'_> {
    /// The broker block for a broker-backed component: the app block with
    /// the component's own configuration merged over it.
    pub fn broker_properties(&self) -> Value {
        let base = self
            .app_broker
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        crate::util::deep_merge(base, self.config.component_config.clone())
    }
}

/// Constructor registered under a component module name.
pub type ComponentFactory =
    Arc<dyn Fn(&ComponentBuildContext) -> Result<Box<dyn Component>, ComponentError> + Send + Sync>;
