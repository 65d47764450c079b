//! Subscription router for simplified apps.
//!
//! When several components share one broker input, the router dispatches
//! each message to the first component whose subscription set matches the
//! topic.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

// Layer 3: Internal module imports
use crate::component::{Component, ComponentContext, ComponentError, InvokeResult};
use crate::message::{Event, Message};
use crate::messaging::subscription_to_regex;

/// Module name the implicit-flow synthesis uses for the router stage.
pub const ROUTER_MODULE: &str = "_router";

/// One routing target: a component and its compiled subscription set.
pub struct RouteEntry {
    pub component_name: String,
    pub patterns: Vec<Regex>,
    pub queue: mpsc::Sender<Event>,
}

impl RouteEntry {
    /// Compile a component's subscriptions into anchored patterns.
    pub fn new(
        component_name: impl Into<String>,
        subscriptions: &[String],
        queue: mpsc::Sender<Event>,
    ) -> Result<Self, ComponentError> {
        let mut patterns = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let translated = format!("^{}$", subscription_to_regex(subscription));
            let pattern = Regex::new(&translated).map_err(|e| {
                ComponentError::Config(format!("bad subscription {subscription}: {e}"))
            })?;
            patterns.push(pattern);
        }
        Ok(Self {
            component_name: component_name.into(),
            patterns,
            queue,
        })
    }

    fn matches(&self, topic: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(topic))
    }
}

/// Shared, post-build-populated route table.
///
/// The flow wires the routes after every group exists; router instances
/// hold the same table through this handle.
#[derive(Clone, Default)]
pub struct RouterRoutes {
    entries: Arc<RwLock<Vec<RouteEntry>>>,
}

impl RouterRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entries(&self, entries: Vec<RouteEntry>) {
        *self.entries.write() = entries;
    }

    fn dispatch_target(&self, topic: &str) -> Option<(String, mpsc::Sender<Event>)> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.matches(topic))
            .map(|entry| (entry.component_name.clone(), entry.queue.clone()))
    }
}

/// Dispatches messages to the first component whose subscriptions match
/// the topic. Messages matching no component are acknowledged and
/// dropped with a warning.
pub struct SubscriptionRouter {
    routes: RouterRoutes,
}

impl SubscriptionRouter {
    pub fn new(routes: RouterRoutes) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl Component for SubscriptionRouter {
    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        let topic = message.topic().unwrap_or("").to_string();
        match self.routes.dispatch_target(&topic) {
            Some((_, queue)) => {
                // Move the whole message (settlement callbacks included)
                // to the matched component's queue
                let routed = std::mem::replace(message, Message::new(Value::Null));
                if queue.send(Event::Message(routed)).await.is_err() {
                    warn!(%topic, "router target queue closed; message dropped");
                }
                Ok(InvokeResult::Handled)
            }
            None => {
                warn!(%topic, "no component subscription matches; message dropped");
                message.call_acknowledgements();
                Ok(InvokeResult::Handled)
            }
        }
    }
}
