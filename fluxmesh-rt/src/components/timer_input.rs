//! Timer input component: emits a message on a fixed interval.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

// Layer 3: Internal module imports
use crate::component::{
    Component, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
use crate::message::Message;

const DEFAULT_INTERVAL_MS: u64 = 1000;

pub(crate) fn register(registry: &ComponentRegistry) {
    registry.register(
        "timer_input",
        Arc::new(|build| {
            let config = &build.config.component_config;
            let interval_ms = config
                .get("interval_ms")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_INTERVAL_MS)
                .max(1);
            let skip_if_behind = config
                .get("skip_messages_if_behind")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let payload = config.get("payload").cloned().unwrap_or_else(|| json!({}));
            Ok(Box::new(TimerInput::new(interval_ms, skip_if_behind, payload)))
        }),
    );
}

/// Source that produces one message per interval.
///
/// With `skip_messages_if_behind`, ticks that were missed while the flow
/// was busy collapse into a single message.
pub struct TimerInput {
    interval: Duration,
    skip_if_behind: bool,
    payload: Value,
    next_tick: Option<Instant>,
}

impl TimerInput {
    pub fn new(interval_ms: u64, skip_if_behind: bool, payload: Value) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            skip_if_behind,
            payload,
            next_tick: None,
        }
    }
}

#[async_trait]
impl Component for TimerInput {
    fn is_source(&self) -> bool {
        true
    }

    async fn next_message(
        &mut self,
        _ctx: &ComponentContext,
    ) -> Result<Option<Message>, ComponentError> {
        let now = Instant::now();
        let due = self.next_tick.unwrap_or(now);
        if due > now {
            tokio::time::sleep_until(due).await;
        }

        self.next_tick = if self.skip_if_behind {
            // Drop any backlog and schedule from the current time
            Some(Instant::now() + self.interval)
        } else {
            Some(due + self.interval)
        };

        Ok(Some(Message::new(self.payload.clone())))
    }

    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        Ok(InvokeResult::Emit(message.payload().clone()))
    }
}
