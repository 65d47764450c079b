//! General-purpose flow components.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Value};

// Layer 3: Internal module imports
use crate::component::{
    Component, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
use crate::expression::is_truthy;
use crate::message::Message;

pub(crate) fn register(registry: &ComponentRegistry) {
    registry.register("pass_through", Arc::new(|_| Ok(Box::new(PassThrough))));
    registry.register("iterate", Arc::new(|_| Ok(Box::new(Iterate))));
    registry.register("message_filter", Arc::new(|_| Ok(Box::new(MessageFilter))));
    registry.register("user_processor", Arc::new(|_| Ok(Box::new(UserProcessor))));
    registry.register("give_ack_output", Arc::new(|_| Ok(Box::new(GiveAckOutput))));
}

/// What goes in comes out.
pub struct PassThrough;

#[async_trait]
impl Component for PassThrough {
    async fn invoke(
        &mut self,
        _message: &mut Message,
        data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        if data.is_null() {
            return Ok(InvokeResult::Emit(json!({})));
        }
        Ok(InvokeResult::Emit(data))
    }
}

/// Take a message whose selected input is a list and output each item as
/// a separate message.
pub struct Iterate;

#[async_trait]
impl Component for Iterate {
    async fn invoke(
        &mut self,
        message: &mut Message,
        data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        let Value::Array(items) = data else {
            return Err(ComponentError::Runtime(
                "The iterate component requires the input to be a list".to_string(),
            ));
        };
        if items.is_empty() {
            return Ok(InvokeResult::Discard);
        }

        // New messages for every item but the last; the incoming message
        // itself carries the final item so its acknowledgements survive
        let last = items.len() - 1;
        let mut items = items;
        let final_item = items.remove(last);
        for item in items {
            let mut fanned_out = Message::new(item.clone())
                .with_user_properties(message.user_properties().clone());
            if let Some(topic) = message.topic() {
                fanned_out.set_topic(topic);
            }
            fanned_out.set_previous(item);
            ctx.emit(fanned_out).await;
        }
        Ok(InvokeResult::Emit(final_item))
    }
}

/// Pass or drop messages based on a configured `filter_expression`.
///
/// The expression is a dynamic configuration value (typically an `invoke`
/// block) evaluated per message. A falsy result discards the message and
/// fires the acknowledgements registered upstream.
pub struct MessageFilter;

#[async_trait]
impl Component for MessageFilter {
    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        let verdict = ctx
            .resolve_config("filter_expression", message)?
            .ok_or_else(|| {
                ComponentError::Config("message_filter requires filter_expression".to_string())
            })?;
        if is_truthy(&verdict) {
            Ok(InvokeResult::Emit(verdict))
        } else {
            Ok(InvokeResult::Discard)
        }
    }
}

/// Evaluate the `component_processing` configuration value per message
/// and emit the result.
pub struct UserProcessor;

#[async_trait]
impl Component for UserProcessor {
    async fn invoke(
        &mut self,
        message: &mut Message,
        data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        match ctx.resolve_config("component_processing", message)? {
            Some(result) => Ok(InvokeResult::Emit(result)),
            None => Ok(InvokeResult::Emit(data)),
        }
    }
}

/// Acknowledge the message as soon as it is processed, then pass it on.
pub struct GiveAckOutput;

#[async_trait]
impl Component for GiveAckOutput {
    async fn invoke(
        &mut self,
        message: &mut Message,
        data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        message.call_acknowledgements();
        Ok(InvokeResult::Emit(data))
    }
}
