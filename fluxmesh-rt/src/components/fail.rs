//! Test-support component that fails every message with a configured
//! error.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::component::{
    Component, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
use crate::message::Message;

pub(crate) fn register(registry: &ComponentRegistry) {
    registry.register("fail", Arc::new(|_| Ok(Box::new(Fail))));
}

/// Raises `error_message` for every message, exercising error routing.
pub struct Fail;

#[async_trait]
impl Component for Fail {
    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        let text = ctx
            .resolve_config("error_message", message)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "fail component invoked".to_string());
        Err(ComponentError::Runtime(text))
    }
}
