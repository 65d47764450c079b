//! Error input component: the head of an error-handling flow.

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
    registry.register("error_input", Arc::new(|_| Ok(Box::new(ErrorInput))));
}

/// Marks a flow as the error handler.
///
/// The connector redirects error messages into the input queue of the
/// flow whose first component is an `error_input`; this component then
/// exposes the error payload as `previous` for downstream selection
/// (e.g. `previous:error.text`).
pub struct ErrorInput;

impl ErrorInput {
    /// Module name the connector looks for when wiring error routing.
    pub const MODULE_NAME: &'static str = "error_input";
}

#[async_trait]
impl Component for ErrorInput {
    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        Ok(InvokeResult::Emit(message.payload().clone()))
    }
}
