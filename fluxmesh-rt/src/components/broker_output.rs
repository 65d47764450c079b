//! Broker output component: the publishing edge of a flow.

// Layer 1: Standard library imports
use std::str::FromStr;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

// Layer 3: Internal module imports
use crate::component::{
    Component, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
use crate::message::Message;
use crate::messaging::{BrokerConfig, BrokerService};
use crate::util::encoding::{encode_payload, PayloadEncoding, PayloadFormat};

pub(crate) fn register(registry: &ComponentRegistry) {
    registry.register(
        "broker_output",
        Arc::new(|build| {
            let properties = build.broker_properties();
            let config = BrokerConfig::from_value(&properties)
                .map_err(|e| ComponentError::Initialization(e.to_string()))?;
            let broker = build
                .messaging
                .clone()
                .from_properties(&properties)
                .map_err(|e| ComponentError::Initialization(e.to_string()))?
                .build()
                .map_err(|e| ComponentError::Initialization(e.to_string()))?;
            Ok(Box::new(BrokerOutput::new(broker, &config)))
        }),
    );
}

/// Publishes the selected input to the broker.
///
/// Expects `data` to be a mapping with `topic` and `payload` and an
/// optional `user_properties` mapping. After a successful publish the
/// source message is acknowledged unless `propagate_acknowledgements` is
/// disabled.
pub struct BrokerOutput {
    broker: Arc<dyn BrokerService>,
    payload_format: PayloadFormat,
    payload_encoding: PayloadEncoding,
}

impl BrokerOutput {
    pub fn new(broker: Arc<dyn BrokerService>, config: &BrokerConfig) -> Self {
        Self {
            broker,
            payload_format: config
                .payload_format
                .as_deref()
                .and_then(|f| PayloadFormat::from_str(f).ok())
                .unwrap_or_default(),
            payload_encoding: PayloadEncoding::from_str(&config.payload_encoding)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Component for BrokerOutput {
    async fn start(&mut self, _ctx: &ComponentContext) -> Result<(), ComponentError> {
        self.broker.connect().await?;
        Ok(())
    }

    async fn invoke(
        &mut self,
        message: &mut Message,
        data: Value,
        ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        let topic = data
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ComponentError::Runtime("broker_output needs a topic".to_string()))?
            .to_string();
        let payload = data
            .get("payload")
            .ok_or_else(|| ComponentError::Runtime("broker_output needs a payload".to_string()))?;
        let user_properties = data
            .get("user_properties")
            .and_then(Value::as_object)
            .cloned();

        let bytes = encode_payload(payload, self.payload_format, self.payload_encoding)
            .map_err(crate::messaging::MessagingError::from)?;
        self.broker
            .send_message(&topic, bytes, user_properties, None)
            .await?;

        let propagate = ctx
            .get_config("propagate_acknowledgements")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if propagate {
            message.call_acknowledgements();
        }
        Ok(InvokeResult::Emit(data))
    }

    async fn stop_component(&mut self) {
        if let Err(error) = self.broker.disconnect().await {
            warn!(%error, "failed to disconnect broker output");
        }
    }
}
