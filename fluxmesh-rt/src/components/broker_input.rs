//! Broker input component: the source edge of a flow.

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

// Layer 3: Internal module imports
use crate::component::{
    Component, ComponentContext, ComponentError, ComponentRegistry, InvokeResult,
};
use crate::message::{Message, NackOutcome};
use crate::messaging::{BrokerConfig, BrokerService, ReconnectionCallback};
use crate::util::encoding::{decode_payload, PayloadEncoding, PayloadFormat};

const RECEIVE_POLL_MS: u64 = 200;

pub(crate) fn register(registry: &ComponentRegistry) {
    registry.register(
        "broker_input",
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
            Ok(Box::new(BrokerInput::new(broker, &config, build.config.subscriptions.iter())))
        }),
    );
}

/// Receives from the broker, decodes payloads, and feeds the flow.
///
/// Each received message carries an ack callback settling the original
/// broker message positively and a nack callback settling it with the
/// caller's outcome. On reconnection, a temporary queue is rebound and
/// the active subscriptions restored; durable queues keep their bindings.
pub struct BrokerInput {
    broker: Arc<dyn BrokerService>,
    queue_name: String,
    temporary_queue: bool,
    payload_format: PayloadFormat,
    payload_encoding: PayloadEncoding,
    active_subscriptions: Arc<Mutex<HashSet<String>>>,
}

impl BrokerInput {
    pub fn new<'a>(
        broker: Arc<dyn BrokerService>,
        config: &BrokerConfig,
        extra_subscriptions: impl Iterator<Item = &'a crate::messaging::types::Subscription>,
    ) -> Self {
        let mut subscriptions: HashSet<String> = config
            .subscriptions
            .iter()
            .map(|s| s.topic.clone())
            .collect();
        subscriptions.extend(extra_subscriptions.map(|s| s.topic.clone()));

        Self {
            broker,
            queue_name: config.queue_name.clone().unwrap_or_default(),
            temporary_queue: config.temporary_queue,
            payload_format: config
                .payload_format
                .as_deref()
                .and_then(|f| PayloadFormat::from_str(f).ok())
                .unwrap_or_default(),
            payload_encoding: PayloadEncoding::from_str(&config.payload_encoding)
                .unwrap_or_default(),
            active_subscriptions: Arc::new(Mutex::new(subscriptions)),
        }
    }

    /// Topic patterns this input currently has bound.
    pub fn active_subscriptions(&self) -> HashSet<String> {
        self.active_subscriptions.lock().clone()
    }

    fn reconnection_callback(&self) -> ReconnectionCallback {
        let broker = Arc::clone(&self.broker);
        let subscriptions = Arc::clone(&self.active_subscriptions);
        let queue_name = self.queue_name.clone();
        let temporary = self.temporary_queue;
        Arc::new(move || {
            let broker = Arc::clone(&broker);
            let subscriptions = Arc::clone(&subscriptions);
            let queue_name = queue_name.clone();
            Box::pin(async move {
                // Durable queues keep their bindings across reconnects
                if !temporary {
                    return Ok(());
                }
                let snapshot: HashSet<String> = subscriptions.lock().clone();
                let (restored, failed) = broker
                    .restore_subscriptions_with_rebind(&snapshot, &queue_name, true)
                    .await?;
                if failed > 0 {
                    warn!(restored, failed, "some subscriptions failed to restore");
                }
                Ok(())
            })
        })
    }
}

#[async_trait]
impl Component for BrokerInput {
    async fn start(&mut self, _ctx: &ComponentContext) -> Result<(), ComponentError> {
        self.broker.connect().await?;
        for topic in self.active_subscriptions().into_iter() {
            self.broker
                .add_topic_to_queue(&topic, &self.queue_name)
                .await?;
        }
        self.broker
            .register_reconnection_callback(self.reconnection_callback());
        Ok(())
    }

    fn is_source(&self) -> bool {
        true
    }

    async fn next_message(
        &mut self,
        _ctx: &ComponentContext,
    ) -> Result<Option<Message>, ComponentError> {
        let Some(broker_message) = self
            .broker
            .receive_message(RECEIVE_POLL_MS, &self.queue_name)
            .await?
        else {
            return Ok(None);
        };

        let payload = match decode_payload(
            &broker_message.payload,
            self.payload_format,
            self.payload_encoding,
        ) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, topic = %broker_message.topic, "undecodable payload; rejected");
                self.broker
                    .nack_message(&broker_message, NackOutcome::Rejected)
                    .await?;
                return Ok(None);
            }
        };

        let message = Message::new(payload)
            .with_topic(broker_message.topic.clone())
            .with_user_properties(broker_message.user_properties.clone());

        // Deferred settlement of the in-flight original
        let ack_broker = Arc::clone(&self.broker);
        let ack_original = broker_message.clone();
        message.add_acknowledgement(Box::new(move || {
            tokio::spawn(async move {
                if let Err(error) = ack_broker.ack_message(&ack_original).await {
                    warn!(%error, "failed to ack broker message");
                }
            });
        }));
        let nack_broker = Arc::clone(&self.broker);
        message.add_negative_acknowledgement(Box::new(move |outcome| {
            tokio::spawn(async move {
                if let Err(error) = nack_broker.nack_message(&broker_message, outcome).await {
                    warn!(%error, "failed to nack broker message");
                }
            });
        }));

        Ok(Some(message))
    }

    async fn invoke(
        &mut self,
        message: &mut Message,
        _data: Value,
        _ctx: &ComponentContext,
    ) -> Result<InvokeResult, ComponentError> {
        Ok(InvokeResult::Emit(message.payload().clone()))
    }

    async fn stop_component(&mut self) {
        if let Err(error) = self.broker.disconnect().await {
            warn!(%error, "failed to disconnect broker input");
        }
    }
}
