//! In-process development broker.
//!
//! Implements the full [`BrokerService`] interface against shared
//! in-memory state. Instances created with the same identity share their
//! subscription and queue maps, so separate components (and the
//! request/response controller's internal broker pair) see one logical
//! broker, exactly like a real deployment.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::builder::SharedBrokerStore;
use super::error::MessagingError;
use super::traits::BrokerService;
use super::types::{
    subscription_to_regex, topic_matches, BrokerConfig, BrokerMessage, ConnectionStatus,
    ReconnectionCallback, SendContext,
};
use crate::message::NackOutcome;

/// Capacity of each in-memory queue.
const QUEUE_CAPACITY: usize = 1000;

struct DevQueue {
    sender: mpsc::Sender<BrokerMessage>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<BrokerMessage>>,
}

impl DevQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }
}

/// Outcome of the most recent subscription restore, kept for inspection
/// by tests exercising the reconnection machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRecord {
    pub queue_name: String,
    pub temporary: bool,
    pub restored: usize,
    pub failed: usize,
}

/// State shared by all dev brokers of one identity.
pub(crate) struct DevBrokerState {
    /// queue name -> set of subscription regex strings
    subscriptions: Mutex<HashMap<String, HashSet<String>>>,
    queues: Mutex<HashMap<String, Arc<DevQueue>>>,
    reconnection_callbacks: Mutex<Vec<ReconnectionCallback>>,
    last_restore: Mutex<Option<RestoreRecord>>,
}

impl DevBrokerState {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            reconnection_callbacks: Mutex::new(Vec::new()),
            last_restore: Mutex::new(None),
        }
    }

    fn ensure_queue(&self, queue_name: &str) -> Arc<DevQueue> {
        let mut queues = self.queues.lock();
        Arc::clone(
            queues
                .entry(queue_name.to_string())
                .or_insert_with(|| Arc::new(DevQueue::new())),
        )
    }

    fn rebind_queue(&self, queue_name: &str) {
        self.queues
            .lock()
            .insert(queue_name.to_string(), Arc::new(DevQueue::new()));
    }
}

/// The in-process broker.
///
/// # Example
///
/// ```rust,ignore
/// let store = SharedBrokerStore::new();
/// let broker = DevBroker::from_value(&config, &store)?;
/// broker.connect().await?;
/// broker.send_message("test/topic", payload, None, None).await?;
/// let message = broker.receive_message(1000, "test_queue").await?;
/// ```
pub struct DevBroker {
    config: BrokerConfig,
    state: Arc<DevBrokerState>,
    connected: AtomicBool,
}

impl DevBroker {
    /// Create a dev broker and bind its configured queue and
    /// subscriptions.
    pub fn new(config: BrokerConfig, store: &SharedBrokerStore) -> Self {
        let state = store.state_for(&config.identity());
        if let Some(queue_name) = &config.queue_name {
            state.ensure_queue(queue_name);
            let mut subscriptions = state.subscriptions.lock();
            let bindings = subscriptions.entry(queue_name.clone()).or_default();
            for subscription in &config.subscriptions {
                bindings.insert(subscription_to_regex(&subscription.topic));
            }
        }
        Self {
            config,
            state,
            connected: AtomicBool::new(false),
        }
    }

    /// Create a dev broker from a raw `broker` configuration block.
    pub fn from_value(value: &Value, store: &SharedBrokerStore) -> Result<Self, MessagingError> {
        Ok(Self::new(BrokerConfig::from_value(value)?, store))
    }

    /// The broker configuration this instance was built from.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Fire every registered reconnection callback, as the production
    /// driver would after re-establishing a connection. A failing callback
    /// does not stop iteration.
    pub async fn simulate_reconnection(&self) {
        let callbacks: Vec<ReconnectionCallback> =
            self.state.reconnection_callbacks.lock().clone();
        debug!(count = callbacks.len(), "simulating broker reconnection");
        for callback in callbacks {
            if let Err(error) = callback().await {
                warn!(%error, "reconnection callback failed");
            }
        }
    }

    /// Outcome of the most recent `restore_subscriptions_with_rebind`.
    pub fn last_restore(&self) -> Option<RestoreRecord> {
        self.state.last_restore.lock().clone()
    }
}

#[async_trait]
impl BrokerService for DevBroker {
    async fn connect(&self) -> Result<(), MessagingError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MessagingError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn connection_status(&self) -> ConnectionStatus {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    async fn send_message(
        &self,
        destination: &str,
        payload: Vec<u8>,
        user_properties: Option<Map<String, Value>>,
        user_context: Option<SendContext>,
    ) -> Result<(), MessagingError> {
        let message = BrokerMessage {
            payload,
            topic: destination.to_string(),
            user_properties: user_properties.unwrap_or_default(),
            delivery_tag: None,
        };

        // Snapshot the matching queues under the lock, deliver outside it
        let matching: Vec<Arc<DevQueue>> = {
            let subscriptions = self.state.subscriptions.lock();
            let queues = self.state.queues.lock();
            subscriptions
                .iter()
                .filter(|(_, regexes)| {
                    regexes
                        .iter()
                        .any(|regex| topic_matches(regex, destination))
                })
                .filter_map(|(queue_name, _)| queues.get(queue_name).map(Arc::clone))
                .collect()
        };

        if matching.is_empty() {
            debug!(topic = destination, "no matching subscription; message dropped");
        }
        for queue in matching {
            if queue.sender.try_send(message.clone()).is_err() {
                warn!(topic = destination, "dev broker queue full; message dropped");
            }
        }

        if let Some(context) = user_context {
            if let Some(callback) = &context.callback {
                callback(&context.data);
            }
        }
        Ok(())
    }

    async fn receive_message(
        &self,
        timeout_ms: u64,
        queue_name: &str,
    ) -> Result<Option<BrokerMessage>, MessagingError> {
        let queue = self.state.ensure_queue(queue_name);
        let received = timeout(Duration::from_millis(timeout_ms), async {
            queue.receiver.lock().await.recv().await
        })
        .await;
        match received {
            Ok(message) => Ok(message),
            Err(_) => Ok(None),
        }
    }

    async fn ack_message(&self, _message: &BrokerMessage) -> Result<(), MessagingError> {
        // Settlement is a no-op for the in-memory broker
        Ok(())
    }

    async fn nack_message(
        &self,
        _message: &BrokerMessage,
        _outcome: NackOutcome,
    ) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn add_topic_subscription(&self, topic: &str) -> Result<bool, MessagingError> {
        let queue_name = self.config.queue_name.clone().ok_or_else(|| {
            MessagingError::InvalidConfig("broker has no queue_name to subscribe".to_string())
        })?;
        self.add_topic_to_queue(topic, &queue_name).await
    }

    async fn add_topic_to_queue(
        &self,
        topic: &str,
        queue_name: &str,
    ) -> Result<bool, MessagingError> {
        self.state.ensure_queue(queue_name);
        self.state
            .subscriptions
            .lock()
            .entry(queue_name.to_string())
            .or_default()
            .insert(subscription_to_regex(topic));
        Ok(true)
    }

    async fn remove_topic_from_queue(
        &self,
        topic: &str,
        queue_name: &str,
    ) -> Result<bool, MessagingError> {
        let regex = subscription_to_regex(topic);
        let mut subscriptions = self.state.subscriptions.lock();
        Ok(subscriptions
            .get_mut(queue_name)
            .map(|bindings| bindings.remove(&regex))
            .unwrap_or(false))
    }

    fn register_reconnection_callback(&self, callback: ReconnectionCallback) {
        self.state.reconnection_callbacks.lock().push(callback);
    }

    async fn restore_subscriptions_with_rebind(
        &self,
        subscriptions: &HashSet<String>,
        queue_name: &str,
        temporary: bool,
    ) -> Result<(usize, usize), MessagingError> {
        if temporary {
            // A temporary queue did not survive the reconnect
            self.state.rebind_queue(queue_name);
        }

        let mut restored = 0;
        let mut failed = 0;
        for subscription in subscriptions {
            match self.add_topic_to_queue(subscription, queue_name).await {
                Ok(_) => restored += 1,
                Err(error) => {
                    warn!(%error, %subscription, "failed to restore subscription");
                    failed += 1;
                }
            }
        }

        *self.state.last_restore.lock() = Some(RestoreRecord {
            queue_name: queue_name.to_string(),
            temporary,
            restored,
            failed,
        });
        Ok((restored, failed))
    }
}
