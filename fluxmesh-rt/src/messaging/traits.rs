//! The broker capability trait implemented by every messaging driver.

// Layer 1: Standard library imports
use std::collections::HashSet;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::error::MessagingError;
use super::types::{BrokerMessage, ConnectionStatus, ReconnectionCallback, SendContext};
use crate::message::NackOutcome;

/// Capability set every messaging service must provide.
///
/// Implementations are thread-safe: a single broker instance may back
/// multiple components and flows concurrently.
#[async_trait]
pub trait BrokerService: Send + Sync {
    /// Establish the connection. Idempotent.
    async fn connect(&self) -> Result<(), MessagingError>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self) -> Result<(), MessagingError>;

    /// Current connection state.
    fn connection_status(&self) -> ConnectionStatus;

    /// Publish `payload` on `destination`.
    ///
    /// When `user_context` carries a callback, the driver invokes it once
    /// the send has completed.
    async fn send_message(
        &self,
        destination: &str,
        payload: Vec<u8>,
        user_properties: Option<Map<String, Value>>,
        user_context: Option<SendContext>,
    ) -> Result<(), MessagingError>;

    /// Blocking receive from `queue_name`, bounded by `timeout_ms`.
    ///
    /// Returns `None` on timeout.
    async fn receive_message(
        &self,
        timeout_ms: u64,
        queue_name: &str,
    ) -> Result<Option<BrokerMessage>, MessagingError>;

    /// Positively settle a received message.
    async fn ack_message(&self, message: &BrokerMessage) -> Result<(), MessagingError>;

    /// Negatively settle a received message.
    async fn nack_message(
        &self,
        message: &BrokerMessage,
        outcome: NackOutcome,
    ) -> Result<(), MessagingError>;

    /// Subscribe the service's own queue to `topic`.
    async fn add_topic_subscription(&self, topic: &str) -> Result<bool, MessagingError>;

    /// Bind `topic` to a specific queue.
    async fn add_topic_to_queue(
        &self,
        topic: &str,
        queue_name: &str,
    ) -> Result<bool, MessagingError>;

    /// Remove a topic binding from a queue. Returns `false` when the
    /// binding did not exist.
    async fn remove_topic_from_queue(
        &self,
        topic: &str,
        queue_name: &str,
    ) -> Result<bool, MessagingError>;

    /// Register a callback invoked after reconnection.
    fn register_reconnection_callback(&self, callback: ReconnectionCallback);

    /// Re-bind a queue and re-add `subscriptions` after a reconnect.
    ///
    /// Returns `(restored, failed)` counts. Must be idempotent.
    async fn restore_subscriptions_with_rebind(
        &self,
        subscriptions: &HashSet<String>,
        queue_name: &str,
        temporary: bool,
    ) -> Result<(usize, usize), MessagingError>;
}
