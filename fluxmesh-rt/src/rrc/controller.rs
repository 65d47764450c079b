//! The per-component request/response controller.

// Layer 1: Standard library imports
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::error::RrcError;
use crate::expression::{Evaluator, Expression};
use crate::message::Message;
use crate::messaging::{BrokerService, MessagingServiceBuilder};
use crate::util::encoding::{decode_payload, encode_payload, PayloadEncoding, PayloadFormat};
use crate::util::RequestId;

/// User-property key carrying the reply correlation metadata.
pub const DEFAULT_REPLY_METADATA_KEY: &str = "__fluxmesh_reply_metadata__";
/// User-property key carrying the reply topic.
pub const DEFAULT_REPLY_TOPIC_KEY: &str = "__fluxmesh_reply_topic__";

const DEFAULT_REQUEST_EXPIRY_MS: u64 = 60_000;
const RECEIVE_POLL_MS: u64 = 200;
const REAPER_INTERVAL_MS: u64 = 500;
const STREAM_BUFFER: usize = 32;

/// Per-request delivery events handed to waiting callers.
#[derive(Debug)]
pub enum RrcEvent {
    /// A reply chunk; `is_last` closes the stream
    Chunk { message: Message, is_last: bool },
    /// The per-request deadline expired
    Timeout,
}

/// Options for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Expect a stream of reply chunks instead of a single reply
    pub stream: bool,
    /// Expression deciding, per chunk, whether the stream is complete
    pub streaming_complete_expression: Option<String>,
    /// When false, publish and return immediately
    pub wait_for_response: bool,
    /// Per-request override of the configured expiry
    pub timeout_ms: Option<u64>,
}

impl RequestOptions {
    /// A blocking request/response exchange.
    pub fn synchronous() -> Self {
        Self {
            wait_for_response: true,
            ..Self::default()
        }
    }

    /// A streaming exchange completed by `complete_expression`.
    pub fn streaming(complete_expression: impl Into<String>) -> Self {
        Self {
            stream: true,
            streaming_complete_expression: Some(complete_expression.into()),
            wait_for_response: true,
            ..Self::default()
        }
    }
}

/// What a request call produced.
pub enum RequestOutcome {
    /// Fire-and-forget: the request was published
    Sent,
    /// The single synchronous response
    Response(Message),
    /// A stream of reply chunks terminated by `is_last` or timeout
    Stream(mpsc::Receiver<RrcEvent>),
}

impl RequestOutcome {
    /// The synchronous response, if this outcome carries one.
    pub fn into_response(self) -> Option<Message> {
        match self {
            Self::Response(message) => Some(message),
            _ => None,
        }
    }

    /// An async `Stream` view of a streaming outcome.
    pub fn into_stream(self) -> Option<tokio_stream::wrappers::ReceiverStream<RrcEvent>> {
        match self {
            Self::Stream(receiver) => {
                Some(tokio_stream::wrappers::ReceiverStream::new(receiver))
            }
            _ => None,
        }
    }
}

struct PendingRequest {
    sender: mpsc::Sender<RrcEvent>,
    deadline: DateTime<Utc>,
    streaming: bool,
    complete_expression: Option<Expression>,
}

/// A companion response-side flow for one host component or session.
///
/// Owns a transient reply topic, an internal broker input/output pair on
/// the host's broker identity, and the correlation table matching replies
/// to outstanding requests.
pub struct RequestResponseController {
    broker: Arc<dyn BrokerService>,
    reply_topic: String,
    reply_queue: String,
    metadata_key: String,
    reply_topic_key: String,
    request_expiry_ms: u64,
    payload_format: PayloadFormat,
    payload_encoding: PayloadEncoding,
    pending: DashMap<String, PendingRequest>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
}

fn config_str(config: &Value, key: &str, default: &str) -> String {
    config
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

impl RequestResponseController {
    /// Build a controller from a `broker_request_response`-style block.
    ///
    /// The block's `broker_config` mapping selects the broker; the reply
    /// queue and subscriptions are injected before the service is built so
    /// the reply topic is bound from the start.
    pub async fn start(
        config: &Value,
        messaging: &MessagingServiceBuilder,
    ) -> Result<Arc<Self>, RrcError> {
        let suffix = Uuid::new_v4().to_string();
        let topic_prefix = config_str(config, "response_topic_prefix", "reply");
        let queue_prefix = config_str(config, "response_queue_prefix", "reply-queue");
        let reply_topic = format!("{topic_prefix}/{suffix}");
        let reply_queue = format!("{queue_prefix}-{suffix}");

        let mut broker_config = config
            .get("broker_config")
            .cloned()
            .unwrap_or_else(|| json!({}));
        {
            let block = broker_config.as_object_mut().ok_or_else(|| {
                RrcError::InvalidConfig("broker_config must be a mapping".to_string())
            })?;
            block.insert("queue_name".to_string(), json!(reply_queue.clone()));
            block.insert(
                "subscriptions".to_string(),
                json!([
                    {"topic": reply_topic.clone()},
                    {"topic": format!("{reply_topic}/>")},
                ]),
            );
        }

        let payload_format = config
            .get("payload_format")
            .and_then(Value::as_str)
            .map(PayloadFormat::from_str)
            .transpose()
            .map_err(|e| RrcError::InvalidConfig(e.to_string()))?
            .unwrap_or_default();
        let payload_encoding = config
            .get("payload_encoding")
            .and_then(Value::as_str)
            .map(PayloadEncoding::from_str)
            .transpose()
            .map_err(|e| RrcError::InvalidConfig(e.to_string()))?
            .unwrap_or_default();

        let broker = messaging
            .clone()
            .from_properties(&broker_config)?
            .build()?;
        broker.connect().await?;

        let controller = Arc::new(Self {
            broker,
            reply_topic,
            reply_queue,
            metadata_key: config_str(config, "reply_metadata_key", DEFAULT_REPLY_METADATA_KEY),
            reply_topic_key: config_str(config, "reply_topic_key", DEFAULT_REPLY_TOPIC_KEY),
            request_expiry_ms: config
                .get("request_expiry_ms")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_REQUEST_EXPIRY_MS),
            payload_format,
            payload_encoding,
            pending: DashMap::new(),
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
        });

        tokio::spawn(Arc::clone(&controller).receive_loop());
        tokio::spawn(Arc::clone(&controller).reaper_loop());
        Ok(controller)
    }

    /// Number of requests currently awaiting replies.
    pub fn active_request_count(&self) -> usize {
        self.pending.len()
    }

    /// When this controller was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The transient reply topic replies must be published to.
    pub fn reply_topic(&self) -> &str {
        &self.reply_topic
    }

    /// Stop the receive and reaper tasks and disconnect the broker.
    pub async fn stop(&self) {
        self.cancel.cancel();
        for entry in self.pending.iter() {
            let _ = entry.value().sender.try_send(RrcEvent::Timeout);
        }
        self.pending.clear();
        if let Err(error) = self.broker.disconnect().await {
            warn!(%error, "failed to disconnect request/response broker");
        }
    }

    /// Publish `message` as a request and, depending on `options`, wait
    /// for its reply or replies.
    pub async fn request(
        &self,
        message: &Message,
        options: RequestOptions,
    ) -> Result<RequestOutcome, RrcError> {
        let request_id = RequestId::new();
        let topic = message
            .topic()
            .map(str::to_string)
            .unwrap_or_else(|| self.reply_topic.clone());

        // Inject reply metadata into the outgoing user properties
        let mut user_properties = message.user_properties().clone();
        user_properties.insert(
            self.metadata_key.clone(),
            json!([{"request_id": request_id.to_string(), "stream": options.stream}]),
        );
        user_properties.insert(self.reply_topic_key.clone(), json!(self.reply_topic));

        let payload = encode_payload(message.payload(), self.payload_format, self.payload_encoding)
            .map_err(crate::messaging::MessagingError::from)?;

        if !options.wait_for_response {
            self.broker
                .send_message(&topic, payload, Some(user_properties), None)
                .await?;
            return Ok(RequestOutcome::Sent);
        }

        let expiry_ms = options.timeout_ms.unwrap_or(self.request_expiry_ms);
        let complete_expression = options
            .streaming_complete_expression
            .as_deref()
            .map(Expression::parse)
            .transpose()
            .map_err(|e| RrcError::InvalidConfig(e.to_string()))?;

        let (sender, mut receiver) = mpsc::channel(STREAM_BUFFER);
        self.pending.insert(
            request_id.to_string(),
            PendingRequest {
                sender,
                deadline: Utc::now() + chrono::Duration::milliseconds(expiry_ms as i64),
                streaming: options.stream,
                complete_expression,
            },
        );

        if let Err(error) = self
            .broker
            .send_message(&topic, payload, Some(user_properties), None)
            .await
        {
            self.pending.remove(&request_id.to_string());
            return Err(error.into());
        }

        if options.stream {
            return Ok(RequestOutcome::Stream(receiver));
        }

        let waited = timeout(Duration::from_millis(expiry_ms), receiver.recv()).await;
        self.pending.remove(&request_id.to_string());
        match waited {
            Ok(Some(RrcEvent::Chunk { message, .. })) => Ok(RequestOutcome::Response(message)),
            Ok(Some(RrcEvent::Timeout)) | Err(_) => Err(RrcError::Timeout),
            Ok(None) => Err(RrcError::Closed),
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.broker.receive_message(RECEIVE_POLL_MS, &self.reply_queue) => received,
            };
            match received {
                Ok(Some(broker_message)) => self.deliver_reply(broker_message),
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, "request/response receive failed");
                }
            }
        }
    }

    fn deliver_reply(&self, broker_message: crate::messaging::BrokerMessage) {
        let mut user_properties = broker_message.user_properties.clone();
        let Some(metadata) = user_properties.remove(&self.metadata_key) else {
            warn!(
                topic = %broker_message.topic,
                "reply without correlation metadata; dropped"
            );
            return;
        };
        user_properties.remove(&self.reply_topic_key);

        let request_id = metadata
            .get(0)
            .and_then(|entry| entry.get("request_id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let Some(request_id) = request_id else {
            warn!("reply metadata without a request id; dropped");
            return;
        };

        // A decode failure still produces a defined delivery so callers
        // observe the error instead of a timeout
        let payload = match decode_payload(
            &broker_message.payload,
            self.payload_format,
            self.payload_encoding,
        ) {
            Ok(payload) => payload,
            Err(error) => json!({"error": error.to_string()}),
        };

        let mut message = Message::new(payload)
            .with_topic(broker_message.topic)
            .with_user_properties(user_properties);
        message.set_previous(message.payload().clone());

        let Some(entry) = self.pending.get(&request_id) else {
            debug!(%request_id, "reply for unknown or expired request; dropped");
            return;
        };

        let is_last = if entry.streaming {
            match &entry.complete_expression {
                Some(expression) => Evaluator::new()
                    .evaluate(expression, &message, None)
                    .map(|value| crate::expression::is_truthy(&value))
                    .unwrap_or(true),
                None => true,
            }
        } else {
            true
        };

        if entry
            .sender
            .try_send(RrcEvent::Chunk { message, is_last })
            .is_err()
        {
            warn!(%request_id, "reply receiver backlog full; chunk dropped");
        }
        drop(entry);

        if is_last {
            self.pending.remove(&request_id);
        }
    }

    async fn reaper_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(REAPER_INTERVAL_MS)) => {}
            }
            let now = Utc::now();
            let expired: Vec<String> = self
                .pending
                .iter()
                .filter(|entry| entry.value().deadline < now)
                .map(|entry| entry.key().clone())
                .collect();
            for request_id in expired {
                if let Some((_, record)) = self.pending.remove(&request_id) {
                    debug!(%request_id, "request expired");
                    let _ = record.sender.try_send(RrcEvent::Timeout);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::messaging::{MessagingServiceBuilder, SharedBrokerStore};
    use serde_json::json;

    fn messaging() -> MessagingServiceBuilder {
        MessagingServiceBuilder::with_store(SharedBrokerStore::new())
    }

    fn controller_config() -> Value {
        json!({
            "broker_config": {"broker_type": "dev_broker"},
            "request_expiry_ms": 2000,
        })
    }

    /// Echo task: receives the request off the dev broker and publishes it
    /// back to the advertised reply topic with the metadata intact.
    fn spawn_echo(messaging: &MessagingServiceBuilder, request_topic: &str) {
        let broker = messaging
            .clone()
            .from_properties(&json!({
                "broker_type": "dev_broker",
                "queue_name": "echo-queue",
                "subscriptions": [{"topic": request_topic}],
            }))
            .unwrap()
            .build()
            .unwrap();
        tokio::spawn(async move {
            broker.connect().await.unwrap();
            loop {
                match broker.receive_message(2000, "echo-queue").await {
                    Ok(Some(request)) => {
                        let reply_topic = request
                            .user_properties
                            .get(DEFAULT_REPLY_TOPIC_KEY)
                            .and_then(Value::as_str)
                            .unwrap()
                            .to_string();
                        broker
                            .send_message(
                                &reply_topic,
                                request.payload.clone(),
                                Some(request.user_properties.clone()),
                                None,
                            )
                            .await
                            .unwrap();
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
        });
    }

    #[tokio::test]
    async fn test_synchronous_roundtrip_strips_metadata() {
        let messaging = messaging();
        spawn_echo(&messaging, "request/topic");
        let controller = RequestResponseController::start(&controller_config(), &messaging)
            .await
            .unwrap();

        let message = Message::new(json!({"data": "A"})).with_topic("request/topic");
        let outcome = controller
            .request(&message, RequestOptions::synchronous())
            .await
            .unwrap();

        match outcome {
            RequestOutcome::Response(response) => {
                assert_eq!(response.payload(), &json!({"data": "A"}));
                assert!(!response
                    .user_properties()
                    .contains_key(DEFAULT_REPLY_METADATA_KEY));
                assert!(!response
                    .user_properties()
                    .contains_key(DEFAULT_REPLY_TOPIC_KEY));
            }
            _ => panic!("expected a synchronous response"),
        }
        assert_eq!(controller.active_request_count(), 0);
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_timeout_when_nobody_replies() {
        let messaging = messaging();
        let config = json!({
            "broker_config": {"broker_type": "dev_broker"},
            "request_expiry_ms": 100,
        });
        let controller = RequestResponseController::start(&config, &messaging)
            .await
            .unwrap();

        let message = Message::new(json!({"data": "A"})).with_topic("request/topic");
        let result = controller
            .request(&message, RequestOptions::synchronous())
            .await;
        assert!(matches!(result, Err(RrcError::Timeout)));
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_fire_and_forget_returns_immediately() {
        let messaging = messaging();
        let controller = RequestResponseController::start(&controller_config(), &messaging)
            .await
            .unwrap();

        let message = Message::new(json!({"data": "ff"})).with_topic("request/topic");
        let outcome = controller
            .request(
                &message,
                RequestOptions {
                    wait_for_response: false,
                    ..RequestOptions::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Sent));
        assert_eq!(controller.active_request_count(), 0);
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_request_ids_are_unique() {
        let ids: Vec<String> = (0..100).map(|_| RequestId::new().to_string()).collect();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn test_streaming_completes_on_expression() {
        let messaging = messaging();
        let controller = RequestResponseController::start(&controller_config(), &messaging)
            .await
            .unwrap();

        // Responder that sends three chunks, marking the third as last
        let responder = messaging
            .clone()
            .from_properties(&json!({
                "broker_type": "dev_broker",
                "queue_name": "stream-echo",
                "subscriptions": [{"topic": "stream/topic"}],
            }))
            .unwrap()
            .build()
            .unwrap();
        responder.connect().await.unwrap();
        tokio::spawn(async move {
            let request = responder
                .receive_message(2000, "stream-echo")
                .await
                .unwrap()
                .unwrap();
            let reply_topic = request
                .user_properties
                .get(DEFAULT_REPLY_TOPIC_KEY)
                .and_then(Value::as_str)
                .unwrap()
                .to_string();
            for chunk in 0..3u8 {
                let payload = json!({"chunk": chunk, "done": chunk == 2});
                responder
                    .send_message(
                        &reply_topic,
                        serde_json::to_vec(&payload).unwrap(),
                        Some(request.user_properties.clone()),
                        None,
                    )
                    .await
                    .unwrap();
            }
        });

        let message = Message::new(json!({"q": 1})).with_topic("stream/topic");
        let outcome = controller
            .request(&message, RequestOptions::streaming("input.payload:done"))
            .await
            .unwrap();

        let mut receiver = match outcome {
            RequestOutcome::Stream(receiver) => receiver,
            _ => panic!("expected a stream"),
        };

        let mut chunks = Vec::new();
        while let Some(event) = receiver.recv().await {
            match event {
                RrcEvent::Chunk { message, is_last } => {
                    chunks.push(message.payload().clone());
                    if is_last {
                        break;
                    }
                }
                RrcEvent::Timeout => panic!("unexpected timeout"),
            }
        }
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], json!({"chunk": 2, "done": true}));
        assert_eq!(controller.active_request_count(), 0);
        controller.stop().await;
    }
}
