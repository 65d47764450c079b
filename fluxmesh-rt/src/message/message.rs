// Layer 1: Standard library imports
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::ack::{AckCallback, NackCallback, NackOutcome};

/// Current element binding while a map/filter/reduce transform iterates.
#[derive(Debug, Clone)]
pub struct IterationFrame {
    /// The element under iteration
    pub item: Value,
    /// Zero-based position of the element
    pub index: usize,
}

/// The unit of traversal through a flow.
///
/// A message carries the decoded broker payload, the topic it arrived on,
/// user properties, the output of the most recent component (`previous`),
/// and scratch namespaces written by transforms (`user_data`) and by the
/// framework itself (`private_data`).
///
/// # Acknowledgements
///
/// Components along a flow may register deferred ack and nack callbacks.
/// Callbacks are appended while the message traverses multiple component
/// groups, so the lists are guarded internally; callers never need an
/// external lock. Acks fire in reverse registration order. Once any nack
/// has fired, later ack calls are suppressed.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::message::Message;
/// use serde_json::json;
///
/// let mut message = Message::new(json!({"text": "Hello, World!"}))
///     .with_topic("demo/topic");
/// message.set_previous(json!("Hello, World!"));
///
/// assert_eq!(message.topic(), Some("demo/topic"));
/// assert_eq!(message.previous(), Some(&json!("Hello, World!")));
/// ```
pub struct Message {
    payload: Value,
    topic: Option<String>,
    user_properties: Map<String, Value>,
    previous: Option<Value>,
    user_data: Map<String, Value>,
    private_data: Map<String, Value>,
    iteration: Option<IterationFrame>,
    reduce_frame: Option<(Value, Value)>,
    acks: Mutex<Vec<AckCallback>>,
    nacks: Mutex<Vec<NackCallback>>,
    nacked: AtomicBool,
}

impl Message {
    /// Create a message carrying `payload` and nothing else.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            topic: None,
            user_properties: Map::new(),
            previous: None,
            user_data: Map::new(),
            private_data: Map::new(),
            iteration: None,
            reduce_frame: None,
            acks: Mutex::new(Vec::new()),
            nacks: Mutex::new(Vec::new()),
            nacked: AtomicBool::new(false),
        }
    }

    /// Builder method: set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Builder method: set the user properties.
    pub fn with_user_properties(mut self, user_properties: Map<String, Value>) -> Self {
        self.user_properties = user_properties;
        self
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = Some(topic.into());
    }

    /// The topic split into its `/`-separated levels.
    pub fn topic_levels(&self) -> Vec<String> {
        self.topic
            .as_deref()
            .map(|t| t.split('/').map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn user_properties(&self) -> &Map<String, Value> {
        &self.user_properties
    }

    pub fn user_properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.user_properties
    }

    pub fn set_user_properties(&mut self, user_properties: Map<String, Value>) {
        self.user_properties = user_properties;
    }

    /// Output of the most recent component, if any.
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    pub fn set_previous(&mut self, previous: Value) {
        self.previous = Some(previous);
    }

    pub fn user_data(&self) -> &Map<String, Value> {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.user_data
    }

    pub fn private_data(&self) -> &Map<String, Value> {
        &self.private_data
    }

    pub fn private_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.private_data
    }

    /// Current map-transform binding, if a transform is iterating.
    pub fn iteration(&self) -> Option<&IterationFrame> {
        self.iteration.as_ref()
    }

    pub fn set_iteration(&mut self, frame: Option<IterationFrame>) {
        self.iteration = frame;
    }

    /// Current reduce bindings `(accumulated_value, current_value)`.
    pub fn reduce_frame(&self) -> Option<&(Value, Value)> {
        self.reduce_frame.as_ref()
    }

    pub fn set_reduce_frame(&mut self, frame: Option<(Value, Value)>) {
        self.reduce_frame = frame;
    }

    /// Register a callback fired when the message is acknowledged.
    pub fn add_acknowledgement(&self, callback: AckCallback) {
        self.acks.lock().push(callback);
    }

    /// Register a callback fired when the message is negatively
    /// acknowledged.
    pub fn add_negative_acknowledgement(&self, callback: NackCallback) {
        self.nacks.lock().push(callback);
    }

    /// Fire all registered acknowledgements, most recent first.
    ///
    /// A no-op once any nack has fired.
    pub fn call_acknowledgements(&self) {
        if self.nacked.load(Ordering::SeqCst) {
            return;
        }
        let mut callbacks = std::mem::take(&mut *self.acks.lock());
        while let Some(callback) = callbacks.pop() {
            callback();
        }
    }

    /// Fire all registered negative acknowledgements with `outcome`, most
    /// recent first, and suppress any later ack attempt.
    pub fn call_negative_acknowledgements(&self, outcome: NackOutcome) {
        self.nacked.store(true, Ordering::SeqCst);
        let mut callbacks = std::mem::take(&mut *self.nacks.lock());
        while let Some(callback) = callbacks.pop() {
            callback(outcome);
        }
    }

    /// Whether a nack has already fired for this message.
    pub fn is_nacked(&self) -> bool {
        self.nacked.load(Ordering::SeqCst)
    }

    /// Snapshot of the externally visible fields, used when a message is
    /// embedded in an error payload.
    pub fn summary(&self) -> Value {
        let mut map = Map::new();
        map.insert("payload".to_string(), self.payload.clone());
        map.insert(
            "topic".to_string(),
            self.topic
                .as_deref()
                .map(|t| Value::String(t.to_string()))
                .unwrap_or(Value::Null),
        );
        map.insert(
            "user_properties".to_string(),
            Value::Object(self.user_properties.clone()),
        );
        Value::Object(map)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("payload", &self.payload)
            .field("topic", &self.topic)
            .field("user_properties", &self.user_properties)
            .field("previous", &self.previous)
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let message = Message::new(json!("simple payload"));

        assert_eq!(message.payload(), &json!("simple payload"));
        assert_eq!(message.topic(), None);
        assert!(message.user_properties().is_empty());
        assert!(message.previous().is_none());
    }

    #[test]
    fn test_builder_topic_and_properties() {
        let mut props = Map::new();
        props.insert("key1".to_string(), json!("value1"));

        let message = Message::new(json!(1))
            .with_topic("a/valid/topic")
            .with_user_properties(props.clone());

        assert_eq!(message.topic(), Some("a/valid/topic"));
        assert_eq!(message.user_properties(), &props);
    }

    #[test]
    fn test_topic_levels() {
        let message = Message::new(json!(null)).with_topic("a/b/c");
        assert_eq!(message.topic_levels(), vec!["a", "b", "c"]);

        let no_topic = Message::new(json!(null));
        assert!(no_topic.topic_levels().is_empty());
    }

    #[test]
    fn test_previous_roundtrip() {
        let mut message = Message::new(json!("p"));
        assert!(message.previous().is_none());

        message.set_previous(json!({"key": "value"}));
        assert_eq!(message.previous(), Some(&json!({"key": "value"})));
    }

    #[test]
    fn test_acks_fire_in_reverse_order() {
        let message = Message::new(json!(null));
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in [1, 2, 3] {
            let order = Arc::clone(&order);
            message.add_acknowledgement(Box::new(move || order.lock().push(label)));
        }

        message.call_acknowledgements();
        assert_eq!(*order.lock(), vec![3, 2, 1]);
    }

    #[test]
    fn test_acks_fire_once() {
        let message = Message::new(json!(null));
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        message.add_acknowledgement(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        message.call_acknowledgements();
        message.call_acknowledgements();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nack_suppresses_later_acks() {
        let message = Message::new(json!(null));
        let acked = Arc::new(AtomicBool::new(false));
        let nack_outcome = Arc::new(Mutex::new(None));

        let acked_flag = Arc::clone(&acked);
        message.add_acknowledgement(Box::new(move || {
            acked_flag.store(true, Ordering::SeqCst);
        }));
        let outcome_slot = Arc::clone(&nack_outcome);
        message.add_negative_acknowledgement(Box::new(move |outcome| {
            *outcome_slot.lock() = Some(outcome);
        }));

        message.call_negative_acknowledgements(NackOutcome::Rejected);
        message.call_acknowledgements();

        assert!(!acked.load(Ordering::SeqCst));
        assert_eq!(*nack_outcome.lock(), Some(NackOutcome::Rejected));
        assert!(message.is_nacked());
    }

    #[test]
    fn test_summary_shape() {
        let mut props = Map::new();
        props.insert("k".to_string(), json!("v"));
        let message = Message::new(json!({"text": "Hello, World!"}))
            .with_topic("t/1")
            .with_user_properties(props);

        assert_eq!(
            message.summary(),
            json!({
                "payload": {"text": "Hello, World!"},
                "topic": "t/1",
                "user_properties": {"k": "v"},
            })
        );
    }
}
