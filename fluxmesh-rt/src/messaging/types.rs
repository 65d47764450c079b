//! Shared messaging types: broker configuration, wire messages, and
//! subscription pattern translation.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::error::MessagingError;

/// Connection state reported by [`BrokerService::connection_status`](super::BrokerService::connection_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Reconnecting,
    Connected,
}

/// Callback invoked after the broker re-establishes a lost connection.
pub type ReconnectionCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), MessagingError>> + Send + Sync>;

/// Caller-supplied context attached to a publish.
///
/// When `callback` is present the broker invokes it with `data` once the
/// send has completed.
#[derive(Clone, Default)]
pub struct SendContext {
    pub data: Value,
    pub callback: Option<Arc<dyn Fn(&Value) + Send + Sync>>,
}

impl fmt::Debug for SendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendContext")
            .field("data", &self.data)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A message as received from the broker, before payload decoding.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Topic the message was published on
    pub topic: String,
    /// User properties carried alongside the payload
    pub user_properties: Map<String, Value>,
    /// Opaque handle for ack/nack settlement
    pub delivery_tag: Option<u64>,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

/// The `broker` configuration block.
///
/// Unknown keys are ignored so driver-specific settings can travel in the
/// same mapping.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BrokerConfig {
    #[serde(default)]
    pub broker_type: Option<String>,
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub broker_url: Option<String>,
    #[serde(default)]
    pub broker_username: Option<String>,
    #[serde(default)]
    pub broker_password: Option<String>,
    #[serde(default)]
    pub broker_vpn: Option<String>,
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub temporary_queue: bool,
    #[serde(default = "default_true")]
    pub create_queue_on_start: bool,
    #[serde(default)]
    pub input_enabled: bool,
    #[serde(default)]
    pub output_enabled: bool,
    #[serde(default)]
    pub request_reply_enabled: bool,
    #[serde(default)]
    pub payload_format: Option<String>,
    #[serde(default = "default_encoding")]
    pub payload_encoding: String,
    #[serde(default)]
    pub dev_mode: Option<Value>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// One topic subscription.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    #[serde(default)]
    pub qos: Option<u8>,
}

impl BrokerConfig {
    /// Parse the `broker` block out of a configuration value.
    pub fn from_value(value: &Value) -> Result<Self, MessagingError> {
        serde_json::from_value(value.clone())
            .map_err(|e| MessagingError::InvalidConfig(e.to_string()))
    }

    /// Identity under which dev brokers share state.
    pub fn identity(&self) -> String {
        self.broker_name
            .clone()
            .unwrap_or_else(|| "dev_broker".to_string())
    }

    /// Whether this configuration selects the in-process dev broker.
    pub fn wants_dev_broker(&self) -> bool {
        if self.broker_type.as_deref() == Some("dev_broker") {
            return true;
        }
        match &self.dev_mode {
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Translate a subscription pattern into an anchored regex string.
///
/// `*` matches exactly one topic level; a trailing `>` matches one or more
/// trailing levels.
pub fn subscription_to_regex(subscription: &str) -> String {
    let mut parts = Vec::new();
    let segments: Vec<&str> = subscription.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (position, segment) in segments.iter().enumerate() {
        let part = match *segment {
            "*" => "[^/]+".to_string(),
            ">" if position == last => ".*".to_string(),
            literal => regex::escape(literal),
        };
        parts.push(part);
    }
    parts.join("/")
}

/// Whether a topic matches a translated subscription regex.
pub fn topic_matches(regex_text: &str, topic: &str) -> bool {
    regex::Regex::new(&format!("^{regex_text}$"))
        .map(|r| r.is_match(topic))
        .unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_to_regex() {
        assert_eq!(subscription_to_regex("test/topic"), "test/topic");
        assert_eq!(subscription_to_regex("test/*"), "test/[^/]+");
        assert_eq!(subscription_to_regex("test/>"), "test/.*");
        assert_eq!(subscription_to_regex("a/*/c"), "a/[^/]+/c");
    }

    #[test]
    fn test_single_level_wildcard_matching() {
        let regex = subscription_to_regex("a/*/c");
        assert!(topic_matches(&regex, "a/b/c"));
        assert!(topic_matches(&regex, "a/anything/c"));
        assert!(!topic_matches(&regex, "a/b/x/c"));
        assert!(!topic_matches(&regex, "a/c"));
        assert!(!topic_matches(&regex, "x/b/c"));
    }

    #[test]
    fn test_multi_level_wildcard_matching() {
        let regex = subscription_to_regex("a/>");
        assert!(topic_matches(&regex, "a/b"));
        assert!(topic_matches(&regex, "a/b/c/d"));
        assert!(!topic_matches(&regex, "a"));
        assert!(!topic_matches(&regex, "b/a"));
    }

    #[test]
    fn test_exact_match_requires_full_topic() {
        let regex = subscription_to_regex("test/topic");
        assert!(topic_matches(&regex, "test/topic"));
        assert!(!topic_matches(&regex, "test/topic/extra"));
        assert!(!topic_matches(&regex, "test/other"));
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let regex = subscription_to_regex("a.b/c");
        assert!(topic_matches(&regex, "a.b/c"));
        assert!(!topic_matches(&regex, "axb/c"));
    }

    #[test]
    fn test_broker_config_parsing() {
        let config = BrokerConfig::from_value(&json!({
            "broker_type": "dev_broker",
            "queue_name": "test_queue",
            "subscriptions": [{"topic": "test/topic"}],
            "extra_driver_setting": true,
        }))
        .unwrap();

        assert_eq!(config.broker_type.as_deref(), Some("dev_broker"));
        assert_eq!(config.queue_name.as_deref(), Some("test_queue"));
        assert_eq!(config.subscriptions.len(), 1);
        assert_eq!(config.payload_encoding, "utf-8");
        assert!(config.wants_dev_broker());
    }

    #[test]
    fn test_dev_mode_selects_dev_broker() {
        for dev_mode in [json!(true), json!("true"), json!("True")] {
            let config = BrokerConfig::from_value(&json!({
                "broker_type": "native",
                "dev_mode": dev_mode,
            }))
            .unwrap();
            assert!(config.wants_dev_broker());
        }

        let config =
            BrokerConfig::from_value(&json!({"broker_type": "native", "dev_mode": false}))
                .unwrap();
        assert!(!config.wants_dev_broker());
    }
}
