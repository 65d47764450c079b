//! Session-scoped request/response correlators.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

// Layer 3: Internal module imports
use super::controller::{RequestOptions, RequestOutcome, RequestResponseController};
use super::error::RrcError;
use crate::message::Message;
use crate::messaging::MessagingServiceBuilder;
use crate::util::{deep_merge, SessionId};

const DEFAULT_MAX_SESSIONS: usize = 50;

/// Public shape of one session in `list_request_response_sessions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub active_request_count: usize,
    pub created_at: String,
}

/// Owns the session table of a component with
/// `multi_session_request_response` enabled.
///
/// Each session is an isolated [`RequestResponseController`] built from
/// the default broker configuration deep-merged with the session's
/// overrides. Session creation and destruction are serialized by a lock;
/// request dispatch for existing sessions is lock-free.
pub struct SessionManager {
    config: Value,
    max_sessions: usize,
    sessions: DashMap<String, Arc<RequestResponseController>>,
    creation: Mutex<()>,
    messaging: MessagingServiceBuilder,
}

impl SessionManager {
    /// Build a manager from a `multi_session_request_response` block.
    pub fn new(config: &Value, messaging: MessagingServiceBuilder) -> Result<Self, RrcError> {
        if !config
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(RrcError::InvalidConfig(
                "multi_session_request_response is not enabled".to_string(),
            ));
        }
        let max_sessions = config
            .get("max_sessions")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_SESSIONS as u64) as usize;
        Ok(Self {
            config: config.clone(),
            max_sessions,
            sessions: DashMap::new(),
            creation: Mutex::new(()),
            messaging,
        })
    }

    /// Create a session, optionally overriding parts of the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// [`RrcError::SessionLimitExceeded`] when the table is full.
    pub async fn create_session(
        &self,
        session_config: Option<Value>,
    ) -> Result<SessionId, RrcError> {
        // Creation is serialized so the limit check and the insert are
        // atomic with respect to other creators
        let _guard = self.creation.lock().await;
        if self.sessions.len() >= self.max_sessions {
            return Err(RrcError::SessionLimitExceeded {
                max: self.max_sessions,
            });
        }

        let default_config = json!({
            "broker_config": self.config.get("default_broker_config").cloned().unwrap_or(json!({})),
            "request_expiry_ms": self.config.get("request_expiry_ms").cloned().unwrap_or(Value::Null),
        });
        let controller_config = match session_config {
            Some(overrides) => deep_merge(default_config, overrides),
            None => default_config,
        };

        let controller =
            RequestResponseController::start(&controller_config, &self.messaging).await?;
        let session_id = SessionId::new();
        self.sessions
            .insert(session_id.to_string(), controller);
        debug!(session_id = %session_id, "created request/response session");
        Ok(session_id)
    }

    /// Destroy a session. Returns `false` when the id is unknown.
    pub async fn destroy_session(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, controller)) => {
                controller.stop().await;
                debug!(%session_id, "destroyed request/response session");
                true
            }
            None => false,
        }
    }

    /// Snapshot of the active sessions.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| SessionInfo {
                session_id: entry.key().clone(),
                active_request_count: entry.value().active_request_count(),
                created_at: entry.value().created_at().to_rfc3339(),
            })
            .collect()
    }

    /// Look up a session's controller.
    pub fn session(&self, session_id: &str) -> Result<Arc<RequestResponseController>, RrcError> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RrcError::SessionNotFound(session_id.to_string()))
    }

    /// Route a request through the named session.
    pub async fn request(
        &self,
        session_id: &str,
        message: &Message,
        options: RequestOptions,
    ) -> Result<RequestOutcome, RrcError> {
        let controller = self.session(session_id)?;
        controller.request(message, options).await
    }

    /// Sessionless dispatch: only valid when the host component also has a
    /// legacy component-level controller, which the caller checks first.
    pub async fn request_default(
        &self,
        _message: &Message,
        _options: RequestOptions,
    ) -> Result<RequestOutcome, RrcError> {
        Err(RrcError::InvalidConfig(
            "no session id given and no component-level request/response configured".to_string(),
        ))
    }

    /// Stop every session.
    pub async fn stop(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.destroy_session(&id).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::messaging::SharedBrokerStore;

    fn manager(max_sessions: Option<u64>) -> SessionManager {
        let mut config = json!({
            "enabled": true,
            "default_broker_config": {"broker_type": "dev_broker"},
        });
        if let Some(max) = max_sessions {
            config["max_sessions"] = json!(max);
        }
        SessionManager::new(
            &config,
            MessagingServiceBuilder::with_store(SharedBrokerStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_disabled_config_is_rejected() {
        let result = SessionManager::new(
            &json!({"enabled": false}),
            MessagingServiceBuilder::new(),
        );
        assert!(matches!(result, Err(RrcError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = manager(None);

        let session_a = manager.create_session(None).await.unwrap();
        let session_b = manager
            .create_session(Some(json!({"request_expiry_ms": 60000})))
            .await
            .unwrap();
        assert_ne!(session_a, session_b);

        let sessions = manager.list_sessions();
        assert_eq!(sessions.len(), 2);
        let ids: std::collections::HashSet<String> =
            sessions.iter().map(|s| s.session_id.clone()).collect();
        assert!(ids.contains(session_a.as_str()));
        assert!(ids.contains(session_b.as_str()));
        for session in &sessions {
            assert_eq!(session.active_request_count, 0);
        }

        assert!(manager.destroy_session(session_a.as_str()).await);
        assert_eq!(manager.list_sessions().len(), 1);
        assert!(!manager.destroy_session(session_a.as_str()).await);

        // Using a destroyed session fails
        let message = Message::new(json!({"data": "A"}));
        let result = manager
            .request(session_a.as_str(), &message, RequestOptions::synchronous())
            .await;
        assert!(matches!(result, Err(RrcError::SessionNotFound(_))));

        assert!(manager.destroy_session(session_b.as_str()).await);
        assert!(manager.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_session_limit() {
        let manager = manager(Some(2));
        manager.create_session(None).await.unwrap();
        manager.create_session(None).await.unwrap();
        let result = manager.create_session(None).await;
        assert!(matches!(
            result,
            Err(RrcError::SessionLimitExceeded { max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_lookup() {
        let manager = manager(None);
        assert!(matches!(
            manager.session("missing"),
            Err(RrcError::SessionNotFound(_))
        ));
    }
}
