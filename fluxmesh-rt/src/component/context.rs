//! Per-instance runtime context handed to components.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

// Layer 3: Internal module imports
use super::error::ComponentError;
use crate::expression::Evaluator;
use crate::message::{Event, Message, NackOutcome};
use crate::rrc::{RequestOptions, RequestOutcome, RequestResponseController, RrcError, SessionManager};
use crate::util::ComponentIdentity;

/// Where a component group's output goes.
#[derive(Clone)]
pub enum OutputTarget {
    /// The next component group's input queue (or a test sink)
    Queue(mpsc::Sender<Event>),
    /// End of the line: the message is considered handled and acked
    Drop,
}

/// Routes error messages to the configured error flow, falling back to
/// the connector's error queue. Cheap to clone.
#[derive(Clone)]
pub struct ErrorReporter {
    error_flow: Arc<RwLock<Option<mpsc::Sender<Event>>>>,
    error_queue: mpsc::UnboundedSender<Event>,
}

impl ErrorReporter {
    pub fn new(error_queue: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            error_flow: Arc::new(RwLock::new(None)),
            error_queue,
        }
    }

    /// Redirect subsequent errors into an error flow's input queue.
    pub fn set_error_flow(&self, sender: mpsc::Sender<Event>) {
        *self.error_flow.write() = Some(sender);
    }

    /// Wrap a failure into an error message and dispatch it.
    pub fn report(
        &self,
        identity: &ComponentIdentity,
        error_text: &str,
        error_kind: &str,
        original: &Message,
    ) {
        let mut payload = Map::new();
        payload.insert("location".to_string(), identity.location());
        let mut error_block = Map::new();
        error_block.insert("text".to_string(), Value::String(error_text.to_string()));
        error_block.insert("exception".to_string(), Value::String(error_kind.to_string()));
        payload.insert("error".to_string(), Value::Object(error_block));
        payload.insert("message".to_string(), original.summary());

        let event = Event::Message(Message::new(Value::Object(payload)));
        let flow = self.error_flow.read().clone();
        match flow {
            Some(sender) => {
                if sender.try_send(event).is_err() {
                    warn!("error flow queue full; error dropped");
                }
            }
            None => {
                if self.error_queue.send(event).is_err() {
                    error!("connector error queue closed; error dropped");
                }
            }
        }
    }
}

/// Identity, configuration, routing, and services for one component
/// instance. Shared with the worker as an `Arc`.
pub struct ComponentContext {
    identity: ComponentIdentity,
    evaluator: Evaluator,
    component_config: Value,
    flow_config: Value,
    app_config: Value,
    next: Arc<RwLock<OutputTarget>>,
    errors: ErrorReporter,
    cancel: CancellationToken,
    request_response: Option<Arc<RequestResponseController>>,
    sessions: Option<Arc<SessionManager>>,
}

impl ComponentContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        identity: ComponentIdentity,
        evaluator: Evaluator,
        component_config: Value,
        flow_config: Value,
        app_config: Value,
        next: Arc<RwLock<OutputTarget>>,
        errors: ErrorReporter,
        cancel: CancellationToken,
        request_response: Option<Arc<RequestResponseController>>,
        sessions: Option<Arc<SessionManager>>,
    ) -> Self {
        Self {
            identity,
            evaluator,
            component_config,
            flow_config,
            app_config,
            next,
            errors,
            cancel,
            request_response,
            sessions,
        }
    }

    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Configuration lookup with precedence component > app > flow.
    pub fn get_config(&self, key: &str) -> Option<Value> {
        for layer in [&self.component_config, &self.app_config, &self.flow_config] {
            if let Some(value) = layer.get(key) {
                return Some(value.clone());
            }
        }
        None
    }

    /// Configuration lookup with a default.
    pub fn get_config_or(&self, key: &str, default: Value) -> Value {
        self.get_config(key).unwrap_or(default)
    }

    /// Configuration lookup that evaluates dynamic values (invoke
    /// descriptors and `evaluate_expression(...)` strings) against the
    /// current message.
    pub fn resolve_config(
        &self,
        key: &str,
        message: &Message,
    ) -> Result<Option<Value>, ComponentError> {
        match self.get_config(key) {
            Some(value) => Ok(Some(self.evaluator.resolve_config_value(
                &value,
                message,
                Some(&self.identity),
            )?)),
            None => Ok(None),
        }
    }

    /// Forward a message to the component's output target.
    ///
    /// With no downstream target the message has reached the end of its
    /// flow and is acknowledged.
    pub async fn emit(&self, message: Message) {
        let target = self.next.read().clone();
        match target {
            OutputTarget::Queue(sender) => {
                if let Err(returned) = sender.send(Event::Message(message)).await {
                    if let Event::Message(message) = returned.0 {
                        warn!("downstream queue closed; message nacked");
                        message.call_negative_acknowledgements(NackOutcome::Failed);
                    }
                }
            }
            OutputTarget::Drop => message.call_acknowledgements(),
        }
    }

    /// Dispatch a failure as an error message.
    pub fn report_error(&self, error: &ComponentError, original: &Message) {
        self.errors
            .report(&self.identity, &error.to_string(), error.kind(), original);
    }

    /// Component-level request/response controller, when configured.
    pub fn request_response(&self) -> Option<&Arc<RequestResponseController>> {
        self.request_response.as_ref()
    }

    /// Session manager, when `multi_session_request_response` is enabled.
    pub fn sessions(&self) -> Option<&Arc<SessionManager>> {
        self.sessions.as_ref()
    }

    /// Publish a request and wait for its reply, routing through the
    /// named session or the component-level controller.
    pub async fn do_broker_request_response(
        &self,
        message: &Message,
        options: RequestOptions,
        session_id: Option<&str>,
    ) -> Result<RequestOutcome, RrcError> {
        match (session_id, &self.sessions, &self.request_response) {
            (Some(id), Some(sessions), _) => sessions.request(id, message, options).await,
            (Some(id), None, _) => Err(RrcError::SessionNotFound(id.to_string())),
            (None, _, Some(controller)) => controller.request(message, options).await,
            (None, Some(sessions), None) => sessions.request_default(message, options).await,
            (None, None, None) => Err(RrcError::InvalidConfig(
                "component has no request/response configuration".to_string(),
            )),
        }
    }
}
