//! The connector: owns apps, shared services, error routing, and the
//! stop signal.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// Layer 3: Internal module imports
use super::error::ConnectorError;
use crate::app::{App, AppBuildParams};
use crate::cache::CacheService;
use crate::component::{ComponentRegistry, ErrorReporter};
use crate::expression::Evaluator;
use crate::flow::Flow;
use crate::logging;
use crate::message::{Event, Message};
use crate::messaging::MessagingServiceBuilder;
use crate::storage::{self, Storage};
use crate::timer::TimerManager;

/// Default grace window per worker during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const DEFAULT_INSTANCE_NAME: &str = "fluxmesh";

/// Builder for [`Connector`] with injectable services.
///
/// # Example
///
/// ```rust,ignore
/// let connector = Connector::builder()
///     .with_registry(my_registry)
///     .build(&config)
///     .await?;
/// connector.run();
/// ```
pub struct ConnectorBuilder {
    registry: ComponentRegistry,
    messaging: MessagingServiceBuilder,
    evaluator: Evaluator,
    shutdown_grace: Duration,
}

impl ConnectorBuilder {
    /// Use a custom component registry (user components included).
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a custom messaging builder (driver registrations, shared
    /// store).
    pub fn with_messaging(mut self, messaging: MessagingServiceBuilder) -> Self {
        self.messaging = messaging;
        self
    }

    /// Use a custom evaluator (extra invoke modules).
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Per-worker join timeout during shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Parse the configuration and construct every app and flow.
    pub async fn build(self, config: &Value) -> Result<Connector, ConnectorError> {
        logging::init(config.get("log"));

        let instance_name = config
            .get("instance_name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_INSTANCE_NAME)
            .to_string();

        let cancel = CancellationToken::new();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let errors = ErrorReporter::new(error_tx);

        // Legacy form: a bare top-level `flows` list becomes one default
        // app
        let app_infos: Vec<Value> = match config.get("apps").and_then(Value::as_array) {
            Some(apps) if !apps.is_empty() => apps.clone(),
            _ => match config.get("flows") {
                Some(flows @ Value::Array(_)) => {
                    vec![json!({"name": "default_app", "flows": flows.clone()})]
                }
                _ => {
                    return Err(ConnectorError::Config(
                        "configuration needs apps or flows".to_string(),
                    ))
                }
            },
        };

        let mut apps = Vec::new();
        for app_info in &app_infos {
            let num_instances = app_info
                .get("num_instances")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .max(1);
            for app_index in 0..num_instances {
                let mut instance_info = app_info.clone();
                if num_instances > 1 {
                    let base = instance_info
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("app")
                        .to_string();
                    if let Some(mapping) = instance_info.as_object_mut() {
                        mapping.insert("name".to_string(), json!(format!("{base}_{app_index}")));
                    }
                }
                let params = AppBuildParams {
                    instance_name: &instance_name,
                    evaluator: &self.evaluator,
                    registry: &self.registry,
                    messaging: &self.messaging,
                    errors: &errors,
                    cancel: &cancel,
                };
                apps.push(App::build(&instance_info, None, &params).await?);
            }
        }

        let mut storages: HashMap<String, Arc<dyn Storage>> = HashMap::new();
        if let Some(entries) = config.get("storage").and_then(Value::as_array) {
            for entry in entries {
                let (name, backend) = storage::from_config(entry)?;
                storages.insert(name, backend);
            }
        }

        let timers = TimerManager::new(cancel.child_token());
        let cache = CacheService::start(cancel.child_token());
        let (stopped_tx, stopped_rx) = watch::channel(false);

        Ok(Connector {
            instance_name,
            apps,
            registry: self.registry,
            messaging: self.messaging,
            evaluator: self.evaluator,
            errors,
            error_rx: tokio::sync::Mutex::new(error_rx),
            cancel,
            timers,
            cache,
            storages,
            shutdown_grace: self.shutdown_grace,
            stopped_tx,
            stopped_rx,
        })
    }
}

/// Top-level lifecycle owner.
///
/// Parses configuration, instantiates apps, runs their flows, collects
/// errors, and stops cleanly.
pub struct Connector {
    instance_name: String,
    apps: Vec<App>,
    registry: ComponentRegistry,
    messaging: MessagingServiceBuilder,
    evaluator: Evaluator,
    errors: ErrorReporter,
    error_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Event>>,
    cancel: CancellationToken,
    timers: TimerManager,
    cache: CacheService,
    storages: HashMap<String, Arc<dyn Storage>>,
    shutdown_grace: Duration,
    stopped_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
}

impl Connector {
    /// Create a builder with default services.
    pub fn builder() -> ConnectorBuilder {
        let messaging = MessagingServiceBuilder::new();
        ConnectorBuilder {
            registry: ComponentRegistry::with_builtins(),
            messaging,
            evaluator: Evaluator::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Build a connector from configuration with default services.
    pub async fn new(config: &Value) -> Result<Self, ConnectorError> {
        Self::builder().build(config).await
    }

    /// Start every flow and wire error routing.
    ///
    /// A flow whose first component is `error_input` becomes the error
    /// handler; otherwise errors accumulate on the connector's error
    /// queue for programmatic retrieval.
    pub fn run(&self) {
        if let Some(error_flow) = self.flows().find(|flow| flow.is_error_flow()) {
            if let Some(sender) = error_flow.input_sender() {
                debug!(flow = error_flow.name(), "error flow wired");
                self.errors.set_error_flow(sender);
            }
        }
        for app in &self.apps {
            app.start();
        }
        info!(instance = %self.instance_name, "connector running");
    }

    /// Two-phase stop: signal, then join every worker within the grace
    /// window.
    pub async fn stop(&self) {
        self.cancel.cancel();
        for app in &self.apps {
            app.stop(self.shutdown_grace).await;
        }
        let _ = self.stopped_tx.send(true);
        info!(instance = %self.instance_name, "connector stopped");
    }

    /// Block until `stop` has completed.
    pub async fn wait_for_flows(&self) {
        let mut stopped = self.stopped_rx.clone();
        while !*stopped.borrow() {
            if stopped.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    /// All flows across every app.
    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.apps.iter().flat_map(App::flows)
    }

    /// Find a flow by name.
    pub fn flow(&self, name: &str) -> Option<&Flow> {
        self.flows().find(|flow| flow.name() == name)
    }

    /// Inject a message into a named flow's input queue.
    pub async fn send_message_to_flow(
        &self,
        flow_name: &str,
        message: Message,
    ) -> Result<(), ConnectorError> {
        let flow = self
            .flow(flow_name)
            .ok_or_else(|| ConnectorError::UnknownFlow(flow_name.to_string()))?;
        let sender = flow
            .input_sender()
            .ok_or_else(|| ConnectorError::UnknownFlow(flow_name.to_string()))?;
        sender
            .send(Event::Message(message))
            .await
            .map_err(|_| ConnectorError::Config(format!("flow {flow_name} is not accepting input")))
    }

    /// Pull the next error message off the connector error queue.
    pub async fn next_error(&self, timeout: Duration) -> Option<Message> {
        let mut receiver = self.error_rx.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(Event::Message(message))) => Some(message),
            _ => None,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn messaging(&self) -> &MessagingServiceBuilder {
        &self.messaging
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// A named storage backend.
    pub fn storage(&self, name: &str) -> Option<Arc<dyn Storage>> {
        self.storages.get(name).cloned()
    }
}
