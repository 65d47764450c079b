//! Worker-group execution for one configured component.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::config::ComponentConfig;
use super::context::{ComponentContext, ErrorReporter, OutputTarget};
use super::error::ComponentError;
use super::registry::ComponentRegistry;
use super::traits::{Component, ComponentBuildContext, ComponentFactory, InvokeResult};
use crate::expression::{Evaluator, SourceExpression};
use crate::message::{Event, Message, NackOutcome};
use crate::messaging::types::Subscription;
use crate::messaging::MessagingServiceBuilder;
use crate::rrc::{RequestResponseController, SessionManager};
use crate::transform::TransformPipeline;
use crate::util::ComponentIdentity;

/// Everything a group needs from its surrounding flow and app.
pub(crate) struct GroupBuildParams<'a> {
    pub instance_name: &'a str,
    pub flow_name: &'a str,
    pub evaluator: &'a Evaluator,
    pub registry: &'a ComponentRegistry,
    pub messaging: &'a MessagingServiceBuilder,
    pub app_broker: Option<&'a Value>,
    pub app_config: &'a Value,
    pub flow_config: &'a Value,
    pub errors: &'a ErrorReporter,
    pub cancel: &'a CancellationToken,
    /// Constructor used instead of the registry lookup (the flow builder
    /// uses this for synthesized stages like the subscription router)
    pub factory_override: Option<ComponentFactory>,
}

/// `num_instances` parallel workers sharing one bounded input queue.
pub struct ComponentGroup {
    name: String,
    input_tx: mpsc::Sender<Event>,
    input_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
    next: Arc<RwLock<OutputTarget>>,
    pipeline: Arc<TransformPipeline>,
    input_selection: Option<SourceExpression>,
    subscriptions: Vec<Subscription>,
    contexts: Vec<Arc<ComponentContext>>,
    components: Mutex<Vec<(Box<dyn Component>, Arc<ComponentContext>)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    request_response: Option<Arc<RequestResponseController>>,
    sessions: Option<Arc<SessionManager>>,
    is_source: bool,
}

impl ComponentGroup {
    /// Build the group: compile transforms, construct instances, set up
    /// the shared queue and any request/response facilities.
    pub(crate) async fn build(
        config: &ComponentConfig,
        params: &GroupBuildParams<'_>,
    ) -> Result<Self, ComponentError> {
        let pipeline = Arc::new(TransformPipeline::from_config(&config.input_transforms)?);
        let (input_tx, input_rx) = mpsc::channel(config.queue_depth);
        let next = Arc::new(RwLock::new(OutputTarget::Drop));

        // Component-level request/response controller
        let request_response = match &config.broker_request_response {
            Some(block) => {
                let mut block = block.clone();
                if block.get("broker_config").is_none() {
                    if let (Some(app_broker), Some(mapping)) =
                        (params.app_broker, block.as_object_mut())
                    {
                        mapping.insert("broker_config".to_string(), app_broker.clone());
                    }
                }
                Some(
                    RequestResponseController::start(&block, params.messaging)
                        .await
                        .map_err(|e| ComponentError::Initialization(e.to_string()))?,
                )
            }
            None => None,
        };

        // Session-scoped request/response manager
        let sessions = match &config.multi_session_request_response {
            Some(block) => Some(Arc::new(
                SessionManager::new(block, params.messaging.clone())
                    .map_err(|e| ComponentError::Initialization(e.to_string()))?,
            )),
            None => None,
        };

        let mut contexts = Vec::with_capacity(config.num_instances);
        let mut components = Vec::with_capacity(config.num_instances);
        let mut is_source = false;

        for component_index in 0..config.num_instances {
            let identity = ComponentIdentity {
                instance: params.instance_name.to_string(),
                flow: params.flow_name.to_string(),
                component: config.component_name.clone(),
                component_index,
            };
            let context = Arc::new(ComponentContext::new(
                identity,
                params.evaluator.clone(),
                config.component_config.clone(),
                params.flow_config.clone(),
                params.app_config.clone(),
                Arc::clone(&next),
                params.errors.clone(),
                params.cancel.child_token(),
                request_response.clone(),
                sessions.clone(),
            ));

            let build = ComponentBuildContext {
                config,
                app_broker: params.app_broker,
                messaging: params.messaging,
            };
            let component = match &params.factory_override {
                Some(factory) => factory(&build)?,
                None => params.registry.create(&build)?,
            };
            is_source = is_source || component.is_source();

            contexts.push(Arc::clone(&context));
            components.push((component, context));
        }

        Ok(Self {
            name: config.component_name.clone(),
            input_tx,
            input_rx: Arc::new(tokio::sync::Mutex::new(input_rx)),
            next,
            pipeline,
            input_selection: config.input_selection.clone(),
            subscriptions: config.subscriptions.clone(),
            contexts,
            components: Mutex::new(components),
            workers: Mutex::new(Vec::new()),
            request_response,
            sessions,
            is_source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender side of the shared input queue.
    pub fn input_sender(&self) -> mpsc::Sender<Event> {
        self.input_tx.clone()
    }

    /// Point this group's output at a queue (the next group, or a sink).
    pub fn set_next(&self, target: OutputTarget) {
        *self.next.write() = target;
    }

    /// Subscriptions declared for this component (used by the router).
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Context of one worker instance.
    pub fn context(&self, component_index: usize) -> Option<Arc<ComponentContext>> {
        self.contexts.get(component_index).cloned()
    }

    /// Whether the group's component feeds the flow instead of reading the
    /// shared queue.
    pub fn is_source(&self) -> bool {
        self.is_source
    }

    /// Start one worker task per instance.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        for (component, context) in self.components.lock().drain(..) {
            let worker = Worker {
                component,
                context,
                input: Arc::clone(&self.input_rx),
                pipeline: Arc::clone(&self.pipeline),
                input_selection: self.input_selection.clone(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
    }

    /// Wait for the workers to drain, aborting any that exceed the grace
    /// window. The flow has already fired the stop signal.
    pub async fn stop(&self, grace: Duration) {
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for mut worker in workers {
            if tokio::time::timeout(grace, &mut worker).await.is_err() {
                warn!(component = %self.name, "worker did not stop in time; abandoning");
                worker.abort();
            }
        }
        if let Some(controller) = &self.request_response {
            controller.stop().await;
        }
        if let Some(sessions) = &self.sessions {
            sessions.stop().await;
        }
    }
}

struct Worker {
    component: Box<dyn Component>,
    context: Arc<ComponentContext>,
    input: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
    pipeline: Arc<TransformPipeline>,
    input_selection: Option<SourceExpression>,
}

impl Worker {
    async fn run(mut self) {
        if let Err(error) = self.component.start(&self.context).await {
            self.context.report_error(
                &ComponentError::Initialization(error.to_string()),
                &Message::new(json!(null)),
            );
            return;
        }

        let cancel = self.context.cancellation().clone();
        loop {
            if self.component.is_source() {
                let next = tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = self.component.next_message(&self.context) => next,
                };
                match next {
                    Ok(Some(message)) => self.process_message(message).await,
                    Ok(None) => {}
                    Err(error) => {
                        warn!(%error, "source component failed to produce a message");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            } else {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = async { self.input.lock().await.recv().await } => event,
                };
                match event {
                    Some(Event::Message(message)) => self.process_message(message).await,
                    Some(Event::Timer { id, payload }) => {
                        if let Err(error) =
                            self.component.handle_timer(&id, payload, &self.context).await
                        {
                            warn!(%error, timer = %id, "timer handler failed");
                        }
                    }
                    Some(Event::CacheExpiry { key, value }) => {
                        if let Err(error) = self
                            .component
                            .handle_cache_expiry(&key, value, &self.context)
                            .await
                        {
                            warn!(%error, %key, "cache expiry handler failed");
                        }
                    }
                    None => break,
                }
            }
        }

        debug!(
            component = %self.context.identity().component,
            "worker draining"
        );
        self.component.stop_component().await;
    }

    async fn process_message(&mut self, mut message: Message) {
        // 1. Input transforms
        if let Err(error) = self.pipeline.apply(
            self.context.evaluator(),
            &mut message,
            Some(self.context.identity()),
        ) {
            self.fail(ComponentError::from(error), &message);
            return;
        }

        // 2. Input selection (default: previous)
        let data = match &self.input_selection {
            Some(selection) => match self.context.evaluator().evaluate_source(
                selection,
                &message,
                Some(self.context.identity()),
            ) {
                Ok(data) => data,
                Err(error) => {
                    self.fail(ComponentError::from(error), &message);
                    return;
                }
            },
            None => message.previous().cloned().unwrap_or(Value::Null),
        };

        // 3. Invoke and post-invoke routing
        match self.component.invoke(&mut message, data, &self.context).await {
            Ok(InvokeResult::Emit(value)) => {
                message.set_previous(value);
                self.context.emit(message).await;
            }
            Ok(InvokeResult::Discard) => message.call_acknowledgements(),
            Ok(InvokeResult::Handled) => {}
            Err(error) => self.fail(error, &message),
        }
    }

    fn fail(&self, error: ComponentError, message: &Message) {
        message.call_negative_acknowledgements(NackOutcome::Rejected);
        self.context.report_error(&error, message);
    }
}
