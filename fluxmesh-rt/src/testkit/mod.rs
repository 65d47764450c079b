//! Helpers for exercising flows in tests.
//!
//! Mirrors the workflow of the integration suite: build a connector from
//! YAML or a JSON value, attach an injectable input and a capturing sink
//! to each flow, push messages in, and read what comes out the other end.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

// Layer 3: Internal module imports
use crate::component::OutputTarget;
use crate::connector::{Connector, ConnectorBuilder, ConnectorError};
use crate::message::{Event, Message};

const SINK_DEPTH: usize = 256;
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One flow with a test input and a capturing sink attached.
pub struct TestFlow {
    name: String,
    input: Option<mpsc::Sender<Event>>,
    output: Mutex<mpsc::Receiver<Event>>,
}

impl TestFlow {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inject a message into the flow's first component group.
    pub async fn send(&self, message: Message) {
        if let Some(input) = &self.input {
            let _ = input.send(Event::Message(message)).await;
        }
    }

    /// Await the next message leaving the flow's last component group.
    pub async fn receive(&self) -> Option<Message> {
        self.receive_timeout(DEFAULT_RECEIVE_TIMEOUT).await
    }

    /// Await the next output message with an explicit timeout.
    pub async fn receive_timeout(&self, timeout: Duration) -> Option<Message> {
        let mut output = self.output.lock().await;
        match tokio::time::timeout(timeout, output.recv()).await {
            Ok(Some(Event::Message(message))) => Some(message),
            _ => None,
        }
    }

    /// Await the next output event of any kind.
    pub async fn receive_event(&self, timeout: Duration) -> Option<Event> {
        let mut output = self.output.lock().await;
        tokio::time::timeout(timeout, output.recv()).await.ok()?
    }
}

/// A running connector with its instrumented flows.
pub struct TestHarness {
    pub connector: Connector,
    pub flows: Vec<TestFlow>,
}

impl TestHarness {
    /// Stop the connector and join its workers.
    pub async fn dispose(&self) {
        self.connector.stop().await;
    }
}

/// Build and run a connector from a JSON-shaped configuration, attaching
/// test taps to every flow (except those marked `test_ignore`).
pub async fn create_test_flows(config: &Value) -> Result<TestHarness, ConnectorError> {
    create_test_flows_with(Connector::builder(), config).await
}

/// Like [`create_test_flows`], with an injectable builder (custom
/// registries, messaging drivers, shutdown grace).
pub async fn create_test_flows_with(
    builder: ConnectorBuilder,
    config: &Value,
) -> Result<TestHarness, ConnectorError> {
    let connector = builder.build(config).await?;
    connector.run();

    let mut flows = Vec::new();
    for flow in connector.flows() {
        if flow
            .config()
            .get("test_ignore")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }
        let (sink_tx, sink_rx) = mpsc::channel(SINK_DEPTH);
        flow.set_output_target(OutputTarget::Queue(sink_tx));
        flows.push(TestFlow {
            name: flow.name().to_string(),
            input: flow.input_sender(),
            output: Mutex::new(sink_rx),
        });
    }

    Ok(TestHarness { connector, flows })
}

/// Build a connector from a YAML configuration string.
pub async fn create_test_flows_yaml(yaml: &str) -> Result<TestHarness, ConnectorError> {
    let config: Value = serde_yaml::from_str(yaml)
        .map_err(|e| ConnectorError::Config(format!("bad YAML config: {e}")))?;
    create_test_flows(&config).await
}

/// One-shot convenience: run `message` through the first flow and return
/// the output message.
pub async fn create_and_run_component(
    config: &Value,
    message: Message,
) -> Result<Option<Message>, ConnectorError> {
    let harness = create_test_flows(config).await?;
    let output = match harness.flows.first() {
        Some(flow) => {
            flow.send(message).await;
            flow.receive().await
        }
        None => None,
    };
    harness.dispose().await;
    Ok(output)
}

/// YAML-string variant of [`create_and_run_component`].
pub async fn create_and_run_component_yaml(
    yaml: &str,
    message: Message,
) -> Result<Option<Message>, ConnectorError> {
    let config: Value = serde_yaml::from_str(yaml)
        .map_err(|e| ConnectorError::Config(format!("bad YAML config: {e}")))?;
    create_and_run_component(&config, message).await
}
