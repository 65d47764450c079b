//! Construction of broker services from configuration.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::Value;

// Layer 3: Internal module imports
use super::dev_broker::{DevBroker, DevBrokerState};
use super::error::MessagingError;
use super::traits::BrokerService;
use super::types::BrokerConfig;

/// Connector-scoped store backing dev-broker state sharing.
///
/// Dev brokers built with the same identity resolve to the same state, so
/// a loopback flow's input and output sides (or a request/response
/// controller's internal broker pair) exchange messages in process.
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct SharedBrokerStore {
    states: Arc<DashMap<String, Arc<DevBrokerState>>>,
}

impl SharedBrokerStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn state_for(&self, identity: &str) -> Arc<DevBrokerState> {
        Arc::clone(
            &self
                .states
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(DevBrokerState::new())),
        )
    }
}

impl Default for SharedBrokerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for an externally supplied broker driver.
pub type BrokerFactory = Arc<
    dyn Fn(&BrokerConfig, &SharedBrokerStore) -> Result<Arc<dyn BrokerService>, MessagingError>
        + Send
        + Sync,
>;

/// Builds broker services from `broker` configuration blocks.
///
/// `broker_type: dev_broker` and `dev_mode: true` select the in-process
/// [`DevBroker`]; any other type must have a driver registered via
/// [`register_broker_type`](Self::register_broker_type). Cheap to clone;
/// clones share the store and the driver registry.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::messaging::MessagingServiceBuilder;
/// use serde_json::json;
///
/// let builder = MessagingServiceBuilder::new();
/// let broker = builder
///     .from_properties(&json!({"broker_type": "dev_broker", "queue_name": "q"}))
///     .unwrap()
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct MessagingServiceBuilder {
    store: SharedBrokerStore,
    factories: Arc<DashMap<String, BrokerFactory>>,
    config: Option<BrokerConfig>,
}

impl MessagingServiceBuilder {
    pub fn new() -> Self {
        Self::with_store(SharedBrokerStore::new())
    }

    pub fn with_store(store: SharedBrokerStore) -> Self {
        Self {
            store,
            factories: Arc::new(DashMap::new()),
            config: None,
        }
    }

    /// The shared dev-broker store.
    pub fn store(&self) -> &SharedBrokerStore {
        &self.store
    }

    /// Register a driver for `broker_type` values other than the dev
    /// broker.
    pub fn register_broker_type(&self, broker_type: impl Into<String>, factory: BrokerFactory) {
        self.factories.insert(broker_type.into(), factory);
    }

    /// Parse a raw `broker` block into the builder.
    pub fn from_properties(mut self, properties: &Value) -> Result<Self, MessagingError> {
        self.config = Some(BrokerConfig::from_value(properties)?);
        Ok(self)
    }

    /// Use an already-parsed configuration.
    pub fn from_config(mut self, config: BrokerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the broker service selected by the configuration.
    pub fn build(&self) -> Result<Arc<dyn BrokerService>, MessagingError> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| MessagingError::InvalidConfig("no broker properties".to_string()))?;

        if config.wants_dev_broker() {
            return Ok(Arc::new(DevBroker::new(config, &self.store)));
        }

        let broker_type = config.broker_type.clone().unwrap_or_default();
        match self
            .factories
            .get(&broker_type)
            .map(|entry| Arc::clone(entry.value()))
        {
            Some(factory) => factory(&config, &self.store),
            None => Err(MessagingError::UnsupportedBrokerType(broker_type)),
        }
    }

    /// Build a dev broker directly, regardless of the configured type.
    ///
    /// Used by test harnesses that need the concrete type to call
    /// [`DevBroker::simulate_reconnection`].
    pub fn build_dev_broker(&self) -> Result<Arc<DevBroker>, MessagingError> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| MessagingError::InvalidConfig("no broker properties".to_string()))?;
        Ok(Arc::new(DevBroker::new(config, &self.store)))
    }
}

impl Default for MessagingServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
