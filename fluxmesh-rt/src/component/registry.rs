//! Name-to-constructor registry for components.
//!
//! Component modules are resolved through a name-to-constructor table
//! populated at build time; no runtime module loading. Built-ins are
//! installed by [`ComponentRegistry::with_builtins`]; user components are
//! added through [`register`](ComponentRegistry::register).

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::error::ComponentError;
use super::traits::{Component, ComponentBuildContext, ComponentFactory};
use crate::components;

/// Registry of component constructors, shared across a connector.
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct ComponentRegistry {
    factories: Arc<DashMap<String, ComponentFactory>>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: Arc::new(DashMap::new()),
        }
    }

    /// A registry with every built-in component installed.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        components::register_builtins(&registry);
        registry
    }

    /// Register (or replace) a constructor under `module_name`.
    pub fn register(&self, module_name: impl Into<String>, factory: ComponentFactory) {
        self.factories.insert(module_name.into(), factory);
    }

    /// Whether a constructor exists for `module_name`.
    pub fn contains(&self, module_name: &str) -> bool {
        self.factories.contains_key(module_name)
    }

    /// Construct a component instance.
    ///
    /// # Errors
    ///
    /// [`ComponentError::UnknownModule`] when nothing is registered under
    /// the requested name. This is a configuration error and fails
    /// startup.
    pub fn create(
        &self,
        build: &ComponentBuildContext<'_>,
    ) -> Result<Box<dyn Component>, ComponentError> {
        let factory = self
            .factories
            .get(&build.config.component_module)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                ComponentError::UnknownModule(build.config.component_module.clone())
            })?;
        factory(build)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
