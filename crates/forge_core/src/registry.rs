//! Action registry for re-binding persisted graphs.
//!
//! Persisted graph metadata carries ids but no callables. On resume the
//! caller supplies a registry that maps each id back to an [`Action`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::graph::Action;

type ActionFactory = dyn Fn(&str) -> Arc<dyn Action> + Send + Sync;

/// Registry of actions keyed by node id, with prefix factories for
/// families of ids such as `file:<path>`.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    factories: Vec<(String, Arc<ActionFactory>)>,
}

impl ActionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under an exact id. Replaces any previous binding.
    pub fn register(&mut self, id: impl Into<String>, action: impl Action + 'static) {
        self.register_shared(id, Arc::new(action));
    }

    pub fn register_shared(&mut self, id: impl Into<String>, action: Arc<dyn Action>) {
        let id = id.into();
        debug!("Registering action: {}", id);
        self.actions.insert(id, action);
    }

    /// Register a factory for every id starting with `prefix`.
    ///
    /// Exact bindings win over factories; among factories the longest
    /// matching prefix wins.
    pub fn register_prefix<F>(&mut self, prefix: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Arc<dyn Action> + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        debug!("Registering action factory: {}*", prefix);
        self.factories.retain(|(p, _)| *p != prefix);
        self.factories.push((prefix, Arc::new(factory)));
    }

    /// Get an action by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Action>> {
        if let Some(action) = self.actions.get(id) {
            return Some(Arc::clone(action));
        }
        self.factories
            .iter()
            .filter(|(prefix, _)| id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, factory)| factory(id))
    }

    /// Get an action by id, returning an error if nothing is bound.
    pub fn resolve(&self, id: &str) -> CoreResult<Arc<dyn Action>> {
        self.get(id)
            .ok_or_else(|| CoreError::UnboundAction(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
            || self
                .factories
                .iter()
                .any(|(prefix, _)| id.starts_with(prefix.as_str()))
    }

    /// Exact ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.actions.len() + self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<&str> = self.factories.iter().map(|(p, _)| p.as_str()).collect();
        f.debug_struct("ActionRegistry")
            .field("actions", &self.ids())
            .field("prefixes", &prefixes)
            .finish()
    }
}
