//! Backend pool management.
//!
//! # Responsibilities
//! - Hold every managed backend keyed by id
//! - Keep the static priority order used for fallback chains

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::ManagedBackend;

/// Immutable set of backends plus their static priority order.
#[derive(Debug, Default)]
pub struct BackendPool {
    backends: HashMap<String, Arc<ManagedBackend>>,
    /// Ids by ascending configured priority, ties in insertion order.
    priority: Vec<String>,
}

impl BackendPool {
    /// Build a pool. Later duplicates of an id are ignored.
    pub fn new(backends: impl IntoIterator<Item = ManagedBackend>) -> Self {
        let mut pool = Self::default();
        let mut inserted: Vec<Arc<ManagedBackend>> = Vec::new();

        for backend in backends {
            if pool.backends.contains_key(backend.id()) {
                tracing::warn!(backend = %backend.id(), "Duplicate backend id, ignoring");
                continue;
            }
            let backend = Arc::new(backend);
            pool.backends.insert(backend.id().to_string(), backend.clone());
            inserted.push(backend);
        }

        // sort_by_key is stable
        inserted.sort_by_key(|b| b.config().priority);
        pool.priority = inserted.iter().map(|b| b.id().to_string()).collect();
        pool
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ManagedBackend>> {
        self.backends.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    /// Ids in static priority order.
    pub fn priority_order(&self) -> &[String] {
        &self.priority
    }

    /// Backends in static priority order.
    pub fn all_backends(&self) -> Vec<Arc<ManagedBackend>> {
        self.priority
            .iter()
            .filter_map(|id| self.backends.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
