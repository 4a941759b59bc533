//! Container storage.
//!
//! Persists serialized navigation trees keyed by scope. The backend is
//! opaque to the build pipeline: anything that can round-trip the container
//! snapshot losslessly qualifies. A sled-backed store is provided for
//! production use and an in-memory store for tests and inline rebuilds.

pub mod sled_store;

pub use sled_store::SledNavigationStore;

use crate::error::StorageError;
use crate::tree::NavigationTree;
use crate::types::ScopeKey;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Write/read primitive for persisted containers.
pub trait NavigationStore: Send + Sync {
    /// Persist the scope's container snapshot, replacing any previous one.
    fn save(&self, scope: ScopeKey, tree: &NavigationTree) -> Result<(), StorageError>;

    /// Load the scope's container snapshot, if one was persisted.
    fn load(&self, scope: ScopeKey) -> Result<Option<NavigationTree>, StorageError>;

    /// Drop the scope's container snapshot.
    fn delete(&self, scope: ScopeKey) -> Result<(), StorageError>;

    /// Drop every persisted container.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory store. Snapshots are deep-copied on save and load so callers
/// observe the same value semantics as a persistent backend.
#[derive(Default)]
pub struct MemoryNavigationStore {
    containers: RwLock<HashMap<String, NavigationTree>>,
}

impl MemoryNavigationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted scopes.
    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }
}

impl NavigationStore for MemoryNavigationStore {
    fn save(&self, scope: ScopeKey, tree: &NavigationTree) -> Result<(), StorageError> {
        self.containers
            .write()
            .insert(scope.storage_key(), tree.clone());
        Ok(())
    }

    fn load(&self, scope: ScopeKey) -> Result<Option<NavigationTree>, StorageError> {
        Ok(self.containers.read().get(&scope.storage_key()).cloned())
    }

    fn delete(&self, scope: ScopeKey) -> Result<(), StorageError> {
        self.containers.write().remove(&scope.storage_key());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.containers.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryNavigationStore::new();
        let scope = ScopeKey::new(0, Stage::Live);

        let mut tree = NavigationTree::new();
        tree.set_completed(true);
        store.save(scope, &tree).unwrap();

        let loaded = store.load(scope).unwrap().unwrap();
        assert!(loaded.is_completed());
        assert!(store.load(ScopeKey::new(0, Stage::Draft)).unwrap().is_none());

        store.delete(scope).unwrap();
        assert!(store.load(scope).unwrap().is_none());
    }

    #[test]
    fn clear_drops_every_scope() {
        let store = MemoryNavigationStore::new();
        for scope in ScopeKey::both_stages(0) {
            store.save(scope, &NavigationTree::new()).unwrap();
        }
        assert_eq!(store.len(), 2);
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
