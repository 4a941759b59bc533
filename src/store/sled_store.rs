//! Sled-backed container store.
//!
//! One tree (`containers`) keyed by scope storage key, values are bincode
//! snapshots. Saves flush before reporting success: a confirmed save is the
//! pipeline's definition of "durably written".

use super::NavigationStore;
use crate::error::StorageError;
use crate::tree::NavigationTree;
use crate::types::ScopeKey;
use std::path::Path;

const CONTAINERS_TREE: &str = "containers";

pub struct SledNavigationStore {
    db: sled::Db,
    containers: sled::Tree,
}

impl SledNavigationStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let containers = db.open_tree(CONTAINERS_TREE)?;
        Ok(Self { db, containers })
    }

    /// Scope keys currently persisted, for the CLI's `show` listing.
    pub fn scopes(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in self.containers.iter() {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}

impl NavigationStore for SledNavigationStore {
    fn save(&self, scope: ScopeKey, tree: &NavigationTree) -> Result<(), StorageError> {
        let bytes =
            bincode::serialize(tree).map_err(|err| StorageError::Encode(err.to_string()))?;
        self.containers
            .insert(scope.storage_key().as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, scope: ScopeKey) -> Result<Option<NavigationTree>, StorageError> {
        match self.containers.get(scope.storage_key().as_bytes())? {
            Some(bytes) => {
                let tree = bincode::deserialize(&bytes)
                    .map_err(|err| StorageError::Decode(err.to_string()))?;
                Ok(Some(tree))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, scope: ScopeKey) -> Result<(), StorageError> {
        self.containers.remove(scope.storage_key().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.containers.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::SnapshotSpec;
    use crate::source::{ConfigRecord, FieldValue, PageRecord};
    use crate::types::Stage;
    use tempfile::TempDir;

    fn sample_tree() -> NavigationTree {
        let spec = SnapshotSpec::with_subsites();
        let mut tree = NavigationTree::new();
        tree.set_config(spec.convert_config(Some(&ConfigRecord::stub(1))).unwrap());
        tree.insert(spec.convert_page(Some(&PageRecord::stub(1, 0, "Home"))).unwrap());
        let mut about = PageRecord::stub(2, 1, "About");
        about
            .extra
            .insert("Author".to_string(), FieldValue::Text("team".into()));
        tree.insert(spec.convert_page(Some(&about)).unwrap());
        tree.set_completed(true);
        tree
    }

    #[test]
    fn sled_round_trip_preserves_structure() {
        let dir = TempDir::new().unwrap();
        let store = SledNavigationStore::open(dir.path()).unwrap();
        let scope = ScopeKey::new(0, Stage::Live);

        store.save(scope, &sample_tree()).unwrap();
        let loaded = store.load(scope).unwrap().unwrap();

        assert!(loaded.is_completed());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.root_ids(), &[1]);
        assert_eq!(loaded.parent_of(2).unwrap().id, 1);
        assert_eq!(loaded.config().unwrap().id, 1);
        assert_eq!(
            loaded.get(2).unwrap().extra_field("Author"),
            Some(&FieldValue::Text("team".into()))
        );
        assert_eq!(
            loaded.get(1).unwrap().extra_field("SubsiteID"),
            Some(&FieldValue::Int(0))
        );
    }

    #[test]
    fn delete_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SledNavigationStore::open(dir.path()).unwrap();
        let live = ScopeKey::new(0, Stage::Live);
        let draft = ScopeKey::new(0, Stage::Draft);

        store.save(live, &sample_tree()).unwrap();
        store.save(draft, &sample_tree()).unwrap();
        assert_eq!(store.scopes().unwrap().len(), 2);

        store.delete(live).unwrap();
        assert!(store.load(live).unwrap().is_none());
        assert!(store.load(draft).unwrap().is_some());

        store.clear().unwrap();
        assert!(store.scopes().unwrap().is_empty());
    }
}
