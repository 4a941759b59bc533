//! Navigation build service.
//!
//! Bridges one source object at a time into a scope's navigation tree and
//! writes the container through to the cache store. One service instance
//! owns one container; chunk jobs populating the same scope share the
//! instance and the single mutex guarding its tree.

use crate::convert::SnapshotSpec;
use crate::error::BuildError;
use crate::source::{ConfigRecord, PageRecord};
use crate::store::NavigationStore;
use crate::tree::NavigationTree;
use crate::types::ScopeKey;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct NavigationBuildService {
    scope: ScopeKey,
    spec: Arc<SnapshotSpec>,
    store: Arc<dyn NavigationStore>,
    tree: Mutex<NavigationTree>,
    /// Chunks handed to the background facility for this scope.
    chunks_registered: AtomicUsize,
    /// Chunks whose processing has finished.
    chunks_finished: AtomicUsize,
    /// Set once the scheduler has stopped producing chunks; completion is
    /// impossible before this.
    sealed: AtomicBool,
}

impl NavigationBuildService {
    /// Service over a fresh, empty container. Rebuilds always replace the
    /// scope's container wholesale.
    pub fn new(scope: ScopeKey, store: Arc<dyn NavigationStore>, spec: Arc<SnapshotSpec>) -> Self {
        Self {
            scope,
            spec,
            store,
            tree: Mutex::new(NavigationTree::new()),
            chunks_registered: AtomicUsize::new(0),
            chunks_finished: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// Service resuming over the scope's persisted container, if any.
    /// Used for config propagation, where the existing tree is updated in
    /// place rather than rebuilt.
    pub fn open(
        scope: ScopeKey,
        store: Arc<dyn NavigationStore>,
        spec: Arc<SnapshotSpec>,
    ) -> Result<Self, BuildError> {
        let service = Self::new(scope, store, spec);
        if let Some(existing) = service.store.load(scope)? {
            *service.tree.lock() = existing;
        }
        Ok(service)
    }

    pub fn scope(&self) -> ScopeKey {
        self.scope
    }

    /// Snapshot of the container being built.
    pub fn object_cache(&self) -> NavigationTree {
        self.tree.lock().clone()
    }

    /// Convert one source page and insert it, writing the container
    /// through to the store.
    ///
    /// An absent source is nothing to cache, not an error. A store write
    /// that does not confirm persistence undoes the insert and reports
    /// `ItemPersist`; the caller records it and may continue with the
    /// remaining objects.
    pub fn refresh_page(&self, source: Option<&PageRecord>) -> Result<(), BuildError> {
        let Some(node) = self.spec.convert_page(source) else {
            debug!(scope = %self.scope, "no source page, skipping conversion");
            return Ok(());
        };
        let id = node.id;

        let mut tree = self.tree.lock();
        tree.insert(node);
        if let Err(err) = self.store.save(self.scope, &tree) {
            tree.remove(id);
            warn!(scope = %self.scope, id, error = %err, "page refresh not persisted");
            return Err(BuildError::ItemPersist { id });
        }
        debug!(scope = %self.scope, id, "page refreshed");
        Ok(())
    }

    /// Convert the site-wide config and set it on the container.
    ///
    /// A config change invalidates the whole cached tree: the container
    /// drops its completed flag so readers fall back to the primary store
    /// until the next rebuild finishes.
    pub fn refresh_config(&self, source: Option<&ConfigRecord>) -> Result<(), BuildError> {
        let Some(node) = self.spec.convert_config(source) else {
            debug!(scope = %self.scope, "no source config, skipping conversion");
            return Ok(());
        };

        let mut tree = self.tree.lock();
        tree.set_config(node);
        tree.set_completed(false);
        self.store.save(self.scope, &tree)?;
        info!(scope = %self.scope, "site config refreshed");
        Ok(())
    }

    /// Record that one more chunk job will populate this scope.
    pub fn register_chunk(&self) {
        self.chunks_registered.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that a chunk job finished its slice.
    pub fn chunk_finished(&self) {
        self.chunks_finished.fetch_add(1, Ordering::SeqCst);
    }

    /// Signal that no further chunks will be registered for this scope.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    fn all_chunks_finished(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
            && self.chunks_finished.load(Ordering::SeqCst)
                >= self.chunks_registered.load(Ordering::SeqCst)
    }

    /// Flush the container and, once every chunk for the scope has
    /// finished, transition it to completed.
    ///
    /// The config node must be set first; completing a configless
    /// container is an ordering bug, not a storage fault.
    pub fn complete_build(&self) -> Result<(), BuildError> {
        let mut tree = self.tree.lock();
        if tree.config().is_none() {
            return Err(BuildError::ConfigNotSet);
        }

        let was_completed = tree.is_completed();
        if self.all_chunks_finished() {
            tree.set_completed(true);
        }
        if let Err(err) = self.store.save(self.scope, &tree) {
            // A rejected flush must not leave the in-memory container
            // claiming completion the store never saw.
            tree.set_completed(was_completed);
            return Err(BuildError::BuildFlush(err));
        }

        if tree.is_completed() {
            info!(scope = %self.scope, nodes = tree.len(), "cache build completed");
        } else {
            debug!(scope = %self.scope, nodes = tree.len(), "cache build flushed, chunks outstanding");
        }
        Ok(())
    }
}

/// Propagate a site-config mutation: refresh the config node into the
/// draft and live containers for the config's subsite, invalidating both
/// so the next rebuild regenerates them.
pub fn propagate_config_change(
    store: &Arc<dyn NavigationStore>,
    spec: &Arc<SnapshotSpec>,
    config: &ConfigRecord,
) -> Result<[ScopeKey; 2], BuildError> {
    let scopes = ScopeKey::both_stages(config.subsite);
    for scope in scopes {
        let service = NavigationBuildService::open(scope, Arc::clone(store), Arc::clone(spec))?;
        service.refresh_config(Some(config))?;
    }
    info!(subsite = config.subsite, "site config change propagated to both stages");
    Ok(scopes)
}
