//! Navigation tree container.
//!
//! Holds a flat index (identity -> node) over the entire cached tree plus
//! the list of root identities and the singleton config node. Parent/child
//! relationships are identity-based lookups through the index — nodes never
//! store references to each other, so the structure serializes cleanly and
//! has no ownership cycles.

pub mod node;
pub mod visibility;

pub use node::{ConfigNode, PageNode};
pub use visibility::{CanViewExtension, LinkingMode};

use crate::types::{NodeId, NO_PARENT};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The read-optimized cache of one scope's content tree.
///
/// Populated incrementally by the build service, possibly across several
/// chunk jobs. Readers must treat a tree that is not [`ready`](Self::is_ready)
/// as absent and fall back to the primary store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationTree {
    /// Flat index over every inserted node, regardless of depth.
    site_map: HashMap<NodeId, PageNode>,
    /// Identities of nodes with no resolvable parent, in insertion order.
    root_elements: Vec<NodeId>,
    /// The singleton site-wide configuration snapshot.
    site_config: Option<ConfigNode>,
    /// Children that arrived before their parent, keyed by the missing
    /// parent identity. Drained when the parent is inserted.
    pending_children: HashMap<NodeId, Vec<NodeId>>,
    /// Signals that the cache is still being mutated. Present for forward
    /// compatibility; normal builds never observe a locked tree.
    locked: bool,
    /// Signals that every source object for this scope has been processed.
    completed: bool,
}

impl NavigationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of content nodes in the flat index.
    pub fn len(&self) -> usize {
        self.site_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.site_map.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&PageNode> {
        self.site_map.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.site_map.contains_key(&id)
    }

    /// Resolved parent of a node, if its recorded parent identity is present
    /// in the index.
    pub fn parent_of(&self, id: NodeId) -> Option<&PageNode> {
        let node = self.get(id)?;
        if node.parent_id == NO_PARENT {
            return None;
        }
        self.get(node.parent_id)
    }

    /// Root nodes in insertion order.
    pub fn root_elements(&self) -> Vec<&PageNode> {
        self.root_elements
            .iter()
            .filter_map(|id| self.site_map.get(id))
            .collect()
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.root_elements
    }

    pub fn config(&self) -> Option<&ConfigNode> {
        self.site_config.as_ref()
    }

    pub fn set_config(&mut self, config: ConfigNode) {
        self.site_config = Some(config);
    }

    /// Insert a node, wiring parent/child links by recorded parent identity.
    ///
    /// A node whose parent has not arrived yet is provisionally listed as a
    /// root and re-homed when the parent is inserted, so every node in the
    /// index stays reachable from the roots at all times. Re-inserting an
    /// existing identity replaces the old node; links held by its children
    /// survive the replacement.
    pub fn insert(&mut self, mut node: PageNode) {
        let id = node.id;
        if self.site_map.contains_key(&id) {
            self.remove(id);
        }

        // Adopt any children that were inserted before this node arrived.
        if let Some(waiting) = self.pending_children.remove(&id) {
            for child in waiting {
                self.root_elements.retain(|r| *r != child);
                node.children.insert(child);
            }
        }

        if node.parent_id == NO_PARENT {
            self.root_elements.push(id);
        } else if let Some(parent) = self.site_map.get_mut(&node.parent_id) {
            parent.children.insert(id);
        } else {
            // Parent not cached (yet). Keep the node reachable and remember
            // where it belongs.
            self.pending_children
                .entry(node.parent_id)
                .or_default()
                .push(id);
            self.root_elements.push(id);
        }

        self.site_map.insert(id, node);
    }

    /// Detach and return a node. Its children are re-parked as pending and
    /// provisionally rooted, exactly as if they had been inserted before
    /// their parent.
    pub fn remove(&mut self, id: NodeId) -> Option<PageNode> {
        let node = self.site_map.remove(&id)?;

        self.root_elements.retain(|r| *r != id);
        if let Some(parent) = self.site_map.get_mut(&node.parent_id) {
            parent.children.remove(&id);
        }
        self.pending_children
            .values_mut()
            .for_each(|waiting| waiting.retain(|c| *c != id));
        self.pending_children.retain(|_, waiting| !waiting.is_empty());

        for child in node.child_ids() {
            if self.site_map.contains_key(&child) {
                self.pending_children.entry(id).or_default().push(child);
                self.root_elements.push(child);
            }
        }

        Some(node)
    }

    /// Ancestor chain of a node, ordered root-first. Empty for roots and for
    /// unknown identities.
    pub fn ancestors_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id);

        let mut current = self.get(id);
        while let Some(node) = current {
            match self.parent_of(node.id) {
                Some(parent) if seen.insert(parent.id) => {
                    chain.push(parent.id);
                    current = self.get(parent.id);
                }
                _ => break,
            }
        }

        chain.reverse();
        chain
    }

    /// A node is orphaned if its recorded parent identity is non-zero but
    /// unresolvable, or if its ancestor chain terminates in an orphaned
    /// node. Checked lazily; never cached across mutation.
    pub fn is_orphaned(&self, id: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            let Some(node) = self.get(current) else {
                return true;
            };
            if node.parent_id == NO_PARENT {
                return false;
            }
            if !seen.insert(current) {
                // Parent cycle: treat the whole chain as unresolvable.
                return true;
            }
            match self.get(node.parent_id) {
                Some(parent) if parent.exists() => current = parent.id,
                _ => return true,
            }
        }
    }

    // Lifecycle -----------------------------------------------------------

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Reader gate: only a completed, unlocked tree may be traversed
    /// outside the pipeline that built it.
    pub fn is_ready(&self) -> bool {
        self.completed && !self.locked
    }

    /// Drop every per-render memo so the tree can serve a new render
    /// context (a new "current page").
    pub fn reset_render_state(&mut self) {
        for node in self.site_map.values_mut() {
            node.reset_render_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageRecord;
    use crate::convert::SnapshotSpec;

    fn page(id: NodeId, parent: NodeId, title: &str) -> PageNode {
        SnapshotSpec::default()
            .convert_page(Some(&PageRecord::stub(id, parent, title)))
            .unwrap()
    }

    fn three_page_tree() -> NavigationTree {
        let mut tree = NavigationTree::new();
        tree.insert(page(1, NO_PARENT, "Home"));
        tree.insert(page(2, 1, "About"));
        tree.insert(page(3, 1, "Contact"));
        tree
    }

    #[test]
    fn insert_wires_parent_and_children() {
        let tree = three_page_tree();
        assert_eq!(tree.root_ids(), &[1]);
        let home = tree.get(1).unwrap();
        assert_eq!(home.child_ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(tree.parent_of(2).unwrap().id, 1);
    }

    #[test]
    fn out_of_order_insert_is_rehomed() {
        let mut tree = NavigationTree::new();
        tree.insert(page(2, 1, "About"));
        // Provisionally a root while the parent is missing.
        assert_eq!(tree.root_ids(), &[2]);
        assert!(tree.is_orphaned(2));

        tree.insert(page(1, NO_PARENT, "Home"));
        assert_eq!(tree.root_ids(), &[1]);
        assert_eq!(tree.get(1).unwrap().child_ids().collect::<Vec<_>>(), vec![2]);
        assert!(!tree.is_orphaned(2));
    }

    #[test]
    fn sitemap_membership_matches_reachability() {
        let mut tree = three_page_tree();
        tree.insert(page(9, 7, "Lost")); // parent 7 never arrives

        let mut reachable = Vec::new();
        let mut stack: Vec<NodeId> = tree.root_ids().to_vec();
        while let Some(id) = stack.pop() {
            reachable.push(id);
            if let Some(node) = tree.get(id) {
                stack.extend(node.child_ids());
            }
        }
        reachable.sort_unstable();

        let mut members: Vec<NodeId> = (1..=9).filter(|id| tree.contains(*id)).collect();
        members.sort_unstable();
        assert_eq!(reachable, members);
    }

    #[test]
    fn ancestors_are_root_first() {
        let mut tree = three_page_tree();
        tree.insert(page(4, 2, "Team"));
        assert_eq!(tree.ancestors_of(4), vec![1, 2]);
        assert_eq!(tree.ancestors_of(2), vec![1]);
        assert!(tree.ancestors_of(1).is_empty());
        assert!(tree.ancestors_of(99).is_empty());
    }

    #[test]
    fn ancestors_round_trip_reconstructs_path() {
        let mut tree = three_page_tree();
        tree.insert(page(4, 2, "Team"));
        let mut path = tree.ancestors_of(4);
        path.push(4);
        assert_eq!(path, vec![1, 2, 4]);
        // Each consecutive pair is a parent/child edge.
        for pair in path.windows(2) {
            assert_eq!(tree.get(pair[1]).unwrap().parent_id, pair[0]);
        }
    }

    #[test]
    fn orphan_definition_is_recursive() {
        let mut tree = NavigationTree::new();
        tree.insert(page(2, 7, "Dangling"));
        tree.insert(page(3, 2, "Child of dangling"));
        assert!(tree.is_orphaned(2));
        assert!(tree.is_orphaned(3));

        tree.insert(page(7, NO_PARENT, "Found"));
        assert!(!tree.is_orphaned(2));
        assert!(!tree.is_orphaned(3));
    }

    #[test]
    fn remove_undoes_an_insert() {
        let mut tree = three_page_tree();
        let removed = tree.remove(3).unwrap();
        assert_eq!(removed.id, 3);
        assert!(!tree.contains(3));
        assert_eq!(tree.get(1).unwrap().child_ids().collect::<Vec<_>>(), vec![2]);

        // Removing an inner node re-parks its children.
        tree.remove(1);
        assert!(tree.is_orphaned(2));
        assert_eq!(tree.root_ids(), &[2]);
    }

    #[test]
    fn reinsert_replaces_and_keeps_links() {
        let mut tree = three_page_tree();
        let mut replacement = page(1, NO_PARENT, "Home v2");
        replacement.version = 2;
        tree.insert(replacement);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(1).unwrap().version, 2);
        assert_eq!(tree.get(1).unwrap().child_ids().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn lifecycle_gates_readers() {
        let mut tree = three_page_tree();
        assert!(!tree.is_ready());
        tree.set_completed(true);
        assert!(tree.is_ready());
        tree.lock();
        assert!(!tree.is_ready());
        tree.unlock();
        assert!(tree.is_ready());
    }

    #[test]
    fn parent_cycle_reports_orphaned() {
        let mut tree = NavigationTree::new();
        tree.insert(page(1, 2, "A"));
        tree.insert(page(2, 1, "B"));
        assert!(tree.is_orphaned(1));
        assert!(tree.ancestors_of(1).len() <= 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn reachable_ids(tree: &NavigationTree) -> Vec<NodeId> {
            let mut seen = std::collections::HashSet::new();
            let mut stack: Vec<NodeId> = tree.root_ids().to_vec();
            while let Some(id) = stack.pop() {
                if seen.insert(id) {
                    if let Some(node) = tree.get(id) {
                        stack.extend(node.child_ids());
                    }
                }
            }
            let mut ids: Vec<NodeId> = seen.into_iter().collect();
            ids.sort_unstable();
            ids
        }

        proptest! {
            /// Membership in the site map and reachability from the roots
            /// stay a bijection for every insertion order of a forest.
            #[test]
            fn bijection_holds_for_any_insertion_order(
                order in proptest::sample::subsequence((1u64..=12).collect::<Vec<_>>(), 1..12)
                    .prop_shuffle()
            ) {
                let mut tree = NavigationTree::new();
                for id in &order {
                    // Forest shape: ids 1..=3 are roots, everything else
                    // hangs off id/3 (which may or may not be inserted).
                    let parent = if *id <= 3 { NO_PARENT } else { id / 3 };
                    tree.insert(page(*id, parent, &format!("Page {id}")));
                }

                let mut members: Vec<NodeId> = order.clone();
                members.sort_unstable();
                prop_assert_eq!(reachable_ids(&tree), members);
            }
        }
    }
}
