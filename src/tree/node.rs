//! Cache-node types: the serializable units stored in a navigation tree.
//!
//! Nodes are snapshots. Every field and captured function result was read
//! from the source row exactly once, at conversion time; nothing here holds
//! a live reference back into the primary store. Parent/child relationships
//! are identity-based and resolved through the owning tree's flat index.

use crate::source::{CanViewMode, FieldValue};
use crate::types::{GroupId, NodeId, NO_PARENT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Content cache node: one page in the navigation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub id: NodeId,
    /// Concrete source kind this node was converted from.
    pub class_name: String,
    pub title: String,
    pub menu_title: String,
    pub url_segment: String,
    pub parent_id: NodeId,
    pub sort: i64,
    pub show_in_menus: bool,
    pub can_view_type: CanViewMode,
    pub version: u64,

    /// Captured function results (see `convert`).
    pub link: String,
    pub viewer_groups: Vec<GroupId>,
    pub source_query_params: BTreeMap<String, String>,
    pub live_version: Option<u64>,

    /// User-configured extra snapshot fields and function results, in
    /// capture order by name.
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,

    /// Child identities. Maintained by the owning tree during insertion;
    /// never mutated afterwards.
    #[serde(default)]
    pub(crate) children: BTreeSet<NodeId>,

    /// Memoized section membership. Valid for a single render context; a
    /// node must not be shared across render contexts without resetting.
    #[serde(skip)]
    pub(crate) section_memo: OnceLock<bool>,
}

impl PageNode {
    /// True if this node carries a real identity.
    pub fn exists(&self) -> bool {
        self.id > 0
    }

    /// True if the recorded parent identity is the "no parent" sentinel.
    pub fn is_root(&self) -> bool {
        self.parent_id == NO_PARENT
    }

    /// Child identities in ascending order.
    pub fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// One provenance value recorded when the source row was loaded.
    pub fn cached_source_query_param(&self, key: &str) -> Option<&str> {
        self.source_query_params.get(key).map(String::as_str)
    }

    /// Whether the source row was definitely loaded off the published view.
    ///
    /// Live reads record `Versioned.mode => stage` and
    /// `Versioned.stage => live`; anything else means the row may have come
    /// from draft.
    pub fn loaded_from_live(&self) -> bool {
        let matches = |key: &str, want: &str| {
            self.cached_source_query_param(key)
                .map(|v| v.eq_ignore_ascii_case(want))
                .unwrap_or(false)
        };
        matches("Versioned.mode", "stage") && matches("Versioned.stage", "live")
    }

    /// One user-configured extra value by its capture name.
    pub fn extra_field(&self, name: &str) -> Option<&FieldValue> {
        self.extra.get(name)
    }

    /// Drop the per-render-context memo so the node can serve a new context.
    pub fn reset_render_state(&mut self) {
        self.section_memo = OnceLock::new();
    }
}

/// Config cache node: snapshot of the singleton site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigNode {
    pub id: NodeId,
    pub title: String,
    pub can_view_type: CanViewMode,
    pub viewer_groups: Vec<GroupId>,
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl ConfigNode {
    pub fn exists(&self) -> bool {
        self.id > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_params() -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("Versioned.mode".to_string(), "stage".to_string());
        params.insert("Versioned.stage".to_string(), "Live".to_string());
        params
    }

    fn node(id: NodeId, parent_id: NodeId) -> PageNode {
        PageNode {
            id,
            class_name: "Page".to_string(),
            title: format!("Page {id}"),
            menu_title: format!("Page {id}"),
            url_segment: format!("page-{id}"),
            parent_id,
            sort: 0,
            show_in_menus: true,
            can_view_type: CanViewMode::Anyone,
            version: 1,
            link: format!("/page-{id}/"),
            viewer_groups: Vec::new(),
            source_query_params: live_params(),
            live_version: Some(1),
            extra: BTreeMap::new(),
            children: BTreeSet::new(),
            section_memo: OnceLock::new(),
        }
    }

    #[test]
    fn provenance_match_is_case_insensitive() {
        let n = node(1, NO_PARENT);
        assert!(n.loaded_from_live());
    }

    #[test]
    fn missing_provenance_means_not_live() {
        let mut n = node(1, NO_PARENT);
        n.source_query_params.clear();
        assert!(!n.loaded_from_live());
    }

    #[test]
    fn root_detection_uses_sentinel() {
        assert!(node(1, NO_PARENT).is_root());
        assert!(!node(2, 1).is_root());
    }

    #[test]
    fn serialization_skips_section_memo() {
        let n = node(1, NO_PARENT);
        n.section_memo.set(true).unwrap();
        let bytes = bincode::serialize(&n).unwrap();
        let back: PageNode = bincode::deserialize(&bytes).unwrap();
        assert!(back.section_memo.get().is_none());
    }
}
