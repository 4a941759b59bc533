//! Actor identity and capability model.
//!
//! The permission subsystem proper lives outside this crate; visibility
//! resolution only needs to know who is asking and which capabilities the
//! identity provider granted them. An absent actor means an anonymous
//! request.

use crate::types::GroupId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Capabilities an identity provider can grant an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Full administrative bypass.
    Admin,
    /// View every node regardless of per-node restrictions.
    TreeViewAll,
    /// View draft-stage content (CMS access or an unsecured draft site).
    ViewDraftContent,
}

/// A resolved actor, as supplied by the identity collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub groups: Vec<GroupId>,
    pub capabilities: HashSet<Capability>,
}

impl Actor {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            groups: Vec::new(),
            capabilities: HashSet::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<GroupId>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Administrative bypass for content nodes: ADMIN or tree-wide view.
    pub fn is_tree_admin(&self) -> bool {
        self.has_capability(Capability::Admin) || self.has_capability(Capability::TreeViewAll)
    }

    /// True if the actor belongs to any of the given groups.
    pub fn in_any_group(&self, groups: &[GroupId]) -> bool {
        self.groups.iter().any(|g| groups.contains(g))
    }
}
