//! Permission-aware visibility over the navigation tree.
//!
//! `can_view` resolution is tree-mediated because inherited rules walk the
//! parent chain and orphan detection needs the flat index. The "current
//! actor" and "current page" are explicit parameters; nothing here reads
//! ambient process state.

use super::node::{ConfigNode, PageNode};
use super::NavigationTree;
use crate::actor::{Actor, Capability};
use crate::source::CanViewMode;
use crate::types::NodeId;
use std::fmt;

/// Extension hook consulted during content-node visibility resolution.
///
/// A `Some` response is definitive for the restriction steps it short-
/// circuits; when several extensions respond, the most restrictive answer
/// wins.
pub trait CanViewExtension: Send + Sync {
    fn can_view(&self, node: &PageNode, actor: Option<&Actor>) -> Option<bool>;
}

/// Deny-biased aggregation over all registered hooks: any explicit deny
/// wins over any allow.
fn extended_can(
    extensions: &[Box<dyn CanViewExtension>],
    node: &PageNode,
    actor: Option<&Actor>,
) -> Option<bool> {
    extensions
        .iter()
        .filter_map(|ext| ext.can_view(node, actor))
        .min()
}

/// How a node relates to the current page, for menu rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkingMode {
    Current,
    Section,
    Link,
}

impl LinkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkingMode::Current => "current",
            LinkingMode::Section => "section",
            LinkingMode::Link => "link",
        }
    }
}

impl fmt::Display for LinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigNode {
    /// Visibility of the site-wide config node itself.
    pub fn can_view(&self, actor: Option<&Actor>) -> bool {
        if actor.is_some_and(|a| a.has_capability(Capability::Admin)) {
            return true;
        }
        match self.can_view_type {
            CanViewMode::Anyone | CanViewMode::Inherit => true,
            CanViewMode::LoggedInUsers => actor.is_some(),
            CanViewMode::OnlyTheseUsers => {
                actor.is_some_and(|a| a.in_any_group(&self.viewer_groups))
            }
        }
    }
}

impl NavigationTree {
    /// Content-node visibility, without extension hooks.
    pub fn can_view(&self, id: NodeId, actor: Option<&Actor>) -> bool {
        self.can_view_with(id, actor, &[])
    }

    /// Content-node visibility with extension hooks.
    ///
    /// Resolution order: draft-staleness and orphan checks deny before any
    /// of the restriction modes are considered; a definitive hook response
    /// overrides those denials and the restriction modes, but never the
    /// administrative bypass or an unrestricted ("Anyone") node.
    pub fn can_view_with(
        &self,
        id: NodeId,
        actor: Option<&Actor>,
        extensions: &[Box<dyn CanViewExtension>],
    ) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };

        // Stale draft rows are invisible unless the actor may preview
        // drafts: the row was not loaded off the published view and its
        // recorded version is not the latest published one.
        let can_preview = actor.is_some_and(|a| a.has_capability(Capability::ViewDraftContent));
        if !node.loaded_from_live() && !can_preview && node.live_version != Some(node.version) {
            return extended_can(extensions, node, actor).unwrap_or(false);
        }

        if self.is_orphaned(id) {
            return extended_can(extensions, node, actor).unwrap_or(false);
        }

        if actor.is_some_and(|a| a.is_tree_admin()) {
            return true;
        }

        if matches!(node.can_view_type, CanViewMode::Anyone) {
            return true;
        }

        if let Some(extended) = extended_can(extensions, node, actor) {
            return extended;
        }

        match node.can_view_type {
            CanViewMode::Anyone => true,
            CanViewMode::Inherit => match self.parent_of(id) {
                Some(parent) => self.can_view_with(parent.id, actor, extensions),
                None => self.config().map(|c| c.can_view(actor)).unwrap_or(true),
            },
            CanViewMode::LoggedInUsers => actor.is_some(),
            CanViewMode::OnlyTheseUsers => {
                actor.is_some_and(|a| a.in_any_group(&node.viewer_groups))
            }
        }
    }

    /// True if the node is the externally supplied current page.
    pub fn is_current(&self, id: NodeId, current_page: NodeId) -> bool {
        id != 0 && id == current_page
    }

    /// True if the node is the current page or an ancestor of it.
    ///
    /// Memoized per node: the answer depends only on the current page, which
    /// is fixed for the lifetime of one render pass. Call
    /// [`NavigationTree::reset_render_state`] before serving a new context.
    pub fn is_section(&self, id: NodeId, current_page: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        *node.section_memo.get_or_init(|| {
            self.is_current(id, current_page) || self.ancestors_of(current_page).contains(&id)
        })
    }

    pub fn linking_mode(&self, id: NodeId, current_page: NodeId) -> LinkingMode {
        if self.is_current(id, current_page) {
            LinkingMode::Current
        } else if self.is_section(id, current_page) {
            LinkingMode::Section
        } else {
            LinkingMode::Link
        }
    }

    /// "link" or "current", for templates that only distinguish those two.
    pub fn link_or_current(&self, id: NodeId, current_page: NodeId) -> &'static str {
        if self.is_current(id, current_page) {
            "current"
        } else {
            "link"
        }
    }

    /// "link" or "section".
    pub fn link_or_section(&self, id: NodeId, current_page: NodeId) -> &'static str {
        if self.is_section(id, current_page) {
            "section"
        } else {
            "link"
        }
    }

    /// Children of a node that are flagged for menus and visible to the
    /// actor, in child-identity order.
    pub fn visible_children(&self, id: NodeId, actor: Option<&Actor>) -> Vec<&PageNode> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        node.child_ids()
            .filter_map(|child| self.get(child))
            .filter(|child| child.show_in_menus)
            .filter(|child| self.can_view(child.id, actor))
            .collect()
    }

    /// Menu entries for the requested level.
    ///
    /// Level 1 is the root menu. For deeper levels the current page's
    /// ancestor chain is resolved and the children of the ancestor at depth
    /// `level - 2` are returned; an empty list signals the chain is shorter
    /// than requested. Every entry is filtered by ShowInMenus and by
    /// `can_view(actor)`.
    pub fn menu(&self, level: usize, current_page: NodeId, actor: Option<&Actor>) -> Vec<&PageNode> {
        if level == 0 {
            return Vec::new();
        }
        if level == 1 {
            return self
                .root_elements()
                .into_iter()
                .filter(|node| node.show_in_menus)
                .filter(|node| self.can_view(node.id, actor))
                .collect();
        }

        if !self.contains(current_page) {
            return Vec::new();
        }
        let mut stack = self.ancestors_of(current_page);
        stack.push(current_page);
        match stack.get(level - 2) {
            Some(ancestor) => self.visible_children(*ancestor, actor),
            None => Vec::new(),
        }
    }
}
