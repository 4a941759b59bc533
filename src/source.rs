//! Source-of-truth records and the collection abstraction the rebuild
//! pipeline iterates.
//!
//! The primary data store itself is a collaborator: deployments implement
//! [`PageCollection`] over whatever query layer they use. The record structs
//! here are the ordered, already-loaded rows the pipeline consumes, and the
//! serialized form chunks travel in when a rebuild is handed to background
//! jobs.

use crate::types::{NodeId, SubsiteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A scalar or small-collection value captured from a source object.
///
/// Snapshot fields and captured function results are stored as `FieldValue`s
/// so user-configured additions round-trip losslessly through the cache
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
    IdList(Vec<u64>),
    Map(BTreeMap<String, String>),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-node view-restriction mode, as recorded on the source row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanViewMode {
    /// No explicit restriction.
    #[default]
    Anyone,
    /// Any authenticated actor.
    LoggedInUsers,
    /// Only actors in the recorded viewer groups.
    OnlyTheseUsers,
    /// Content nodes only: delegate to the parent node, or to the site
    /// config when the node is a root.
    Inherit,
}

/// One page row, loaded from the primary store for a single scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: NodeId,
    pub class_name: String,
    pub title: String,
    #[serde(default)]
    pub menu_title: String,
    #[serde(default)]
    pub url_segment: String,
    #[serde(default)]
    pub parent_id: NodeId,
    #[serde(default)]
    pub sort: i64,
    #[serde(default)]
    pub show_in_menus: bool,
    #[serde(default)]
    pub can_view_type: CanViewMode,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub subsite: SubsiteId,

    /// Resolved link, as the source's own link builder produced it.
    #[serde(default)]
    pub link: String,
    /// Viewer-group identities backing `OnlyTheseUsers`.
    #[serde(default)]
    pub viewer_groups: Vec<u64>,
    /// Provenance of the row: which versioned reading mode the query ran
    /// under (e.g. `Versioned.mode => stage`, `Versioned.stage => live`).
    #[serde(default)]
    pub source_query_params: BTreeMap<String, String>,
    /// Latest published version of this row, captured alongside the draft
    /// row so staleness checks need no live lookup.
    #[serde(default)]
    pub live_version: Option<u64>,

    /// Additional user-configured source columns.
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl PageRecord {
    /// Minimal record for tests and fixtures.
    pub fn stub(id: NodeId, parent_id: NodeId, title: &str) -> Self {
        Self {
            id,
            class_name: "Page".to_string(),
            title: title.to_string(),
            menu_title: title.to_string(),
            url_segment: title.to_lowercase().replace(' ', "-"),
            parent_id,
            sort: id as i64,
            show_in_menus: true,
            can_view_type: CanViewMode::Anyone,
            version: 1,
            subsite: 0,
            link: format!("/{}/", title.to_lowercase().replace(' ', "-")),
            viewer_groups: Vec::new(),
            source_query_params: BTreeMap::new(),
            live_version: Some(1),
            extra: BTreeMap::new(),
        }
    }
}

/// The singleton site-wide configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub can_view_type: CanViewMode,
    #[serde(default)]
    pub viewer_groups: Vec<u64>,
    #[serde(default)]
    pub subsite: SubsiteId,
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl ConfigRecord {
    pub fn stub(id: NodeId) -> Self {
        Self {
            id,
            title: "Site".to_string(),
            can_view_type: CanViewMode::Anyone,
            viewer_groups: Vec::new(),
            subsite: 0,
            extra: BTreeMap::new(),
        }
    }
}

/// Ordered collection of source pages for one scope.
///
/// Implementations wrap the deployment's own query layer; the pipeline only
/// needs ordered iteration and an upfront count for progress reporting.
pub trait PageCollection {
    fn count(&self) -> usize;
    fn pages(&self) -> Box<dyn Iterator<Item = PageRecord> + '_>;
}

/// In-memory collection, used by the CLI's dump loader and by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSet {
    pub records: Vec<PageRecord>,
}

impl PageSet {
    pub fn new(records: Vec<PageRecord>) -> Self {
        Self { records }
    }

    /// Restrict to one subsite, preserving order.
    pub fn for_subsite(&self, subsite: SubsiteId) -> PageSet {
        PageSet::new(
            self.records
                .iter()
                .filter(|r| r.subsite == subsite)
                .cloned()
                .collect(),
        )
    }
}

impl PageCollection for PageSet {
    fn count(&self) -> usize {
        self.records.len()
    }

    fn pages(&self) -> Box<dyn Iterator<Item = PageRecord> + '_> {
        Box::new(self.records.iter().cloned())
    }
}
