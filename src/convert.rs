//! Snapshot conversion: source rows -> cache nodes.
//!
//! Conversion copies a declared set of fields by direct attribute read and
//! runs a declared set of zero-argument producers exactly once, storing the
//! results. The declarations are resolved when the spec is constructed, not
//! per read, so a node never needs the source row again after conversion.

use crate::source::{ConfigRecord, FieldValue, PageRecord};
use crate::tree::{ConfigNode, PageNode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// A named accessor capturing one extra value from a source row.
///
/// `read` returning `None` means the row has no such value; nothing is
/// recorded for it.
pub struct FieldSpec<S> {
    pub name: &'static str,
    pub read: fn(&S) -> Option<FieldValue>,
}

impl<S> FieldSpec<S> {
    pub fn new(name: &'static str, read: fn(&S) -> Option<FieldValue>) -> Self {
        Self { name, read }
    }
}

/// Declared snapshot configuration.
///
/// The core page and config fields (titles, parent identity, permission
/// mode, captured link and groups) are always copied; the spec adds ordered,
/// named extras on top — the equivalent of userland additions to the
/// original cacheable field lists, e.g. capturing a `SubsiteID` column when
/// tenant partitioning is enabled.
#[derive(Default)]
pub struct SnapshotSpec {
    page_fields: Vec<FieldSpec<PageRecord>>,
    config_fields: Vec<FieldSpec<ConfigRecord>>,
}

impl SnapshotSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an extra page capture.
    pub fn with_page_field(mut self, spec: FieldSpec<PageRecord>) -> Self {
        self.page_fields.push(spec);
        self
    }

    /// Declare an extra config capture.
    pub fn with_config_field(mut self, spec: FieldSpec<ConfigRecord>) -> Self {
        self.config_fields.push(spec);
        self
    }

    /// Spec used when subsite partitioning is a live filter dimension:
    /// captures the `SubsiteID` column on both node kinds.
    pub fn with_subsites() -> Self {
        Self::new()
            .with_page_field(FieldSpec::new("SubsiteID", |r| {
                Some(FieldValue::Int(r.subsite as i64))
            }))
            .with_config_field(FieldSpec::new("SubsiteID", |r| {
                Some(FieldValue::Int(r.subsite as i64))
            }))
    }

    /// Convert one page row into a content cache node.
    ///
    /// An absent source is not an error: there is nothing to cache, and the
    /// caller moves on.
    pub fn convert_page(&self, source: Option<&PageRecord>) -> Option<PageNode> {
        let record = source?;

        let mut extra: BTreeMap<String, FieldValue> = record.extra.clone();
        for field in &self.page_fields {
            if let Some(value) = (field.read)(record) {
                extra.insert(field.name.to_string(), value);
            }
        }

        Some(PageNode {
            id: record.id,
            class_name: record.class_name.clone(),
            title: record.title.clone(),
            menu_title: if record.menu_title.is_empty() {
                record.title.clone()
            } else {
                record.menu_title.clone()
            },
            url_segment: record.url_segment.clone(),
            parent_id: record.parent_id,
            sort: record.sort,
            show_in_menus: record.show_in_menus,
            can_view_type: record.can_view_type,
            version: record.version,
            link: record.link.clone(),
            viewer_groups: record.viewer_groups.clone(),
            source_query_params: record.source_query_params.clone(),
            live_version: record.live_version,
            extra,
            children: BTreeSet::new(),
            section_memo: OnceLock::new(),
        })
    }

    /// Convert the singleton configuration row into a config cache node.
    pub fn convert_config(&self, source: Option<&ConfigRecord>) -> Option<ConfigNode> {
        let record = source?;

        let mut extra: BTreeMap<String, FieldValue> = record.extra.clone();
        for field in &self.config_fields {
            if let Some(value) = (field.read)(record) {
                extra.insert(field.name.to_string(), value);
            }
        }

        Some(ConfigNode {
            id: record.id,
            title: record.title.clone(),
            can_view_type: record.can_view_type,
            viewer_groups: record.viewer_groups.clone(),
            extra,
        })
    }

    /// Cache-node kind tag derived by naming convention from the source's
    /// concrete type.
    pub fn cache_kind(class_name: &str) -> String {
        format!("Cacheable{class_name}")
    }
}
