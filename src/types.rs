//! Core identity and scope types shared across the object cache.

use serde::{Deserialize, Serialize};
use std::fmt;

/// NodeId: primary-store identity of a cached object. `0` is the
/// "no parent" sentinel and never identifies a real node.
pub type NodeId = u64;

/// GroupId: identity of a viewer group in the permission subsystem.
pub type GroupId = u64;

/// SubsiteId: tenant partition. `0` means the unpartitioned default site.
pub type SubsiteId = u64;

/// Sentinel parent identity for root nodes.
pub const NO_PARENT: NodeId = 0;

/// Versioned reading stage a source object was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Draft content, visible to CMS users only.
    #[serde(alias = "stage")]
    Draft,
    /// Published content.
    Live,
}

impl Stage {
    /// Reading-mode string as recorded in source query params.
    pub fn mode(&self) -> &'static str {
        match self {
            Stage::Draft => "stage",
            Stage::Live => "live",
        }
    }

    /// Both stages, in rebuild order.
    pub fn all() -> [Stage; 2] {
        [Stage::Draft, Stage::Live]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stage" | "draft" => Ok(Stage::Draft),
            "live" => Ok(Stage::Live),
            other => Err(format!("unknown stage `{other}` (expected stage|live)")),
        }
    }
}

/// One (tenant, stage) combination. Each scope owns exactly one cached
/// navigation container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub subsite: SubsiteId,
    pub stage: Stage,
}

impl ScopeKey {
    pub fn new(subsite: SubsiteId, stage: Stage) -> Self {
        Self { subsite, stage }
    }

    /// Storage key under which this scope's container is persisted.
    pub fn storage_key(&self) -> String {
        format!("navcache.{}.{}", self.subsite, self.stage)
    }

    /// Both scopes (draft + live) for one subsite.
    pub fn both_stages(subsite: SubsiteId) -> [ScopeKey; 2] {
        [
            ScopeKey::new(subsite, Stage::Draft),
            ScopeKey::new(subsite, Stage::Live),
        ]
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsite {} / {}", self.subsite, self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parses_both_spellings() {
        assert_eq!("stage".parse::<Stage>().unwrap(), Stage::Draft);
        assert_eq!("Live".parse::<Stage>().unwrap(), Stage::Live);
        assert!("prod".parse::<Stage>().is_err());
    }

    #[test]
    fn scope_key_is_stable() {
        let key = ScopeKey::new(3, Stage::Live);
        assert_eq!(key.storage_key(), "navcache.3.live");
    }
}
