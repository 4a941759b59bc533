//! Navcache: read-optimized navigation object cache.
//!
//! Maintains a denormalized, tree-shaped cache of a hierarchical content
//! graph plus its site-wide configuration, rebuilt from the source of truth
//! in memory-aware chunks that can run as independent background jobs.

pub mod actor;
pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod logging;
pub mod memory;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;
pub mod tree;
pub mod types;

pub use actor::{Actor, Capability};
pub use convert::SnapshotSpec;
pub use error::{BuildError, StorageError};
pub use job::{ChunkRefreshJob, FailurePolicy, JobData};
pub use queue::{Job, JobQueue, NullJobQueue, ThreadedJobQueue};
pub use scheduler::{build_scope, rebuild_both_stages, BuildReport, RebuildEnv};
pub use service::{propagate_config_change, NavigationBuildService};
pub use source::{CanViewMode, ConfigRecord, PageCollection, PageRecord, PageSet};
pub use store::{MemoryNavigationStore, NavigationStore, SledNavigationStore};
pub use tree::{CanViewExtension, ConfigNode, LinkingMode, NavigationTree, PageNode};
pub use types::{NodeId, ScopeKey, Stage, SubsiteId};
