//! Chunked cache-refresh job.
//!
//! One job replays "refresh one source page" over a fixed chunk under a
//! hard memory ceiling. The chunk and scope travel in a [`JobData`]
//! key/value holder so a requeued or restarted job resumes with the same
//! parameters; the build-service handle is re-attached by whoever owns the
//! queue.

use crate::error::BuildError;
use crate::memory::{parse_limit, MemoryProbe};
use crate::queue::{Job, JobOutcome};
use crate::service::NavigationBuildService;
use crate::source::PageRecord;
use crate::types::ScopeKey;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// How a job treats an individual page that fails to persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any per-item persist failure aborts the remainder of the chunk.
    #[default]
    Strict,
    /// Per-item persist failures are recorded as warnings; processing
    /// continues and the job still reports itself complete.
    Lenient,
}

impl FailurePolicy {
    pub fn is_strict(&self) -> bool {
        matches!(self, FailurePolicy::Strict)
    }
}

/// Safety margin subtracted from the platform memory ceiling before a job
/// aborts, in bytes.
pub const CRITICAL_MEMORY_BUFFER: u64 = 2 * 1024 * 1024;

/// Opaque key/value holder preserving a job's inputs across serialization
/// boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobData {
    entries: HashMap<String, serde_json::Value>,
}

impl JobData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        self.entries
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

const DATA_CHUNK: &str = "chunk";
const DATA_SCOPE: &str = "scope";
const DATA_POLICY: &str = "policy";

/// Background unit of work refreshing one chunk of source pages.
pub struct ChunkRefreshJob {
    service: Arc<NavigationBuildService>,
    data: JobData,
    policy: FailurePolicy,
    /// Platform ceiling as a human-readable size; parsed at execution time.
    memory_limit: String,
    critical_buffer: u64,
    probe: Arc<dyn MemoryProbe>,
    signature: String,
    total_steps: usize,
    current_step: AtomicUsize,
    warnings: Mutex<Vec<String>>,
}

impl ChunkRefreshJob {
    pub fn new(
        service: Arc<NavigationBuildService>,
        chunk: Vec<PageRecord>,
        policy: FailurePolicy,
        memory_limit: String,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        let total_steps = chunk.len();
        let mut data = JobData::new();
        // The holder is authoritative: process() reads the chunk back out
        // of it, so a restarted job with the same data does the same work.
        let recorded = [
            data.set(DATA_CHUNK, &chunk),
            data.set(DATA_SCOPE, &service.scope()),
            data.set(DATA_POLICY, &policy),
        ];
        for err in recorded.into_iter().filter_map(Result::err) {
            warn!(error = %err, "job metadata not fully recorded");
        }

        Self {
            service,
            data,
            policy,
            memory_limit,
            critical_buffer: CRITICAL_MEMORY_BUFFER,
            probe,
            signature: Uuid::new_v4().to_string(),
            total_steps,
            current_step: AtomicUsize::new(0),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Reconstruct a job from persisted metadata, re-attaching a service
    /// for the recorded scope.
    pub fn from_data(
        data: JobData,
        service: Arc<NavigationBuildService>,
        memory_limit: String,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        let chunk: Vec<PageRecord> = data.get(DATA_CHUNK).unwrap_or_default();
        let policy = data.get(DATA_POLICY).unwrap_or_default();
        let mut job = Self::new(service, chunk, policy, memory_limit, probe);
        job.data = data;
        job
    }

    pub fn with_critical_buffer(mut self, buffer: u64) -> Self {
        self.critical_buffer = buffer;
        self
    }

    pub fn scope(&self) -> Option<ScopeKey> {
        self.data.get(DATA_SCOPE)
    }

    pub fn chunk_size(&self) -> usize {
        self.total_steps
    }

    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::Relaxed)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    fn record_warning(&self, message: String) {
        warn!(signature = %self.signature, warning = %message, "chunk item not cached");
        self.warnings.lock().push(message);
    }
}

impl Job for ChunkRefreshJob {
    fn signature(&self) -> &str {
        // Fresh per instance: jobs over different chunks of the same scope
        // must never be deduplicated as "identical".
        &self.signature
    }

    fn title(&self) -> String {
        let scope = self.scope();
        let subsite = scope.map(|s| s.subsite).unwrap_or_default();
        let stage = scope.map(|s| s.stage.to_string()).unwrap_or_default();
        let mut title = format!("Cacheable refresh {} objects.", self.chunk_size());
        if subsite != 0 {
            title.push_str(&format!(" (Subsite {subsite})"));
        }
        title.push(' ');
        title.push_str(&stage);
        title
    }

    fn process(&self) -> Result<JobOutcome, BuildError> {
        let chunk: Vec<PageRecord> = self.data.get(DATA_CHUNK).unwrap_or_default();
        let ceiling = parse_limit(&self.memory_limit);
        let threshold = ceiling.map(|bytes| bytes.saturating_sub(self.critical_buffer));
        debug!(
            signature = %self.signature,
            chunk = chunk.len(),
            ceiling = ceiling.unwrap_or(0),
            "processing cache refresh chunk"
        );

        for (index, record) in chunk.iter().enumerate() {
            // Peak memory is checked before each object; an unsigned
            // ceiling disables the check entirely.
            if let Some(threshold) = threshold {
                let peak = self.probe.peak_bytes();
                if peak > 0 && peak >= threshold {
                    return Err(BuildError::MemoryCeiling { peak_bytes: peak });
                }
            }

            self.current_step.store(index + 1, Ordering::Relaxed);

            match self.service.refresh_page(Some(record)) {
                Ok(()) => {}
                Err(err @ BuildError::ItemPersist { .. }) => match self.policy {
                    FailurePolicy::Strict => return Err(err),
                    FailurePolicy::Lenient => self.record_warning(err.to_string()),
                },
                Err(fatal) => return Err(fatal),
            }
        }

        self.service.chunk_finished();
        self.service.complete_build()?;

        Ok(JobOutcome {
            warning: self.warnings.lock().first().cloned(),
        })
    }
}
