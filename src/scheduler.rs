//! Chunked rebuild scheduler.
//!
//! Drives one full pass over a scope's source pages, steering between
//! inline processing and background chunk jobs based on observed peak
//! memory growth. The watermark is relative to the peak recorded at the
//! last handoff (initially the start of the pass): peak memory is
//! monotone, so each chunk corresponds to one watermark's worth of growth.

use crate::config::RebuildConfig;
use crate::convert::SnapshotSpec;
use crate::error::BuildError;
use crate::job::ChunkRefreshJob;
use crate::memory::MemoryProbe;
use crate::queue::JobQueue;
use crate::service::NavigationBuildService;
use crate::source::{ConfigRecord, PageCollection, PageRecord};
use crate::store::NavigationStore;
use crate::types::{ScopeKey, Stage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shared collaborators for rebuild passes.
#[derive(Clone)]
pub struct RebuildEnv {
    pub store: Arc<dyn NavigationStore>,
    pub queue: Arc<dyn JobQueue>,
    pub probe: Arc<dyn MemoryProbe>,
    pub spec: Arc<SnapshotSpec>,
    pub config: RebuildConfig,
}

/// Summary of one scope rebuild pass.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub scope: ScopeKey,
    /// Source objects yielded by the collection.
    pub total: usize,
    /// Objects refreshed inline in this pass.
    pub refreshed_inline: usize,
    /// Chunks handed to the background facility.
    pub chunks_queued: usize,
    /// Objects covered by queued chunks.
    pub queued_objects: usize,
    /// Non-fatal per-object failures recorded inline.
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl BuildReport {
    /// Percentage of the pass that has been handled (queued or inline).
    pub fn percent_complete(count: usize, total: usize) -> String {
        if total == 0 {
            return "100%".to_string();
        }
        format!("{:.1}%", (count as f64 / total as f64) * 100.0)
    }
}

/// Build one scope's container from scratch.
///
/// The config node is refreshed before any content node, and the container
/// transitions to completed only after every source object has been
/// attempted — whether inline or through chunk jobs.
pub fn build_scope(
    env: &RebuildEnv,
    scope: ScopeKey,
    pages: &dyn PageCollection,
    config: &ConfigRecord,
) -> Result<BuildReport, BuildError> {
    let started = Instant::now();
    let service = Arc::new(NavigationBuildService::new(
        scope,
        Arc::clone(&env.store),
        Arc::clone(&env.spec),
    ));

    service.refresh_config(Some(config))?;

    let total = pages.count();
    let can_queue = env.queue.available();
    let mut baseline = env.probe.peak_bytes();
    info!(
        scope = %scope,
        pages = total,
        can_queue,
        baseline_bytes = baseline,
        "starting cache rebuild pass"
    );

    let mut report = BuildReport {
        scope,
        total,
        refreshed_inline: 0,
        chunks_queued: 0,
        queued_objects: 0,
        warnings: Vec::new(),
        duration: Duration::ZERO,
    };
    let mut chunk: Vec<PageRecord> = Vec::new();

    for (index, record) in pages.pages().enumerate() {
        let title = record.title.clone();
        if can_queue {
            chunk.push(record);

            // Memory is sampled after every accumulated object; once the
            // pass has grown a watermark's worth since the last handoff,
            // the accumulated batch becomes a job and the accumulator and
            // baseline start over.
            let peak = env.probe.peak_bytes();
            if peak.saturating_sub(baseline) >= env.config.chunk_watermark_bytes {
                baseline = peak;
                report.chunks_queued += 1;
                report.queued_objects += chunk.len();
                info!(
                    scope = %scope,
                    chunk = report.chunks_queued,
                    objects = chunk.len(),
                    peak_bytes = peak,
                    "chunking at watermark"
                );
                submit_chunk(env, &service, std::mem::take(&mut chunk));
            }
        } else {
            match service.refresh_page(Some(&record)) {
                Ok(()) => report.refreshed_inline += 1,
                Err(err @ BuildError::ItemPersist { .. }) => {
                    if env.config.failure_policy.is_strict() {
                        return Err(err);
                    }
                    warn!(scope = %scope, error = %err, "continuing after item failure");
                    report.warnings.push(err.to_string());
                }
                Err(fatal) => return Err(fatal),
            }
        }

        debug!(
            scope = %scope,
            page = %title,
            progress = %BuildReport::percent_complete(index + 1, total),
            "cached"
        );
    }

    // The final partial chunk still runs as its own job so the pass never
    // leaves a tail unprocessed.
    if can_queue && !chunk.is_empty() {
        report.chunks_queued += 1;
        report.queued_objects += chunk.len();
        submit_chunk(env, &service, std::mem::take(&mut chunk));
    }
    service.seal();
    // Completes immediately when every chunk has already finished (and in
    // the inline case); otherwise flushes, and the last chunk job performs
    // the completing call.
    service.complete_build()?;

    report.duration = started.elapsed();
    info!(
        scope = %scope,
        inline = report.refreshed_inline,
        chunks = report.chunks_queued,
        duration_ms = report.duration.as_millis() as u64,
        "rebuild pass finished"
    );
    Ok(report)
}

fn submit_chunk(env: &RebuildEnv, service: &Arc<NavigationBuildService>, chunk: Vec<PageRecord>) {
    service.register_chunk();
    let job = ChunkRefreshJob::new(
        Arc::clone(service),
        chunk,
        env.config.failure_policy,
        env.config.memory_limit.clone(),
        Arc::clone(&env.probe),
    )
    .with_critical_buffer(env.config.critical_buffer_bytes);
    env.queue.submit(Box::new(job));
}

/// Rebuild both stage scopes for one subsite's config: the propagate-on-
/// write rule. Editing the site-wide configuration regenerates the cached
/// tree for the draft and published views alike.
pub fn rebuild_both_stages(
    env: &RebuildEnv,
    config: &ConfigRecord,
    pages_for: &dyn Fn(Stage) -> Box<dyn PageCollection>,
) -> Result<Vec<BuildReport>, BuildError> {
    let mut reports = Vec::new();
    for stage in Stage::all() {
        let scope = ScopeKey::new(config.subsite, stage);
        let pages = pages_for(stage);
        reports.push(build_scope(env, scope, pages.as_ref(), config)?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RebuildConfig;
    use crate::job::FailurePolicy;
    use crate::queue::{NullJobQueue, ThreadedJobQueue};
    use crate::source::PageSet;
    use crate::store::{MemoryNavigationStore, NavigationStore};
    use parking_lot::Mutex;

    struct SequenceProbe {
        peaks: Mutex<Vec<u64>>,
        last: Mutex<u64>,
    }

    impl SequenceProbe {
        fn new(peaks: Vec<u64>) -> Self {
            Self {
                peaks: Mutex::new(peaks),
                last: Mutex::new(0),
            }
        }
    }

    impl MemoryProbe for SequenceProbe {
        fn peak_bytes(&self) -> u64 {
            let mut peaks = self.peaks.lock();
            let mut last = self.last.lock();
            if !peaks.is_empty() {
                *last = peaks.remove(0);
            }
            *last
        }
    }

    fn pages(n: u64) -> PageSet {
        PageSet::new(
            (1..=n)
                .map(|id| {
                    let parent = if id == 1 { 0 } else { 1 };
                    PageRecord::stub(id, parent, &format!("Page {id}"))
                })
                .collect(),
        )
    }

    fn env_with(
        queue: Arc<dyn JobQueue>,
        probe: Arc<dyn MemoryProbe>,
        store: Arc<dyn NavigationStore>,
    ) -> RebuildEnv {
        RebuildEnv {
            store,
            queue,
            probe,
            spec: Arc::new(SnapshotSpec::default()),
            config: RebuildConfig {
                chunk_watermark_bytes: 1000,
                critical_buffer_bytes: 100,
                memory_limit: "-1".to_string(),
                failure_policy: FailurePolicy::Strict,
            },
        }
    }

    #[test]
    fn inline_pass_without_queue() {
        let store: Arc<dyn NavigationStore> = Arc::new(MemoryNavigationStore::new());
        let env = env_with(
            Arc::new(NullJobQueue),
            Arc::new(SequenceProbe::new(vec![u64::MAX])), // watermark ignored inline
            store.clone(),
        );
        let scope = ScopeKey::new(0, Stage::Live);

        let report = build_scope(&env, scope, &pages(4), &ConfigRecord::stub(1)).unwrap();
        assert_eq!(report.refreshed_inline, 4);
        assert_eq!(report.chunks_queued, 0);

        let tree = store.load(scope).unwrap().unwrap();
        assert!(tree.is_completed());
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root_ids(), &[1]);
    }

    #[test]
    fn watermark_splits_the_pass_into_chunks() {
        let store: Arc<dyn NavigationStore> = Arc::new(MemoryNavigationStore::new());
        let queue = Arc::new(ThreadedJobQueue::new());
        // Baseline 100; growth crosses the 1000-byte watermark at objects
        // 2 and 4, leaving object 5 for the final partial chunk.
        let probe = Arc::new(SequenceProbe::new(vec![100, 500, 1200, 1250, 2300, 2300]));
        let env = env_with(queue.clone(), probe, store.clone());
        let scope = ScopeKey::new(0, Stage::Live);

        let report = build_scope(&env, scope, &pages(5), &ConfigRecord::stub(1)).unwrap();
        assert_eq!(report.refreshed_inline, 0);
        assert_eq!(report.chunks_queued, 3);
        assert_eq!(report.queued_objects, 5);

        queue.wait_idle();
        assert!(queue.failures().is_empty());
        let tree = store.load(scope).unwrap().unwrap();
        assert!(tree.is_completed());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn quiet_pass_queues_one_final_chunk() {
        let store: Arc<dyn NavigationStore> = Arc::new(MemoryNavigationStore::new());
        let queue = Arc::new(ThreadedJobQueue::new());
        let probe = Arc::new(SequenceProbe::new(vec![100]));
        let env = env_with(queue.clone(), probe, store.clone());
        let scope = ScopeKey::new(0, Stage::Live);

        let report = build_scope(&env, scope, &pages(3), &ConfigRecord::stub(1)).unwrap();
        assert_eq!(report.chunks_queued, 1);
        assert_eq!(report.queued_objects, 3);

        queue.wait_idle();
        let tree = store.load(scope).unwrap().unwrap();
        assert!(tree.is_completed());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn empty_scope_still_completes_with_config() {
        let store: Arc<dyn NavigationStore> = Arc::new(MemoryNavigationStore::new());
        let queue = Arc::new(ThreadedJobQueue::new());
        let env = env_with(queue, Arc::new(SequenceProbe::new(vec![100])), store.clone());
        let scope = ScopeKey::new(0, Stage::Draft);

        let report = build_scope(&env, scope, &pages(0), &ConfigRecord::stub(1)).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.chunks_queued, 0);
        let tree = store.load(scope).unwrap().unwrap();
        assert!(tree.is_completed());
        assert!(tree.is_empty());
    }

    #[test]
    fn rebuild_both_stages_covers_draft_and_live() {
        let store: Arc<dyn NavigationStore> = Arc::new(MemoryNavigationStore::new());
        let env = env_with(
            Arc::new(NullJobQueue),
            Arc::new(SequenceProbe::new(vec![0])),
            store.clone(),
        );

        let reports = rebuild_both_stages(&env, &ConfigRecord::stub(1), &|_stage| {
            Box::new(pages(2)) as Box<dyn PageCollection>
        })
        .unwrap();
        assert_eq!(reports.len(), 2);
        for scope in ScopeKey::both_stages(0) {
            assert!(store.load(scope).unwrap().unwrap().is_completed());
        }
    }

    #[test]
    fn percentage_formatting() {
        assert_eq!(BuildReport::percent_complete(1, 3), "33.3%");
        assert_eq!(BuildReport::percent_complete(3, 3), "100.0%");
        assert_eq!(BuildReport::percent_complete(0, 0), "100%");
    }
}
