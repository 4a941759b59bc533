//! Background-job facility.
//!
//! The rebuild pipeline depends only on the narrow [`JobQueue`] interface:
//! `submit` a unit of work, ask whether the facility is `available`. The
//! threaded queue here is the in-process implementation; deployments with
//! an external job runner implement the trait over it instead.

use crate::error::BuildError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a job that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    /// First recorded warning, when the job completed with non-fatal
    /// per-item failures.
    pub warning: Option<String>,
}

/// A queued unit of background work.
pub trait Job: Send + 'static {
    /// Unique identity for this job instance. Must be derived freshly —
    /// never from the job's inputs — so distinct chunks of the same scope
    /// are not treated as duplicates.
    fn signature(&self) -> &str;

    /// Human-readable description for queue listings.
    fn title(&self) -> String;

    /// Execute the job. Fatal errors are surfaced through the queue's
    /// failure reporting; they are never swallowed.
    fn process(&self) -> Result<JobOutcome, BuildError>;
}

/// Handle returned by `submit`.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub signature: String,
}

/// Terminal status of a submitted job.
#[derive(Debug, Clone)]
pub enum JobStatus {
    Pending,
    Running,
    Completed { warning: Option<String> },
    Failed { message: String },
}

/// Queue counters, mirrored into log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub submitted: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Facility interface the scheduler consumes.
pub trait JobQueue: Send + Sync {
    fn available(&self) -> bool;
    fn submit(&self, job: Box<dyn Job>) -> JobHandle;
}

/// In-process queue running each job on its own worker thread.
#[derive(Default)]
pub struct ThreadedJobQueue {
    workers: Mutex<Vec<JoinHandle<()>>>,
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    stats: Arc<RwLock<QueueStats>>,
}

impl ThreadedJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> QueueStats {
        *self.stats.read()
    }

    pub fn status(&self, signature: &str) -> Option<JobStatus> {
        self.statuses.read().get(signature).cloned()
    }

    /// Messages of every failed job, in completion order.
    pub fn failures(&self) -> Vec<String> {
        self.statuses
            .read()
            .values()
            .filter_map(|status| match status {
                JobStatus::Failed { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Block until every submitted job has finished.
    pub fn wait_idle(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                error!("job worker thread panicked");
            }
        }
    }
}

impl JobQueue for ThreadedJobQueue {
    fn available(&self) -> bool {
        true
    }

    fn submit(&self, job: Box<dyn Job>) -> JobHandle {
        let signature = job.signature().to_string();
        let title = job.title();
        debug!(signature = %signature, title = %title, "queueing job");

        self.statuses
            .write()
            .insert(signature.clone(), JobStatus::Pending);
        self.stats.write().submitted += 1;

        let statuses = Arc::clone(&self.statuses);
        let stats = Arc::clone(&self.stats);
        let thread_signature = signature.clone();
        let worker = std::thread::spawn(move || {
            statuses
                .write()
                .insert(thread_signature.clone(), JobStatus::Running);
            stats.write().processing += 1;

            let result = job.process();

            let mut stats = stats.write();
            stats.processing -= 1;
            match result {
                Ok(outcome) => {
                    stats.completed += 1;
                    if let Some(warning) = &outcome.warning {
                        warn!(signature = %thread_signature, warning = %warning, "job completed with warnings");
                    } else {
                        info!(signature = %thread_signature, "job completed");
                    }
                    statuses.write().insert(
                        thread_signature,
                        JobStatus::Completed {
                            warning: outcome.warning,
                        },
                    );
                }
                Err(err) => {
                    stats.failed += 1;
                    error!(signature = %thread_signature, error = %err, "job failed");
                    statuses.write().insert(
                        thread_signature,
                        JobStatus::Failed {
                            message: err.to_string(),
                        },
                    );
                }
            }
        });

        self.workers.lock().push(worker);
        JobHandle { signature }
    }
}

/// Absent facility: forces the scheduler to process everything inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJobQueue;

impl JobQueue for NullJobQueue {
    fn available(&self) -> bool {
        false
    }

    fn submit(&self, job: Box<dyn Job>) -> JobHandle {
        // The scheduler never submits when `available` is false; a call
        // here is a caller bug and the work is dropped loudly.
        let signature = job.signature().to_string();
        error!(signature = %signature, "job submitted to unavailable queue, dropping");
        JobHandle { signature }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    struct FixedJob {
        signature: String,
        fail_with: Option<NodeId>,
        warning: Option<String>,
    }

    impl Job for FixedJob {
        fn signature(&self) -> &str {
            &self.signature
        }

        fn title(&self) -> String {
            "fixed job".to_string()
        }

        fn process(&self) -> Result<JobOutcome, BuildError> {
            match self.fail_with {
                Some(id) => Err(BuildError::ItemPersist { id }),
                None => Ok(JobOutcome {
                    warning: self.warning.clone(),
                }),
            }
        }
    }

    #[test]
    fn completed_and_failed_jobs_are_tracked() {
        let queue = ThreadedJobQueue::new();
        let ok = queue.submit(Box::new(FixedJob {
            signature: "job-ok".to_string(),
            fail_with: None,
            warning: None,
        }));
        let warned = queue.submit(Box::new(FixedJob {
            signature: "job-warn".to_string(),
            fail_with: None,
            warning: Some("unable to cache object #9".to_string()),
        }));
        let bad = queue.submit(Box::new(FixedJob {
            signature: "job-bad".to_string(),
            fail_with: Some(3),
            warning: None,
        }));
        queue.wait_idle();

        assert!(matches!(
            queue.status(&ok.signature),
            Some(JobStatus::Completed { warning: None })
        ));
        assert!(matches!(
            queue.status(&warned.signature),
            Some(JobStatus::Completed { warning: Some(_) })
        ));
        assert!(matches!(
            queue.status(&bad.signature),
            Some(JobStatus::Failed { .. })
        ));

        let stats = queue.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(queue.failures().len(), 1);
        assert!(queue.failures()[0].contains("#3"));
    }

    #[test]
    fn null_queue_is_unavailable() {
        assert!(!NullJobQueue.available());
    }
}
