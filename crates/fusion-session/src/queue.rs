//! MutationQueue: the single-writer job runner.
//!
//! The embedded engine tolerates exactly one writer; instead of
//! fine-grained per-table locking, every mutating operation -- import,
//! materialize, clear, drop, export -- is serialized through this queue.
//! Concurrency is fixed at 1: jobs run strictly in FIFO submission
//! order, and at most one job is ever active.
//!
//! The worker task *owns* the write-side [`TableStore`]. There is no
//! other handle to it, which turns the single-writer discipline from a
//! convention into a property of the types: the only way to mutate the
//! store is to enqueue a job.
//!
//! A job that fails reports the failure to its submitter and does not
//! block subsequent jobs. `reset()` drops jobs that have not started;
//! an active job always runs to completion (the engine's per-statement
//! atomicity is the only rollback). No timeouts are imposed -- a hung
//! job blocks the queue, acceptable for local file and in-memory work.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use fusion_store::TableStore;

use crate::job::{self, Job, JobError, JobOutput};

type JobResult = Result<JobOutput, JobError>;

struct QueuedJob {
    job: Job,
    reply: oneshot::Sender<JobResult>,
}

struct QueueInner {
    pending: Mutex<VecDeque<QueuedJob>>,
    /// Wakes the worker when a job is pushed.
    wake: Notify,
    /// Wakes `on_idle` waiters when the queue drains.
    idle: Notify,
    /// Jobs submitted but not yet settled (pending + active).
    in_flight: AtomicUsize,
}

/// Handle to a submitted job; resolves when the job settles.
pub struct JobHandle {
    label: String,
    rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// The label of the job this handle tracks.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Waits for the job to complete or fail.
    pub async fn wait(self) -> JobResult {
        match self.rx.await {
            Ok(result) => result,
            // Worker gone (queue dropped) before the job ran.
            Err(_) => Err(JobError::Cancelled { label: self.label }),
        }
    }
}

/// The single-concurrency mutation queue.
pub struct MutationQueue {
    inner: Arc<QueueInner>,
    worker: JoinHandle<()>,
}

impl MutationQueue {
    /// Spawns the worker task, transferring ownership of the write-side
    /// store into it. Must be called within a tokio runtime.
    pub fn spawn(mut store: TableStore) -> Self {
        let inner = Arc::new(QueueInner {
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            idle: Notify::new(),
            in_flight: AtomicUsize::new(0),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = tokio::spawn(async move {
            loop {
                let next = worker_inner.pending.lock().unwrap().pop_front();
                let Some(queued) = next else {
                    // `notify_one` stores a permit when nobody is parked,
                    // so a push between the pop and this await is not lost.
                    worker_inner.wake.notified().await;
                    continue;
                };

                let label = queued.job.label.clone();
                tracing::debug!(%label, "job started");
                let result =
                    job::run(&mut store, &queued.job).map_err(|e| JobError::Failed {
                        label: label.clone(),
                        message: e.to_string(),
                    });
                match &result {
                    Ok(_) => tracing::debug!(%label, "job finished"),
                    Err(err) => tracing::warn!(%label, error = %err, "job failed"),
                }
                // Submitter may have dropped its handle; that's fine.
                let _ = queued.reply.send(result);

                if worker_inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                    worker_inner.idle.notify_waiters();
                }
            }
        });

        MutationQueue { inner, worker }
    }

    /// Admits a job at the back of the queue.
    pub fn enqueue(&self, job: Job) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let label = job.label.clone();
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner
            .pending
            .lock()
            .unwrap()
            .push_back(QueuedJob { job, reply: tx });
        self.inner.wake.notify_one();
        JobHandle { label, rx }
    }

    /// Resolves when no job is pending or active.
    pub async fn on_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Cancels every job that has not yet started, resolving their
    /// handles with [`JobError::Cancelled`]. The active job, if any,
    /// runs to completion. Returns the number of cancelled jobs.
    pub fn reset(&self) -> usize {
        let drained: Vec<QueuedJob> = {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.drain(..).collect()
        };
        let cancelled = drained.len();
        if cancelled > 0 {
            let remaining = self
                .inner
                .in_flight
                .fetch_sub(cancelled, Ordering::SeqCst)
                - cancelled;
            for queued in drained {
                let label = queued.job.label;
                tracing::debug!(%label, "job cancelled by reset");
                let _ = queued.reply.send(Err(JobError::Cancelled { label }));
            }
            if remaining == 0 {
                self.inner.idle.notify_waiters();
            }
        }
        cancelled
    }

    /// Jobs submitted but not yet settled (pending + active).
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for MutationQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
