//! Runs jobs off the UI thread.
//!
//! A fixed pool of workers pulls jobs from one queue, so requests overlap and
//! may finish in any order, but the thread count never grows with the pointer.
//! A hover lookup that a newer hover lookup has overtaken while queued is
//! skipped without being sent. Completions come back on one channel that the
//! UI drains every frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use super::{BitmapService, Completion, Job};
use crate::error::ViewerError;

/// Worker count when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

type Notify = Arc<dyn Fn() + Send + Sync>;

/// State every worker reads.
struct Shared {
    service: Arc<dyn BitmapService>,
    notify: OnceLock<Notify>,
    /// Sequence number of the newest supersedable job submitted.
    newest_supersedable: AtomicU64,
}

pub struct Dispatcher {
    jobs: Sender<Job>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    shared: Arc<Shared>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn BitmapService>) -> Self {
        Self::with_workers(service, DEFAULT_WORKERS)
    }

    /// Pool of `workers` threads (at least one).
    pub fn with_workers(service: Arc<dyn BitmapService>, workers: usize) -> Self {
        let (jobs, queue) = mpsc::channel::<Job>();
        let (tx, rx) = mpsc::channel();
        let queue = Arc::new(Mutex::new(queue));
        let shared = Arc::new(Shared {
            service,
            notify: OnceLock::new(),
            newest_supersedable: AtomicU64::new(0),
        });

        let mut spawned = 0;
        for index in 0..workers.max(1) {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            let tx = tx.clone();
            match std::thread::Builder::new()
                .name(format!("backend-worker-{index}"))
                .spawn(move || worker_loop(&queue, &shared, &tx))
            {
                Ok(_) => spawned += 1,
                Err(err) => tracing::error!(worker = index, error = %err, "could not spawn request worker"),
            }
        }
        tracing::debug!(workers = spawned, "request workers started");

        Self {
            jobs,
            tx,
            rx,
            shared,
            workers: spawned,
        }
    }

    /// Called from a worker after each completion is queued (e.g. `Context::request_repaint`).
    pub fn with_notify(self, notify: impl Fn() + Send + Sync + 'static) -> Self {
        if self.shared.notify.set(Arc::new(notify)).is_err() {
            tracing::warn!("dispatcher notify already set; keeping the first one");
        }
        self
    }

    /// Threads actually running.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn submit(&self, job: Job) {
        tracing::debug!(seq = job.seq, kind = job.kind.label(), "dispatching job");
        if job.kind.is_supersedable() {
            self.shared
                .newest_supersedable
                .fetch_max(job.seq, Ordering::AcqRel);
        }
        if self.workers == 0 {
            let _ = self.tx.send(Completion {
                job,
                result: Err(ViewerError::network(None, "no request worker is running")),
            });
            return;
        }
        if let Err(mpsc::SendError(job)) = self.jobs.send(job) {
            tracing::error!(seq = job.seq, "request queue closed");
            let _ = self.tx.send(Completion {
                job,
                result: Err(ViewerError::network(None, "request queue closed")),
            });
        }
    }

    pub fn submit_all(&self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            self.submit(job);
        }
    }

    /// Everything that finished since the last call, in arrival order.
    pub fn drain(&self) -> Vec<Completion> {
        self.rx.try_iter().collect()
    }

    /// Block for the next completion, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}

fn worker_loop(queue: &Mutex<Receiver<Job>>, shared: &Shared, tx: &Sender<Completion>) {
    loop {
        // The lock is only held while waiting for the next job.
        let next = match queue.lock() {
            Ok(queue) => queue.recv(),
            Err(_) => return,
        };
        // The dispatcher was dropped.
        let Ok(job) = next else {
            return;
        };
        if job.kind.is_supersedable()
            && job.seq < shared.newest_supersedable.load(Ordering::Acquire)
        {
            tracing::trace!(seq = job.seq, kind = job.kind.label(), "skipping superseded job");
            continue;
        }
        let completion = shared.service.execute(job);
        // The receiver is gone only when the viewer is shutting down.
        if tx.send(completion).is_err() {
            return;
        }
        if let Some(notify) = shared.notify.get() {
            notify();
        }
    }
}
