use crate::core::hash::{MediaHasher, ScanOutcome};
use crate::core::progress::{self, ProgressReporter};
use crossbeam_channel::{Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to start feeder thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Scan stopped after {delivered} of {expected} files")]
    Incomplete { delivered: usize, expected: usize },
}

/// Fingerprints files on a fixed set of workers fed through a bounded queue.
pub struct ParallelScanner {
    hasher: Arc<MediaHasher>,
    workers: usize,
    queue_capacity: usize,
}

impl ParallelScanner {
    pub fn new(hasher: MediaHasher) -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            hasher: Arc::new(hasher),
            workers,
            queue_capacity: workers * 4,
        }
    }

    /// `0` keeps the host-parallelism default.
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }

    /// `0` keeps the default of four slots per worker.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = if capacity > 0 {
            capacity
        } else {
            self.workers * 4
        };
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start hashing `paths`. The returned stream yields one outcome per path
    /// in the original order and reports progress as each is released.
    pub fn scan<'a>(
        &self,
        paths: Vec<PathBuf>,
        reporter: &'a dyn ProgressReporter,
    ) -> Result<ScanStream<'a>, PoolError> {
        let total = paths.len();
        if total == 0 {
            reporter.report(1.0, progress::EMPTY_FOLDER);
            return Ok(ScanStream::empty(reporter));
        }

        reporter.report(0.0, progress::NOT_STARTED);

        let workers = self.workers.min(total).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dedupe-hash-{}", i))
            .build()?;

        let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, PathBuf)>(self.queue_capacity);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, ScanOutcome)>();

        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let hasher = self.hasher.clone();
            pool.spawn(move || run_worker(&hasher, job_rx, result_tx));
        }
        drop(job_rx);
        drop(result_tx);

        thread::Builder::new()
            .name("dedupe-feeder".to_string())
            .spawn(move || feed(paths, job_tx))?;

        log::debug!("Hashing {} files on {} workers", total, workers);

        Ok(ScanStream {
            results: Some(result_rx),
            pending: BTreeMap::new(),
            next: 0,
            total,
            reporter,
            failed: false,
            _pool: Some(pool),
        })
    }
}

fn feed(paths: Vec<PathBuf>, jobs: Sender<(usize, PathBuf)>) {
    for job in paths.into_iter().enumerate() {
        // Every worker has gone away; nothing left to feed.
        if jobs.send(job).is_err() {
            break;
        }
    }
}

fn run_worker(
    hasher: &MediaHasher,
    jobs: Receiver<(usize, PathBuf)>,
    results: Sender<(usize, ScanOutcome)>,
) {
    for (index, path) in jobs.iter() {
        let outcome = hasher.hash(path);
        if results.send((index, outcome)).is_err() {
            break;
        }
    }
}

/// In-order view over the worker results.
///
/// Outcomes finishing early wait in a reorder buffer until every earlier
/// index has been released. Dropping the stream stops the workers.
pub struct ScanStream<'a> {
    results: Option<Receiver<(usize, ScanOutcome)>>,
    pending: BTreeMap<usize, ScanOutcome>,
    next: usize,
    total: usize,
    reporter: &'a dyn ProgressReporter,
    failed: bool,
    _pool: Option<ThreadPool>,
}

impl<'a> ScanStream<'a> {
    fn empty(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            results: None,
            pending: BTreeMap::new(),
            next: 0,
            total: 0,
            reporter,
            failed: false,
            _pool: None,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn release(&mut self, outcome: ScanOutcome) -> ScanOutcome {
        self.next += 1;
        let (fraction, message) = progress::scan_progress(self.next, self.total);
        self.reporter.report(fraction, &message);
        outcome
    }
}

impl Iterator for ScanStream<'_> {
    type Item = Result<ScanOutcome, PoolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total || self.failed {
            return None;
        }

        loop {
            if let Some(outcome) = self.pending.remove(&self.next) {
                return Some(Ok(self.release(outcome)));
            }

            let received = self.results.as_ref().map(|rx| rx.recv());
            match received {
                Some(Ok((index, outcome))) => {
                    self.pending.insert(index, outcome);
                }
                _ => {
                    self.failed = true;
                    return Some(Err(PoolError::Incomplete {
                        delivered: self.next,
                        expected: self.total,
                    }));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (0, Some(remaining))
    }
}
