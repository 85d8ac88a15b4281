use crate::config::{Config, ConfigError};
use crate::core::actions::{Action, ActionExecutor, ActionReport};
use crate::core::duplicate::{DuplicateGrouper, GroupError};
use crate::core::hash::MediaHasher;
use crate::core::pool::{ParallelScanner, PoolError};
use crate::core::progress::{self, ProgressReporter};
use crate::core::resolution::{Resolution, ResolutionPolicy};
use crate::core::scanner::{FileEnumerator, ScanError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

/// Failures that abort a run. Per-file and per-duplicate problems never
/// reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error("Engine panicked: {message}")]
    Panicked { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub action: Option<Action>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub files_seen: usize,
    pub fingerprinted: usize,
    pub skipped: usize,
    pub groups: usize,
    pub duplicates: usize,
    pub actions: ActionReport,
    pub resolutions: Vec<Resolution>,
}

impl RunSummary {
    fn new(root: &Path, action: Option<Action>, dry_run: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            action,
            dry_run,
            started_at: Utc::now(),
            elapsed_ms: 0,
            files_seen: 0,
            fingerprinted: 0,
            skipped: 0,
            groups: 0,
            duplicates: 0,
            actions: ActionReport::default(),
            resolutions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files_seen == 0
    }
}

/// Runs one detection-and-resolution pass over a directory tree.
pub struct Deduplicator {
    root: PathBuf,
    config: Config,
    dry_run: bool,
}

impl Deduplicator {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run on the calling thread. `action = None` finds and resolves groups
    /// without touching any file.
    ///
    /// The reporter always ends at fraction 1.0: "Process completed",
    /// "Critical error occurred", or the single empty-folder update.
    pub fn run(
        &self,
        action: Option<Action>,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, EngineError> {
        let started = Instant::now();
        match self.execute(action, reporter) {
            Ok(mut summary) => {
                summary.elapsed_ms = started.elapsed().as_millis() as u64;
                if !summary.is_empty() {
                    reporter.report(1.0, progress::COMPLETED);
                }
                log::info!(
                    "Scanned {} files ({} fingerprinted, {} skipped): {} group(s), {} duplicate(s) in {}ms",
                    summary.files_seen,
                    summary.fingerprinted,
                    summary.skipped,
                    summary.groups,
                    summary.duplicates,
                    summary.elapsed_ms
                );
                Ok(summary)
            }
            Err(e) => {
                log::error!("Run over {} aborted: {}", self.root.display(), e);
                reporter.report(1.0, progress::CRITICAL_ERROR);
                Err(e)
            }
        }
    }

    /// Run on a dedicated background thread so the caller's own thread stays
    /// free. A panic inside the engine is reported as a critical error.
    pub fn spawn(
        self,
        action: Option<Action>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> std::io::Result<JoinHandle<Result<RunSummary, EngineError>>> {
        thread::Builder::new()
            .name("dedupe-engine".to_string())
            .spawn(move || {
                panic::catch_unwind(AssertUnwindSafe(|| self.run(action, reporter.as_ref())))
                    .unwrap_or_else(|payload| {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        log::error!("Engine panicked: {}", message);
                        reporter.report(1.0, progress::CRITICAL_ERROR);
                        Err(EngineError::Panicked { message })
                    })
            })
    }

    fn execute(
        &self,
        action: Option<Action>,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, EngineError> {
        self.config.validate()?;
        let enumerator = FileEnumerator::new(&self.root)?;
        let root = enumerator.root().to_path_buf();
        let mut summary = RunSummary::new(&root, action, self.dry_run);

        let files = enumerator.discover_files()?;
        summary.files_seen = files.len();
        log::info!("Found {} files under {}", files.len(), root.display());

        let hasher = MediaHasher::new(self.config.hash_size, self.config.ffmpeg.clone());
        let scanner = ParallelScanner::new(hasher)
            .with_workers(self.config.effective_workers())
            .with_queue_capacity(self.config.queue_capacity);
        let stream = scanner.scan(files, reporter)?;
        if stream.is_empty() {
            return Ok(summary);
        }

        // The grouper lives on this thread only; workers hand over outcomes
        // through the stream and never see the map.
        let mut grouper = DuplicateGrouper::new();
        for outcome in stream {
            grouper.insert(outcome?)?;
        }
        summary.fingerprinted = grouper.fingerprinted();
        summary.skipped = grouper.skipped();

        let resolutions = ResolutionPolicy::new().resolve_all(grouper.into_groups());
        summary.groups = resolutions.len();
        summary.duplicates = resolutions.iter().map(|r| r.duplicates.len()).sum();

        if let Some(action) = action {
            log::info!(
                "Applying {} to {} duplicate(s) in {} group(s)",
                action,
                summary.duplicates,
                summary.groups
            );
            let executor = ActionExecutor::new(&root, action)
                .with_duplicates_dir(&self.config.duplicates_dir)
                .with_dry_run(self.dry_run);
            summary.actions = executor.execute(&resolutions);
        }
        summary.resolutions = resolutions;

        Ok(summary)
    }
}
