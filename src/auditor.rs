/*!
 * Batch driver: walk, look up, aggregate
 *
 * The default mode is strictly sequential: one file is read, uploaded and
 * resolved before the next one starts, so when request N fails exactly the
 * files before it have been resolved. With more than one worker, uploads run
 * on a fixed-size thread pool and a single collector on the calling thread
 * owns the aggregator. Outcomes are joined by source path there.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::Local;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;
use crate::error::{AuditError, Result};
use crate::lookup::Lookup;
use crate::progress::{AuditEvent, ProgressReporter};
use crate::types::{BatchResult, LookupOutcome, RunMetadata};
use crate::walker::Walker;

/// Shared stop signal for a batch
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the batch to stop dispatching new requests
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a batch produced
#[derive(Debug)]
pub struct AuditOutcome {
    /// Records stored before the batch ended
    pub result: BatchResult,
    /// Fatal error that ended the batch early
    pub error: Option<AuditError>,
    /// Whether the batch stopped because it was cancelled
    pub cancelled: bool,
}

impl AuditOutcome {
    /// True when every file was handled
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

/// Message from an upload worker to the collector
enum WorkerMessage {
    Resolved(PathBuf, Result<LookupOutcome>),
    Unreadable(AuditError),
}

/// Runs one batch over a walker with a lookup implementation
pub struct Auditor<L: Lookup> {
    walker: Walker,
    lookup: L,
    only_missing: bool,
    workers: usize,
    cancel: CancelFlag,
}

impl<L: Lookup> Auditor<L> {
    /// Create a sequential auditor
    pub fn new(walker: Walker, lookup: L, only_missing: bool) -> Self {
        Self {
            walker,
            lookup,
            only_missing,
            workers: 1,
            cancel: CancelFlag::new(),
        }
    }

    /// Upload with up to `workers` concurrent requests
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Use an externally owned cancel flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops this auditor
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(self.walker.root())
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Run the batch to completion, cancellation or the first fatal error.
    ///
    /// Whatever was stored before the batch ended is always returned, so a
    /// partial result can still be exported.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> AuditOutcome {
        let metadata = RunMetadata {
            root_path: self.walker.root().to_string_lossy().to_string(),
            recursive: self.walker.is_recursive(),
            only_missing: self.only_missing,
            timestamp: Local::now(),
        };
        let mut aggregator = Aggregator::new(metadata);

        let total = self.walker.count();
        reporter.report(&AuditEvent::Started { total });
        info!(
            root = %self.walker.root().display(),
            total,
            workers = self.workers,
            "starting audit"
        );

        let (error, cancelled) = if self.workers > 1 {
            match ThreadPoolBuilder::new().num_threads(self.workers).build() {
                Ok(pool) => self.run_pool(&pool, &mut aggregator, total, reporter),
                Err(e) => (Some(crate::error!(Config, "Failed to start workers: {}", e)), false),
            }
        } else {
            self.run_sequential(&mut aggregator, total, reporter)
        };

        let result = aggregator.finish();
        match &error {
            Some(e) => error!(error = %e, stored = result.len(), "audit aborted"),
            None if cancelled => warn!(stored = result.len(), "audit cancelled"),
            None => info!(
                stored = result.len(),
                skipped = result.skipped().len(),
                "audit complete"
            ),
        }

        AuditOutcome {
            result,
            error,
            cancelled,
        }
    }

    fn run_sequential(
        &self,
        aggregator: &mut Aggregator,
        total: u64,
        reporter: &dyn ProgressReporter,
    ) -> (Option<AuditError>, bool) {
        let mut current = 0u64;

        for entry in self.walker.files() {
            if self.cancel.is_cancelled() {
                return (None, true);
            }

            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    record_unreadable(aggregator, e, reporter);
                    continue;
                }
            };

            current += 1;
            let resolved = self.lookup.lookup(&path);
            if let Some(fatal) = self.collect(aggregator, path, resolved, reporter) {
                return (Some(fatal), false);
            }
            reporter.report(&AuditEvent::Progress {
                current,
                total: total.max(current),
            });
        }

        (None, false)
    }

    fn run_pool(
        &self,
        pool: &rayon::ThreadPool,
        aggregator: &mut Aggregator,
        total: u64,
        reporter: &dyn ProgressReporter,
    ) -> (Option<AuditError>, bool) {
        let (tx, rx) = crossbeam_channel::bounded::<WorkerMessage>(self.workers * 2);
        let abort = CancelFlag::new();
        let mut fatal = None;
        let mut current = 0u64;

        thread::scope(|scope| {
            let lookup = &self.lookup;
            let cancel = &self.cancel;
            let abort = &abort;
            let files = self.walker.files();

            scope.spawn(move || {
                pool.install(|| {
                    files.par_bridge().for_each_with(tx, |tx, entry| {
                        if cancel.is_cancelled() || abort.is_cancelled() {
                            return;
                        }
                        let message = match entry {
                            Ok(path) => {
                                let resolved = lookup.lookup(&path);
                                if matches!(&resolved, Err(e) if e.is_fatal()) {
                                    abort.cancel();
                                }
                                WorkerMessage::Resolved(path, resolved)
                            }
                            Err(e) => WorkerMessage::Unreadable(e),
                        };
                        // The collector only hangs up once every sender is gone.
                        let _ = tx.send(message);
                    });
                });
            });

            for message in rx {
                match message {
                    WorkerMessage::Unreadable(e) => record_unreadable(aggregator, e, reporter),
                    WorkerMessage::Resolved(path, resolved) => {
                        current += 1;
                        if let Some(e) = self.collect(aggregator, path, resolved, reporter) {
                            // Keep draining so in-flight uploads are still recorded.
                            fatal.get_or_insert(e);
                            continue;
                        }
                        reporter.report(&AuditEvent::Progress {
                            current,
                            total: total.max(current),
                        });
                    }
                }
            }
        });

        let cancelled = fatal.is_none() && self.cancel.is_cancelled();
        (fatal, cancelled)
    }

    /// Store one resolved file. Returns the error when it is fatal.
    fn collect(
        &self,
        aggregator: &mut Aggregator,
        path: PathBuf,
        resolved: Result<LookupOutcome>,
        reporter: &dyn ProgressReporter,
    ) -> Option<AuditError> {
        match resolved {
            Ok(outcome) => {
                let relative = self.relative_path(&path);
                let source = path.to_string_lossy().to_string();
                debug!(path = %relative, status = ?outcome.status(), "resolved");
                if let Some(record) = aggregator.record(source, relative, outcome) {
                    reporter.report(&AuditEvent::Recorded(record));
                }
                None
            }
            Err(e) if e.is_fatal() => {
                error!(path = %path.display(), error = %e, "lookup failed");
                Some(e)
            }
            Err(e) => {
                record_unreadable(aggregator, e, reporter);
                None
            }
        }
    }
}

fn record_unreadable(aggregator: &mut Aggregator, error: AuditError, reporter: &dyn ProgressReporter) {
    let path = match &error {
        AuditError::Filesystem { path, .. } => path.clone(),
        _ => PathBuf::new(),
    };
    warn!(path = %path.display(), error = %error, "skipping unreadable file");
    reporter.report(&AuditEvent::Skipped {
        path: &path,
        error: &error,
    });
    aggregator.skip(path.to_string_lossy().to_string(), error.to_string());
}
