//! Engine: scan, analyze in waves, find, rank, persist
//!
//! Wave 1 analyzers run on worker threads wherever their requires sets
//! are satisfied and their provides sets are disjoint. Fusion runs alone
//! in Wave 2. Finders are parallel pure reads. Ranking and persistence
//! are single-threaded. Cancellation is cooperative at phase boundaries.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::analyzers::{self, Analyzer};
use crate::config::InsightConfig;
use crate::error::{InsightError, Result};
use crate::finders;
use crate::git;
use crate::history::{write_sidecar, HistoryDb};
use crate::scanner::{self, ScanStats};
use crate::signals::Tier;
use crate::snapshot::Snapshot;
use crate::store::{slots, Store};

/// Cooperative cancellation flag, checked at phase boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(InsightError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// End-of-run report, printed for every run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub scan: ScanStats,
    pub commit_count: usize,
    pub tier: Option<Tier>,
    /// (analyzer, reason)
    pub analyzers_skipped: Vec<(String, String)>,
    /// (finder, reason)
    pub finders_skipped: Vec<(String, String)>,
    pub findings_count: usize,
    pub health: Option<f64>,
    pub snapshot_id: Option<i64>,
    /// Set when persistence failed and the snapshot went to a sidecar
    pub sidecar: Option<PathBuf>,
    pub persistence_error: Option<String>,
}

/// Everything a run produces
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub summary: RunSummary,
}

/// The analysis engine for one root
pub struct Engine {
    config: InsightConfig,
    cancel: CancelToken,
}

impl Engine {
    pub fn new(config: InsightConfig) -> Self {
        Self { config, cancel: CancelToken::new() }
    }

    pub fn with_cancel(config: InsightConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// Run the full pipeline. Only persistence errors propagate as such;
    /// analyzer and finder failures degrade to skips in the summary.
    pub fn run(&self, root: &Path) -> Result<RunOutcome> {
        match self.config.parallel_workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| InsightError::Config { message: e.to_string() })?;
                pool.install(|| self.run_inner(root))
            }
            None => self.run_inner(root),
        }
    }

    fn run_inner(&self, root: &Path) -> Result<RunOutcome> {
        let mut summary = RunSummary::default();
        let store = Store::new();

        // Leaves: scanner and git extractor are the only file-touching
        // stages and are independent of each other
        self.cancel.check()?;
        let (scan_result, history) = rayon::join(
            || scanner::scan(root, &self.config),
            || git::extract(root, &self.config.temporal),
        );
        let (files, scan_stats) = scan_result?;
        if files.is_empty() {
            return Err(InsightError::EmptyScan { path: root.display().to_string() });
        }
        summary.files_scanned = files.len();
        summary.scan = scan_stats;
        summary.commit_count = history.commits.len();

        store.file_metrics.set(slots::FILE_METRICS, files);
        store.git_history.set(slots::GIT_HISTORY, history);

        // Wave 1, then fusion
        self.cancel.check()?;
        self.run_wave(&store, analyzers::wave_one(), &mut summary)?;
        self.cancel.check()?;
        self.run_wave(&store, analyzers::wave_two(), &mut summary)?;
        summary.tier = store.signals.get().map(|s| s.tier);

        // Finders over the immutable post-fusion store
        self.cancel.check()?;
        let outcome = finders::run_finders(&store, &self.config);
        summary.finders_skipped = outcome.skipped;
        summary.findings_count = outcome.findings.len();

        let timestamp = chrono::Utc::now().timestamp();
        let mut snapshot =
            Snapshot::build(&root.display().to_string(), &store, outcome.findings, timestamp);
        summary.health = snapshot.codebase_health();

        // Persistence, with sidecar fallback
        self.cancel.check()?;
        if self.config.enable_cache {
            match HistoryDb::open(root).and_then(|mut db| db.persist(&mut snapshot)) {
                Ok(id) => {
                    summary.snapshot_id = Some(id);
                    crate::history::prune_stale_sidecars(root, self.config.cache_ttl_hours);
                }
                Err(e) => {
                    warn!(error = %e, "persistence failed, preserving snapshot to sidecar");
                    summary.persistence_error = Some(e.to_string());
                    match write_sidecar(root, &snapshot) {
                        Ok(path) => summary.sidecar = Some(path),
                        Err(sidecar_err) => {
                            warn!(error = %sidecar_err, "sidecar write also failed");
                        }
                    }
                }
            }
        }

        Ok(RunOutcome { snapshot, summary })
    }

    /// Run one wave: repeatedly execute every analyzer whose requirements
    /// are populated, in parallel, until quiescent. Analyzers left over
    /// are skipped with the reason logged.
    fn run_wave(
        &self,
        store: &Store,
        wave: Vec<Box<dyn Analyzer>>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut pending = wave;
        let started = std::time::Instant::now();

        while !pending.is_empty() {
            self.cancel.check()?;
            if started.elapsed().as_secs() > self.config.timeout_seconds {
                warn!(
                    elapsed_s = started.elapsed().as_secs(),
                    budget_s = self.config.timeout_seconds,
                    "analyzer wave exceeded its soft time budget"
                );
            }

            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|a| a.requires().iter().all(|slot| store.is_populated(slot)));

            if ready.is_empty() {
                for analyzer in &waiting {
                    let missing: Vec<&str> = analyzer
                        .requires()
                        .iter()
                        .copied()
                        .filter(|slot| !store.is_populated(slot))
                        .collect();
                    let reason = format!("missing slots: {}", missing.join(", "));
                    info!(analyzer = analyzer.name(), %reason, "skipping analyzer");
                    summary.analyzers_skipped.push((analyzer.name().to_string(), reason));
                }
                break;
            }

            let failures: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
            rayon::scope(|scope| {
                for analyzer in &ready {
                    let failures = &failures;
                    scope.spawn(move |_| {
                        let result = catch_unwind(AssertUnwindSafe(|| {
                            analyzer.run(store, &self.config)
                        }));
                        match result {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!(analyzer = analyzer.name(), error = %e, "analyzer failed");
                                failures
                                    .lock()
                                    .push((analyzer.name().to_string(), e.to_string()));
                            }
                            Err(_) => {
                                warn!(analyzer = analyzer.name(), "analyzer panicked");
                                failures
                                    .lock()
                                    .push((analyzer.name().to_string(), "panicked".to_string()));
                            }
                        }
                    });
                }
            });
            summary.analyzers_skipped.extend(failures.into_inner());

            pending = waiting;
        }

        Ok(())
    }
}
