//! Temporal analyzer: churn, cochange, authorship, commit intent

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::store::{slots, Store};

/// Commits touching more files than this are treated as bulk operations
/// and excluded from cochange counting
const BULK_COMMIT_LIMIT: usize = 50;
/// Minimum joint occurrences before a pair is scored
const MIN_PAIR_COUNT: usize = 2;

const FIX_KEYWORDS: &[&str] = &["fix", "bug", "patch", "hotfix", "resolve", "repair"];
const REFACTOR_KEYWORDS: &[&str] = &["refactor", "restructure", "reorganize", "clean", "simplify"];

/// Churn classification for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trajectory {
    #[default]
    Dormant,
    Stabilizing,
    Stable,
    Churning,
    Spiking,
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dormant => "DORMANT",
            Self::Stabilizing => "STABILIZING",
            Self::Stable => "STABLE",
            Self::Churning => "CHURNING",
            Self::Spiking => "SPIKING",
        }
    }

    /// Five-way decision tree over change volume, slope, and volatility
    pub fn classify(total_changes: usize, slope: f64, cv: f64) -> Self {
        if total_changes <= 1 {
            Self::Dormant
        } else if slope < -0.1 && cv < 1.0 {
            Self::Stabilizing
        } else if slope > 0.1 && cv > 0.5 {
            Self::Spiking
        } else if cv > 0.5 {
            Self::Churning
        } else {
            Self::Stable
        }
    }
}

/// Per-file temporal facts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChurn {
    pub total_changes: usize,
    /// Changes inside the velocity window
    pub recent_changes: usize,
    pub window_counts: Vec<usize>,
    pub slope: f64,
    pub cv: f64,
    pub trajectory: Trajectory,
    pub author_entropy: f64,
    pub bus_factor: f64,
    pub primary_author: String,
    pub primary_share: f64,
    pub fix_ratio: f64,
    pub refactor_ratio: f64,
    /// Epoch seconds of the newest commit touching the file
    pub last_change: i64,
}

/// One scored cochange pair; paths ordered (a < b)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CochangeEdge {
    pub a: String,
    pub b: String,
    pub count: usize,
    pub lift: f64,
    pub confidence: f64,
    pub temporal_coupling: f64,
}

/// Temporal facts for the run. Empty when there is no git history.
#[derive(Debug, Clone, Default)]
pub struct TemporalFacts {
    pub files: BTreeMap<String, FileChurn>,
    pub cochange: Vec<CochangeEdge>,
    pub commit_count: usize,
    /// Median total_changes across all scanned files, for the hotspot
    /// filter
    pub median_changes: f64,
}

impl TemporalFacts {
    pub fn is_empty(&self) -> bool {
        self.commit_count == 0
    }

    pub fn cochange_between(&self, a: &str, b: &str) -> Option<&CochangeEdge> {
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        self.cochange.iter().find(|e| e.a == x && e.b == y)
    }
}

pub struct TemporalAnalyzer;

impl Analyzer for TemporalAnalyzer {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS, slots::GIT_HISTORY]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::TEMPORAL]
    }

    fn run(&self, store: &Store, config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };
        let Some(history) = store.git_history.get() else { return Ok(()) };

        if history.is_empty() {
            info!("empty git history, temporal slot left empty");
            store.temporal.set(slots::TEMPORAL, TemporalFacts::default());
            return Ok(());
        }

        let scanned: ahash::AHashSet<&str> =
            files.iter().map(|f| f.metrics.path.as_str()).collect();

        // Commits newest-first; restrict to scanned files
        let filtered: Vec<(i64, &str, Vec<&str>)> = history
            .commits
            .iter()
            .map(|c| {
                let touched: Vec<&str> = c
                    .files
                    .iter()
                    .map(String::as_str)
                    .filter(|f| scanned.contains(f))
                    .collect();
                (c.timestamp, c.subject.as_str(), touched)
            })
            .filter(|(_, _, touched)| !touched.is_empty())
            .collect();

        if filtered.is_empty() {
            store.temporal.set(slots::TEMPORAL, TemporalFacts::default());
            return Ok(());
        }

        let newest = filtered.iter().map(|(ts, _, _)| *ts).max().unwrap_or(0);
        let oldest = filtered.iter().map(|(ts, _, _)| *ts).min().unwrap_or(0);
        let window_secs = i64::from(config.temporal.churn_window_days) * 86_400;
        let window_count =
            (((newest - oldest) / window_secs.max(1)) + 1).max(1) as usize;
        let velocity_cutoff =
            newest - i64::from(config.temporal.velocity_window_days) * 86_400;

        // Per-file accumulation
        #[derive(Default)]
        struct FileAcc<'a> {
            windows: Vec<usize>,
            authors: ahash::AHashMap<&'a str, usize>,
            total: usize,
            recent: usize,
            fixes: usize,
            refactors: usize,
            last: i64,
        }
        let mut acc: BTreeMap<&str, FileAcc> = BTreeMap::new();

        // Cochange pair counters and single-file occurrence counts
        let mut pair_counts: ahash::AHashMap<(&str, &str), usize> = ahash::AHashMap::new();
        let mut occurrence: ahash::AHashMap<&str, usize> = ahash::AHashMap::new();

        for commit in &history.commits {
            let touched: Vec<&str> = commit
                .files
                .iter()
                .map(String::as_str)
                .filter(|f| scanned.contains(f))
                .collect();
            if touched.is_empty() {
                continue;
            }

            let subject = commit.subject.to_lowercase();
            let is_fix = FIX_KEYWORDS.iter().any(|k| subject.contains(k));
            let is_refactor = REFACTOR_KEYWORDS.iter().any(|k| subject.contains(k));
            let window =
                (((commit.timestamp - oldest) / window_secs.max(1)).max(0) as usize).min(window_count - 1);

            for &path in &touched {
                let entry = acc.entry(path).or_default();
                if entry.windows.is_empty() {
                    entry.windows = vec![0; window_count];
                }
                entry.windows[window] += 1;
                entry.total += 1;
                *entry.authors.entry(commit.author.as_str()).or_insert(0) += 1;
                if commit.timestamp >= velocity_cutoff {
                    entry.recent += 1;
                }
                if is_fix {
                    entry.fixes += 1;
                }
                if is_refactor {
                    entry.refactors += 1;
                }
                entry.last = entry.last.max(commit.timestamp);
                *occurrence.entry(path).or_insert(0) += 1;
            }

            // Bulk-commit filter bounds the quadratic pair space
            if touched.len() <= BULK_COMMIT_LIMIT {
                for (i, &a) in touched.iter().enumerate() {
                    for &b in &touched[i + 1..] {
                        let key = if a <= b { (a, b) } else { (b, a) };
                        *pair_counts.entry(key).or_insert(0) += 1;
                    }
                }
            }
        }

        let total_commits = filtered.len() as f64;
        let mut cochange: Vec<CochangeEdge> = pair_counts
            .into_iter()
            .filter(|(_, count)| *count >= MIN_PAIR_COUNT)
            .map(|((a, b), count)| {
                let p_a = occurrence[a] as f64 / total_commits;
                let p_b = occurrence[b] as f64 / total_commits;
                let p_ab = count as f64 / total_commits;
                let lift = p_ab / (p_a * p_b);
                let confidence = (p_ab / p_a).max(p_ab / p_b);
                CochangeEdge {
                    a: a.to_string(),
                    b: b.to_string(),
                    count,
                    lift,
                    confidence,
                    temporal_coupling: lift * confidence,
                }
            })
            .collect();
        cochange.sort_by(|x, y| (x.a.as_str(), x.b.as_str()).cmp(&(y.a.as_str(), y.b.as_str())));

        let mut per_file = BTreeMap::new();
        for (path, file_acc) in acc {
            let (slope, cv) = churn_statistics(&file_acc.windows);
            let (entropy, primary_author, primary_share) = authorship(&file_acc.authors);
            per_file.insert(
                path.to_string(),
                FileChurn {
                    total_changes: file_acc.total,
                    recent_changes: file_acc.recent,
                    window_counts: file_acc.windows,
                    slope,
                    cv,
                    trajectory: Trajectory::classify(file_acc.total, slope, cv),
                    author_entropy: entropy,
                    bus_factor: entropy.exp2(),
                    primary_author,
                    primary_share,
                    fix_ratio: file_acc.fixes as f64 / file_acc.total as f64,
                    refactor_ratio: file_acc.refactors as f64 / file_acc.total as f64,
                    last_change: file_acc.last,
                },
            );
        }

        // Median across all scanned files; untouched files count zero
        let mut change_counts: Vec<usize> = files
            .iter()
            .map(|f| per_file.get(&f.metrics.path).map(|c| c.total_changes).unwrap_or(0))
            .collect();
        change_counts.sort_unstable();
        let median_changes = median_of_sorted(&change_counts);

        debug!(
            commits = filtered.len(),
            tracked_files = per_file.len(),
            cochange_pairs = cochange.len(),
            "temporal analysis complete"
        );

        store.temporal.set(
            slots::TEMPORAL,
            TemporalFacts {
                files: per_file,
                cochange,
                commit_count: filtered.len(),
                median_changes,
            },
        );
        Ok(())
    }
}

/// Closed-form OLS slope over (index, count) plus coefficient of variation
fn churn_statistics(windows: &[usize]) -> (f64, f64) {
    let n = windows.len() as f64;
    if windows.is_empty() {
        return (0.0, 0.0);
    }

    let sum_x: f64 = (0..windows.len()).map(|i| i as f64).sum();
    let sum_y: f64 = windows.iter().map(|&y| y as f64).sum();
    let sum_xy: f64 = windows.iter().enumerate().map(|(i, &y)| i as f64 * y as f64).sum();
    let sum_xx: f64 = (0..windows.len()).map(|i| (i * i) as f64).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    let slope = if denom.abs() < f64::EPSILON { 0.0 } else { (n * sum_xy - sum_x * sum_y) / denom };

    let mean = sum_y / n;
    let cv = if mean > 0.0 {
        let variance =
            windows.iter().map(|&y| (y as f64 - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt() / mean
    } else {
        0.0
    };

    (slope, cv)
}

/// Shannon entropy over author commit counts, primary author and share
fn authorship(authors: &ahash::AHashMap<&str, usize>) -> (f64, String, f64) {
    let total: usize = authors.values().sum();
    if total == 0 {
        return (0.0, String::new(), 0.0);
    }

    // Sorted iteration keeps the float accumulation byte-stable across runs
    let mut sorted: Vec<(&&str, &usize)> = authors.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let entropy = sorted
        .iter()
        .map(|(_, &c)| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0);

    let (primary, count) = sorted[0];
    (entropy, primary.to_string(), *count as f64 / total as f64)
}

fn median_of_sorted(sorted: &[usize]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}
