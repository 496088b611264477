//! Finder framework: signal predicates -> findings, then rank and dedup
//!
//! Finders are capability objects {name, requires, find} iterated by the
//! kernel. A finder whose requirements are unsatisfied is skipped with a
//! log line; a finder that panics is caught and treated as producing zero
//! findings. Neither ever fails the run.

mod architecture;
mod semantic;
mod structural;
mod temporal;

use std::panic::{catch_unwind, AssertUnwindSafe};

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::InsightConfig;
use crate::findings::{Finding, Scope};
use crate::signals::SignalField;
use crate::store::Store;

pub use architecture::{BoundaryMismatchFinder, LayerViolationFinder};
pub use semantic::{NamingDriftFinder, StaleTodoFinder};
pub use structural::{
    BottleneckHubFinder, CloneFinder, CycleFinder, GodFileFinder, OrphanFinder,
    PhantomImportFinder,
};
pub use temporal::{ChurnHotspotFinder, HiddenCouplingFinder, KnowledgeSiloFinder, ReviewBlindspotFinder};

/// Grouped FILE findings per kind are capped at this many groups
const MAX_GROUPS_PER_KIND: usize = 3;

/// A finding producer over the immutable post-fusion store
pub trait Finder: Send + Sync {
    fn name(&self) -> &'static str;
    /// Store slots that must be populated for this finder to run
    fn requires(&self) -> &'static [&'static str];
    /// Pure read over the store; never mutates
    fn find(&self, store: &Store, config: &InsightConfig) -> Vec<Finding>;
}

/// The full finder pool
pub fn all_finders() -> Vec<Box<dyn Finder>> {
    vec![
        Box::new(OrphanFinder),
        Box::new(PhantomImportFinder),
        Box::new(CloneFinder),
        Box::new(CycleFinder),
        Box::new(GodFileFinder),
        Box::new(BottleneckHubFinder),
        Box::new(HiddenCouplingFinder),
        Box::new(KnowledgeSiloFinder),
        Box::new(ReviewBlindspotFinder),
        Box::new(ChurnHotspotFinder),
        Box::new(LayerViolationFinder),
        Box::new(BoundaryMismatchFinder),
        Box::new(NamingDriftFinder),
        Box::new(StaleTodoFinder),
    ]
}

/// Outcome of the finder phase, including skips for the run summary
#[derive(Debug, Default)]
pub struct FinderOutcome {
    pub findings: Vec<Finding>,
    pub skipped: Vec<(String, String)>,
}

/// Run every finder in parallel, then group, dedup, annotate, and rank.
pub fn run_finders(store: &Store, config: &InsightConfig) -> FinderOutcome {
    let finders = all_finders();

    let mut skipped = Vec::new();
    let mut runnable: Vec<&dyn Finder> = Vec::new();
    for finder in &finders {
        let missing: Vec<&str> = finder
            .requires()
            .iter()
            .copied()
            .filter(|slot| !store.is_populated(slot))
            .collect();
        if missing.is_empty() {
            runnable.push(finder.as_ref());
        } else {
            let reason = format!("missing slots: {}", missing.join(", "));
            info!(finder = finder.name(), %reason, "skipping finder");
            skipped.push((finder.name().to_string(), reason));
        }
    }

    let mut findings: Vec<Finding> = runnable
        .par_iter()
        .flat_map_iter(|finder| {
            match catch_unwind(AssertUnwindSafe(|| finder.find(store, config))) {
                Ok(found) => found,
                Err(_) => {
                    warn!(finder = finder.name(), "finder panicked, treating as zero findings");
                    Vec::new()
                }
            }
        })
        .collect();

    findings = group_file_findings(findings, store);
    findings = dedup(findings);
    annotate_percentiles(&mut findings, store.signals.get());
    rank(&mut findings);

    FinderOutcome { findings, skipped }
}

/// Group FILE-scope findings of one kind by module, one grouped finding
/// per (kind, module), capped per kind.
fn group_file_findings(findings: Vec<Finding>, store: &Store) -> Vec<Finding> {
    let module_of = store.architecture.get().map(|a| &a.module_of);

    let mut passthrough = Vec::new();
    let mut buckets: std::collections::BTreeMap<(String, String), Vec<Finding>> =
        std::collections::BTreeMap::new();

    for finding in findings {
        if finding.scope != Scope::File {
            passthrough.push(finding);
            continue;
        }
        let module = finding
            .entities
            .first()
            .and_then(|path| module_of.and_then(|m| m.get(path)))
            .cloned()
            .unwrap_or_default();
        buckets.entry((finding.kind.as_str().to_string(), module)).or_default().push(finding);
    }

    let mut per_kind: std::collections::BTreeMap<String, Vec<Finding>> =
        std::collections::BTreeMap::new();
    for ((kind, _module), mut group) in buckets {
        let merged = if group.len() == 1 {
            group.pop().expect("non-empty group")
        } else {
            merge_group(group)
        };
        per_kind.entry(kind).or_default().push(merged);
    }

    let mut out = passthrough;
    for (_, mut groups) in per_kind {
        groups.sort_by(|a, b| {
            OrderedFloat(b.rank_score())
                .cmp(&OrderedFloat(a.rank_score()))
                .then_with(|| a.entities.cmp(&b.entities))
        });
        groups.truncate(MAX_GROUPS_PER_KIND);
        out.extend(groups);
    }
    out
}

/// Merge same-kind FILE findings into one carrying the affected file list
fn merge_group(group: Vec<Finding>) -> Finding {
    let kind = group[0].kind;
    let confidence =
        group.iter().map(|f| f.confidence).sum::<f64>() / group.len() as f64;

    let mut entities: Vec<String> =
        group.iter().flat_map(|f| f.entities.iter().cloned()).collect();
    entities.sort();
    entities.dedup();

    // Keep the strongest member's evidence up front
    let mut members = group;
    members.sort_by_key(|f| std::cmp::Reverse(OrderedFloat(f.rank_score())));
    let evidence: Vec<crate::findings::Evidence> =
        members.iter().take(3).flat_map(|f| f.evidence.iter().cloned()).collect();

    Finding::new(kind, entities, confidence, evidence)
}

/// Drop duplicate identity keys, keeping the higher-confidence finding
fn dedup(mut findings: Vec<Finding>) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        a.identity_key
            .cmp(&b.identity_key)
            .then_with(|| OrderedFloat(b.confidence).cmp(&OrderedFloat(a.confidence)))
    });
    findings.dedup_by(|a, b| a.identity_key == b.identity_key);
    findings
}

/// Fill evidence percentiles from the signal field where missing
fn annotate_percentiles(findings: &mut [Finding], signals: Option<&SignalField>) {
    let Some(field) = signals else { return };
    for finding in findings.iter_mut() {
        for evidence in finding.evidence.iter_mut() {
            if evidence.percentile.is_some() {
                continue;
            }
            for entity in &finding.entities {
                if let Some(p) = field.file_percentile(entity, &evidence.signal) {
                    evidence.percentile = Some(p);
                    break;
                }
            }
        }
    }
}

/// Order by rank score descending; lexicographic entity paths break ties
/// so ordering is fully deterministic.
fn rank(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        OrderedFloat(b.rank_score())
            .cmp(&OrderedFloat(a.rank_score()))
            .then_with(|| a.entities.cmp(&b.entities))
            .then_with(|| a.identity_key.cmp(&b.identity_key))
    });
}

/// Hotspot filter shared by temporal-aware finders: only files whose
/// change count exceeds the per-run median qualify.
pub(crate) fn is_hotspot(store: &Store, path: &str) -> bool {
    let Some(temporal) = store.temporal.get() else { return false };
    let changes =
        temporal.files.get(path).map(|c| c.total_changes as f64).unwrap_or(0.0);
    changes > temporal.median_changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Evidence, FindingKind};

    fn file_finding(kind: FindingKind, path: &str, confidence: f64) -> Finding {
        Finding::new(
            kind,
            vec![path.to_string()],
            confidence,
            vec![Evidence::new("lines", 10.0, "test")],
        )
    }

    #[test]
    fn dedup_keeps_one_per_identity() {
        let findings = vec![
            file_finding(FindingKind::OrphanCode, "a.py", 0.5),
            file_finding(FindingKind::OrphanCode, "a.py", 0.9),
            file_finding(FindingKind::OrphanCode, "b.py", 0.5),
        ];
        let out = dedup(findings);
        assert_eq!(out.len(), 2);
        let a = out.iter().find(|f| f.entities == vec!["a.py".to_string()]).unwrap();
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn grouping_merges_same_kind_file_findings() {
        let store = Store::new();
        let findings = vec![
            file_finding(FindingKind::OrphanCode, "a.py", 0.8),
            file_finding(FindingKind::OrphanCode, "b.py", 0.6),
            file_finding(FindingKind::GodFile, "c.py", 0.9),
        ];
        let out = group_file_findings(findings, &store);
        // Orphans merge (same unassigned module), god file stays alone
        assert_eq!(out.len(), 2);
        let orphan = out.iter().find(|f| f.kind == FindingKind::OrphanCode).unwrap();
        assert_eq!(orphan.entities, vec!["a.py".to_string(), "b.py".to_string()]);
        assert!((orphan.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn rank_is_deterministic_on_ties() {
        let mut findings = vec![
            file_finding(FindingKind::OrphanCode, "b.py", 0.5),
            file_finding(FindingKind::OrphanCode, "a.py", 0.5),
        ];
        rank(&mut findings);
        assert_eq!(findings[0].entities[0], "a.py");
    }
}
