//! Temporal finders: hidden coupling, knowledge silos, review blindspots,
//! churn hotspots
//!
//! Temporal-aware finders only emit for files whose change count exceeds
//! the per-run median (the hotspot filter).

use crate::analyzers::semantic::Role;
use crate::config::InsightConfig;
use crate::finders::{is_hotspot, Finder};
use crate::findings::{Evidence, Finding, FindingKind};
use crate::signals::Tier;
use crate::store::{slots, Store};

/// Minimum cochange lift before a pair counts as coupled
const COUPLING_MIN_LIFT: f64 = 2.0;
/// Minimum conditional confidence for hidden coupling
const COUPLING_MIN_CONFIDENCE: f64 = 0.6;
/// Bus factor below this reads as a single effective owner
const SILO_MAX_BUS_FACTOR: f64 = 1.5;

/// Files that change together without any structural edge
pub struct HiddenCouplingFinder;

impl Finder for HiddenCouplingFinder {
    fn name(&self) -> &'static str {
        "hidden_coupling"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::TEMPORAL, slots::GRAPH]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(temporal) = store.temporal.get() else { return Vec::new() };
        let Some(graph) = store.graph.get() else { return Vec::new() };
        if temporal.is_empty() {
            return Vec::new();
        }

        temporal
            .cochange
            .iter()
            .filter(|edge| {
                edge.lift >= COUPLING_MIN_LIFT && edge.confidence >= COUPLING_MIN_CONFIDENCE
            })
            .filter(|edge| is_hotspot(store, &edge.a) || is_hotspot(store, &edge.b))
            .filter(|edge| {
                // Structural neighbors are expected to co-change
                let (a, b) = (graph.index_of(&edge.a), graph.index_of(&edge.b));
                match (a, b) {
                    (Some(a), Some(b)) => {
                        !graph.out_neighbors(a).contains(&b) && !graph.out_neighbors(b).contains(&a)
                    }
                    _ => true,
                }
            })
            .map(|edge| {
                Finding::new(
                    FindingKind::HiddenCoupling,
                    vec![edge.a.clone(), edge.b.clone()],
                    (edge.confidence).clamp(0.0, 1.0),
                    vec![
                        Evidence::new(
                            "cochange_pair_count",
                            edge.lift,
                            format!("changed together {}x, lift {:.1}", edge.count, edge.lift),
                        ),
                        Evidence::new(
                            "dependency_edges",
                            0.0,
                            "no structural edge connects the pair",
                        ),
                    ],
                )
            })
            .collect()
    }
}

/// Central files effectively owned by one person.
///
/// Percentile variant: pagerank >= p90 and bus factor < 1.5. Absolute
/// variant: in-degree >= 5 and bus factor < 1.5.
pub struct KnowledgeSiloFinder;

impl Finder for KnowledgeSiloFinder {
    fn name(&self) -> &'static str {
        "knowledge_silo"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::TEMPORAL, slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(temporal) = store.temporal.get() else { return Vec::new() };
        let Some(field) = store.signals.get() else { return Vec::new() };
        if temporal.is_empty() {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for (path, churn) in &temporal.files {
            if churn.bus_factor >= SILO_MAX_BUS_FACTOR || !is_hotspot(store, path) {
                continue;
            }
            let central = match field.tier {
                Tier::Absolute => field.file_value(path, "in_degree").unwrap_or(0.0) >= 5.0,
                _ => field.file_percentile(path, "pagerank").unwrap_or(0.0) >= 0.9,
            };
            if !central {
                continue;
            }

            findings.push(Finding::new(
                FindingKind::KnowledgeSilo,
                vec![path.clone()],
                (1.0 - churn.author_entropy).clamp(0.5, 1.0),
                vec![
                    Evidence::new(
                        "bus_factor",
                        churn.bus_factor,
                        format!("effectively {} contributor(s)", churn.bus_factor.round() as i64),
                    ),
                    Evidence::new(
                        "pagerank",
                        field.file_value(path, "pagerank").unwrap_or(0.0),
                        "highly depended upon",
                    )
                    .with_percentile(field.file_percentile(path, "pagerank")),
                    Evidence::new(
                        "primary_author_share",
                        churn.primary_share,
                        format!("{} owns {:.0}% of changes", churn.primary_author, churn.primary_share * 100.0),
                    ),
                ],
            ));
        }
        findings
    }
}

/// Central files with no test coverage anywhere in the tree
pub struct ReviewBlindspotFinder;

impl Finder for ReviewBlindspotFinder {
    fn name(&self) -> &'static str {
        "review_blindspot"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS, slots::STRUCTURAL, slots::SEMANTIC, slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(files) = store.file_metrics.get() else { return Vec::new() };
        let Some(structural) = store.structural.get() else { return Vec::new() };
        let Some(semantic) = store.semantic.get() else { return Vec::new() };
        let Some(field) = store.signals.get() else { return Vec::new() };

        // Test files and everything they import
        let test_files: Vec<&crate::scanner::ScannedFile> = files
            .iter()
            .filter(|f| semantic.role_of(&f.metrics.path) == Role::Test)
            .collect();
        let tested: ahash::AHashSet<&str> = test_files
            .iter()
            .filter_map(|f| f.syntax.as_ref())
            .flat_map(|s| s.imports.iter().filter_map(|i| i.resolved.as_deref()))
            .collect();
        let test_stems: Vec<String> = test_files
            .iter()
            .map(|f| {
                stem_of(&f.metrics.path)
                    .trim_start_matches("test_")
                    .trim_end_matches("_test")
                    .to_string()
            })
            .collect();

        let mut findings = Vec::new();
        for (path, s) in &structural.files {
            if semantic.role_of(path) == Role::Test {
                continue;
            }
            let central = match field.tier {
                Tier::Absolute => s.in_degree >= 5,
                _ => field.file_percentile(path, "pagerank").unwrap_or(0.0) >= 0.9,
            };
            if !central {
                continue;
            }

            let stem = stem_of(path);
            let has_test = tested.contains(path.as_str())
                || test_stems.iter().any(|t| !t.is_empty() && t == stem);
            if has_test {
                continue;
            }

            findings.push(Finding::new(
                FindingKind::ReviewBlindspot,
                vec![path.clone()],
                0.75,
                vec![
                    Evidence::new("in_degree", s.in_degree as f64, "widely imported")
                        .with_percentile(field.file_percentile(path, "in_degree")),
                    Evidence::new("pagerank", s.pagerank, "no test file exercises it")
                        .with_percentile(field.file_percentile(path, "pagerank")),
                ],
            ));
        }
        findings
    }
}

/// Files both volatile and heavy: trajectory CHURNING or SPIKING with a
/// top-decile change count (absolute variant: ten or more changes).
pub struct ChurnHotspotFinder;

impl Finder for ChurnHotspotFinder {
    fn name(&self) -> &'static str {
        "churn_hotspot"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::TEMPORAL, slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(temporal) = store.temporal.get() else { return Vec::new() };
        let Some(field) = store.signals.get() else { return Vec::new() };
        if temporal.is_empty() {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for (path, churn) in &temporal.files {
            use crate::analyzers::temporal::Trajectory;
            if !matches!(churn.trajectory, Trajectory::Churning | Trajectory::Spiking) {
                continue;
            }
            if !is_hotspot(store, path) {
                continue;
            }
            let heavy = match field.tier {
                Tier::Absolute => churn.total_changes >= 10,
                _ => field.file_percentile(path, "total_changes").unwrap_or(0.0) >= 0.9,
            };
            if !heavy {
                continue;
            }

            findings.push(Finding::new(
                FindingKind::ChurnHotspot,
                vec![path.clone()],
                0.8,
                vec![
                    Evidence::new(
                        "total_changes",
                        churn.total_changes as f64,
                        format!("trajectory {}", churn.trajectory.as_str()),
                    )
                    .with_percentile(field.file_percentile(path, "total_changes")),
                    Evidence::new("churn_cv", churn.cv, "volatile change pattern"),
                ],
            ));
        }
        findings
    }
}

fn stem_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path).split('.').next().unwrap_or("")
}
