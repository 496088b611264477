//! Signal fusion: one typed field with percentiles and composites
//!
//! Runs in its own wave after every other analyzer. Raw measurements are
//! copied into the field, percentiles are assigned per the active tier,
//! the five canonical primitives are fused into raw risk and the
//! consistency-weighted risk score, and the fixed composite formulas
//! produce module health and the codebase-level scores.

use std::collections::BTreeMap;

use tracing::debug;

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::signals::{
    percentile_floor, SignalEntry, SignalField, SignalMap, SignalValue, Tier,
};
use crate::store::{slots, Store};

/// Composite weights: module health
const HEALTH_W_COHESION: f64 = 0.25;
const HEALTH_W_LOW_COUPLING: f64 = 0.20;
const HEALTH_W_MAIN_SEQ: f64 = 0.20;
const HEALTH_W_ROLE: f64 = 0.20;
const HEALTH_W_BOUNDARY: f64 = 0.15;

/// Composite weights: global wiring
const WIRING_W_MODULARITY: f64 = 0.5;
const WIRING_W_ACYCLICITY: f64 = 0.3;
const WIRING_W_CONNECTIVITY: f64 = 0.2;

/// Composite weights: architecture health
const ARCH_W_MODULE_HEALTH: f64 = 0.4;
const ARCH_W_CLEAN_EDGES: f64 = 0.3;
const ARCH_W_BOUNDARY: f64 = 0.3;

/// Composite weights: codebase health
const CODEBASE_W_WIRING: f64 = 0.35;
const CODEBASE_W_ARCHITECTURE: f64 = 0.35;
const CODEBASE_W_LOW_RISK: f64 = 0.30;

/// Consistency agreement exponents (weighted geometric mean)
const AGREEMENT_EXP_CV: f64 = 0.4;
const AGREEMENT_EXP_SIGN: f64 = 0.3;
const AGREEMENT_EXP_ENTROPY: f64 = 0.3;

pub struct FusionAnalyzer;

impl Analyzer for FusionAnalyzer {
    fn name(&self) -> &'static str {
        "fusion"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[
            slots::FILE_METRICS,
            slots::GRAPH,
            slots::STRUCTURAL,
            slots::CLONES,
            slots::TEMPORAL,
            slots::SEMANTIC,
            slots::SPECTRAL,
            slots::ARCHITECTURE,
        ]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::SIGNALS]
    }

    fn run(&self, store: &Store, config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };
        let Some(graph) = store.graph.get() else { return Ok(()) };
        let Some(structural) = store.structural.get() else { return Ok(()) };
        let Some(clones) = store.clones.get() else { return Ok(()) };
        let Some(temporal) = store.temporal.get() else { return Ok(()) };
        let Some(semantic) = store.semantic.get() else { return Ok(()) };
        let Some(spectral) = store.spectral.get() else { return Ok(()) };
        let Some(architecture) = store.architecture.get() else { return Ok(()) };

        let n = files.len();
        let tier = Tier::for_file_count(n);
        let mut field = SignalField::new(tier);

        let newest_commit = temporal.files.values().map(|c| c.last_change).max().unwrap_or(0);

        // Raw per-file signals
        for file in files {
            let path = &file.metrics.path;
            let mut map = SignalMap::new();

            let m = &file.metrics;
            put_count(&mut map, "lines", m.lines);
            put_count(&mut map, "token_count", m.token_count);
            put_count(&mut map, "function_count", m.function_count);
            put_count(&mut map, "class_count", m.class_count);
            put_count(&mut map, "import_count", m.raw_imports.len());
            if m.function_count > 0 {
                put_float(&mut map, "avg_function_length", m.lines as f64 / m.function_count as f64);
            }
            if let Some(syntax) = &file.syntax {
                let max_nesting =
                    syntax.functions.iter().map(|f| f.nesting_depth).max().unwrap_or(0);
                put_count(&mut map, "max_nesting", max_nesting);
            }
            put_float(&mut map, "cognitive_load", m.cognitive_load);
            put_float(&mut map, "compression_ratio", m.compression_ratio);

            if let Some(s) = structural.files.get(path) {
                put_count(&mut map, "in_degree", s.in_degree);
                put_count(&mut map, "out_degree", s.out_degree);
                put_float(&mut map, "pagerank", s.pagerank);
                put_float(&mut map, "betweenness", s.betweenness);
                put_count(&mut map, "blast_radius_size", s.blast_radius);
                if let Some(depth) = s.depth_from_entry {
                    put_count(&mut map, "depth_from_entry", depth);
                }
                put_count(&mut map, "community", s.community);
                map.insert("in_cycle".into(), SignalEntry::new(SignalValue::Flag(s.in_cycle)));
                put_count(&mut map, "phantom_import_count", s.phantom_imports);
            }
            if !clones.skipped {
                put_count(&mut map, "clone_pair_count", clones.pair_count_for(path));
            }

            match temporal.files.get(path) {
                Some(churn) => {
                    put_count(&mut map, "total_changes", churn.total_changes);
                    put_count(&mut map, "recent_changes", churn.recent_changes);
                    put_float(&mut map, "churn_slope", churn.slope);
                    put_float(&mut map, "churn_cv", churn.cv);
                    map.insert(
                        "churn_trajectory".into(),
                        SignalEntry::new(SignalValue::Label(churn.trajectory.as_str().into())),
                    );
                    put_float(&mut map, "author_entropy", churn.author_entropy);
                    put_float(&mut map, "bus_factor", churn.bus_factor);
                    put_float(&mut map, "primary_author_share", churn.primary_share);
                    put_float(&mut map, "fix_ratio", churn.fix_ratio);
                    put_float(&mut map, "refactor_ratio", churn.refactor_ratio);
                    let days = (newest_commit - churn.last_change).max(0) / 86_400;
                    put_count(&mut map, "days_since_change", days as usize);
                }
                None => {
                    // Untracked files still carry the documented defaults
                    put_count(&mut map, "total_changes", 0);
                    map.insert(
                        "churn_trajectory".into(),
                        SignalEntry::new(SignalValue::Label("DORMANT".into())),
                    );
                }
            }

            if let Some(sem) = semantic.files.get(path) {
                map.insert(
                    "role".into(),
                    SignalEntry::new(SignalValue::Label(sem.role.as_str().into())),
                );
                put_float(&mut map, "docstring_coverage", sem.docstring_coverage);
                put_float(&mut map, "todo_density", sem.todo_density);
                put_float(&mut map, "naming_drift", sem.naming_drift);
                put_count(&mut map, "concept_count", sem.concepts.len());
            }

            field.files.insert(path.clone(), map);
        }

        assign_file_percentiles(&mut field);

        // Raw risk and the consistency-weighted risk score
        let primitives = collect_primitives(&field, n, !temporal.is_empty());
        for (path, values) in &primitives {
            let raw = weighted_sum_rescaled(values, &config.fusion_weights);
            field.raw_risk.insert(path.clone(), raw);
            if let Some(map) = field.files.get_mut(path) {
                put_float(map, "raw_risk", raw);
            }
        }

        if tier != Tier::Absolute {
            // A consistency-weighted deviation at the configured z
            // threshold maps to a risk score of 1 - 1/e
            let z_scale = config.z_score_threshold.max(1e-6);
            let scores = consistency_scores(&primitives, &config.fusion_weights);
            for (path, (score, _confidence)) in scores {
                if let Some(map) = field.files.get_mut(&path) {
                    put_float(map, "risk_score", 1.0 - (-score / z_scale).exp());
                }
            }
            for path in field.files.keys().cloned().collect::<Vec<_>>() {
                let quality = 1.0
                    - (0.4 * field.file_percentile(&path, "betweenness").unwrap_or(0.0)
                        + 0.3 * field.file_percentile(&path, "blast_radius_size").unwrap_or(0.0)
                        + 0.3 * field.file_percentile(&path, "out_degree").unwrap_or(0.0));
                if let Some(map) = field.files.get_mut(&path) {
                    put_float(map, "wiring_quality", quality.clamp(0.0, 1.0));
                }
            }
        }

        // Health Laplacian over undirected adjacency
        for path in field.files.keys().cloned().collect::<Vec<_>>() {
            let own = field.raw_risk.get(&path).copied().unwrap_or(0.0);
            let delta = match graph.index_of(&path) {
                Some(v) => {
                    let neighbors = graph.undirected_neighbors(v);
                    if neighbors.is_empty() {
                        0.0
                    } else {
                        let neighborhood: f64 = neighbors
                            .iter()
                            .filter_map(|&w| field.raw_risk.get(graph.path(w)))
                            .sum::<f64>()
                            / neighbors.len() as f64;
                        own - neighborhood
                    }
                }
                None => 0.0,
            };
            field.delta_h.insert(path.clone(), delta);
            if let Some(map) = field.files.get_mut(&path) {
                put_float(map, "delta_h", delta);
            }
        }

        // Module signals
        for module in &architecture.modules {
            let mut map = SignalMap::new();
            put_count(&mut map, "file_count", module.files.len());
            put_count(&mut map, "afferent_coupling", module.afferent);
            put_count(&mut map, "efferent_coupling", module.efferent);
            put_float(&mut map, "cohesion", module.cohesion);
            put_float(&mut map, "coupling", module.coupling);
            put_float(&mut map, "abstractness", module.abstractness);
            if let Some(instability) = module.instability {
                put_float(&mut map, "instability", instability);
            }
            if let Some(msd) = module.main_seq_distance {
                put_float(&mut map, "main_seq_distance", msd);
            }
            put_float(&mut map, "role_consistency", module.role_consistency);
            put_float(&mut map, "boundary_alignment", module.boundary_alignment);

            let churn: usize = module
                .files
                .iter()
                .filter_map(|f| temporal.files.get(f))
                .map(|c| c.total_changes)
                .sum();
            put_count(&mut map, "module_churn", churn);

            if tier != Tier::Absolute {
                put_float(&mut map, "health_score", module_health(module));
            }
            field.modules.insert(module.name.clone(), map);
        }

        // Global signals
        put_count(&mut field.global, "total_files", n);
        put_count(&mut field.global, "total_modules", architecture.modules.len());
        put_count(&mut field.global, "dependency_edges", graph.edge_count());
        put_count(&mut field.global, "cycle_count", structural.cycle_count);
        put_float(&mut field.global, "modularity", structural.modularity);
        put_float(&mut field.global, "fiedler_value", spectral.fiedler_value);
        put_count(&mut field.global, "layer_count", architecture.layer_count);
        put_count(&mut field.global, "violation_count", architecture.violations.len());
        put_count(&mut field.global, "cochange_pair_count", temporal.cochange.len());
        put_count(&mut field.global, "commit_count", temporal.commit_count);
        if !clones.skipped {
            put_count(&mut field.global, "clone_pairs", clones.pairs.len());
        }

        if tier != Tier::Absolute {
            let in_cycle = structural.files.values().filter(|f| f.in_cycle).count();
            let cycle_ratio = if n > 0 { in_cycle as f64 / n as f64 } else { 0.0 };
            let wiring = WIRING_W_MODULARITY * structural.modularity.clamp(0.0, 1.0)
                + WIRING_W_ACYCLICITY * (1.0 - cycle_ratio)
                + WIRING_W_CONNECTIVITY * spectral.fiedler_value.min(1.0);
            put_float(&mut field.global, "wiring_score", wiring);

            let module_healths: Vec<f64> =
                architecture.modules.iter().map(module_health).collect();
            let mean_health = mean(&module_healths).unwrap_or(0.0);
            let boundary_mean = mean(
                &architecture.modules.iter().map(|m| m.boundary_alignment).collect::<Vec<_>>(),
            )
            .unwrap_or(0.0);
            let edge_total: usize =
                architecture.module_edges.iter().map(|(_, _, w)| w).sum();
            let violation_ratio = if edge_total > 0 {
                (architecture.violations.len() as f64 / edge_total as f64).min(1.0)
            } else {
                0.0
            };
            let arch = ARCH_W_MODULE_HEALTH * mean_health
                + ARCH_W_CLEAN_EDGES * (1.0 - violation_ratio)
                + ARCH_W_BOUNDARY * boundary_mean;
            put_float(&mut field.global, "architecture_health", arch);

            let risks: Vec<f64> = field
                .files
                .values()
                .filter_map(|m| m.get("risk_score").and_then(|e| e.value.as_f64()))
                .collect();
            let mean_risk = mean(&risks).unwrap_or(0.0);
            let codebase = CODEBASE_W_WIRING * wiring
                + CODEBASE_W_ARCHITECTURE * arch
                + CODEBASE_W_LOW_RISK * (1.0 - mean_risk);
            put_float(&mut field.global, "codebase_health", codebase);
        }

        // Second percentile pass covers the fused file signals
        assign_file_percentiles(&mut field);

        debug!(tier = ?tier, files = field.files.len(), "signal fusion complete");
        store.signals.set(slots::SIGNALS, field);
        Ok(())
    }
}

fn put_count(map: &mut SignalMap, name: &str, value: usize) {
    map.insert(name.to_string(), SignalEntry::new(SignalValue::Count(value as u64)));
}

fn put_float(map: &mut SignalMap, name: &str, value: f64) {
    if value.is_finite() {
        map.insert(name.to_string(), SignalEntry::new(SignalValue::Float(value)));
    }
}

/// Percentile of x within sorted sample: |{v <= x}| / |S|
fn empirical_percentile(sorted: &[f64], x: f64) -> f64 {
    let count = sorted.partition_point(|&v| v <= x);
    count as f64 / sorted.len() as f64
}

/// Flat-prior Bayesian percentile for small samples
fn bayesian_percentile(sorted: &[f64], x: f64) -> f64 {
    let count = sorted.partition_point(|&v| v <= x);
    (count as f64 + 1.0) / (sorted.len() as f64 + 2.0)
}

/// Assign percentiles to every numeric file signal per the active tier
fn assign_file_percentiles(field: &mut SignalField) {
    if field.tier == Tier::Absolute {
        return;
    }

    // Collect per-signal samples
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for map in field.files.values() {
        for (name, entry) in map {
            if matches!(entry.value, SignalValue::Float(_) | SignalValue::Count(_)) {
                if let Some(v) = entry.value.as_f64() {
                    samples.entry(name.clone()).or_default().push(v);
                }
            }
        }
    }
    for values in samples.values_mut() {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    }

    let tier = field.tier;
    for map in field.files.values_mut() {
        for (name, entry) in map.iter_mut() {
            let Some(raw) = entry.value.as_f64() else { continue };
            if matches!(entry.value, SignalValue::Flag(_)) {
                continue;
            }
            let Some(sorted) = samples.get(name) else { continue };
            if let Some(floor) = percentile_floor(name) {
                if raw < floor {
                    entry.percentile = Some(0.0);
                    continue;
                }
            }
            let pct = match tier {
                Tier::Full => empirical_percentile(sorted, raw),
                Tier::Bayesian => bayesian_percentile(sorted, raw),
                Tier::Absolute => unreachable!(),
            };
            entry.percentile = Some(pct);
        }
    }
}

/// The five canonical risk primitives per file, each normalized to [0, 1].
/// Order: compression ratio, pagerank, churn volatility, semantic
/// incoherence, cognitive load. Absent primitives are None.
fn collect_primitives(
    field: &SignalField,
    n: usize,
    has_history: bool,
) -> BTreeMap<String, [Option<f64>; 5]> {
    field
        .files
        .iter()
        .map(|(path, map)| {
            let get = |name: &str| map.get(name).and_then(|e| e.value.as_f64());
            let compression = get("compression_ratio");
            let pagerank =
                get("pagerank").map(|p| (p * n as f64 / 3.0).min(1.0));
            let volatility = if has_history {
                get("churn_cv").map(|cv| cv / (1.0 + cv))
            } else {
                None
            };
            let incoherence = get("naming_drift");
            let cognitive = get("cognitive_load").map(|c| c / (c + 30.0));
            (path.clone(), [compression, pagerank, volatility, incoherence, cognitive])
        })
        .collect()
}

/// Weighted sum over available primitives; weights for absent primitives
/// are dropped and the rest rescaled to sum to one.
fn weighted_sum_rescaled(values: &[Option<f64>; 5], weights: &[f64; 5]) -> f64 {
    let active: f64 =
        values.iter().zip(weights).filter(|(v, _)| v.is_some()).map(|(_, w)| w).sum();
    if active <= 0.0 {
        return 0.0;
    }
    values
        .iter()
        .zip(weights)
        .filter_map(|(v, w)| v.map(|v| v * w / active))
        .sum()
}

/// Consistency-weighted scores: |weighted z-sum| scaled by the geometric
/// mean of three agreement measures. Returns (score, confidence) per file.
fn consistency_scores(
    primitives: &BTreeMap<String, [Option<f64>; 5]>,
    weights: &[f64; 5],
) -> BTreeMap<String, (f64, f64)> {
    // Column statistics over present values
    let mut means = [0.0f64; 5];
    let mut stds = [0.0f64; 5];
    for dim in 0..5 {
        let column: Vec<f64> =
            primitives.values().filter_map(|v| v[dim]).collect();
        if column.is_empty() {
            continue;
        }
        let mu = column.iter().sum::<f64>() / column.len() as f64;
        let var =
            column.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / column.len() as f64;
        means[dim] = mu;
        stds[dim] = var.sqrt();
    }

    primitives
        .iter()
        .map(|(path, values)| {
            // z-scores for present primitives
            let mut zs: Vec<f64> = Vec::new();
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for dim in 0..5 {
                let Some(v) = values[dim] else { continue };
                let z = if stds[dim] > 1e-12 { (v - means[dim]) / stds[dim] } else { 0.0 };
                zs.push(z);
                weighted_sum += weights[dim] * z;
                weight_total += weights[dim];
            }
            if weight_total > 0.0 {
                weighted_sum /= weight_total;
            }

            let agreement = agreement_measures(&zs);
            let score = weighted_sum.abs() * agreement;
            (path.clone(), (score.max(0.0), agreement))
        })
        .collect()
}

/// Weighted geometric mean of three independent agreement measures over a
/// z-vector: dispersion (CV-based), sign agreement, and entropy of
/// magnitude concentration.
fn agreement_measures(zs: &[f64]) -> f64 {
    if zs.is_empty() {
        return 0.0;
    }
    let magnitudes: Vec<f64> = zs.iter().map(|z| z.abs()).collect();
    let mag_mean = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;

    let cv_measure = if mag_mean > 1e-12 {
        let var = magnitudes.iter().map(|m| (m - mag_mean).powi(2)).sum::<f64>()
            / magnitudes.len() as f64;
        1.0 / (1.0 + var.sqrt() / mag_mean)
    } else {
        1.0
    };

    let signed: Vec<f64> = zs.iter().copied().filter(|z| z.abs() > 1e-12).collect();
    let sign_measure = if signed.is_empty() {
        1.0
    } else {
        let balance: f64 = signed.iter().map(|z| z.signum()).sum();
        (balance.abs() / signed.len() as f64).max(1.0 / signed.len() as f64)
    };

    let total: f64 = magnitudes.iter().sum();
    let entropy_measure = if total > 1e-12 && magnitudes.len() > 1 {
        let entropy: f64 = magnitudes
            .iter()
            .filter(|m| **m > 1e-12)
            .map(|m| {
                let p = m / total;
                -p * p.ln()
            })
            .sum();
        (entropy / (magnitudes.len() as f64).ln()).clamp(0.0, 1.0)
    } else {
        1.0
    };

    cv_measure.powf(AGREEMENT_EXP_CV)
        * sign_measure.powf(AGREEMENT_EXP_SIGN)
        * entropy_measure.powf(AGREEMENT_EXP_ENTROPY)
}

/// Module health: fixed linear formula. The main-sequence term is dropped
/// (with weight rescale) when instability is absent.
pub fn module_health(module: &crate::analyzers::architecture::ModuleFacts) -> f64 {
    let mut score = HEALTH_W_COHESION * module.cohesion.clamp(0.0, 1.0)
        + HEALTH_W_LOW_COUPLING * (1.0 - module.coupling.clamp(0.0, 1.0))
        + HEALTH_W_ROLE * module.role_consistency.clamp(0.0, 1.0)
        + HEALTH_W_BOUNDARY * module.boundary_alignment.clamp(0.0, 1.0);
    let mut total = HEALTH_W_COHESION + HEALTH_W_LOW_COUPLING + HEALTH_W_ROLE + HEALTH_W_BOUNDARY;
    if let Some(msd) = module.main_seq_distance {
        score += HEALTH_W_MAIN_SEQ * (1.0 - msd.clamp(0.0, 1.0));
        total += HEALTH_W_MAIN_SEQ;
    }
    score / total
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::architecture::ModuleFacts;

    #[test]
    fn empirical_percentile_definition() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(empirical_percentile(&sorted, 1.0), 0.25);
        assert_eq!(empirical_percentile(&sorted, 4.0), 1.0);
        assert_eq!(empirical_percentile(&sorted, 2.5), 0.5);
    }

    #[test]
    fn bayesian_percentile_is_shrunk() {
        let sorted = vec![1.0, 2.0, 3.0];
        // (3+1)/(3+2) instead of 1.0
        assert!((bayesian_percentile(&sorted, 3.0) - 0.8).abs() < 1e-9);
        assert!(bayesian_percentile(&sorted, 0.0) > 0.0);
    }

    #[test]
    fn weighted_sum_rescales_missing() {
        let weights = [0.20, 0.25, 0.20, 0.15, 0.20];
        let full = [Some(0.5), Some(0.5), Some(0.5), Some(0.5), Some(0.5)];
        assert!((weighted_sum_rescaled(&full, &weights) - 0.5).abs() < 1e-9);

        // Volatility missing: remaining weights rescale, value unchanged
        let partial = [Some(0.5), Some(0.5), None, Some(0.5), Some(0.5)];
        assert!((weighted_sum_rescaled(&partial, &weights) - 0.5).abs() < 1e-9);

        let none = [None, None, None, None, None];
        assert_eq!(weighted_sum_rescaled(&none, &weights), 0.0);
    }

    #[test]
    fn agreement_rewards_consistency() {
        // All dimensions agree, equal magnitude
        let consistent = agreement_measures(&[1.0, 1.0, 1.0, 1.0]);
        // Mixed signs, uneven magnitudes
        let inconsistent = agreement_measures(&[2.0, -1.5, 0.1, -0.1]);
        assert!(consistent > inconsistent);
        assert!(consistent <= 1.0 + 1e-9);
        assert!(inconsistent >= 0.0);
    }

    #[test]
    fn module_health_rescales_when_instability_absent() {
        let mut module = ModuleFacts {
            cohesion: 1.0,
            coupling: 0.0,
            role_consistency: 1.0,
            boundary_alignment: 1.0,
            main_seq_distance: Some(0.0),
            instability: Some(0.5),
            ..Default::default()
        };
        assert!((module_health(&module) - 1.0).abs() < 1e-9);

        module.instability = None;
        module.main_seq_distance = None;
        // Still a perfect score: the term is dropped, not zeroed
        assert!((module_health(&module) - 1.0).abs() < 1e-9);
    }
}
