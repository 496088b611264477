//! Snapshot: the immutable artifact of one analysis run
//!
//! Built by copying relevant store contents at the end of a run, then
//! owned by the history database. The JSON form is the export format; the
//! version tag increments on breaking changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzers::architecture::{LayerViolation, ModuleFacts};
use crate::analyzers::temporal::CochangeEdge;
use crate::error::{InsightError, Result};
use crate::findings::Finding;
use crate::signals::{SignalMap, Tier};
use crate::store::Store;

/// Export format version; bump on breaking changes
pub const SNAPSHOT_VERSION: u32 = 1;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One analysis run, frozen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Epoch seconds; monotonically non-decreasing per root (the history
    /// database clamps on persist)
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub commit_sha: Option<String>,
    pub tool_version: String,
    pub root: String,
    pub tier: Tier,
    pub file_signals: BTreeMap<String, SignalMap>,
    pub module_signals: BTreeMap<String, SignalMap>,
    pub global_signals: SignalMap,
    pub dependency_edges: Vec<(String, String)>,
    pub cochange_edges: Vec<CochangeEdge>,
    pub modules: Vec<ModuleFacts>,
    pub layers: BTreeMap<String, usize>,
    pub violations: Vec<LayerViolation>,
    pub findings: Vec<Finding>,
    /// Per-file health Laplacian
    pub delta_h: BTreeMap<String, f64>,
    /// Per-file line digests, used for rename detection across runs
    #[serde(default)]
    pub file_digests: BTreeMap<String, Vec<u64>>,
}

impl Snapshot {
    /// Freeze the store into a snapshot.
    ///
    /// `timestamp` is the wall-clock time at build; the history layer
    /// enforces monotonicity when persisting.
    pub fn build(root: &str, store: &Store, findings: Vec<Finding>, timestamp: i64) -> Self {
        let signals = store.signals.get();
        let architecture = store.architecture.get();

        let dependency_edges = store
            .graph
            .get()
            .map(|graph| {
                graph
                    .edges
                    .iter()
                    .map(|&(s, t, _)| (graph.path(s).to_string(), graph.path(t).to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let file_digests = store
            .file_metrics
            .get()
            .map(|files| {
                files
                    .iter()
                    .map(|f| (f.metrics.path.clone(), f.metrics.line_hashes.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            version: SNAPSHOT_VERSION,
            timestamp,
            commit_sha: store.git_history.get().and_then(|h| h.head_sha.clone()),
            tool_version: TOOL_VERSION.to_string(),
            root: root.to_string(),
            tier: signals.map(|s| s.tier).unwrap_or(Tier::Absolute),
            file_signals: signals.map(|s| s.files.clone()).unwrap_or_default(),
            module_signals: signals.map(|s| s.modules.clone()).unwrap_or_default(),
            global_signals: signals.map(|s| s.global.clone()).unwrap_or_default(),
            dependency_edges,
            cochange_edges: store
                .temporal
                .get()
                .map(|t| t.cochange.clone())
                .unwrap_or_default(),
            modules: architecture.map(|a| a.modules.clone()).unwrap_or_default(),
            layers: architecture.map(|a| a.layers.clone()).unwrap_or_default(),
            violations: architecture.map(|a| a.violations.clone()).unwrap_or_default(),
            findings,
            delta_h: signals.map(|s| s.delta_h.clone()).unwrap_or_default(),
            file_digests,
        }
    }

    pub fn file_count(&self) -> usize {
        self.file_signals.len()
    }

    /// Global codebase health, when composites were computed
    pub fn codebase_health(&self) -> Option<f64> {
        self.global_signals.get("codebase_health").and_then(|e| e.value.as_f64())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| InsightError::Snapshot { message: e.to_string() })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| InsightError::Snapshot { message: e.to_string() })
    }
}

/// Line-set Jaccard similarity between two file digests
pub fn digest_jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let set_a: ahash::AHashSet<u64> = a.iter().copied().collect();
    let set_b: ahash::AHashSet<u64> = b.iter().copied().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Evidence, FindingKind};
    use crate::signals::{SignalEntry, SignalValue};

    fn sample_snapshot() -> Snapshot {
        let mut file_signals = BTreeMap::new();
        let mut map = SignalMap::new();
        map.insert("lines".to_string(), SignalEntry::new(SignalValue::Count(120)));
        let mut entry = SignalEntry::new(SignalValue::Float(0.42));
        entry.percentile = Some(0.9);
        map.insert("pagerank".to_string(), entry);
        map.insert(
            "churn_trajectory".to_string(),
            SignalEntry::new(SignalValue::Label("STABLE".to_string())),
        );
        file_signals.insert("a.py".to_string(), map);

        Snapshot {
            version: SNAPSHOT_VERSION,
            timestamp: 1_700_000_000,
            commit_sha: Some("a".repeat(40)),
            tool_version: TOOL_VERSION.to_string(),
            root: "/tmp/repo".to_string(),
            tier: Tier::Full,
            file_signals,
            module_signals: BTreeMap::new(),
            global_signals: SignalMap::new(),
            dependency_edges: vec![("a.py".to_string(), "b.py".to_string())],
            cochange_edges: Vec::new(),
            modules: Vec::new(),
            layers: BTreeMap::new(),
            violations: Vec::new(),
            findings: vec![Finding::new(
                FindingKind::OrphanCode,
                vec!["a.py".to_string()],
                0.8,
                vec![Evidence::new("in_degree", 0.0, "unreferenced")],
            )],
            delta_h: BTreeMap::from([("a.py".to_string(), 0.1)]),
            file_digests: BTreeMap::from([("a.py".to_string(), vec![1, 2, 3])]),
        }
    }

    #[test]
    fn json_round_trip_is_structurally_equal() {
        let snapshot = sample_snapshot();
        let json = snapshot.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn jaccard_bounds() {
        assert_eq!(digest_jaccard(&[1, 2, 3], &[1, 2, 3]), 1.0);
        assert_eq!(digest_jaccard(&[1, 2], &[3, 4]), 0.0);
        let sim = digest_jaccard(&[1, 2, 3, 4], &[1, 2, 3, 5]);
        assert!((sim - 0.6).abs() < 1e-9);
        assert_eq!(digest_jaccard(&[], &[]), 1.0);
    }
}
