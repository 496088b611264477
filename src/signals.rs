//! The signal model: typed measurements with polarity and percentiles
//!
//! Every measurement the analyzers produce flows into a [`SignalField`]
//! keyed by signal name. Polarity is fixed per name in a static registry;
//! a name absent from an entity's map means the measurement is absent,
//! never zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Direction of badness for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HighBad,
    HighGood,
    Neutral,
}

/// Entity level a signal attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalScope {
    File,
    Module,
    Codebase,
}

/// A signal value: finite float, non-negative count, flag, or a closed
/// enum label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Flag(bool),
    Count(u64),
    Float(f64),
    Label(String),
}

impl SignalValue {
    /// Numeric view; labels have none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Count(v) => Some(*v as f64),
            Self::Flag(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(l) => Some(l),
            _ => None,
        }
    }
}

/// Registry row fixing a signal's scope and polarity for the lifetime of
/// the program
#[derive(Debug, Clone, Copy)]
pub struct SignalDef {
    pub name: &'static str,
    pub scope: SignalScope,
    pub polarity: Polarity,
}

macro_rules! defs {
    ($($name:literal, $scope:ident, $polarity:ident;)*) => {
        &[$(SignalDef {
            name: $name,
            scope: SignalScope::$scope,
            polarity: Polarity::$polarity,
        },)*]
    };
}

/// The full signal registry.
///
/// `glue_deficit` is registered but never produced; consumers must treat
/// it as absent.
pub static REGISTRY: &[SignalDef] = defs![
    // File: size and shape
    "lines", File, HighBad;
    "token_count", File, Neutral;
    "function_count", File, Neutral;
    "class_count", File, Neutral;
    "import_count", File, Neutral;
    "avg_function_length", File, HighBad;
    "max_nesting", File, HighBad;
    "cognitive_load", File, HighBad;
    "compression_ratio", File, HighBad;
    "docstring_coverage", File, HighGood;
    "todo_density", File, HighBad;
    // File: graph position
    "in_degree", File, Neutral;
    "out_degree", File, HighBad;
    "pagerank", File, HighBad;
    "betweenness", File, HighBad;
    "blast_radius_size", File, HighBad;
    "depth_from_entry", File, Neutral;
    "community", File, Neutral;
    "in_cycle", File, HighBad;
    "phantom_import_count", File, HighBad;
    "clone_pair_count", File, HighBad;
    // File: temporal
    "total_changes", File, HighBad;
    "recent_changes", File, HighBad;
    "churn_slope", File, HighBad;
    "churn_cv", File, HighBad;
    "churn_trajectory", File, Neutral;
    "author_entropy", File, Neutral;
    "bus_factor", File, HighGood;
    "primary_author_share", File, HighBad;
    "fix_ratio", File, HighBad;
    "refactor_ratio", File, HighGood;
    "days_since_change", File, Neutral;
    // File: semantic
    "role", File, Neutral;
    "naming_drift", File, HighBad;
    "concept_count", File, Neutral;
    // File: fused
    "raw_risk", File, HighBad;
    "risk_score", File, HighBad;
    "wiring_quality", File, HighGood;
    "delta_h", File, HighBad;
    // Module
    "file_count", Module, Neutral;
    "afferent_coupling", Module, Neutral;
    "efferent_coupling", Module, HighBad;
    "instability", Module, Neutral;
    "cohesion", Module, HighGood;
    "coupling", Module, HighBad;
    "abstractness", Module, Neutral;
    "main_seq_distance", Module, HighBad;
    "role_consistency", Module, HighGood;
    "boundary_alignment", Module, HighGood;
    "module_churn", Module, HighBad;
    "health_score", Module, HighGood;
    // Codebase
    "total_files", Codebase, Neutral;
    "total_modules", Codebase, Neutral;
    "dependency_edges", Codebase, Neutral;
    "cycle_count", Codebase, HighBad;
    "modularity", Codebase, HighGood;
    "fiedler_value", Codebase, HighGood;
    "layer_count", Codebase, Neutral;
    "violation_count", Codebase, HighBad;
    "cochange_pair_count", Codebase, Neutral;
    "commit_count", Codebase, Neutral;
    "clone_pairs", Codebase, HighBad;
    "glue_deficit", Codebase, HighBad;
    "wiring_score", Codebase, HighGood;
    "architecture_health", Codebase, HighGood;
    "codebase_health", Codebase, HighGood;
];

/// Look up a registry row by name
pub fn def_of(name: &str) -> Option<&'static SignalDef> {
    REGISTRY.iter().find(|d| d.name == name)
}

/// Fixed polarity for a signal name
pub fn polarity_of(name: &str) -> Option<Polarity> {
    def_of(name).map(|d| d.polarity)
}

/// Percentile floors: below the listed raw value, percentile is clamped
/// to zero so degenerate distributions cannot produce spurious
/// high-percentile flags.
pub const PERCENTILE_FLOORS: &[(&str, f64)] = &[
    ("pagerank", 0.005),
    ("blast_radius_size", 5.0),
    ("cognitive_load", 10.0),
    ("lines", 100.0),
];

pub fn percentile_floor(name: &str) -> Option<f64> {
    PERCENTILE_FLOORS.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// One measurement on one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub value: SignalValue,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub percentile: Option<f64>,
}

impl SignalEntry {
    pub fn new(value: SignalValue) -> Self {
        Self { value, percentile: None }
    }
}

/// Name -> entry, ordered for deterministic serialization
pub type SignalMap = BTreeMap<String, SignalEntry>;

/// Normalization regime, selected by file count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// < 15 files: no percentiles, composites skipped
    Absolute,
    /// 15..50 files: Bayesian percentile with a flat prior
    Bayesian,
    /// >= 50 files: empirical percentile
    Full,
}

impl Tier {
    pub fn for_file_count(n: usize) -> Self {
        if n < 15 {
            Self::Absolute
        } else if n < 50 {
            Self::Bayesian
        } else {
            Self::Full
        }
    }
}

/// The fused field of all signals for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalField {
    pub tier: Tier,
    pub files: BTreeMap<String, SignalMap>,
    pub modules: BTreeMap<String, SignalMap>,
    pub global: SignalMap,
    /// Pre-normalization weighted risk per file, input to the health
    /// Laplacian
    pub raw_risk: BTreeMap<String, f64>,
    /// Health Laplacian per file
    pub delta_h: BTreeMap<String, f64>,
}

impl SignalField {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            files: BTreeMap::new(),
            modules: BTreeMap::new(),
            global: SignalMap::new(),
            raw_risk: BTreeMap::new(),
            delta_h: BTreeMap::new(),
        }
    }

    pub fn file_entry(&self, path: &str, name: &str) -> Option<&SignalEntry> {
        self.files.get(path).and_then(|m| m.get(name))
    }

    pub fn file_value(&self, path: &str, name: &str) -> Option<f64> {
        self.file_entry(path, name).and_then(|e| e.value.as_f64())
    }

    pub fn file_label(&self, path: &str, name: &str) -> Option<&str> {
        self.file_entry(path, name).and_then(|e| e.value.as_label())
    }

    pub fn file_percentile(&self, path: &str, name: &str) -> Option<f64> {
        self.file_entry(path, name).and_then(|e| e.percentile)
    }

    pub fn module_entry(&self, module: &str, name: &str) -> Option<&SignalEntry> {
        self.modules.get(module).and_then(|m| m.get(name))
    }

    pub fn module_value(&self, module: &str, name: &str) -> Option<f64> {
        self.module_entry(module, name).and_then(|e| e.value.as_f64())
    }

    pub fn global_value(&self, name: &str) -> Option<f64> {
        self.global.get(name).and_then(|e| e.value.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<&str> = REGISTRY.iter().map(|d| d.name).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::for_file_count(1), Tier::Absolute);
        assert_eq!(Tier::for_file_count(14), Tier::Absolute);
        assert_eq!(Tier::for_file_count(15), Tier::Bayesian);
        assert_eq!(Tier::for_file_count(49), Tier::Bayesian);
        assert_eq!(Tier::for_file_count(50), Tier::Full);
        assert_eq!(Tier::for_file_count(10_000), Tier::Full);
    }

    #[test]
    fn value_views() {
        assert_eq!(SignalValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(SignalValue::Count(3).as_f64(), Some(3.0));
        assert_eq!(SignalValue::Flag(true).as_f64(), Some(1.0));
        assert_eq!(SignalValue::Label("stable".into()).as_f64(), None);
        assert_eq!(SignalValue::Label("stable".into()).as_label(), Some("stable"));
    }

    #[test]
    fn value_json_round_trip() {
        for value in [
            SignalValue::Flag(true),
            SignalValue::Count(42),
            SignalValue::Float(0.25),
            SignalValue::Label("spiking".into()),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: SignalValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn floors_are_registered_signals() {
        for (name, _) in PERCENTILE_FLOORS {
            assert!(def_of(name).is_some(), "{} missing from registry", name);
        }
    }

    #[test]
    fn known_polarities() {
        assert_eq!(polarity_of("pagerank"), Some(Polarity::HighBad));
        assert_eq!(polarity_of("bus_factor"), Some(Polarity::HighGood));
        assert_eq!(polarity_of("glue_deficit"), Some(Polarity::HighBad));
        assert_eq!(polarity_of("nonexistent"), None);
    }
}
