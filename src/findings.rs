//! Findings: typed insights with severity, evidence, and stable identity

use serde::{Deserialize, Serialize};

use crate::scanner::tokens::fnv1a;

/// Closed set of finding types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    OrphanCode,
    PhantomImports,
    CopyPasteClone,
    DependencyCycle,
    GodFile,
    BottleneckHub,
    HiddenCoupling,
    KnowledgeSilo,
    ReviewBlindspot,
    ChurnHotspot,
    LayerViolation,
    BoundaryMismatch,
    NamingDrift,
    StaleTodos,
}

/// Remediation effort class, fixed per finding type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Tractability factor feeding actionability
    pub fn tractability(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 0.75,
            Self::High => 0.5,
        }
    }
}

/// Entity scope, fixed per finding type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    File,
    FilePair,
    Module,
    ModulePair,
    Codebase,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::FilePair => "FILE_PAIR",
            Self::Module => "MODULE",
            Self::ModulePair => "MODULE_PAIR",
            Self::Codebase => "CODEBASE",
        }
    }
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrphanCode => "orphan_code",
            Self::PhantomImports => "phantom_imports",
            Self::CopyPasteClone => "copy_paste_clone",
            Self::DependencyCycle => "dependency_cycle",
            Self::GodFile => "god_file",
            Self::BottleneckHub => "bottleneck_hub",
            Self::HiddenCoupling => "hidden_coupling",
            Self::KnowledgeSilo => "knowledge_silo",
            Self::ReviewBlindspot => "review_blindspot",
            Self::ChurnHotspot => "churn_hotspot",
            Self::LayerViolation => "layer_violation",
            Self::BoundaryMismatch => "boundary_mismatch",
            Self::NamingDrift => "naming_drift",
            Self::StaleTodos => "stale_todos",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "orphan_code" => Self::OrphanCode,
            "phantom_imports" => Self::PhantomImports,
            "copy_paste_clone" => Self::CopyPasteClone,
            "dependency_cycle" => Self::DependencyCycle,
            "god_file" => Self::GodFile,
            "bottleneck_hub" => Self::BottleneckHub,
            "hidden_coupling" => Self::HiddenCoupling,
            "knowledge_silo" => Self::KnowledgeSilo,
            "review_blindspot" => Self::ReviewBlindspot,
            "churn_hotspot" => Self::ChurnHotspot,
            "layer_violation" => Self::LayerViolation,
            "boundary_mismatch" => Self::BoundaryMismatch,
            "naming_drift" => Self::NamingDrift,
            "stale_todos" => Self::StaleTodos,
            _ => return None,
        })
    }

    /// Base severity, constant per type
    pub fn severity(&self) -> f64 {
        match self {
            Self::OrphanCode => 0.35,
            Self::PhantomImports => 0.50,
            Self::CopyPasteClone => 0.55,
            Self::DependencyCycle => 0.70,
            Self::GodFile => 0.75,
            Self::BottleneckHub => 0.70,
            Self::HiddenCoupling => 0.65,
            Self::KnowledgeSilo => 0.70,
            Self::ReviewBlindspot => 0.60,
            Self::ChurnHotspot => 0.60,
            Self::LayerViolation => 0.80,
            Self::BoundaryMismatch => 0.50,
            Self::NamingDrift => 0.30,
            Self::StaleTodos => 0.25,
        }
    }

    pub fn effort(&self) -> Effort {
        match self {
            Self::OrphanCode | Self::PhantomImports | Self::ReviewBlindspot => Effort::Low,
            Self::NamingDrift | Self::StaleTodos => Effort::Low,
            Self::CopyPasteClone
            | Self::HiddenCoupling
            | Self::KnowledgeSilo
            | Self::ChurnHotspot
            | Self::BottleneckHub
            | Self::BoundaryMismatch => Effort::Medium,
            Self::DependencyCycle | Self::GodFile | Self::LayerViolation => Effort::High,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::OrphanCode
            | Self::PhantomImports
            | Self::GodFile
            | Self::BottleneckHub
            | Self::KnowledgeSilo
            | Self::ReviewBlindspot
            | Self::ChurnHotspot
            | Self::NamingDrift
            | Self::StaleTodos => Scope::File,
            Self::CopyPasteClone | Self::HiddenCoupling => Scope::FilePair,
            Self::BoundaryMismatch => Scope::Module,
            Self::LayerViolation => Scope::ModulePair,
            Self::DependencyCycle => Scope::Codebase,
        }
    }
}

/// One evidence item: a signal read off the cited entity at emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub signal: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub percentile: Option<f64>,
    /// One-line rationale
    pub note: String,
}

impl Evidence {
    pub fn new(signal: &str, value: f64, note: impl Into<String>) -> Self {
        Self { signal: signal.to_string(), value, percentile: None, note: note.into() }
    }

    pub fn with_percentile(mut self, percentile: Option<f64>) -> Self {
        self.percentile = percentile;
        self
    }
}

/// An emitted insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: f64,
    pub confidence: f64,
    pub effort: Effort,
    pub scope: Scope,
    /// Affected entities, sorted
    pub entities: Vec<String>,
    /// At least one item, always
    pub evidence: Vec<Evidence>,
    /// Content-derived key, stable across runs and renames
    pub identity_key: String,
}

impl Finding {
    /// Build a finding; severity/effort/scope derive from the kind, the
    /// identity key from kind plus sorted entities.
    pub fn new(kind: FindingKind, entities: Vec<String>, confidence: f64, evidence: Vec<Evidence>) -> Self {
        debug_assert!(!evidence.is_empty(), "findings must carry evidence");
        let mut entities = entities;
        entities.sort();
        let identity_key = identity_key(kind, &entities);
        Self {
            kind,
            severity: kind.severity(),
            confidence: confidence.clamp(0.0, 1.0),
            effort: kind.effort(),
            scope: kind.scope(),
            entities,
            evidence,
            identity_key,
        }
    }

    /// Ranking key: severity x confidence x actionability
    pub fn rank_score(&self) -> f64 {
        self.severity * self.confidence * self.actionability()
    }

    /// Actionability from impact (evidence percentile mass) and
    /// tractability (effort class)
    pub fn actionability(&self) -> f64 {
        let percentiles: Vec<f64> =
            self.evidence.iter().filter_map(|e| e.percentile).collect();
        let impact = if percentiles.is_empty() {
            0.5
        } else {
            percentiles.iter().sum::<f64>() / percentiles.len() as f64
        };
        0.5 + 0.5 * impact * self.effort.tractability()
    }
}

/// Content hash of finding type + sorted canonical entity keys
pub fn identity_key(kind: FindingKind, sorted_entities: &[String]) -> String {
    let mut buf = String::from(kind.as_str());
    for entity in sorted_entities {
        buf.push('\n');
        buf.push_str(entity);
    }
    format!("{:016x}", fnv1a(buf.as_bytes()))
}
