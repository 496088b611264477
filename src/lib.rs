//! Shannon Insight: codebase analysis engine
//!
//! Ingests a source tree plus its version-control history and produces a
//! ranked set of architectural findings together with a health score.
//! The pipeline is a strict DAG: scanner and git extractor feed a
//! blackboard store, Wave-1 analyzers enrich it with structural,
//! temporal, semantic, spectral, and architectural facts, signal fusion
//! normalizes everything into one typed field, and the finder pool turns
//! signals into ranked findings that are persisted to a history database.
//!
//! # Example
//!
//! ```ignore
//! use shannon_insight::{Engine, InsightConfig};
//! use std::path::Path;
//!
//! let config = InsightConfig::load(Path::new("."))?;
//! let outcome = Engine::new(config).run(Path::new("."))?;
//! for finding in &outcome.snapshot.findings {
//!     println!("{}: {:?}", finding.kind.as_str(), finding.entities);
//! }
//! ```

pub mod analyzers;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod finders;
pub mod findings;
pub mod git;
pub mod graph;
pub mod history;
pub mod lang;
pub mod report;
pub mod scanner;
pub mod signals;
pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use config::{InsightConfig, LanguagePolicy};
pub use engine::{CancelToken, Engine, RunOutcome, RunSummary};
pub use error::{InsightError, Result};
pub use findings::{Effort, Evidence, Finding, FindingKind, Scope};
pub use lang::Lang;
pub use scanner::{FileMetrics, FileSyntax, ScannedFile};
pub use signals::{Polarity, SignalField, SignalValue, Tier};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION, TOOL_VERSION};
pub use store::Store;

// Re-export analyzer fact types
pub use analyzers::architecture::{ArchitectureFacts, LayerViolation, ModuleFacts, ViolationKind};
pub use analyzers::clones::{CloneFacts, ClonePair};
pub use analyzers::semantic::{Role, SemanticFacts};
pub use analyzers::structural::StructuralFacts;
pub use analyzers::temporal::{CochangeEdge, TemporalFacts, Trajectory};

// Re-export history types
pub use history::{ChronicFinding, HistoryDb, Mover, SnapshotRow, TrendPoint};
