//! Analyzer DAG: independent Wave-1 analyzers plus the fusion wave
//!
//! Analyzers declare requires/provides slot sets; the engine schedules any
//! analyzer whose requirements are populated, runs independent ones on
//! worker threads, and skips (with a log line) any whose requirements can
//! never be met.

pub mod architecture;
pub mod clones;
pub mod fusion;
pub mod semantic;
pub mod spectral;
pub mod structural;
pub mod temporal;

use crate::config::InsightConfig;
use crate::error::Result;
use crate::store::Store;

/// An analysis pass over the blackboard
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;
    /// Slots that must be populated before this analyzer runs
    fn requires(&self) -> &'static [&'static str];
    /// Slots this analyzer populates; disjoint across concurrent analyzers
    fn provides(&self) -> &'static [&'static str];
    fn run(&self, store: &Store, config: &InsightConfig) -> Result<()>;
}

/// Wave 1: independent fact producers
pub fn wave_one() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(structural::StructuralAnalyzer),
        Box::new(clones::CloneAnalyzer),
        Box::new(temporal::TemporalAnalyzer),
        Box::new(semantic::SemanticAnalyzer),
        Box::new(spectral::SpectralAnalyzer),
        Box::new(architecture::ArchitectureAnalyzer),
    ]
}

/// Wave 2: signal fusion, after all Wave-1 workers have quiesced
pub fn wave_two() -> Vec<Box<dyn Analyzer>> {
    vec![Box::new(fusion::FusionAnalyzer)]
}
