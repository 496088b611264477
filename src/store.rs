//! The blackboard: slot-oriented container analyzers communicate through
//!
//! Each slot is written exactly once by the analyzer declaring it in
//! `provides` and read by analyzers declaring it in `requires`. Slots are
//! created empty and transition to populated once; nothing else mutates
//! them.

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::analyzers::architecture::ArchitectureFacts;
use crate::analyzers::clones::CloneFacts;
use crate::analyzers::semantic::SemanticFacts;
use crate::analyzers::spectral::SpectralFacts;
use crate::analyzers::structural::StructuralFacts;
use crate::analyzers::temporal::TemporalFacts;
use crate::git::GitHistory;
use crate::graph::DepGraph;
use crate::scanner::ScannedFile;
use crate::signals::SignalField;

/// Slot names, used in analyzer requires/provides declarations
pub mod slots {
    pub const FILE_METRICS: &str = "file_metrics";
    pub const GIT_HISTORY: &str = "git_history";
    pub const GRAPH: &str = "graph";
    pub const STRUCTURAL: &str = "structural";
    pub const CLONES: &str = "clones";
    pub const TEMPORAL: &str = "temporal";
    pub const SEMANTIC: &str = "semantic";
    pub const SPECTRAL: &str = "spectral";
    pub const ARCHITECTURE: &str = "architecture";
    pub const SIGNALS: &str = "signals";
}

/// A write-once slot
#[derive(Debug)]
pub struct Slot<T> {
    cell: OnceCell<T>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Populate the slot. A second write is rejected and logged; slots
    /// transition to populated exactly once.
    pub fn set(&self, name: &str, value: T) {
        if self.cell.set(value).is_err() {
            warn!(slot = name, "attempted double write to slot, keeping first value");
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// The process-local store for a single run
#[derive(Debug)]
pub struct Store {
    pub file_metrics: Slot<Vec<ScannedFile>>,
    pub git_history: Slot<GitHistory>,
    pub graph: Slot<DepGraph>,
    pub structural: Slot<StructuralFacts>,
    pub clones: Slot<CloneFacts>,
    pub temporal: Slot<TemporalFacts>,
    pub semantic: Slot<SemanticFacts>,
    pub spectral: Slot<SpectralFacts>,
    pub architecture: Slot<ArchitectureFacts>,
    pub signals: Slot<SignalField>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            file_metrics: Slot::new(),
            git_history: Slot::new(),
            graph: Slot::new(),
            structural: Slot::new(),
            clones: Slot::new(),
            temporal: Slot::new(),
            semantic: Slot::new(),
            spectral: Slot::new(),
            architecture: Slot::new(),
            signals: Slot::new(),
        }
    }

    /// Whether a slot, addressed by name, has been populated
    pub fn is_populated(&self, slot: &str) -> bool {
        match slot {
            slots::FILE_METRICS => self.file_metrics.is_set(),
            slots::GIT_HISTORY => self.git_history.is_set(),
            slots::GRAPH => self.graph.is_set(),
            slots::STRUCTURAL => self.structural.is_set(),
            slots::CLONES => self.clones.is_set(),
            slots::TEMPORAL => self.temporal.is_set(),
            slots::SEMANTIC => self.semantic.is_set(),
            slots::SPECTRAL => self.spectral.is_set(),
            slots::ARCHITECTURE => self.architecture.is_set(),
            slots::SIGNALS => self.signals.is_set(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_write_once() {
        let slot: Slot<u32> = Slot::new();
        assert!(!slot.is_set());
        slot.set("test", 1);
        slot.set("test", 2);
        assert_eq!(slot.get(), Some(&1));
    }

    #[test]
    fn store_population_by_name() {
        let store = Store::new();
        assert!(!store.is_populated(slots::GRAPH));
        store.git_history.set(slots::GIT_HISTORY, crate::git::GitHistory::default());
        assert!(store.is_populated(slots::GIT_HISTORY));
        assert!(!store.is_populated("unknown"));
    }
}
