//! Architecture finders: layer violations and boundary mismatches

use crate::analyzers::architecture::ViolationKind;
use crate::config::InsightConfig;
use crate::finders::Finder;
use crate::findings::{Evidence, Finding, FindingKind};
use crate::store::{slots, Store};

/// Module boundary alignment below this is a mismatch
const MIN_BOUNDARY_ALIGNMENT: f64 = 0.5;
/// Modules smaller than this are not worth flagging
const MIN_MODULE_FILES: usize = 3;

/// One finding per BACKWARD edge in the inferred layering
pub struct LayerViolationFinder;

impl Finder for LayerViolationFinder {
    fn name(&self) -> &'static str {
        "layer_violation"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::ARCHITECTURE]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(architecture) = store.architecture.get() else { return Vec::new() };

        architecture
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Backward)
            .map(|violation| {
                Finding::new(
                    FindingKind::LayerViolation,
                    vec![violation.src_module.clone(), violation.tgt_module.clone()],
                    0.9,
                    vec![Evidence::new(
                        "violation_count",
                        (violation.tgt_layer - violation.src_layer) as f64,
                        format!(
                            "layer {} module {} imports layer {} module {}",
                            violation.src_layer,
                            violation.src_module,
                            violation.tgt_layer,
                            violation.tgt_module
                        ),
                    )],
                )
            })
            .collect()
    }
}

/// Modules whose declared boundary disagrees with community structure
pub struct BoundaryMismatchFinder;

impl Finder for BoundaryMismatchFinder {
    fn name(&self) -> &'static str {
        "boundary_mismatch"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::ARCHITECTURE]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(architecture) = store.architecture.get() else { return Vec::new() };

        architecture
            .modules
            .iter()
            .filter(|m| {
                m.files.len() >= MIN_MODULE_FILES && m.boundary_alignment < MIN_BOUNDARY_ALIGNMENT
            })
            .map(|module| {
                Finding::new(
                    FindingKind::BoundaryMismatch,
                    vec![module.name.clone()],
                    1.0 - module.boundary_alignment,
                    vec![
                        Evidence::new(
                            "boundary_alignment",
                            module.boundary_alignment,
                            "files scatter across dependency communities",
                        ),
                        Evidence::new(
                            "cohesion",
                            module.cohesion,
                            format!("{} files in module", module.files.len()),
                        ),
                    ],
                )
            })
            .collect()
    }
}
