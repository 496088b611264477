//! Structural finders: orphans, phantom imports, clones, cycles, god
//! files, bottleneck hubs
//!
//! These read graph shape, not history, so they bypass the hotspot filter.

use crate::analyzers::semantic::Role;
use crate::config::InsightConfig;
use crate::finders::Finder;
use crate::findings::{Evidence, Finding, FindingKind};
use crate::signals::Tier;
use crate::store::{slots, Store};

/// `in_degree == 0` and the role is neither entry point nor test
pub struct OrphanFinder;

impl Finder for OrphanFinder {
    fn name(&self) -> &'static str {
        "orphan_code"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::STRUCTURAL, slots::SEMANTIC]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(structural) = store.structural.get() else { return Vec::new() };
        let Some(semantic) = store.semantic.get() else { return Vec::new() };

        structural
            .files
            .iter()
            .filter(|(path, s)| {
                s.in_degree == 0
                    && !matches!(semantic.role_of(path), Role::EntryPoint | Role::Test)
            })
            .map(|(path, s)| {
                let role = semantic.role_of(path);
                Finding::new(
                    FindingKind::OrphanCode,
                    vec![path.clone()],
                    0.8,
                    vec![
                        Evidence::new("in_degree", 0.0, "no file imports this one"),
                        Evidence::new(
                            "out_degree",
                            s.out_degree as f64,
                            format!("role {} is not an entry point", role.as_str()),
                        ),
                    ],
                )
            })
            .collect()
    }
}

/// Imports that look project-local but resolve to nothing
pub struct PhantomImportFinder;

impl Finder for PhantomImportFinder {
    fn name(&self) -> &'static str {
        "phantom_imports"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::STRUCTURAL]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(structural) = store.structural.get() else { return Vec::new() };
        structural
            .files
            .iter()
            .filter(|(_, s)| s.phantom_imports > 0)
            .map(|(path, s)| {
                Finding::new(
                    FindingKind::PhantomImports,
                    vec![path.clone()],
                    0.9,
                    vec![Evidence::new(
                        "phantom_import_count",
                        s.phantom_imports as f64,
                        format!("{} local imports resolve to no scanned file", s.phantom_imports),
                    )],
                )
            })
            .collect()
    }
}

/// Confirmed clone pairs from the clone analyzer
pub struct CloneFinder;

impl Finder for CloneFinder {
    fn name(&self) -> &'static str {
        "copy_paste_clone"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::CLONES]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(clones) = store.clones.get() else { return Vec::new() };
        clones
            .pairs
            .iter()
            .map(|pair| {
                Finding::new(
                    FindingKind::CopyPasteClone,
                    vec![pair.a.clone(), pair.b.clone()],
                    1.0 - pair.ncd,
                    vec![
                        Evidence::new(
                            "clone_pair_count",
                            pair.similarity,
                            format!("token similarity {:.0}%", pair.similarity * 100.0),
                        ),
                        Evidence::new("compression_ratio", pair.ncd, "near-duplicate content"),
                    ],
                )
            })
            .collect()
    }
}

/// Each SCC of size > 1 becomes one dependency-cycle finding
pub struct CycleFinder;

impl Finder for CycleFinder {
    fn name(&self) -> &'static str {
        "dependency_cycle"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::STRUCTURAL]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(structural) = store.structural.get() else { return Vec::new() };
        structural
            .cycles
            .iter()
            .map(|cycle| {
                Finding::new(
                    FindingKind::DependencyCycle,
                    cycle.clone(),
                    1.0,
                    vec![Evidence::new(
                        "cycle_count",
                        cycle.len() as f64,
                        format!("{} files form an import cycle", cycle.len()),
                    )],
                )
            })
            .collect()
    }
}

/// Large, central, cognitively heavy files.
///
/// Percentile variant: pagerank >= p90, lines >= p90, cognitive load >=
/// p80. Absolute variant: lines > 500, functions > 20, cognitive load >
/// 50.
pub struct GodFileFinder;

impl Finder for GodFileFinder {
    fn name(&self) -> &'static str {
        "god_file"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(field) = store.signals.get() else { return Vec::new() };

        let mut findings = Vec::new();
        for path in field.files.keys() {
            let lines = field.file_value(path, "lines").unwrap_or(0.0);
            let cognitive = field.file_value(path, "cognitive_load").unwrap_or(0.0);

            let hit = match field.tier {
                Tier::Absolute => {
                    let functions = field.file_value(path, "function_count").unwrap_or(0.0);
                    lines > 500.0 && functions > 20.0 && cognitive > 50.0
                }
                _ => {
                    field.file_percentile(path, "pagerank").unwrap_or(0.0) >= 0.9
                        && field.file_percentile(path, "lines").unwrap_or(0.0) >= 0.9
                        && field.file_percentile(path, "cognitive_load").unwrap_or(0.0) >= 0.8
                }
            };
            if !hit {
                continue;
            }

            let pagerank = field.file_value(path, "pagerank").unwrap_or(0.0);
            findings.push(Finding::new(
                FindingKind::GodFile,
                vec![path.clone()],
                0.85,
                vec![
                    Evidence::new("lines", lines, "outsized file")
                        .with_percentile(field.file_percentile(path, "lines")),
                    Evidence::new("pagerank", pagerank, "central to the dependency graph")
                        .with_percentile(field.file_percentile(path, "pagerank")),
                    Evidence::new("cognitive_load", cognitive, "heavy control flow")
                        .with_percentile(field.file_percentile(path, "cognitive_load")),
                ],
            ));
        }
        findings
    }
}

/// Files most shortest paths flow through, with wide blast radius.
///
/// Percentile variant: betweenness >= p95 and blast radius >= p90.
/// Absolute variant: blast radius >= 10 with in and out degree >= 5.
pub struct BottleneckHubFinder;

impl Finder for BottleneckHubFinder {
    fn name(&self) -> &'static str {
        "bottleneck_hub"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::SIGNALS]
    }

    fn find(&self, store: &Store, _config: &InsightConfig) -> Vec<Finding> {
        let Some(field) = store.signals.get() else { return Vec::new() };

        let mut findings = Vec::new();
        for path in field.files.keys() {
            let blast = field.file_value(path, "blast_radius_size").unwrap_or(0.0);
            let hit = match field.tier {
                Tier::Absolute => {
                    blast >= 10.0
                        && field.file_value(path, "in_degree").unwrap_or(0.0) >= 5.0
                        && field.file_value(path, "out_degree").unwrap_or(0.0) >= 5.0
                }
                _ => {
                    field.file_percentile(path, "betweenness").unwrap_or(0.0) >= 0.95
                        && field.file_percentile(path, "blast_radius_size").unwrap_or(0.0) >= 0.9
                }
            };
            if !hit {
                continue;
            }

            let betweenness = field.file_value(path, "betweenness").unwrap_or(0.0);
            findings.push(Finding::new(
                FindingKind::BottleneckHub,
                vec![path.clone()],
                0.8,
                vec![
                    Evidence::new("betweenness", betweenness, "many dependency paths pass through")
                        .with_percentile(field.file_percentile(path, "betweenness")),
                    Evidence::new("blast_radius_size", blast, "changes ripple widely")
                        .with_percentile(field.file_percentile(path, "blast_radius_size")),
                ],
            ));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::structural::{FileStructure, StructuralFacts};
    use crate::analyzers::semantic::{FileSemantics, SemanticFacts};
    use std::collections::BTreeMap;

    fn store_with_structure(
        entries: Vec<(&str, FileStructure, Role)>,
    ) -> Store {
        let store = Store::new();
        let mut files = BTreeMap::new();
        let mut roles = BTreeMap::new();
        for (path, structure, role) in entries {
            files.insert(path.to_string(), structure);
            roles.insert(
                path.to_string(),
                FileSemantics { role, ..Default::default() },
            );
        }
        store.structural.set(
            slots::STRUCTURAL,
            StructuralFacts { files, ..Default::default() },
        );
        store
            .semantic
            .set(slots::SEMANTIC, SemanticFacts { files: roles, concepts: Vec::new() });
        store
    }

    #[test]
    fn orphan_respects_roles() {
        let store = store_with_structure(vec![
            ("lonely.py", FileStructure::default(), Role::Utility),
            ("main.py", FileStructure::default(), Role::EntryPoint),
            ("test_x.py", FileStructure::default(), Role::Test),
            (
                "used.py",
                FileStructure { in_degree: 2, ..Default::default() },
                Role::Utility,
            ),
        ]);
        let findings = OrphanFinder.find(&store, &InsightConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entities, vec!["lonely.py".to_string()]);
        assert!(!findings[0].evidence.is_empty());
    }

    #[test]
    fn phantom_imports_only_when_present() {
        let store = store_with_structure(vec![
            (
                "bad.py",
                FileStructure { phantom_imports: 2, in_degree: 1, ..Default::default() },
                Role::Unknown,
            ),
            (
                "ok.py",
                FileStructure { in_degree: 1, ..Default::default() },
                Role::Unknown,
            ),
        ]);
        let findings = PhantomImportFinder.find(&store, &InsightConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entities, vec!["bad.py".to_string()]);
        assert_eq!(findings[0].evidence[0].value, 2.0);
    }

    #[test]
    fn cycle_finder_emits_per_scc() {
        let store = Store::new();
        store.structural.set(
            slots::STRUCTURAL,
            StructuralFacts {
                cycles: vec![vec!["a.py".to_string(), "b.py".to_string()]],
                cycle_count: 1,
                ..Default::default()
            },
        );
        let findings = CycleFinder.find(&store, &InsightConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DependencyCycle);
        assert_eq!(findings[0].entities.len(), 2);
    }
}
