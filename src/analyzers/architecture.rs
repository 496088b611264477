//! Architecture analyzer: module detection, Martin metrics, layer
//! inference and violation classification

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::graph::DepGraph;
use crate::store::{slots, Store};

/// Martin metrics and composition facts for one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleFacts {
    pub name: String,
    pub files: Vec<String>,
    /// Incoming cross-module dependency edges
    pub afferent: usize,
    /// Outgoing cross-module dependency edges
    pub efferent: usize,
    pub cohesion: f64,
    pub coupling: f64,
    /// Ce/(Ca+Ce); absent for isolated modules, never defaulted to zero
    pub instability: Option<f64>,
    pub abstractness: f64,
    /// |A + I - 1|; absent whenever instability is absent
    pub main_seq_distance: Option<f64>,
    pub role_consistency: f64,
    pub boundary_alignment: f64,
}

/// Edge classification against the inferred layering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationKind {
    Backward,
    Skip,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backward => "BACKWARD",
            Self::Skip => "SKIP",
        }
    }
}

/// One layering violation on a module edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerViolation {
    pub src_module: String,
    pub tgt_module: String,
    pub src_layer: usize,
    pub tgt_layer: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Default)]
pub struct ArchitectureFacts {
    pub modules: Vec<ModuleFacts>,
    /// File path -> module name
    pub module_of: BTreeMap<String, String>,
    /// Module name -> layer depth (0 = foundation, imports nothing)
    pub layers: BTreeMap<String, usize>,
    pub violations: Vec<LayerViolation>,
    /// Aggregated module edges (src, tgt, weight)
    pub module_edges: Vec<(String, String, usize)>,
    pub layer_count: usize,
}

impl ArchitectureFacts {
    pub fn module_named(&self, name: &str) -> Option<&ModuleFacts> {
        self.modules.iter().find(|m| m.name == name)
    }
}

pub struct ArchitectureAnalyzer;

impl Analyzer for ArchitectureAnalyzer {
    fn name(&self) -> &'static str {
        "architecture"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS, slots::GRAPH, slots::STRUCTURAL, slots::SEMANTIC]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::ARCHITECTURE]
    }

    fn run(&self, store: &Store, config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };
        let Some(graph) = store.graph.get() else { return Ok(()) };
        let Some(structural) = store.structural.get() else { return Ok(()) };
        let Some(semantic) = store.semantic.get() else { return Ok(()) };

        let paths: Vec<&str> = files.iter().map(|f| f.metrics.path.as_str()).collect();
        let module_of = detect_modules(&paths, config, structural);

        let mut facts = compute_module_facts(files, graph, structural, semantic, &module_of);
        let (layers, violations, module_edges, layer_count) =
            infer_layers(graph, &module_of);

        facts.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            modules = facts.len(),
            layers = layer_count,
            violations = violations.len(),
            "architecture analysis complete"
        );

        store.architecture.set(
            slots::ARCHITECTURE,
            ArchitectureFacts {
                modules: facts,
                module_of,
                layers,
                violations,
                module_edges,
                layer_count,
            },
        );
        Ok(())
    }
}

/// Module detection: configured globs, then the directory-depth heuristic,
/// then Louvain communities as synthetic modules.
fn detect_modules(
    paths: &[&str],
    config: &InsightConfig,
    structural: &crate::analyzers::structural::StructuralFacts,
) -> BTreeMap<String, String> {
    if !config.modules.custom.is_empty() {
        let compiled: Vec<(String, Regex)> = config
            .modules
            .custom
            .iter()
            .filter_map(|m| glob_to_regex(&m.path).map(|re| (m.name.clone(), re)))
            .collect();
        let mut out = BTreeMap::new();
        for path in paths {
            let module = compiled
                .iter()
                .find(|(_, re)| re.is_match(path))
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| "(unassigned)".to_string());
            out.insert(path.to_string(), module);
        }
        return out;
    }

    if let Some(depth_modules) = directory_modules(paths, config.architecture.module_depth) {
        return depth_modules;
    }

    // Louvain fallback: synthetic modules from community structure
    let mut out = BTreeMap::new();
    for path in paths {
        let community =
            structural.files.get(*path).map(|f| f.community).unwrap_or(0);
        out.insert(path.to_string(), format!("community_{}", community));
    }
    out
}

/// The shallowest depth where at least two directories exist and most
/// contain two or more files
fn directory_modules(paths: &[&str], forced_depth: Option<usize>) -> Option<BTreeMap<String, String>> {
    let assignment_at = |depth: usize| -> BTreeMap<String, String> {
        paths
            .iter()
            .map(|p| {
                let components: Vec<&str> = p.split('/').collect();
                let module = if components.len() > depth {
                    components[..depth].join("/")
                } else {
                    "(root)".to_string()
                };
                (p.to_string(), module)
            })
            .collect()
    };

    if let Some(depth) = forced_depth {
        return Some(assignment_at(depth.max(1)));
    }

    for depth in 1..=4 {
        let assignment = assignment_at(depth);
        let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
        for module in assignment.values() {
            if module != "(root)" {
                *sizes.entry(module).or_insert(0) += 1;
            }
        }
        if sizes.len() < 2 {
            continue;
        }
        let multi = sizes.values().filter(|&&n| n >= 2).count();
        if multi * 2 > sizes.len() {
            return Some(assignment);
        }
    }
    None
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}

static ABSTRACT_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(I[A-Z]|Abstract)").unwrap());

fn compute_module_facts(
    files: &[crate::scanner::ScannedFile],
    graph: &DepGraph,
    structural: &crate::analyzers::structural::StructuralFacts,
    semantic: &crate::analyzers::semantic::SemanticFacts,
    module_of: &BTreeMap<String, String>,
) -> Vec<ModuleFacts> {
    let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (path, module) in module_of {
        members.entry(module.as_str()).or_default().push(path.as_str());
    }

    // Cross-module edge tallies
    let mut afferent: BTreeMap<&str, usize> = BTreeMap::new();
    let mut efferent: BTreeMap<&str, usize> = BTreeMap::new();
    let mut internal: BTreeMap<&str, usize> = BTreeMap::new();
    for &(src, tgt, _) in &graph.edges {
        let src_module = module_of.get(graph.path(src)).map(String::as_str);
        let tgt_module = module_of.get(graph.path(tgt)).map(String::as_str);
        let (Some(sm), Some(tm)) = (src_module, tgt_module) else { continue };
        if sm == tm {
            *internal.entry(sm).or_insert(0) += 1;
        } else {
            *efferent.entry(sm).or_insert(0) += 1;
            *afferent.entry(tm).or_insert(0) += 1;
        }
    }

    let abstract_counts: BTreeMap<&str, (usize, usize)> = files
        .iter()
        .map(|f| {
            let (mut abstracts, mut total) = (0, 0);
            if let Some(syntax) = &f.syntax {
                for class in &syntax.classes {
                    total += 1;
                    if class.is_abstract || ABSTRACT_HINT.is_match(&class.name) {
                        abstracts += 1;
                    }
                }
            }
            (f.metrics.path.as_str(), (abstracts, total))
        })
        .collect();

    members
        .iter()
        .map(|(module, paths)| {
            let n = paths.len();
            let ca = afferent.get(module).copied().unwrap_or(0);
            let ce = efferent.get(module).copied().unwrap_or(0);
            let internal_edges = internal.get(module).copied().unwrap_or(0);
            let external_edges = ca + ce;

            let cohesion = if n > 1 {
                internal_edges as f64 / (n * (n - 1)) as f64
            } else {
                0.0
            };
            let coupling = if internal_edges + external_edges > 0 {
                external_edges as f64 / (internal_edges + external_edges) as f64
            } else {
                0.0
            };
            let instability = if ca + ce > 0 { Some(ce as f64 / (ca + ce) as f64) } else { None };

            let (abstracts, total_classes) = paths
                .iter()
                .map(|p| abstract_counts.get(*p).copied().unwrap_or((0, 0)))
                .fold((0, 0), |(a, t), (x, y)| (a + x, t + y));
            let abstractness =
                if total_classes > 0 { abstracts as f64 / total_classes as f64 } else { 0.0 };

            // Computed only when instability is present
            let main_seq_distance = instability.map(|i| (abstractness + i - 1.0).abs());

            let mut role_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for path in paths.iter() {
                *role_counts.entry(semantic.role_of(path).as_str()).or_insert(0) += 1;
            }
            let role_consistency = role_counts
                .values()
                .max()
                .map(|&m| m as f64 / n as f64)
                .unwrap_or(0.0);

            let mut community_counts: BTreeMap<usize, usize> = BTreeMap::new();
            for path in paths.iter() {
                let community =
                    structural.files.get(*path).map(|f| f.community).unwrap_or(0);
                *community_counts.entry(community).or_insert(0) += 1;
            }
            let boundary_alignment = community_counts
                .values()
                .max()
                .map(|&m| m as f64 / n as f64)
                .unwrap_or(0.0);

            ModuleFacts {
                name: module.to_string(),
                files: paths.iter().map(|p| p.to_string()).collect(),
                afferent: ca,
                efferent: ce,
                cohesion,
                coupling,
                instability,
                abstractness,
                main_seq_distance,
                role_consistency,
                boundary_alignment,
            }
        })
        .collect()
}

type LayerOutput =
    (BTreeMap<String, usize>, Vec<LayerViolation>, Vec<(String, String, usize)>, usize);

/// Contract to the module graph, break cycles, assign layer depths, and
/// classify every original edge against the layering.
///
/// Depth counts the dependency chain below a module: a module importing
/// nothing sits at layer 0. A BACKWARD edge points from a lower layer to a
/// higher one; a SKIP edge spans more than one layer. The two are
/// independent and may coexist on the same edge.
fn infer_layers(graph: &DepGraph, module_of: &BTreeMap<String, String>) -> LayerOutput {
    // Aggregate file edges into module edges
    let mut edge_weights: BTreeMap<(String, String), usize> = BTreeMap::new();
    for &(src, tgt, _) in &graph.edges {
        let (Some(sm), Some(tm)) =
            (module_of.get(graph.path(src)), module_of.get(graph.path(tgt)))
        else {
            continue;
        };
        if sm != tm {
            *edge_weights.entry((sm.clone(), tm.clone())).or_insert(0) += 1;
        }
    }

    let mut modules: Vec<&String> = module_of.values().collect();
    modules.sort();
    modules.dedup();
    let index: BTreeMap<&str, usize> =
        modules.iter().enumerate().map(|(i, m)| (m.as_str(), i)).collect();
    let m = modules.len();

    let mut out_adj: Vec<Vec<usize>> = vec![Vec::new(); m];
    for (src, tgt) in edge_weights.keys() {
        out_adj[index[src.as_str()]].push(index[tgt.as_str()]);
    }

    // Iterative DFS back-edge removal
    let mut color = vec![0u8; m]; // 0 white, 1 gray, 2 black
    let mut back_edges: Vec<(usize, usize)> = Vec::new();
    for start in 0..m {
        if color[start] != 0 {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = 1;
        while let Some(&(v, child)) = stack.last() {
            if child < out_adj[v].len() {
                stack.last_mut().map(|f| f.1 += 1);
                let w = out_adj[v][child];
                match color[w] {
                    0 => {
                        color[w] = 1;
                        stack.push((w, 0));
                    }
                    1 => back_edges.push((v, w)),
                    _ => {}
                }
            } else {
                color[v] = 2;
                stack.pop();
            }
        }
    }

    let dag_edges: Vec<(usize, usize)> = edge_weights
        .keys()
        .map(|(s, t)| (index[s.as_str()], index[t.as_str()]))
        .filter(|e| !back_edges.contains(e))
        .collect();

    // Layer depth: longest dependency chain below each module, computed
    // over the DAG in reverse topological order
    let mut out_degree = vec![0usize; m];
    let mut rev_adj: Vec<Vec<usize>> = vec![Vec::new(); m];
    for &(s, t) in &dag_edges {
        out_degree[s] += 1;
        rev_adj[t].push(s);
    }
    let mut layer = vec![0usize; m];
    let mut queue: std::collections::VecDeque<usize> =
        (0..m).filter(|&v| out_degree[v] == 0).collect();
    let mut remaining = out_degree.clone();
    while let Some(v) = queue.pop_front() {
        for &p in &rev_adj[v] {
            layer[p] = layer[p].max(layer[v] + 1);
            remaining[p] -= 1;
            if remaining[p] == 0 {
                queue.push_back(p);
            }
        }
    }

    // Classify every original module edge
    let mut violations = Vec::new();
    for (src, tgt) in edge_weights.keys() {
        let (sl, tl) = (layer[index[src.as_str()]], layer[index[tgt.as_str()]]);
        if sl < tl {
            violations.push(LayerViolation {
                src_module: src.clone(),
                tgt_module: tgt.clone(),
                src_layer: sl,
                tgt_layer: tl,
                kind: ViolationKind::Backward,
            });
        }
        if sl.abs_diff(tl) > 1 {
            violations.push(LayerViolation {
                src_module: src.clone(),
                tgt_module: tgt.clone(),
                src_layer: sl,
                tgt_layer: tl,
                kind: ViolationKind::Skip,
            });
        }
    }

    let layers: BTreeMap<String, usize> =
        modules.iter().map(|module| ((*module).clone(), layer[index[module.as_str()]])).collect();
    let layer_count = layer.iter().copied().max().map(|l| l + 1).unwrap_or(0);
    let module_edges: Vec<(String, String, usize)> = edge_weights
        .into_iter()
        .map(|((s, t), w)| (s, t, w))
        .collect();

    (layers, violations, module_edges, layer_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::semantic::SemanticAnalyzer;
    use crate::analyzers::structural::StructuralAnalyzer;
    use crate::lang::Lang;
    use crate::scanner::{FileMetrics, FileSyntax, ImportInfo, ScannedFile};

    fn scanned(path: &str, imports: Vec<&str>) -> ScannedFile {
        ScannedFile {
            metrics: FileMetrics {
                path: path.to_string(),
                lang: Lang::Python,
                lines: 30,
                token_count: 100,
                function_count: 2,
                class_count: 0,
                raw_imports: imports.iter().map(|s| s.to_string()).collect(),
                compression_ratio: 0.5,
                cognitive_load: 1.0,
                line_hashes: Vec::new(),
                token_hashes: Vec::new(),
            },
            syntax: Some(FileSyntax {
                imports: imports
                    .into_iter()
                    .map(|r| ImportInfo {
                        raw: r.to_string(),
                        resolved: Some(r.to_string()),
                        is_local: true,
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    fn run_pipeline(files: Vec<ScannedFile>, config: &InsightConfig) -> ArchitectureFacts {
        let store = Store::new();
        store.file_metrics.set(slots::FILE_METRICS, files);
        StructuralAnalyzer.run(&store, config).unwrap();
        SemanticAnalyzer.run(&store, config).unwrap();
        ArchitectureAnalyzer.run(&store, config).unwrap();
        store.architecture.get().unwrap().clone()
    }

    fn layered_files() -> Vec<ScannedFile> {
        vec![
            scanned("api/routes.py", vec!["svc/logic.py"]),
            scanned("api/views.py", vec!["svc/logic.py"]),
            scanned("svc/logic.py", vec!["core/base.py"]),
            scanned("svc/other.py", vec!["core/base.py"]),
            scanned("core/base.py", vec![]),
            scanned("core/util.py", vec![]),
        ]
    }

    #[test]
    fn directory_modules_and_layers() {
        let facts = run_pipeline(layered_files(), &InsightConfig::default());
        assert_eq!(facts.module_of["api/routes.py"], "api");
        assert_eq!(facts.module_of["core/base.py"], "core");
        assert_eq!(facts.layers["core"], 0);
        assert_eq!(facts.layers["svc"], 1);
        assert_eq!(facts.layers["api"], 2);
        assert_eq!(facts.layer_count, 3);
        assert!(facts.violations.is_empty());
    }

    #[test]
    fn backward_violation_detected() {
        let mut files = layered_files();
        // core reaching up into api
        files[4] = scanned("core/base.py", vec!["api/routes.py"]);
        let facts = run_pipeline(files, &InsightConfig::default());
        let backward: Vec<&LayerViolation> =
            facts.violations.iter().filter(|v| v.kind == ViolationKind::Backward).collect();
        assert!(!backward.is_empty());
        assert!(backward.iter().any(|v| v.src_module == "core" && v.tgt_module == "api"));
    }

    #[test]
    fn skip_violation_detected() {
        let mut files = layered_files();
        files.push(scanned("api/direct.py", vec!["core/base.py"]));
        let facts = run_pipeline(files, &InsightConfig::default());
        let skips: Vec<&LayerViolation> =
            facts.violations.iter().filter(|v| v.kind == ViolationKind::Skip).collect();
        assert!(skips.iter().any(|v| v.src_module == "api" && v.tgt_module == "core"));
    }

    #[test]
    fn martin_metrics() {
        let facts = run_pipeline(layered_files(), &InsightConfig::default());
        let core = facts.module_named("core").unwrap();
        // core has only incoming edges
        assert_eq!(core.efferent, 0);
        assert_eq!(core.afferent, 2);
        assert_eq!(core.instability, Some(0.0));

        let api = facts.module_named("api").unwrap();
        assert_eq!(api.instability, Some(1.0));
        assert_eq!(api.main_seq_distance, Some(0.0));
    }

    #[test]
    fn isolated_module_has_absent_instability() {
        let mut files = layered_files();
        files.push(scanned("lone/one.py", vec![]));
        files.push(scanned("lone/two.py", vec![]));
        let facts = run_pipeline(files, &InsightConfig::default());
        let lone = facts.module_named("lone").unwrap();
        assert_eq!(lone.instability, None);
        assert_eq!(lone.main_seq_distance, None);
    }

    #[test]
    fn custom_modules_from_config() {
        let mut config = InsightConfig::default();
        config.modules.custom = vec![
            crate::config::CustomModule { name: "backend".into(), path: "api/**".into() },
            crate::config::CustomModule { name: "kernel".into(), path: "core/**".into() },
        ];
        let facts = run_pipeline(layered_files(), &config);
        assert_eq!(facts.module_of["api/routes.py"], "backend");
        assert_eq!(facts.module_of["core/base.py"], "kernel");
        assert_eq!(facts.module_of["svc/logic.py"], "(unassigned)");
    }

    #[test]
    fn glob_translation() {
        let re = glob_to_regex("src/**/*.py").unwrap();
        assert!(re.is_match("src/a/b/c.py"));
        assert!(!re.is_match("lib/a.py"));
        let re = glob_to_regex("core/*").unwrap();
        assert!(re.is_match("core/base.py"));
        assert!(!re.is_match("core/sub/base.py"));
    }
}
