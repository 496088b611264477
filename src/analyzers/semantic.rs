//! Semantic analyzer: file roles, concept clusters, naming drift

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::graph::louvain;
use crate::scanner::tokens::split_identifier;
use crate::scanner::ScannedFile;
use crate::store::{slots, Store};

/// Files with fewer unique identifiers than this get the single-concept
/// fallback
const MIN_UNIQUE_IDENTIFIERS: usize = 20;
/// Top TF-IDF terms per file feeding the concept graph
const TOP_TERMS_PER_FILE: usize = 10;

/// Identifier segments carrying no domain meaning
const STOP_WORDS: &[&str] = &[
    "abstract", "and", "args", "assert", "async", "await", "bool", "break", "case", "catch",
    "char", "class", "const", "continue", "def", "default", "del", "done", "double", "elif",
    "else", "enum", "err", "error", "except", "extends", "false", "final", "finally", "float",
    "fn", "for", "from", "func", "function", "get", "global", "impl", "implements", "import",
    "in", "init", "int", "interface", "is", "kwargs", "lambda", "let", "long", "main", "match",
    "mod", "mut", "new", "none", "not", "null", "obj", "of", "or", "override", "package", "pass",
    "print", "private", "protected", "pub", "public", "raise", "ret", "return", "self", "set",
    "static", "std", "str", "string", "struct", "super", "switch", "temp", "this", "throw",
    "throws", "tmp", "trait", "true", "try", "type", "typeof", "use", "val", "value", "var",
    "void", "while", "with", "yield",
];

/// Closed role classification for a file's purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Model,
    Service,
    Utility,
    Config,
    Test,
    Cli,
    EntryPoint,
    Interface,
    Constant,
    Exception,
    Migration,
    #[default]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "MODEL",
            Self::Service => "SERVICE",
            Self::Utility => "UTILITY",
            Self::Config => "CONFIG",
            Self::Test => "TEST",
            Self::Cli => "CLI",
            Self::EntryPoint => "ENTRY_POINT",
            Self::Interface => "INTERFACE",
            Self::Constant => "CONSTANT",
            Self::Exception => "EXCEPTION",
            Self::Migration => "MIGRATION",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Per-file semantic facts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSemantics {
    pub role: Role,
    pub docstring_coverage: f64,
    pub todo_density: f64,
    /// 1 - cosine(filename tokens, content concept terms)
    pub naming_drift: f64,
    /// Concept cluster ids this file participates in
    pub concepts: Vec<usize>,
}

/// One concept cluster over identifier terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: usize,
    pub label: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SemanticFacts {
    pub files: BTreeMap<String, FileSemantics>,
    pub concepts: Vec<Concept>,
}

impl SemanticFacts {
    pub fn role_of(&self, path: &str) -> Role {
        self.files.get(path).map(|f| f.role).unwrap_or_default()
    }
}

pub struct SemanticAnalyzer;

impl Analyzer for SemanticAnalyzer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::SEMANTIC]
    }

    fn run(&self, store: &Store, _config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };

        // Term frequencies per file over split identifier segments
        let term_counts: Vec<BTreeMap<String, f64>> = files
            .iter()
            .map(|f| {
                let mut counts: BTreeMap<String, f64> = BTreeMap::new();
                if let Some(syntax) = &f.syntax {
                    for (ident, occurrences) in &syntax.identifiers {
                        for segment in split_identifier(ident) {
                            if !STOP_WORDS.contains(&segment.as_str()) {
                                *counts.entry(segment).or_insert(0.0) += f64::from(*occurrences);
                            }
                        }
                    }
                }
                counts
            })
            .collect();

        let (concepts, file_concepts, top_terms) = extract_concepts(files, &term_counts);

        let mut per_file = BTreeMap::new();
        for (idx, file) in files.iter().enumerate() {
            let role = classify_role(file);
            // Identifier-thin files carry no reliable concept vector
            let unique_identifiers =
                file.syntax.as_ref().map(|s| s.identifiers.len()).unwrap_or(0);
            let naming_drift = if unique_identifiers < MIN_UNIQUE_IDENTIFIERS {
                0.0
            } else {
                naming_drift(&file.metrics.path, &top_terms[idx])
            };
            per_file.insert(
                file.metrics.path.clone(),
                FileSemantics {
                    role,
                    docstring_coverage: file.docstring_coverage(),
                    todo_density: file.todo_density(),
                    naming_drift,
                    concepts: file_concepts[idx].clone(),
                },
            );
        }

        debug!(files = per_file.len(), concepts = concepts.len(), "semantic analysis complete");
        store.semantic.set(slots::SEMANTIC, SemanticFacts { files: per_file, concepts });
        Ok(())
    }
}

/// Deterministic decision tree over path, decorators, bases, and content
/// shape
pub fn classify_role(file: &ScannedFile) -> Role {
    let path = file.metrics.path.to_lowercase();
    let stem = path
        .rsplit('/')
        .next()
        .unwrap_or(&path)
        .split('.')
        .next()
        .unwrap_or("")
        .to_string();
    let components: Vec<&str> = path.split('/').collect();
    let syntax = file.syntax.as_ref();

    let in_dir = |names: &[&str]| components.iter().any(|c| names.contains(c));

    if in_dir(&["test", "tests", "__tests__", "spec", "testing"])
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || path.contains(".test.")
        || path.contains(".spec.")
    {
        return Role::Test;
    }
    if in_dir(&["migrations", "migration"]) || stem.contains("migration") {
        return Role::Migration;
    }
    if syntax.map(|s| s.has_main_guard).unwrap_or(false)
        || matches!(stem.as_str(), "main" | "__main__" | "index" | "app")
    {
        return Role::EntryPoint;
    }
    if in_dir(&["cli", "cmd", "commands"]) || matches!(stem.as_str(), "cli" | "cmd" | "console") {
        return Role::Cli;
    }
    if stem.contains("config") || stem.contains("settings") || stem == "conf" {
        return Role::Config;
    }
    if let Some(syntax) = syntax {
        let classes = &syntax.classes;
        let exceptionish = |name: &str| name.ends_with("Error") || name.ends_with("Exception");
        if stem.contains("error")
            || stem.contains("exception")
            || (!classes.is_empty()
                && classes.iter().all(|c| {
                    exceptionish(&c.name) || c.bases.iter().any(|b| exceptionish(b))
                }))
        {
            return Role::Exception;
        }
        if matches!(stem.as_str(), "constants" | "consts" | "defines")
            || (syntax.functions.is_empty()
                && classes.is_empty()
                && mostly_uppercase_identifiers(syntax))
        {
            return Role::Constant;
        }
        if !classes.is_empty() && classes.iter().all(|c| c.is_abstract) {
            return Role::Interface;
        }
        if matches!(stem.as_str(), "models" | "model" | "entities" | "entity" | "schema" | "dto")
            || in_dir(&["models", "entities"])
            || classes.iter().any(|c| {
                c.decorators.iter().any(|d| d.contains("dataclass"))
                    || c.bases.iter().any(|b| b.contains("Model") || b.contains("Entity"))
            })
        {
            return Role::Model;
        }
    }
    if stem.contains("service")
        || stem.contains("manager")
        || stem.contains("handler")
        || stem.contains("controller")
        || stem.contains("worker")
        || in_dir(&["services", "handlers", "controllers"])
    {
        return Role::Service;
    }
    if matches!(stem.as_str(), "utils" | "util" | "helpers" | "helper" | "common" | "misc" | "tools")
        || in_dir(&["utils", "helpers"])
    {
        return Role::Utility;
    }
    Role::Unknown
}

fn mostly_uppercase_identifiers(syntax: &crate::scanner::FileSyntax) -> bool {
    let total = syntax.identifiers.len();
    if total == 0 {
        return false;
    }
    let upper = syntax
        .identifiers
        .iter()
        .filter(|(name, _)| name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()))
        .count();
    upper as f64 / total as f64 > 0.5
}

type ConceptOutput = (Vec<Concept>, Vec<Vec<usize>>, Vec<Vec<(String, f64)>>);

/// TF-IDF weighted co-occurrence graph over top terms, clustered with
/// Louvain. Returns (concepts, per-file concept ids, per-file top terms).
fn extract_concepts(files: &[ScannedFile], term_counts: &[BTreeMap<String, f64>]) -> ConceptOutput {
    let n = files.len().max(1) as f64;

    // Document frequencies
    let mut df: BTreeMap<&str, f64> = BTreeMap::new();
    for counts in term_counts {
        for term in counts.keys() {
            *df.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
    }

    // Top terms per file by TF-IDF
    let top_terms: Vec<Vec<(String, f64)>> = term_counts
        .iter()
        .map(|counts| {
            let mut weighted: Vec<(String, f64)> = counts
                .iter()
                .map(|(term, tf)| {
                    // Smoothed IDF keeps corpus-wide terms at a small
                    // positive weight instead of zeroing them out
                    let idf = (n / df[term.as_str()]).ln() + 1.0;
                    (term.clone(), tf * idf)
                })
                .filter(|(_, w)| *w > 0.0)
                .collect();
            weighted.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
            });
            weighted.truncate(TOP_TERMS_PER_FILE);
            weighted
        })
        .collect();

    // Term vocabulary over all top terms
    let mut vocabulary: Vec<&str> = top_terms
        .iter()
        .flat_map(|terms| terms.iter().map(|(t, _)| t.as_str()))
        .collect();
    vocabulary.sort_unstable();
    vocabulary.dedup();
    let term_index: BTreeMap<&str, usize> =
        vocabulary.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    // Co-occurrence adjacency: terms sharing a file attract
    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); vocabulary.len()];
    for terms in &top_terms {
        for (i, (term_a, weight_a)) in terms.iter().enumerate() {
            for (term_b, weight_b) in &terms[i + 1..] {
                let (a, b) = (term_index[term_a.as_str()], term_index[term_b.as_str()]);
                let weight = weight_a.min(*weight_b);
                adjacency[a].push((b, weight));
                adjacency[b].push((a, weight));
            }
        }
    }

    let (term_community, _) = louvain(&adjacency);

    // Cluster label: term with the greatest total weight in the cluster
    let mut cluster_weight: BTreeMap<usize, BTreeMap<&str, f64>> = BTreeMap::new();
    for terms in &top_terms {
        for (term, weight) in terms {
            let cluster = term_community[term_index[term.as_str()]];
            *cluster_weight.entry(cluster).or_default().entry(term.as_str()).or_insert(0.0) +=
                weight;
        }
    }

    let mut concepts = Vec::new();
    let mut cluster_to_concept: BTreeMap<usize, usize> = BTreeMap::new();
    for (cluster, weights) in &cluster_weight {
        let label = weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(t, _)| t.to_string())
            .unwrap_or_default();
        let id = concepts.len();
        cluster_to_concept.insert(*cluster, id);
        concepts.push(Concept { id, label, files: Vec::new() });
    }

    // Per-file concept membership; thin files get a role-tagged fallback
    let mut file_concepts: Vec<Vec<usize>> = Vec::with_capacity(files.len());
    let mut fallback: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, file) in files.iter().enumerate() {
        let unique_identifiers =
            file.syntax.as_ref().map(|s| s.identifiers.len()).unwrap_or(0);
        if unique_identifiers < MIN_UNIQUE_IDENTIFIERS {
            let tag = format!("role:{}", classify_role(file).as_str().to_lowercase());
            let id = *fallback.entry(tag.clone()).or_insert_with(|| {
                let id = concepts.len();
                concepts.push(Concept { id, label: tag, files: Vec::new() });
                id
            });
            concepts[id].files.push(file.metrics.path.clone());
            file_concepts.push(vec![id]);
            continue;
        }

        let mut ids: Vec<usize> = top_terms[idx]
            .iter()
            .map(|(term, _)| cluster_to_concept[&term_community[term_index[term.as_str()]]])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        for &id in &ids {
            concepts[id].files.push(file.metrics.path.clone());
        }
        file_concepts.push(ids);
    }

    (concepts, file_concepts, top_terms)
}

/// 1 - cosine similarity between filename tokens and content terms
fn naming_drift(path: &str, top_terms: &[(String, f64)]) -> f64 {
    let stem = path.rsplit('/').next().unwrap_or(path).split('.').next().unwrap_or("");
    let name_tokens: Vec<String> = split_identifier(stem)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect();
    if name_tokens.is_empty() || top_terms.is_empty() {
        return 0.0;
    }

    let content_norm: f64 = top_terms.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    let name_norm = (name_tokens.len() as f64).sqrt();
    let dot: f64 = top_terms
        .iter()
        .filter(|(term, _)| name_tokens.iter().any(|t| t == term))
        .map(|(_, w)| w)
        .sum();

    if content_norm == 0.0 {
        return 0.0;
    }
    (1.0 - dot / (name_norm * content_norm)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Lang;
    use crate::scanner::{ClassInfo, FileMetrics, FileSyntax};

    fn file(path: &str, syntax: FileSyntax) -> ScannedFile {
        ScannedFile {
            metrics: FileMetrics {
                path: path.to_string(),
                lang: Lang::Python,
                lines: 50,
                token_count: 100,
                function_count: syntax.functions.len(),
                class_count: syntax.classes.len(),
                raw_imports: Vec::new(),
                compression_ratio: 0.5,
                cognitive_load: 0.0,
                line_hashes: Vec::new(),
                token_hashes: Vec::new(),
            },
            syntax: Some(syntax),
        }
    }

    fn with_main_guard() -> FileSyntax {
        FileSyntax { has_main_guard: true, ..Default::default() }
    }

    #[test]
    fn role_tree_ordering() {
        assert_eq!(classify_role(&file("tests/test_api.py", FileSyntax::default())), Role::Test);
        assert_eq!(
            classify_role(&file("db/migrations/0001_init.py", FileSyntax::default())),
            Role::Migration
        );
        assert_eq!(classify_role(&file("tool.py", with_main_guard())), Role::EntryPoint);
        assert_eq!(classify_role(&file("app/cli/run.py", FileSyntax::default())), Role::Cli);
        assert_eq!(classify_role(&file("settings.py", FileSyntax::default())), Role::Config);
        assert_eq!(classify_role(&file("core/utils.py", FileSyntax::default())), Role::Utility);
        assert_eq!(
            classify_role(&file("api/handler.py", FileSyntax::default())),
            Role::Service
        );
        assert_eq!(classify_role(&file("thing.py", FileSyntax::default())), Role::Unknown);
    }

    #[test]
    fn exception_and_interface_roles() {
        let exceptions = FileSyntax {
            classes: vec![ClassInfo {
                name: "NotFoundError".to_string(),
                bases: vec!["Exception".to_string()],
                is_abstract: false,
                decorators: Vec::new(),
            }],
            ..Default::default()
        };
        assert_eq!(classify_role(&file("app/things.py", exceptions)), Role::Exception);

        let interfaces = FileSyntax {
            classes: vec![ClassInfo {
                name: "Repository".to_string(),
                bases: vec!["ABC".to_string()],
                is_abstract: true,
                decorators: Vec::new(),
            }],
            ..Default::default()
        };
        assert_eq!(classify_role(&file("app/ports.py", interfaces)), Role::Interface);
    }

    #[test]
    fn concept_fallback_for_thin_files() {
        let store = Store::new();
        store.file_metrics.set(
            slots::FILE_METRICS,
            vec![file("a.py", FileSyntax::default()), file("b.py", FileSyntax::default())],
        );
        SemanticAnalyzer.run(&store, &InsightConfig::default()).unwrap();
        let facts = store.semantic.get().unwrap();
        // Thin files collapse into one role-tagged fallback concept
        assert_eq!(facts.files["a.py"].concepts.len(), 1);
        assert_eq!(facts.files["a.py"].concepts, facts.files["b.py"].concepts);
        assert!(facts.concepts[facts.files["a.py"].concepts[0]].label.starts_with("role:"));
    }

    #[test]
    fn concepts_cluster_shared_vocabulary() {
        let identifiers = |names: &[&str]| FileSyntax {
            identifiers: names.iter().map(|n| (n.to_string(), 3)).collect(),
            ..Default::default()
        };
        let order_terms: Vec<String> =
            (0..25).map(|i| format!("orderItem{}", i)).collect();
        let order_refs: Vec<&str> = order_terms.iter().map(String::as_str).collect();
        let store = Store::new();
        store.file_metrics.set(
            slots::FILE_METRICS,
            vec![
                file("orders.py", identifiers(&order_refs)),
                file("billing.py", identifiers(&order_refs)),
            ],
        );
        SemanticAnalyzer.run(&store, &InsightConfig::default()).unwrap();
        let facts = store.semantic.get().unwrap();
        // Shared vocabulary puts both files in overlapping concepts
        let a = &facts.files["orders.py"].concepts;
        let b = &facts.files["billing.py"].concepts;
        assert!(a.iter().any(|c| b.contains(c)));
    }

    #[test]
    fn naming_drift_bounds() {
        let aligned = naming_drift("parser.py", &[("parser".to_string(), 5.0)]);
        assert!(aligned < 0.5);
        let drifted =
            naming_drift("parser.py", &[("billing".to_string(), 5.0), ("invoice".to_string(), 4.0)]);
        assert!(drifted > 0.9);
        assert_eq!(naming_drift("x.py", &[]), 0.0);
    }
}
