//! Structural analyzer: dependency graph and graph-theoretic signals

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::graph::{
    betweenness, blast_radius, depth_from_entries, louvain, pagerank, scc_membership, tarjan_scc,
    DepGraph,
};
use crate::store::{slots, Store};

/// Per-file graph position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStructure {
    pub in_degree: usize,
    pub out_degree: usize,
    pub pagerank: f64,
    pub betweenness: f64,
    pub blast_radius: usize,
    /// Longest dependency chain from an entry point; None when the file is
    /// unreachable from every entry
    pub depth_from_entry: Option<usize>,
    /// Louvain community id
    pub community: usize,
    pub in_cycle: bool,
    /// Count of project-local imports that resolved to no scanned file
    pub phantom_imports: usize,
}

/// Graph facts for the whole run
#[derive(Debug, Clone, Default)]
pub struct StructuralFacts {
    pub files: BTreeMap<String, FileStructure>,
    /// SCCs of size > 1, as sorted path lists
    pub cycles: Vec<Vec<String>>,
    pub cycle_count: usize,
    pub modularity: f64,
    pub community_count: usize,
}

pub struct StructuralAnalyzer;

impl Analyzer for StructuralAnalyzer {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::GRAPH, slots::STRUCTURAL]
    }

    fn run(&self, store: &Store, config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };
        let graph = DepGraph::from_files(files);
        let n = graph.node_count();

        let ranks = pagerank(
            &graph,
            config.pagerank_damping,
            config.pagerank_tolerance,
            config.pagerank_iterations,
        );
        let centrality = betweenness(&graph);
        let radius = blast_radius(&graph);

        let components = tarjan_scc(&graph);
        let membership = scc_membership(&components, n);
        let cycles: Vec<Vec<String>> = components
            .iter()
            .filter(|c| c.len() > 1)
            .map(|c| c.iter().map(|&v| graph.path(v).to_string()).collect())
            .collect();
        let in_cycle: Vec<bool> =
            (0..n).map(|v| components[membership[v]].len() > 1).collect();

        let (communities, modularity) = louvain(&graph.undirected_adjacency());
        let community_count = communities.iter().copied().max().map(|m| m + 1).unwrap_or(0);

        // Entry points for depth assignment: files carrying the language's
        // entry idiom
        let entries: Vec<usize> = files
            .iter()
            .filter(|f| f.syntax.as_ref().map(|s| s.has_main_guard).unwrap_or(false))
            .filter_map(|f| graph.index_of(&f.metrics.path))
            .collect();
        let depths = depth_from_entries(&graph, &entries);

        let mut per_file = BTreeMap::new();
        for file in files {
            let Some(v) = graph.index_of(&file.metrics.path) else { continue };
            let phantom_imports = file
                .syntax
                .as_ref()
                .map(|s| s.imports.iter().filter(|i| i.is_local && i.resolved.is_none()).count())
                .unwrap_or(0);
            per_file.insert(
                file.metrics.path.clone(),
                FileStructure {
                    in_degree: graph.in_degree(v),
                    out_degree: graph.out_degree(v),
                    pagerank: ranks.get(v).copied().unwrap_or(0.0),
                    betweenness: centrality.get(v).copied().unwrap_or(0.0),
                    blast_radius: radius.get(v).copied().unwrap_or(0),
                    depth_from_entry: depths.get(v).copied().flatten(),
                    community: communities.get(v).copied().unwrap_or(0),
                    in_cycle: in_cycle.get(v).copied().unwrap_or(false),
                    phantom_imports,
                },
            );
        }

        debug!(
            nodes = n,
            edges = graph.edge_count(),
            cycles = cycles.len(),
            communities = community_count,
            "structural analysis complete"
        );

        let facts = StructuralFacts {
            files: per_file,
            cycle_count: cycles.len(),
            cycles,
            modularity,
            community_count,
        };
        store.graph.set(slots::GRAPH, graph);
        store.structural.set(slots::STRUCTURAL, facts);
        Ok(())
    }
}
