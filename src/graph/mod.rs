//! Index-based file dependency graph
//!
//! Nodes are file paths; edges are resolved imports. The graph is stored
//! as index vectors plus adjacency lists, never as owning pointers between
//! files, so cyclic structures are representable.

mod betweenness;
mod louvain;
mod pagerank;
mod reach;
mod scc;

pub use betweenness::betweenness;
pub use louvain::{louvain, modularity, Adjacency};
pub use pagerank::pagerank;
pub use reach::{blast_radius, depth_from_entries};
pub use scc::{scc_membership, tarjan_scc};

use ahash::AHashMap;

use crate::scanner::ScannedFile;

/// File dependency graph over index-based adjacency
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    /// Node paths, sorted; index into this vec is the node id
    nodes: Vec<String>,
    index: AHashMap<String, usize>,
    /// (source, target, weight) dependency edges
    pub edges: Vec<(usize, usize, f64)>,
    out_adj: Vec<Vec<usize>>,
    in_adj: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Build the graph from scanned files and their resolved imports
    pub fn from_files(files: &[ScannedFile]) -> Self {
        let mut nodes: Vec<String> = files.iter().map(|f| f.metrics.path.clone()).collect();
        nodes.sort();
        let index: AHashMap<String, usize> =
            nodes.iter().enumerate().map(|(i, p)| (p.clone(), i)).collect();

        let mut edge_set: AHashMap<(usize, usize), f64> = AHashMap::new();
        for file in files {
            let Some(src) = index.get(&file.metrics.path).copied() else { continue };
            let Some(syntax) = &file.syntax else { continue };
            for import in &syntax.imports {
                let Some(resolved) = &import.resolved else { continue };
                let Some(tgt) = index.get(resolved).copied() else { continue };
                if src == tgt {
                    continue;
                }
                *edge_set.entry((src, tgt)).or_insert(0.0) += 1.0;
            }
        }

        let mut edges: Vec<(usize, usize, f64)> =
            edge_set.into_iter().map(|((s, t), w)| (s, t, w)).collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut out_adj = vec![Vec::new(); nodes.len()];
        let mut in_adj = vec![Vec::new(); nodes.len()];
        for &(src, tgt, _) in &edges {
            out_adj[src].push(tgt);
            in_adj[tgt].push(src);
        }

        Self { nodes, index, edges, out_adj, in_adj }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn path(&self, node: usize) -> &str {
        &self.nodes[node]
    }

    pub fn paths(&self) -> &[String] {
        &self.nodes
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn out_neighbors(&self, node: usize) -> &[usize] {
        &self.out_adj[node]
    }

    pub fn in_neighbors(&self, node: usize) -> &[usize] {
        &self.in_adj[node]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_adj[node].len()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.in_adj[node].len()
    }

    /// Undirected weighted adjacency projection, for community detection
    /// and spectral analysis
    pub fn undirected_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adj: Vec<AHashMap<usize, f64>> = vec![AHashMap::new(); self.nodes.len()];
        for &(src, tgt, weight) in &self.edges {
            *adj[src].entry(tgt).or_insert(0.0) += weight;
            *adj[tgt].entry(src).or_insert(0.0) += weight;
        }
        adj.into_iter()
            .map(|m| {
                let mut pairs: Vec<(usize, f64)> = m.into_iter().collect();
                pairs.sort_by_key(|(n, _)| *n);
                pairs
            })
            .collect()
    }

    /// Undirected neighbor sets, for the health Laplacian
    pub fn undirected_neighbors(&self, node: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> =
            self.out_adj[node].iter().chain(self.in_adj[node].iter()).copied().collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}

#[cfg(test)]
pub(crate) fn graph_from_edges(n: usize, edges: &[(usize, usize)]) -> DepGraph {
    let nodes: Vec<String> = (0..n).map(|i| format!("f{}.py", i)).collect();
    let index: AHashMap<String, usize> =
        nodes.iter().enumerate().map(|(i, p)| (p.clone(), i)).collect();
    let edges: Vec<(usize, usize, f64)> = edges.iter().map(|&(s, t)| (s, t, 1.0)).collect();
    let mut out_adj = vec![Vec::new(); n];
    let mut in_adj = vec![Vec::new(); n];
    for &(s, t, _) in &edges {
        out_adj[s].push(t);
        in_adj[t].push(s);
    }
    DepGraph { nodes, index, edges, out_adj, in_adj }
}
