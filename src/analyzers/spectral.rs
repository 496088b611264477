//! Spectral analyzer: algebraic connectivity of the dependency graph
//!
//! The Fiedler value (second-smallest Laplacian eigenvalue) measures how
//! well wired the codebase is: near zero means the graph is barely
//! connected or not connected at all.

use std::collections::VecDeque;

use tracing::debug;

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::graph::DepGraph;
use crate::store::{slots, Store};

const POWER_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFacts {
    pub fiedler_value: f64,
}

pub struct SpectralAnalyzer;

impl Analyzer for SpectralAnalyzer {
    fn name(&self) -> &'static str {
        "spectral"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::GRAPH]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::SPECTRAL]
    }

    fn run(&self, store: &Store, _config: &InsightConfig) -> Result<()> {
        let Some(graph) = store.graph.get() else { return Ok(()) };
        let fiedler_value = fiedler_value(graph);
        debug!(fiedler_value, "spectral analysis complete");
        store.spectral.set(slots::SPECTRAL, SpectralFacts { fiedler_value });
        Ok(())
    }
}

/// Second-smallest eigenvalue of the undirected graph Laplacian.
///
/// Disconnected graphs return exactly 0 (checked by BFS first, no
/// iteration noise); connected graphs use deflated power iteration on the
/// spectrum-shifted operator.
pub fn fiedler_value(graph: &DepGraph) -> f64 {
    let n = graph.node_count();
    if n < 2 {
        return 0.0;
    }

    let adjacency = graph.undirected_adjacency();
    if !is_connected(&adjacency) {
        return 0.0;
    }

    let degree: Vec<f64> =
        adjacency.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let max_degree = degree.iter().cloned().fold(0.0, f64::max);
    if max_degree == 0.0 {
        return 0.0;
    }

    // Shift: B = cI - L has eigenvalues c - lambda; the largest deflated
    // eigenvector of B corresponds to lambda_2 of L
    let shift = 2.0 * max_degree;

    // Deterministic start vector, orthogonal to the all-ones kernel
    let mut v: Vec<f64> = (0..n).map(|i| ((i as f64) + 0.5).sin()).collect();
    remove_mean(&mut v);
    normalize(&mut v);

    let mut eigenvalue = 0.0;
    for _ in 0..POWER_ITERATIONS {
        // w = B v = shift*v - L v = shift*v - (D v - A v)
        let mut w = vec![0.0; n];
        for i in 0..n {
            let mut lv = degree[i] * v[i];
            for &(j, weight) in &adjacency[i] {
                lv -= weight * v[j];
            }
            w[i] = shift * v[i] - lv;
        }
        remove_mean(&mut w);
        let norm = normalize(&mut w);
        let next = shift - norm;
        let delta = (next - eigenvalue).abs();
        eigenvalue = next;
        v = w;
        if delta < CONVERGENCE {
            break;
        }
    }

    eigenvalue.max(0.0)
}

fn is_connected(adjacency: &[Vec<(usize, f64)>]) -> bool {
    let n = adjacency.len();
    if n == 0 {
        return false;
    }
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    seen[0] = true;
    queue.push_back(0);
    let mut count = 1;
    while let Some(v) = queue.pop_front() {
        for &(w, _) in &adjacency[v] {
            if !seen[w] {
                seen[w] = true;
                count += 1;
                queue.push_back(w);
            }
        }
    }
    count == n
}

fn remove_mean(v: &mut [f64]) {
    let mean = v.iter().sum::<f64>() / v.len() as f64;
    for x in v.iter_mut() {
        *x -= mean;
    }
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DepGraph;

    fn graph(n: usize, edges: &[(usize, usize)]) -> DepGraph {
        crate::graph::graph_from_edges(n, edges)
    }

    #[test]
    fn disconnected_graph_is_zero() {
        let g = graph(4, &[(0, 1)]);
        assert_eq!(fiedler_value(&g), 0.0);
    }

    #[test]
    fn path_graph_value() {
        // P3 Laplacian eigenvalues: 0, 1, 3
        let g = graph(3, &[(0, 1), (1, 2)]);
        let lambda2 = fiedler_value(&g);
        assert!((lambda2 - 1.0).abs() < 1e-3, "lambda2 = {}", lambda2);
    }

    #[test]
    fn complete_graph_value() {
        // K3 eigenvalues: 0, 3, 3
        let g = graph(3, &[(0, 1), (1, 2), (0, 2)]);
        let lambda2 = fiedler_value(&g);
        assert!((lambda2 - 3.0).abs() < 1e-3, "lambda2 = {}", lambda2);
    }

    #[test]
    fn tiny_graphs() {
        assert_eq!(fiedler_value(&graph(0, &[])), 0.0);
        assert_eq!(fiedler_value(&graph(1, &[])), 0.0);
    }
}
