//! PageRank by power iteration
//!
//! Dangling nodes redistribute their mass uniformly, which keeps the
//! transition matrix stochastic and the iteration convergent. The result
//! is a probability distribution over nodes.

use super::DepGraph;

/// Compute PageRank over the dependency graph.
///
/// Returns one value per node, summing to 1. An empty graph returns an
/// empty vector.
pub fn pagerank(graph: &DepGraph, damping: f64, tolerance: f64, max_iterations: usize) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let uniform = 1.0 / n as f64;
    let mut ranks = vec![uniform; n];
    let mut next = vec![0.0; n];

    for _ in 0..max_iterations {
        let dangling_mass: f64 =
            (0..n).filter(|&v| graph.out_degree(v) == 0).map(|v| ranks[v]).sum();

        let base = (1.0 - damping) * uniform + damping * dangling_mass * uniform;
        next.iter_mut().for_each(|r| *r = base);

        for v in 0..n {
            let out_degree = graph.out_degree(v);
            if out_degree == 0 {
                continue;
            }
            let share = damping * ranks[v] / out_degree as f64;
            for &t in graph.out_neighbors(v) {
                next[t] += share;
            }
        }

        let delta: f64 = ranks.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut ranks, &mut next);
        if delta < tolerance {
            break;
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::super::graph_from_edges;
    use super::*;

    #[test]
    fn ranks_sum_to_one() {
        let graph = graph_from_edges(4, &[(0, 1), (1, 2), (2, 0), (3, 2)]);
        let ranks = pagerank(&graph, 0.85, 1e-6, 20);
        let total: f64 = ranks.iter().sum();
        assert!((total - 1.0).abs() < 1e-3, "sum = {}", total);
        assert!(ranks.iter().all(|r| (0.0..=1.0).contains(r)));
    }

    #[test]
    fn hub_outranks_leaves() {
        // Everyone imports node 0
        let graph = graph_from_edges(5, &[(1, 0), (2, 0), (3, 0), (4, 0)]);
        let ranks = pagerank(&graph, 0.85, 1e-6, 20);
        for leaf in 1..5 {
            assert!(ranks[0] > ranks[leaf]);
        }
    }

    #[test]
    fn dangling_only_graph_is_uniform() {
        let graph = graph_from_edges(3, &[]);
        let ranks = pagerank(&graph, 0.85, 1e-6, 20);
        for r in &ranks {
            assert!((r - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_graph() {
        let graph = graph_from_edges(0, &[]);
        assert!(pagerank(&graph, 0.85, 1e-6, 20).is_empty());
    }
}
