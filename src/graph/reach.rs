//! Reachability metrics: blast radius and depth from entry points

use std::collections::VecDeque;

use super::scc::{scc_membership, tarjan_scc};
use super::DepGraph;

/// Blast radius per node: the number of files transitively reachable
/// through dependency edges, excluding the node itself.
pub fn blast_radius(graph: &DepGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut radius = vec![0; n];
    let mut seen = vec![u32::MAX; n];

    for start in 0..n {
        let marker = start as u32;
        let mut queue = VecDeque::new();
        seen[start] = marker;
        queue.push_back(start);
        let mut count = 0;
        while let Some(v) = queue.pop_front() {
            for &w in graph.out_neighbors(v) {
                if seen[w] != marker {
                    seen[w] = marker;
                    count += 1;
                    queue.push_back(w);
                }
            }
        }
        radius[start] = count;
    }
    radius
}

/// Longest dependency-chain depth from the given entry nodes.
///
/// Cycles are contracted first, so depth is well-defined on the
/// condensation. Nodes not reachable from any entry get None.
pub fn depth_from_entries(graph: &DepGraph, entries: &[usize]) -> Vec<Option<usize>> {
    let n = graph.node_count();
    if n == 0 || entries.is_empty() {
        return vec![None; n];
    }

    let components = tarjan_scc(graph);
    let membership = scc_membership(&components, n);
    let scc_count = components.len();

    // Condensation adjacency and in-degrees
    let mut scc_out: Vec<Vec<usize>> = vec![Vec::new(); scc_count];
    let mut in_degree = vec![0usize; scc_count];
    for &(src, tgt, _) in &graph.edges {
        let (a, b) = (membership[src], membership[tgt]);
        if a != b && !scc_out[a].contains(&b) {
            scc_out[a].push(b);
            in_degree[b] += 1;
        }
    }

    // Kahn topological order over the condensation
    let mut queue: VecDeque<usize> =
        (0..scc_count).filter(|&s| in_degree[s] == 0).collect();
    let mut topo = Vec::with_capacity(scc_count);
    let mut remaining = in_degree.clone();
    while let Some(s) = queue.pop_front() {
        topo.push(s);
        for &t in &scc_out[s] {
            remaining[t] -= 1;
            if remaining[t] == 0 {
                queue.push_back(t);
            }
        }
    }

    // Longest path from any entry component
    let mut depth: Vec<Option<usize>> = vec![None; scc_count];
    for &entry in entries {
        depth[membership[entry]] = Some(0);
    }
    for &s in &topo {
        let Some(d) = depth[s] else { continue };
        for &t in &scc_out[s] {
            let candidate = d + 1;
            depth[t] = Some(depth[t].map_or(candidate, |existing| existing.max(candidate)));
        }
    }

    (0..n).map(|v| depth[membership[v]]).collect()
}

#[cfg(test)]
mod tests {
    use super::super::graph_from_edges;
    use super::*;

    #[test]
    fn blast_radius_chain() {
        let graph = graph_from_edges(3, &[(0, 1), (1, 2)]);
        assert_eq!(blast_radius(&graph), vec![2, 1, 0]);
    }

    #[test]
    fn blast_radius_with_cycle() {
        let graph = graph_from_edges(3, &[(0, 1), (1, 0), (1, 2)]);
        // 0 reaches 1 and 2; 1 reaches 0 and 2; 2 reaches nothing
        assert_eq!(blast_radius(&graph), vec![2, 2, 0]);
    }

    #[test]
    fn depth_from_entry_chain() {
        let graph = graph_from_edges(4, &[(0, 1), (1, 2), (0, 3)]);
        let depth = depth_from_entries(&graph, &[0]);
        assert_eq!(depth, vec![Some(0), Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn unreachable_is_none() {
        let graph = graph_from_edges(3, &[(0, 1)]);
        let depth = depth_from_entries(&graph, &[0]);
        assert_eq!(depth[2], None);
    }

    #[test]
    fn cycle_collapses_to_one_depth() {
        let graph = graph_from_edges(3, &[(0, 1), (1, 2), (2, 1)]);
        let depth = depth_from_entries(&graph, &[0]);
        assert_eq!(depth[0], Some(0));
        assert_eq!(depth[1], Some(1));
        assert_eq!(depth[2], Some(1));
    }
}
