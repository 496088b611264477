//! Louvain community detection
//!
//! Two-phase modularity optimization over a weighted undirected adjacency
//! list. Node order is fixed, so the partition is deterministic for a
//! given graph.

/// Weighted undirected adjacency: for each node, (neighbor, weight) pairs
pub type Adjacency = Vec<Vec<(usize, f64)>>;

/// Detect communities. Returns a community id per node (ids are compacted,
/// starting at 0) and the modularity of the final partition.
pub fn louvain(adjacency: &Adjacency) -> (Vec<usize>, f64) {
    let n = adjacency.len();
    if n == 0 {
        return (Vec::new(), 0.0);
    }

    // current community assignment per original node
    let mut assignment: Vec<usize> = (0..n).collect();
    let mut level_adjacency = adjacency.clone();

    loop {
        let (local, improved) = one_level(&level_adjacency);
        if !improved {
            break;
        }
        // Fold the level assignment into the original-node assignment
        for a in assignment.iter_mut() {
            *a = local[*a];
        }
        let next = aggregate(&level_adjacency, &local);
        if next.len() == level_adjacency.len() {
            break;
        }
        level_adjacency = next;
    }

    let compacted = compact(&assignment);
    let q = modularity(adjacency, &compacted);
    (compacted, q)
}

/// One local-move pass. Returns (assignment over this level's nodes,
/// whether any node moved).
fn one_level(adjacency: &Adjacency) -> (Vec<usize>, bool) {
    let n = adjacency.len();
    let mut community: Vec<usize> = (0..n).collect();

    let degree: Vec<f64> =
        adjacency.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let two_m: f64 = degree.iter().sum();
    if two_m == 0.0 {
        return (community, false);
    }
    let mut community_total: Vec<f64> = degree.clone();

    let mut improved_any = false;
    loop {
        let mut moved = false;
        for v in 0..n {
            let current = community[v];
            community_total[current] -= degree[v];

            // Weight from v into each neighboring community
            let mut links: ahash::AHashMap<usize, f64> = ahash::AHashMap::new();
            for &(w, weight) in &adjacency[v] {
                if w != v {
                    *links.entry(community[w]).or_insert(0.0) += weight;
                }
            }

            let mut best_community = current;
            let mut best_gain = links.get(&current).copied().unwrap_or(0.0)
                - community_total[current] * degree[v] / two_m;
            let mut candidates: Vec<(usize, f64)> = links.into_iter().collect();
            candidates.sort_by_key(|(c, _)| *c);
            for (candidate, link_weight) in candidates {
                let gain = link_weight - community_total[candidate] * degree[v] / two_m;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            community_total[best_community] += degree[v];
            if best_community != current {
                community[v] = best_community;
                moved = true;
                improved_any = true;
            }
        }
        if !moved {
            break;
        }
    }

    (compact(&community), improved_any)
}

/// Contract communities into super-nodes
fn aggregate(adjacency: &Adjacency, assignment: &[usize]) -> Adjacency {
    let count = assignment.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut folded: Vec<ahash::AHashMap<usize, f64>> = vec![ahash::AHashMap::new(); count];
    for (v, neighbors) in adjacency.iter().enumerate() {
        for &(w, weight) in neighbors {
            let (cv, cw) = (assignment[v], assignment[w]);
            *folded[cv].entry(cw).or_insert(0.0) += weight;
        }
    }
    folded
        .into_iter()
        .map(|m| {
            let mut pairs: Vec<(usize, f64)> = m.into_iter().collect();
            pairs.sort_by_key(|(c, _)| *c);
            pairs
        })
        .collect()
}

/// Modularity of a partition over the original adjacency
pub fn modularity(adjacency: &Adjacency, assignment: &[usize]) -> f64 {
    let degree: Vec<f64> =
        adjacency.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let two_m: f64 = degree.iter().sum();
    if two_m == 0.0 {
        return 0.0;
    }

    let mut q = 0.0;
    for (v, neighbors) in adjacency.iter().enumerate() {
        for &(w, weight) in neighbors {
            if assignment[v] == assignment[w] {
                q += weight - degree[v] * degree[w] / two_m;
            }
        }
    }
    q / two_m
}

/// Renumber community ids densely, ordered by first appearance
fn compact(assignment: &[usize]) -> Vec<usize> {
    let mut mapping: ahash::AHashMap<usize, usize> = ahash::AHashMap::new();
    let mut next = 0;
    assignment
        .iter()
        .map(|&c| {
            *mapping.entry(c).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency_from(n: usize, edges: &[(usize, usize)]) -> Adjacency {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in edges {
            adj[a].push((b, 1.0));
            adj[b].push((a, 1.0));
        }
        adj
    }

    #[test]
    fn two_cliques_split() {
        // Two triangles joined by one bridge edge
        let adjacency =
            adjacency_from(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)]);
        let (communities, q) = louvain(&adjacency);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
        assert_eq!(communities[3], communities[4]);
        assert_eq!(communities[4], communities[5]);
        assert_ne!(communities[0], communities[3]);
        assert!(q > 0.3, "modularity = {}", q);
    }

    #[test]
    fn empty_and_edgeless() {
        let (communities, q) = louvain(&Vec::new());
        assert!(communities.is_empty());
        assert_eq!(q, 0.0);

        let adjacency = adjacency_from(3, &[]);
        let (communities, q) = louvain(&adjacency);
        assert_eq!(communities.len(), 3);
        assert_eq!(q, 0.0);
    }

    #[test]
    fn deterministic() {
        let adjacency = adjacency_from(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)]);
        let (a, _) = louvain(&adjacency);
        let (b, _) = louvain(&adjacency);
        assert_eq!(a, b);
    }
}
