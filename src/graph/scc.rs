//! Strongly connected components, Tarjan's algorithm
//!
//! Iterative formulation; the recursive version overflows on deep
//! dependency chains.

use super::DepGraph;

/// Enumerate SCCs. Each component is a sorted node list; components are
/// returned in a deterministic order.
pub fn tarjan_scc(graph: &DepGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    const UNVISITED: usize = usize::MAX;

    let mut index_counter = 0usize;
    let mut indices = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();

    // Explicit DFS frames: (node, next child offset). Nodes are numbered
    // when pushed so a node is never pushed twice.
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut visit = |v: usize, counter: &mut usize, indices: &mut [usize], lowlink: &mut [usize], stack: &mut Vec<usize>, on_stack: &mut [bool]| {
        indices[v] = *counter;
        lowlink[v] = *counter;
        *counter += 1;
        stack.push(v);
        on_stack[v] = true;
    };

    for start in 0..n {
        if indices[start] != UNVISITED {
            continue;
        }
        visit(start, &mut index_counter, &mut indices, &mut lowlink, &mut stack, &mut on_stack);
        frames.push((start, 0));

        while let Some(&(v, child_idx)) = frames.last() {
            let neighbors = graph.out_neighbors(v);
            if child_idx < neighbors.len() {
                frames.last_mut().expect("frame exists").1 += 1;
                let w = neighbors[child_idx];
                if indices[w] == UNVISITED {
                    visit(w, &mut index_counter, &mut indices, &mut lowlink, &mut stack, &mut on_stack);
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(indices[w]);
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == indices[v] {
                    let mut component = Vec::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }

    components.sort_by_key(|c| c[0]);
    components
}

/// Map each node to its SCC id, aligned with [`tarjan_scc`] output order
pub fn scc_membership(components: &[Vec<usize>], n: usize) -> Vec<usize> {
    let mut membership = vec![0; n];
    for (id, component) in components.iter().enumerate() {
        for &node in component {
            membership[node] = id;
        }
    }
    membership
}
