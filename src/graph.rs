//! Directed-graph structure of a transition matrix.
//!
//! Edges are the strictly positive entries of `P`. Communication classes come
//! either from weak connectivity (undirected closure of the edges) or from
//! strongly connected components. Both partitions are reported in a canonical
//! order (members ascending, classes by smallest member) so the result does not
//! depend on traversal order.

use crate::config::ConnectivityMode;
use crate::transition::TransitionMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One block of the state partition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommunicationClass {
    /// Member indices, ascending
    pub states: Vec<usize>,
    /// Member labels, in the same order
    pub labels: Vec<String>,
    /// No positive transition leaves the class
    pub is_closed: bool,
}

/// Connectivity analysis of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GraphAnalysis {
    pub classes: Vec<CommunicationClass>,
    /// Indices with `P[i][i] == 1.0`
    pub absorbing_states: Vec<usize>,
    pub absorbing_labels: Vec<String>,
    pub mode: ConnectivityMode,
    irreducible: bool,
}

impl GraphAnalysis {
    /// True when every state communicates with every other state.
    ///
    /// Always judged on strongly connected components, whatever `mode` is.
    pub fn is_irreducible(&self) -> bool {
        self.irreducible
    }

    /// Class partition as label lists.
    pub fn partition_labels(&self) -> Vec<Vec<String>> {
        self.classes.iter().map(|c| c.labels.clone()).collect()
    }

    /// Position in `classes` of the class containing `state`.
    pub fn class_of(&self, state: usize) -> Option<usize> {
        self.classes.iter().position(|c| c.states.contains(&state))
    }

    /// Classes that no positive transition leaves.
    pub fn closed_classes(&self) -> impl Iterator<Item = &CommunicationClass> {
        self.classes.iter().filter(|c| c.is_closed)
    }

    /// States whose class is not closed.
    pub fn transient_states(&self) -> Vec<usize> {
        let mut states: Vec<usize> = self
            .classes
            .iter()
            .filter(|c| !c.is_closed)
            .flat_map(|c| c.states.iter().copied())
            .collect();
        states.sort_unstable();
        states
    }
}

/// Partitions the alphabet and finds absorbing states.
pub fn analyze_graph(matrix: &TransitionMatrix, mode: ConnectivityMode) -> GraphAnalysis {
    let sccs = strongly_connected_components(matrix);
    let irreducible = sccs.len() == 1;
    let blocks = match mode {
        ConnectivityMode::Weak => weak_components(matrix),
        ConnectivityMode::Strong => sccs,
    };

    let n = matrix.n_states();
    let mut block_of = vec![0usize; n];
    for (b, block) in blocks.iter().enumerate() {
        for &s in block {
            block_of[s] = b;
        }
    }

    let classes = blocks
        .into_iter()
        .enumerate()
        .map(|(b, states)| {
            let is_closed = states
                .iter()
                .all(|&i| matrix.successors(i).all(|j| block_of[j] == b));
            let labels = states.iter().map(|&i| matrix.labels()[i].clone()).collect();
            CommunicationClass {
                states,
                labels,
                is_closed,
            }
        })
        .collect();

    let absorbing = absorbing_states(matrix);
    let absorbing_labels = absorbing.iter().map(|&i| matrix.labels()[i].clone()).collect();

    GraphAnalysis {
        classes,
        absorbing_states: absorbing,
        absorbing_labels,
        mode,
        irreducible,
    }
}

/// States with `P[i][i] == 1.0` exactly.
pub fn absorbing_states(matrix: &TransitionMatrix) -> Vec<usize> {
    (0..matrix.n_states())
        .filter(|&i| matrix.probability(i, i) == 1.0)
        .collect()
}

/// Components of the undirected relation `P[i][j] > 0 || P[j][i] > 0`.
pub fn weak_components(matrix: &TransitionMatrix) -> Vec<Vec<usize>> {
    let n = matrix.n_states();
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut component = Vec::new();
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            component.push(i);
            for j in 0..n {
                if !visited[j] && (matrix.probability(i, j) > 0.0 || matrix.probability(j, i) > 0.0) {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    components
}

/// Strongly connected components (Tarjan, iterative).
pub fn strongly_connected_components(matrix: &TransitionMatrix) -> Vec<Vec<usize>> {
    let n = matrix.n_states();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        index[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, next candidate successor)
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < n {
                let w = frame.1;
                frame.1 += 1;
                if matrix.probability(v, w) <= 0.0 {
                    continue;
                }
                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    }
                    Some(wi) if on_stack[w] => lowlink[v] = lowlink[v].min(wi),
                    Some(_) => {}
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if index[v] == Some(lowlink[v]) {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
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

    components.sort_unstable_by_key(|c| c.first().copied().unwrap_or(usize::MAX));
    components
}

/// For each state, whether some positive path (of length ≥ 0) reaches `targets`.
pub fn can_reach(matrix: &TransitionMatrix, targets: &[usize]) -> Vec<bool> {
    can_reach_avoiding(matrix, targets, &[])
}

/// Like [`can_reach`], but paths may not pass through `blocked` states.
///
/// A blocked state that is itself a target still counts as reaching.
pub fn can_reach_avoiding(matrix: &TransitionMatrix, targets: &[usize], blocked: &[usize]) -> Vec<bool> {
    let n = matrix.n_states();
    let mut is_blocked = vec![false; n];
    for &b in blocked.iter().filter(|&&b| b < n) {
        is_blocked[b] = true;
    }

    let mut reaches = vec![false; n];
    let mut stack = Vec::new();
    for &t in targets {
        if t < n && !reaches[t] {
            reaches[t] = true;
            stack.push(t);
        }
    }
    // Walk edges backwards from the targets
    while let Some(j) = stack.pop() {
        for i in 0..n {
            if !reaches[i] && !is_blocked[i] && matrix.probability(i, j) > 0.0 {
                reaches[i] = true;
                stack.push(i);
            }
        }
    }
    reaches
}
