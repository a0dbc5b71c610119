//! Empirical transition operator estimation.
//!
//! Counts consecutive pairs over the encoded sequence (skipped steps already
//! removed), then normalizes each row by its total. Rows of states that never
//! transition anywhere stay all zero; every consumer treats them explicitly.

use crate::alphabet::StateRegistry;
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::linear_algebra::{matrix_from_rows, matrix_to_rows};
use crate::math_utils::constants::PROBABILITY_SUM_TOLERANCE;
use crate::math_utils::float_ops::approx_eq_eps;
use crate::results::LabeledMatrix;
use log::debug;
use nalgebra::DMatrix;
use std::fmt::Display;
use std::hash::Hash;

/// Row-stochastic (or zero-row) matrix over a fixed alphabet order.
///
/// Immutable after construction; analyzers borrow it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    labels: Vec<String>,
    probabilities: DMatrix<f64>,
    counts: Option<DMatrix<u64>>,
}

/// Estimates the transition matrix from a dense index sequence.
///
/// `labels[i]` names state `i` and the alphabet must not be empty. Every index
/// in `sequence` must be below `labels.len()`. Cost is O(T + |S|²).
pub fn estimate_transition_matrix(
    sequence: &[usize],
    labels: Vec<String>,
) -> MarkovResult<TransitionMatrix> {
    let n = labels.len();
    if n == 0 {
        return Err(MarkovAnalysisError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if let Some(&bad) = sequence.iter().find(|&&s| s >= n) {
        return Err(MarkovAnalysisError::unknown_state(format!("index {}", bad)));
    }

    let mut counts = DMatrix::<u64>::zeros(n, n);
    for pair in sequence.windows(2) {
        counts[(pair[0], pair[1])] += 1;
    }

    let mut probabilities = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let total: u64 = counts.row(i).iter().sum();
        if total > 0 {
            for j in 0..n {
                probabilities[(i, j)] = counts[(i, j)] as f64 / total as f64;
            }
        }
    }

    debug!(
        "Estimated transition matrix over {} states from {} observations",
        n,
        sequence.len()
    );

    Ok(TransitionMatrix {
        labels,
        probabilities,
        counts: Some(counts),
    })
}

impl TransitionMatrix {
    /// Estimates from any hashable label sequence, registering states in first-seen order.
    pub fn from_label_sequence<T>(sequence: &[T]) -> MarkovResult<Self>
    where
        T: Eq + Hash + Clone + Display,
    {
        let mut registry = StateRegistry::new();
        let indices = registry.intern_all(sequence);
        let labels = registry.keys().iter().map(|k| k.to_string()).collect();
        estimate_transition_matrix(&indices, labels)
    }

    /// Builds a matrix from explicit rows.
    ///
    /// Entries must be finite and non-negative; each row must sum to 1 or be all
    /// zero, within `1e-9`.
    pub fn from_rows(labels: Vec<String>, rows: &[Vec<f64>]) -> MarkovResult<Self> {
        let n = labels.len();
        if n == 0 {
            return Err(MarkovAnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if rows.len() != n {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: n,
                actual: rows.len(),
                context: "transition matrix rows".to_string(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(MarkovAnalysisError::DimensionMismatch {
                    expected: n,
                    actual: row.len(),
                    context: format!("transition matrix row '{}'", labels[i]),
                });
            }
            if let Some(&p) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(MarkovAnalysisError::InvalidParameter {
                    parameter: format!("P['{}']", labels[i]),
                    value: p,
                    constraint: "finite and non-negative".to_string(),
                });
            }
            let sum: f64 = row.iter().sum();
            let all_zero = row.iter().all(|&p| p == 0.0);
            if !all_zero && !approx_eq_eps(sum, 1.0, PROBABILITY_SUM_TOLERANCE) {
                return Err(MarkovAnalysisError::InvalidParameter {
                    parameter: format!("row sum of '{}'", labels[i]),
                    value: sum,
                    constraint: "1 or an all-zero row".to_string(),
                });
            }
        }

        Ok(Self {
            labels,
            probabilities: matrix_from_rows(rows)?,
            counts: None,
        })
    }

    /// Number of states in the alphabet.
    pub fn n_states(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Dense index of `label`, or `UnknownState` naming it.
    pub fn index_of(&self, label: &str) -> MarkovResult<usize> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| MarkovAnalysisError::unknown_state(label))
    }

    /// Checks that `index` is inside the alphabet.
    pub fn check_index(&self, index: usize) -> MarkovResult<usize> {
        if index < self.n_states() {
            Ok(index)
        } else {
            Err(MarkovAnalysisError::unknown_state(format!("index {}", index)))
        }
    }

    /// Underlying dense probabilities.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.probabilities
    }

    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.probabilities[(from, to)]
    }

    /// Raw transition counts, when estimated from data.
    pub fn counts(&self) -> Option<&DMatrix<u64>> {
        self.counts.as_ref()
    }

    /// Observed departures from each state, when estimated from data.
    pub fn row_totals(&self) -> Option<Vec<u64>> {
        self.counts
            .as_ref()
            .map(|c| (0..c.nrows()).map(|i| c.row(i).iter().sum()).collect())
    }

    pub fn row_sum(&self, index: usize) -> f64 {
        self.probabilities.row(index).sum()
    }

    /// True when the state has at least one positive outgoing probability.
    pub fn has_outgoing(&self, index: usize) -> bool {
        self.probabilities.row(index).iter().any(|&p| p > 0.0)
    }

    /// Indices of all-zero rows.
    pub fn zero_rows(&self) -> Vec<usize> {
        (0..self.n_states()).filter(|&i| !self.has_outgoing(i)).collect()
    }

    /// Positive entries as `(from, to, probability)`, in row-major order.
    pub fn nonzero_transitions(&self) -> Vec<(usize, usize, f64)> {
        let n = self.n_states();
        let mut edges = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let p = self.probabilities[(i, j)];
                if p > 0.0 {
                    edges.push((i, j, p));
                }
            }
        }
        edges
    }

    /// Positive successors of `index`.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_states()).filter(move |&j| self.probabilities[(index, j)] > 0.0)
    }

    /// Named-axis copy for presentation.
    pub fn to_table(&self) -> LabeledMatrix {
        LabeledMatrix {
            labels: self.labels.clone(),
            rows: matrix_to_rows(&self.probabilities),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_alternating_sequence() {
        let seq = ["X", "Y", "X", "Y", "X", "Y"];
        let m = TransitionMatrix::from_label_sequence(&seq).unwrap();
        assert_eq!(m.labels(), &["X".to_string(), "Y".to_string()]);
        let x = m.index_of("X").unwrap();
        let y = m.index_of("Y").unwrap();
        assert_eq!(m.probability(x, y), 1.0);
        assert_eq!(m.probability(y, x), 1.0);
        assert_eq!(m.probability(x, x), 0.0);
        assert_eq!(m.row_totals(), Some(vec![3, 2]));
    }

    #[test]
    fn test_terminal_state_row_stays_zero() {
        // "C" only appears last, so it never departs
        let seq = ["A", "B", "A", "A", "C"];
        let m = TransitionMatrix::from_label_sequence(&seq).unwrap();
        let c = m.index_of("C").unwrap();
        assert_eq!(m.row_sum(c), 0.0);
        assert!(!m.has_outgoing(c));
        assert_eq!(m.zero_rows(), vec![c]);

        let a = m.index_of("A").unwrap();
        assert_approx_eq!(m.row_sum(a), 1.0, 1e-12);
        assert_approx_eq!(m.probability(a, a), 1.0 / 3.0, 1e-12);
    }

    #[test]
    fn test_from_rows_validation() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert!(TransitionMatrix::from_rows(labels.clone(), &[vec![0.9, 0.1], vec![0.4, 0.6]]).is_ok());
        assert!(TransitionMatrix::from_rows(labels.clone(), &[vec![1.0, 0.0], vec![0.0, 0.0]]).is_ok());
        assert!(TransitionMatrix::from_rows(labels.clone(), &[vec![0.9, 0.2], vec![0.4, 0.6]]).is_err());
        assert!(TransitionMatrix::from_rows(labels.clone(), &[vec![1.1, -0.1], vec![0.4, 0.6]]).is_err());
        assert!(TransitionMatrix::from_rows(labels, &[vec![1.0], vec![0.4, 0.6]]).is_err());
        assert!(TransitionMatrix::from_rows(vec![], &[]).is_err());
    }

    #[test]
    fn test_unknown_label_and_index() {
        let m = TransitionMatrix::from_label_sequence(&["A", "B"]).unwrap();
        assert!(matches!(
            m.index_of("Q"),
            Err(MarkovAnalysisError::UnknownState { state }) if state == "Q"
        ));
        assert!(m.check_index(5).is_err());
        assert!(estimate_transition_matrix(&[0, 3], vec!["A".into()]).is_err());
        assert!(matches!(
            TransitionMatrix::from_label_sequence::<String>(&[]),
            Err(MarkovAnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_table_and_edges() {
        let m = TransitionMatrix::from_label_sequence(&["A", "B", "B"]).unwrap();
        let table = m.to_table();
        assert_eq!(table.get("A", "B"), Some(1.0));
        assert_eq!(m.nonzero_transitions(), vec![(0, 1, 1.0), (1, 1, 1.0)]);
        assert_eq!(m.successors(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_estimation_is_deterministic() {
        let seq: Vec<usize> = (0..200).map(|i| (i * 7 + i / 3) % 5).collect();
        let labels: Vec<String> = (0..5).map(|i| format!("S{}", i)).collect();
        let a = estimate_transition_matrix(&seq, labels.clone()).unwrap();
        let b = estimate_transition_matrix(&seq, labels).unwrap();
        assert_eq!(a, b);
    }
}
