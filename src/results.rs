//! # Named-Axis Results
//!
//! Presentation-facing containers: a vector or matrix whose axes carry state
//! labels. Analyzers work on dense `nalgebra` storage internally and convert to
//! these at the boundary.

use crate::errors::{MarkovAnalysisError, MarkovResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One-dimensional array indexed by state label.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabeledVector {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl LabeledVector {
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> MarkovResult<Self> {
        if labels.len() != values.len() {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: labels.len(),
                actual: values.len(),
                context: "labeled vector".to_string(),
            });
        }
        Ok(Self { labels, values })
    }

    /// Value for `label`, if present.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

/// Square two-dimensional array with the same labels on both axes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabeledMatrix {
    pub labels: Vec<String>,
    /// Row-major values; `rows[i][j]` is the entry from `labels[i]` to `labels[j]`
    pub rows: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<f64>>) -> MarkovResult<Self> {
        let n = labels.len();
        if rows.len() != n {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: n,
                actual: rows.len(),
                context: "labeled matrix rows".to_string(),
            });
        }
        if let Some(row) = rows.iter().find(|r| r.len() != n) {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: n,
                actual: row.len(),
                context: "labeled matrix columns".to_string(),
            });
        }
        Ok(Self { labels, rows })
    }

    /// Entry from `from` to `to`, if both labels exist.
    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == from)?;
        let j = self.labels.iter().position(|l| l == to)?;
        Some(self.rows[i][j])
    }

    /// One row as a labeled vector.
    pub fn row(&self, label: &str) -> Option<LabeledVector> {
        let i = self.labels.iter().position(|l| l == label)?;
        Some(LabeledVector {
            labels: self.labels.clone(),
            values: self.rows[i].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_vector_lookup() {
        let v = LabeledVector::new(vec!["A".into(), "B".into()], vec![0.8, 0.2]).unwrap();
        assert_eq!(v.get("B"), Some(0.2));
        assert_eq!(v.get("C"), None);
        assert_eq!(v.iter().count(), 2);
        assert!(LabeledVector::new(vec!["A".into()], vec![]).is_err());
    }

    #[test]
    fn test_labeled_matrix_lookup() {
        let m = LabeledMatrix::new(
            vec!["A".into(), "B".into()],
            vec![vec![0.0, 1.0], vec![0.0, 1.0]],
        )
        .unwrap();
        assert_eq!(m.get("A", "B"), Some(1.0));
        assert_eq!(m.row("B").unwrap().values, vec![0.0, 1.0]);
        assert!(LabeledMatrix::new(vec!["A".into()], vec![vec![1.0, 0.0]]).is_err());
    }
}
