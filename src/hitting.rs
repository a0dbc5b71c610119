//! Expected hitting times toward a target set.
//!
//! Solves `h(t) = 0` on targets and `h(i) = 1 + Σⱼ P[i][j]·h(j)` elsewhere. The
//! direct path is an LU solve of the stacked system; when it is singular the
//! solver falls back to Jacobi relaxation and reports whether that converged.
//!
//! States that can fall into a closed set containing no target never hit the
//! targets almost surely; they get `+∞` and are listed as unreachable. States with
//! an all-zero row are exits and get `h = 1` from their own equation.

use crate::config::AnalysisConfig;
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::graph::{can_reach, can_reach_avoiding};
use crate::linear_algebra::solve_linear_system;
use crate::results::LabeledVector;
use crate::transition::TransitionMatrix;
use log::warn;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default iteration cap for the relaxation fallback
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default absolute tolerance for the relaxation fallback
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// How the hitting times were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolveMethod {
    /// Exact direct solve
    Direct,
    /// Relaxation after a singular direct solve
    Iterative {
        iterations: usize,
        /// False when the iteration cap was hit first
        converged: bool,
    },
}

/// Hitting-time vector with provenance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HittingTimeResult {
    /// Expected steps to reach the target set, in alphabet order
    pub times: Vec<f64>,
    pub labels: Vec<String>,
    /// Target indices, ascending and deduplicated
    pub targets: Vec<usize>,
    pub method: SolveMethod,
    /// States with infinite expected hitting time
    pub unreachable_states: Vec<usize>,
}

impl HittingTimeResult {
    /// True when the relaxation fallback produced the times.
    pub fn is_approximate(&self) -> bool {
        matches!(self.method, SolveMethod::Iterative { .. })
    }

    pub fn as_labeled(&self) -> LabeledVector {
        LabeledVector {
            labels: self.labels.clone(),
            values: self.times.clone(),
        }
    }

    /// Hitting time from `label`.
    pub fn time(&self, label: &str) -> MarkovResult<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.times[i])
            .ok_or_else(|| MarkovAnalysisError::unknown_state(label))
    }
}

/// Hitting-time solver over a borrowed transition matrix.
#[derive(Debug, Clone, Copy)]
pub struct HittingTimeSolver<'a> {
    matrix: &'a TransitionMatrix,
    max_iterations: usize,
    tolerance: f64,
}

impl<'a> HittingTimeSolver<'a> {
    pub fn new(matrix: &'a TransitionMatrix) -> Self {
        Self {
            matrix,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Uses the relaxation limits from `config`.
    pub fn with_config(matrix: &'a TransitionMatrix, config: &AnalysisConfig) -> Self {
        Self {
            matrix,
            max_iterations: config.hitting_max_iterations,
            tolerance: config.hitting_tolerance,
        }
    }

    pub fn with_limits(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.max_iterations = max_iterations;
        self.tolerance = tolerance;
        self
    }

    /// Hitting times toward the states named in `targets`.
    pub fn solve_labels<S: AsRef<str>>(&self, targets: &[S]) -> MarkovResult<HittingTimeResult> {
        let indices = targets
            .iter()
            .map(|t| self.matrix.index_of(t.as_ref()))
            .collect::<MarkovResult<Vec<_>>>()?;
        self.solve(&indices)
    }

    /// Hitting times toward the target indices.
    pub fn solve(&self, targets: &[usize]) -> MarkovResult<HittingTimeResult> {
        if targets.is_empty() {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "targets".to_string(),
                value: 0.0,
                constraint: "at least one target state".to_string(),
            });
        }
        let n = self.matrix.n_states();
        let mut targets = targets
            .iter()
            .map(|&t| self.matrix.check_index(t))
            .collect::<MarkovResult<Vec<_>>>()?;
        targets.sort_unstable();
        targets.dedup();

        let mut is_target = vec![false; n];
        for &t in &targets {
            is_target[t] = true;
        }
        let divergent = self.divergent_states(&targets, &is_target);

        let direct = if divergent.is_empty() {
            self.solve_direct(&is_target)?
        } else {
            None
        };

        let (times, method) = match direct {
            Some(times) => (times, SolveMethod::Direct),
            None => {
                warn!(
                    "Hitting-time system is singular ({} divergent states); falling back to relaxation",
                    divergent.len()
                );
                let (times, iterations, converged) = self.relax(&is_target, &divergent);
                if !converged {
                    warn!(
                        "Hitting-time relaxation truncated after {} iterations (tolerance {:.1e})",
                        iterations, self.tolerance
                    );
                }
                (times, SolveMethod::Iterative { iterations, converged })
            }
        };

        Ok(HittingTimeResult {
            times,
            labels: self.matrix.labels().to_vec(),
            targets,
            method,
            unreachable_states: divergent,
        })
    }

    /// Non-target states that can reach a closed target-free set without
    /// passing through a target.
    fn divergent_states(&self, targets: &[usize], is_target: &[bool]) -> Vec<usize> {
        let n = self.matrix.n_states();
        let exits: Vec<usize> = (0..n)
            .filter(|&i| !is_target[i] && !self.matrix.has_outgoing(i))
            .collect();
        let mut seeds: Vec<usize> = targets.to_vec();
        seeds.extend(&exits);

        let escapes = can_reach(self.matrix, &seeds);
        let trapped: Vec<usize> = (0..n).filter(|&i| !escapes[i]).collect();
        if trapped.is_empty() {
            return trapped;
        }
        let falls_in = can_reach_avoiding(self.matrix, &trapped, targets);
        (0..n).filter(|&i| falls_in[i] && !is_target[i]).collect()
    }

    /// LU solve of `A h = b` with `A = I − P` and unit rows on targets.
    fn solve_direct(&self, is_target: &[bool]) -> MarkovResult<Option<Vec<f64>>> {
        let n = self.matrix.n_states();
        let p = self.matrix.matrix();
        let mut a = DMatrix::<f64>::identity(n, n) - p;
        let mut b = DVector::<f64>::from_element(n, 1.0);
        for t in (0..n).filter(|&t| is_target[t]) {
            a.row_mut(t).fill(0.0);
            a[(t, t)] = 1.0;
            b[t] = 0.0;
        }
        Ok(solve_linear_system(&a, &b)?.map(|h| h.iter().copied().collect()))
    }

    /// Jacobi relaxation from zeros; targets pinned at 0, divergent states at `+∞`.
    fn relax(&self, is_target: &[bool], divergent: &[usize]) -> (Vec<f64>, usize, bool) {
        let n = self.matrix.n_states();
        let mut is_divergent = vec![false; n];
        for &d in divergent {
            is_divergent[d] = true;
        }
        let free: Vec<usize> = (0..n).filter(|&i| !is_target[i] && !is_divergent[i]).collect();

        let mut h = vec![0.0; n];
        let mut iterations = 0;
        let mut converged = free.is_empty();
        while !converged && iterations < self.max_iterations {
            iterations += 1;
            let mut next = h.clone();
            let mut change: f64 = 0.0;
            for &i in &free {
                // Free states have no edge into divergent ones
                let expected: f64 = self
                    .matrix
                    .successors(i)
                    .map(|j| self.matrix.probability(i, j) * h[j])
                    .sum();
                next[i] = 1.0 + expected;
                change = change.max((next[i] - h[i]).abs());
            }
            h = next;
            converged = change < self.tolerance;
        }

        for &d in divergent {
            h[d] = f64::INFINITY;
        }
        (h, iterations, converged)
    }
}
