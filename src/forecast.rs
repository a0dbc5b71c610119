//! Multi-step regime forecasting.
//!
//! Propagates a point mass (or any initial distribution) through `π_{k+1} = π_k·P`.
//! Mass that reaches a state with an all-zero row vanishes; the forecast is then
//! flagged unreliable rather than silently renormalized.

use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::math_utils::argmax;
use crate::math_utils::constants::PROBABILITY_SUM_TOLERANCE;
use crate::results::LabeledVector;
use crate::transition::TransitionMatrix;
use log::warn;
use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One forecast horizon.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastStep {
    /// Horizon, starting at 1
    pub step: usize,
    /// Label of the most likely state (first on ties)
    pub state: String,
    pub state_index: usize,
    /// Probability of the most likely state
    pub probability: f64,
    /// Full distribution over the alphabet
    pub distribution: Vec<f64>,
}

impl ForecastStep {
    /// Total probability mass at this horizon.
    pub fn total_mass(&self) -> f64 {
        self.distribution.iter().sum()
    }
}

/// Forecast path from a start state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Forecast {
    pub labels: Vec<String>,
    pub steps: Vec<ForecastStep>,
    /// False when some mass was lost through zero rows
    pub reliable: bool,
    /// Mass lost by the final horizon
    pub leaked_mass: f64,
}

impl Forecast {
    /// Distribution at `step` as a named-axis vector.
    pub fn distribution_at(&self, step: usize) -> Option<LabeledVector> {
        self.steps.iter().find(|s| s.step == step).map(|s| LabeledVector {
            labels: self.labels.clone(),
            values: s.distribution.clone(),
        })
    }

    /// Most likely state at every horizon.
    pub fn most_likely_path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.state.as_str()).collect()
    }
}

/// Forecasting engine borrowing a transition matrix.
#[derive(Debug, Clone, Copy)]
pub struct PredictorEngine<'a> {
    matrix: &'a TransitionMatrix,
}

impl<'a> PredictorEngine<'a> {
    pub fn new(matrix: &'a TransitionMatrix) -> Self {
        Self { matrix }
    }

    /// Forecasts `steps` horizons from the state named `start`.
    pub fn forecast(&self, start: &str, steps: usize) -> MarkovResult<Forecast> {
        let index = self.matrix.index_of(start)?;
        self.forecast_from_index(index, steps)
    }

    /// Forecasts `steps` horizons from state `index`.
    pub fn forecast_from_index(&self, index: usize, steps: usize) -> MarkovResult<Forecast> {
        self.matrix.check_index(index)?;
        let mut initial = vec![0.0; self.matrix.n_states()];
        initial[index] = 1.0;
        self.forecast_distribution(&initial, steps)
    }

    /// Forecasts from an arbitrary initial distribution.
    pub fn forecast_distribution(&self, initial: &[f64], steps: usize) -> MarkovResult<Forecast> {
        let n = self.matrix.n_states();
        if steps == 0 {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "steps".to_string(),
                value: 0.0,
                constraint: "at least 1".to_string(),
            });
        }
        if initial.len() != n {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: n,
                actual: initial.len(),
                context: "initial forecast distribution".to_string(),
            });
        }
        if let Some(&p) = initial.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "initial distribution".to_string(),
                value: p,
                constraint: "finite and non-negative".to_string(),
            });
        }

        let p = self.matrix.matrix();
        let initial_mass: f64 = initial.iter().sum();
        let mut current = DVector::from_column_slice(initial);
        let mut records = Vec::with_capacity(steps);

        for step in 1..=steps {
            current = p.tr_mul(&current);
            let distribution: Vec<f64> = current.iter().copied().collect();
            let state_index = argmax(&distribution).unwrap_or(0);
            records.push(ForecastStep {
                step,
                state: self.matrix.labels()[state_index].clone(),
                state_index,
                probability: distribution[state_index],
                distribution,
            });
        }

        let final_mass = current.sum();
        let leaked_mass = (initial_mass - final_mass).max(0.0);
        let reliable = leaked_mass <= PROBABILITY_SUM_TOLERANCE;
        if !reliable {
            warn!(
                "Forecast lost {:.4} probability mass through states without outgoing transitions",
                leaked_mass
            );
        }

        Ok(Forecast {
            labels: self.matrix.labels().to_vec(),
            steps: records,
            reliable,
            leaked_mass,
        })
    }
}
