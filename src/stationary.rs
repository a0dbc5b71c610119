//! Stationary distribution analysis.
//!
//! The distribution satisfies `Pᵀπ ≈ π`. Three interchangeable strategies are
//! offered through [`StationaryMethod`]; all of them return a non-negative vector
//! summing to one, and the result always reports the max-abs residual so callers
//! can judge how stationary it actually is.

use crate::config::{AnalysisConfig, StationaryMethod};
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::linear_algebra::{eigenvector_nearest, solve_linear_system};
use crate::math_utils::{argmax, argmin, shannon_entropy};
use crate::results::LabeledVector;
use crate::transition::TransitionMatrix;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Iteration cap for the lazy power method.
const MAX_POWER_ITERATIONS: usize = 100_000;

/// Stationary distribution with diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StationaryResult {
    /// Probability of each state, in alphabet order
    pub distribution: Vec<f64>,
    /// State labels, in alphabet order
    pub labels: Vec<String>,
    /// Whether `max |Pᵀπ − π|` is within the configured tolerance
    pub is_stationary: bool,
    /// Shannon entropy in nats
    pub entropy: f64,
    /// Label of the most probable state (first on ties)
    pub most_probable: String,
    /// Label of the least probable state (first on ties)
    pub least_probable: String,
    /// Eigenvalue of `P` associated with the returned vector
    pub eigenvalue: f64,
    /// `max |Pᵀπ − π|`
    pub residual: f64,
    /// Strategy that produced the vector
    pub method: StationaryMethod,
}

impl StationaryResult {
    /// Distribution as a named-axis vector.
    pub fn as_labeled(&self) -> LabeledVector {
        LabeledVector {
            labels: self.labels.clone(),
            values: self.distribution.clone(),
        }
    }

    /// Probability of `label`.
    pub fn probability(&self, label: &str) -> MarkovResult<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.distribution[i])
            .ok_or_else(|| MarkovAnalysisError::unknown_state(label))
    }

    /// Expected return time `1/πᵢ`; `+∞` where `πᵢ = 0`.
    pub fn expected_return_times(&self) -> LabeledVector {
        LabeledVector {
            labels: self.labels.clone(),
            values: self
                .distribution
                .iter()
                .map(|&p| if p > 0.0 { 1.0 / p } else { f64::INFINITY })
                .collect(),
        }
    }
}

/// Stationary analysis using the strategy and tolerance in `config`.
pub fn analyze_stationarity(
    matrix: &TransitionMatrix,
    config: &AnalysisConfig,
) -> MarkovResult<StationaryResult> {
    stationary_by_method(matrix, config.stationary_method, config.stationarity_tolerance)
}

/// Stationary analysis with an explicit strategy.
pub fn stationary_by_method(
    matrix: &TransitionMatrix,
    method: StationaryMethod,
    tolerance: f64,
) -> MarkovResult<StationaryResult> {
    let p = matrix.matrix();
    let (raw, eigenvalue) = match method {
        StationaryMethod::Eigenvector => stationary_eigenvector(p)?,
        StationaryMethod::PowerIteration => stationary_power_iteration(p, tolerance)?,
        StationaryMethod::LinearSystem => stationary_linear_system(p)?,
    };
    debug!(
        "Stationary solve ({:?}) selected eigenvalue {:.12}",
        method, eigenvalue
    );

    let distribution = normalize_abs(&raw)?;
    let pi = DVector::from_column_slice(&distribution);
    let residual = (p.tr_mul(&pi) - &pi).amax();
    let is_stationary = residual <= tolerance;
    if !is_stationary {
        warn!(
            "Stationarity check failed: max |P'pi - pi| = {:.3e} exceeds tolerance {:.1e}",
            residual, tolerance
        );
    }

    let labels = matrix.labels().to_vec();
    let most = argmax(&distribution).unwrap_or(0);
    let least = argmin(&distribution).unwrap_or(0);

    Ok(StationaryResult {
        entropy: shannon_entropy(&distribution),
        most_probable: labels[most].clone(),
        least_probable: labels[least].clone(),
        distribution,
        labels,
        is_stationary,
        eigenvalue,
        residual,
        method,
    })
}

/// Eigenvector of `Pᵀ` for the eigenvalue closest to 1.
fn stationary_eigenvector(p: &DMatrix<f64>) -> MarkovResult<(Vec<f64>, f64)> {
    let pair = eigenvector_nearest(&p.transpose(), 1.0)?;
    Ok((pair.eigenvector.iter().copied().collect(), pair.eigenvalue))
}

/// Power iteration on the lazy chain `(P + I) / 2`, which shares the stationary
/// vectors of `P` and is aperiodic.
fn stationary_power_iteration(p: &DMatrix<f64>, tolerance: f64) -> MarkovResult<(Vec<f64>, f64)> {
    let n = p.nrows();
    let lazy_t = (p.transpose() + DMatrix::<f64>::identity(n, n)) * 0.5;
    let mut pi = DVector::from_element(n, 1.0 / n as f64);
    let mut retained = 1.0;

    for _ in 0..MAX_POWER_ITERATIONS {
        let next = &lazy_t * &pi;
        retained = next.sum();
        if retained <= 0.0 || !retained.is_finite() {
            return Err(MarkovAnalysisError::numerical(
                "all probability mass leaked through zero rows",
                "stationary_power_iteration",
            ));
        }
        let next = next / retained;
        let change = (&next - &pi).amax();
        pi = next;
        // Residual of P is twice the lazy step change
        if change * 2.0 <= tolerance * 0.5 {
            break;
        }
    }

    Ok((pi.iter().copied().collect(), 2.0 * retained - 1.0))
}

/// Solves `(Pᵀ − I)π = 0` with the last equation replaced by `Σπ = 1`.
fn stationary_linear_system(p: &DMatrix<f64>) -> MarkovResult<(Vec<f64>, f64)> {
    let n = p.nrows();
    let mut a = p.transpose() - DMatrix::<f64>::identity(n, n);
    a.row_mut(n - 1).fill(1.0);
    let mut b = DVector::<f64>::zeros(n);
    b[n - 1] = 1.0;

    let pi = solve_linear_system(&a, &b)?.ok_or_else(|| {
        MarkovAnalysisError::numerical(
            "stationary system is singular (more than one closed class)",
            "stationary_linear_system",
        )
    })?;
    Ok((pi.iter().copied().collect(), 1.0))
}

/// Element-wise absolute value renormalized to sum one.
fn normalize_abs(raw: &[f64]) -> MarkovResult<Vec<f64>> {
    let abs: Vec<f64> = raw.iter().map(|v| v.abs()).collect();
    let total: f64 = abs.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(MarkovAnalysisError::numerical(
            "stationary vector has no mass",
            "normalize_abs",
        ));
    }
    Ok(abs.into_iter().map(|v| v / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn two_state() -> TransitionMatrix {
        TransitionMatrix::from_rows(
            vec!["A".into(), "B".into()],
            &[vec![0.9, 0.1], vec![0.4, 0.6]],
        )
        .unwrap()
    }

    #[test]
    fn test_two_state_chain_all_methods() {
        let m = two_state();
        for method in [
            StationaryMethod::Eigenvector,
            StationaryMethod::PowerIteration,
            StationaryMethod::LinearSystem,
        ] {
            let r = stationary_by_method(&m, method, 1e-10).unwrap();
            assert_approx_eq!(r.distribution[0], 0.8, 1e-9);
            assert_approx_eq!(r.distribution[1], 0.2, 1e-9);
            assert_approx_eq!(r.entropy, 0.5004024235381879, 1e-8);
            assert_eq!(r.most_probable, "A");
            assert_eq!(r.least_probable, "B");
            assert!(r.is_stationary, "{:?} residual {}", method, r.residual);
            assert_approx_eq!(r.eigenvalue, 1.0, 1e-8);
        }
    }

    #[test]
    fn test_expected_return_times() {
        let r = analyze_stationarity(&two_state(), &AnalysisConfig::default()).unwrap();
        let times = r.expected_return_times();
        assert_approx_eq!(times.values[0], 1.25, 1e-9);
        assert_approx_eq!(times.values[1], 5.0, 1e-9);
        assert_approx_eq!(r.probability("B").unwrap(), 0.2, 1e-9);
        assert!(r.probability("Z").is_err());
    }

    #[test]
    fn test_absorbing_chain_concentrates_mass() {
        let m = TransitionMatrix::from_rows(
            vec!["A".into(), "B".into()],
            &[vec![0.0, 1.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let r = analyze_stationarity(&m, &AnalysisConfig::default()).unwrap();
        assert_approx_eq!(r.distribution[0], 0.0, 1e-10);
        assert_approx_eq!(r.distribution[1], 1.0, 1e-10);
        assert_approx_eq!(r.entropy, 0.0, 1e-9);
        assert!(r.expected_return_times().values[0] > 1e9);
    }

    #[test]
    fn test_single_state() {
        let m = TransitionMatrix::from_rows(vec!["only".into()], &[vec![1.0]]).unwrap();
        let r = analyze_stationarity(&m, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.distribution, vec![1.0]);
        assert_eq!(r.entropy, 0.0);
        assert!(r.is_stationary);
    }

    #[test]
    fn test_periodic_chain_uniform() {
        let m = TransitionMatrix::from_label_sequence(&["X", "Y", "X", "Y", "X", "Y"]).unwrap();
        let r = stationary_by_method(&m, StationaryMethod::PowerIteration, 1e-10).unwrap();
        assert_approx_eq!(r.distribution[0], 0.5, 1e-9);
        let r = analyze_stationarity(&m, &AnalysisConfig::default()).unwrap();
        assert_approx_eq!(r.distribution[0], 0.5, 1e-9);
        assert_approx_eq!(r.entropy, std::f64::consts::LN_2, 1e-9);
    }

    #[test]
    fn test_linear_system_rejects_multiple_closed_classes() {
        let m = TransitionMatrix::from_rows(
            vec!["A".into(), "B".into()],
            &[vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        assert!(stationary_by_method(&m, StationaryMethod::LinearSystem, 1e-10).is_err());
        // The eigenvector strategy still returns some stationary vector
        let r = stationary_by_method(&m, StationaryMethod::Eigenvector, 1e-10).unwrap();
        assert!(r.is_stationary);
    }
}
