//! # Analysis Configuration
//!
//! Knobs shared by every analyzer in an [`AnalysisSession`](crate::session::AnalysisSession):
//! which stationary strategy to use, how connectivity is defined, the hitting-time
//! relaxation budget and the scales used for fractal estimation.

use crate::errors::{validate_finite, validate_parameter, MarkovAnalysisError, MarkovResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default scales for rescaled-range Hurst estimation
pub const DEFAULT_HURST_SCALES: [usize; 5] = [2, 4, 8, 16, 32];

/// Default horizons for multi-scale volatility
pub const DEFAULT_VOLATILITY_SCALES: [usize; 5] = [1, 5, 10, 20, 50];

/// Strategy used to compute the stationary distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StationaryMethod {
    /// Eigenvector of `Pᵀ` for the eigenvalue closest to 1
    #[default]
    Eigenvector,
    /// Power iteration on the lazy chain `(P + I) / 2`
    PowerIteration,
    /// Direct solve of `(Pᵀ − I)π = 0` with one row replaced by `Σπ = 1`
    LinearSystem,
}

/// How communication classes are formed from the positive-probability edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectivityMode {
    /// Components of the undirected relation `P[i][j] > 0 || P[j][i] > 0`
    Weak,
    /// Strongly connected components (true communication classes)
    #[default]
    Strong,
}

/// Configuration for a Markov regime analysis session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// Stationary distribution strategy
    pub stationary_method: StationaryMethod,
    /// Absolute tolerance for the `Pᵀπ ≈ π` check
    pub stationarity_tolerance: f64,
    /// Connectivity definition for communication classes
    pub connectivity: ConnectivityMode,
    /// Iteration cap for the hitting-time relaxation fallback
    pub hitting_max_iterations: usize,
    /// Convergence tolerance for the hitting-time relaxation fallback
    pub hitting_tolerance: f64,
    /// Window sizes for rescaled-range analysis
    pub hurst_scales: Vec<usize>,
    /// Horizons for multi-scale volatility
    pub volatility_scales: Vec<usize>,
    /// Default number of forecast steps
    pub forecast_steps: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stationary_method: StationaryMethod::Eigenvector,
            stationarity_tolerance: 1e-10,
            connectivity: ConnectivityMode::Strong,
            hitting_max_iterations: 1000,
            hitting_tolerance: 1e-6,
            hurst_scales: DEFAULT_HURST_SCALES.to_vec(),
            volatility_scales: DEFAULT_VOLATILITY_SCALES.to_vec(),
            forecast_steps: 5,
        }
    }
}

impl AnalysisConfig {
    /// Reference behaviour: weakly connected classes and eigenvector stationary solve.
    pub fn reference() -> Self {
        Self {
            connectivity: ConnectivityMode::Weak,
            ..Self::default()
        }
    }

    /// Tighter tolerances and a larger relaxation budget.
    pub fn precise() -> Self {
        Self {
            stationarity_tolerance: 1e-12,
            hitting_max_iterations: 100_000,
            hitting_tolerance: 1e-10,
            ..Self::default()
        }
    }

    /// Builder-style setter for the stationary strategy.
    pub fn with_stationary_method(mut self, method: StationaryMethod) -> Self {
        self.stationary_method = method;
        self
    }

    /// Builder-style setter for the connectivity mode.
    pub fn with_connectivity(mut self, mode: ConnectivityMode) -> Self {
        self.connectivity = mode;
        self
    }

    /// Checks that tolerances are positive and scale lists are usable.
    pub fn validate(&self) -> MarkovResult<()> {
        validate_finite(self.stationarity_tolerance, "stationarity_tolerance")?;
        validate_finite(self.hitting_tolerance, "hitting_tolerance")?;
        validate_parameter(
            self.stationarity_tolerance,
            f64::MIN_POSITIVE,
            1.0,
            "stationarity_tolerance",
        )?;
        validate_parameter(
            self.hitting_tolerance,
            f64::MIN_POSITIVE,
            f64::MAX,
            "hitting_tolerance",
        )?;
        if self.hitting_max_iterations == 0 {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "hitting_max_iterations".to_string(),
                value: 0.0,
                constraint: "at least 1".to_string(),
            });
        }
        if let Some(&bad) = self.hurst_scales.iter().find(|&&s| s < 2) {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "hurst_scales".to_string(),
                value: bad as f64,
                constraint: "every scale must be at least 2".to_string(),
            });
        }
        if let Some(&bad) = self.volatility_scales.iter().find(|&&s| s == 0) {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "volatility_scales".to_string(),
                value: bad as f64,
                constraint: "every horizon must be at least 1".to_string(),
            });
        }
        if self.forecast_steps == 0 {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "forecast_steps".to_string(),
                value: 0.0,
                constraint: "at least 1".to_string(),
            });
        }
        Ok(())
    }
}
