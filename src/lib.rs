//! # Markov Regime Analysis
//!
//! Discrete-state Markov modelling of market regimes built from technical indicators.
//!
//! A series of indicator readings is discretized into composite states such as
//! `T2_V0_R1_O1_M2_A0_S1`, a first-order transition matrix is estimated from the
//! observed state sequence, and the chain is then analyzed: stationary behaviour,
//! multi-step forecasts, communication classes, expected hitting times. Close
//! prices are analyzed separately for fractal scaling (rescaled-range Hurst
//! exponent, volatility scaling and self-similarity).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use markov_finance::{
//!     AnalysisConfig, AnalysisSession, DiscretizationScheme, FeatureSeries, IndicatorBar,
//!     StateEncoder, DEFAULT_TREND_LOOKBACK,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bars: Vec<IndicatorBar> = load_bars();
//!     let series = FeatureSeries::from_bars(&bars, DEFAULT_TREND_LOOKBACK)?;
//!     let encoder = StateEncoder::new(DiscretizationScheme::fit_standard(&series)?);
//!
//!     let session = AnalysisSession::build(series, &encoder, AnalysisConfig::default())?;
//!     let stationary = session.stationary()?;
//!     println!("Most probable regime: {}", stationary.most_probable);
//!
//!     for step in session.forecast_from_current()?.steps {
//!         println!("t+{}: {} ({:.1}%)", step.step, step.state, step.probability * 100.0);
//!     }
//!     Ok(())
//! }
//!
//! fn load_bars() -> Vec<IndicatorBar> {
//!     Vec::new()
//! }
//! ```
//!
//! ## Architecture
//!
//! [`AnalysisSession`] ties the pipeline together, but every stage is usable on
//! its own: [`StateEncoder`] for discretization, [`TransitionMatrix`] for
//! estimation, and the analyzers ([`analyze_stationarity`], [`PredictorEngine`],
//! [`analyze_graph`], [`HittingTimeSolver`]) which borrow a matrix read-only.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]

// Core modules
pub mod alphabet;
pub mod config;
pub mod errors;
pub mod features;
pub mod linear_algebra;
pub mod math_utils;
pub mod results;

// Chain construction and analysis
pub mod encoder;
pub mod forecast;
pub mod graph;
pub mod hitting;
pub mod stationary;
pub mod transition;

// Price scaling and interpretation
pub mod fractal;
pub mod regime;
pub mod session;
pub mod timeframe;

// Re-exports for convenience - main public API
pub use alphabet::StateRegistry;
pub use config::{AnalysisConfig, ConnectivityMode, StationaryMethod};
pub use errors::{MarkovAnalysisError, MarkovResult};
pub use features::{
    FeatureSeries, FeatureVector, IndicatorBar, IndicatorDimension, DEFAULT_TREND_LOOKBACK,
};
pub use results::{LabeledMatrix, LabeledVector};
pub use session::{AnalysisSession, StateFrequency};

// Encoding exports
pub use encoder::{
    Cutoff, DimensionThresholds, DiscretizationScheme, EncodedSequence, State, StateEncoder,
};

// Chain analysis exports
pub use forecast::{Forecast, ForecastStep, PredictorEngine};
pub use graph::{analyze_graph, CommunicationClass, GraphAnalysis};
pub use hitting::{HittingTimeResult, HittingTimeSolver, SolveMethod};
pub use stationary::{analyze_stationarity, stationary_by_method, StationaryResult};
pub use transition::{estimate_transition_matrix, TransitionMatrix};

// Fractal analysis exports
pub use fractal::{
    estimate_hurst, fractal_profile, self_similarity, volatility_scales, FractalProfile,
    HurstRegime, HurstResult, SelfSimilarity,
};

// Interpretation exports
pub use regime::{
    assess_state_signal, describe_state, dimension_marginals, summarize_forecast_signals,
    summarize_market_phases, Confidence, MarketPhaseSummary, Signal, SignalAssessment,
};
pub use timeframe::{analyze_timeframes, rank_timeframes, RankedTimeframe, TimeframeSummary};

// Mathematical utilities exports
pub use math_utils::{
    float_ops::{approx_eq_eps, approx_zero, safe_div, safe_ln},
    shannon_entropy,
};
