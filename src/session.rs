//! End-to-end analysis session over one feature series.
//!
//! A session owns everything derived from the input: encoded states, the
//! alphabet and the transition matrix. Those are fixed at build time. The
//! stationary distribution is computed on first use and cached.

use crate::alphabet::StateRegistry;
use crate::config::AnalysisConfig;
use crate::encoder::{EncodedSequence, State, StateEncoder};
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::features::FeatureSeries;
use crate::forecast::{Forecast, PredictorEngine};
use crate::fractal::{fractal_profile, FractalProfile};
use crate::graph::{analyze_graph, GraphAnalysis};
use crate::hitting::{HittingTimeResult, HittingTimeSolver};
use crate::regime::{
    dimension_marginals, summarize_forecast_signals, summarize_market_phases, DimensionMarginal,
    ForecastSignalSummary, MarketPhaseSummary,
};
use crate::stationary::{analyze_stationarity, StationaryResult};
use crate::transition::{estimate_transition_matrix, TransitionMatrix};
use log::info;
use once_cell::sync::OnceCell;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Occurrence count of one state in the encoded sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateFrequency {
    pub state: String,
    pub count: usize,
    /// Share of the encoded sequence, in percent
    pub percent: f64,
}

/// Encoded series with its estimated chain.
#[derive(Debug)]
pub struct AnalysisSession {
    series: FeatureSeries,
    encoded: EncodedSequence,
    alphabet: StateRegistry<State>,
    matrix: TransitionMatrix,
    config: AnalysisConfig,
    stationary: OnceCell<StationaryResult>,
}

impl AnalysisSession {
    /// Encodes `series`, registers the alphabet and estimates the matrix.
    ///
    /// Fails with `InsufficientData` when no time step encodes.
    pub fn build(
        series: FeatureSeries,
        encoder: &StateEncoder,
        config: AnalysisConfig,
    ) -> MarkovResult<Self> {
        config.validate()?;
        let encoded = encoder.encode_series(&series);
        if encoded.is_empty() {
            return Err(MarkovAnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let mut alphabet = StateRegistry::new();
        let indices = alphabet.intern_all(&encoded.states);
        let labels = alphabet.keys().iter().map(State::label).collect();
        let matrix = estimate_transition_matrix(&indices, labels)?;

        info!(
            "Built session: {} encoded steps ({} skipped), {} distinct states",
            encoded.len(),
            encoded.skipped,
            alphabet.len()
        );

        Ok(Self {
            series,
            encoded,
            alphabet,
            matrix,
            config,
            stationary: OnceCell::new(),
        })
    }

    /// Feature series the session was built from.
    pub fn series(&self) -> &FeatureSeries {
        &self.series
    }

    /// Encoded states with their time indices and skip count.
    pub fn encoded(&self) -> &EncodedSequence {
        &self.encoded
    }

    pub fn alphabet(&self) -> &StateRegistry<State> {
        &self.alphabet
    }

    /// Estimated transition matrix.
    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Last encoded state.
    pub fn current_state(&self) -> Option<State> {
        self.encoded.last()
    }

    /// Stationary distribution, computed once.
    pub fn stationary(&self) -> MarkovResult<&StationaryResult> {
        self.stationary
            .get_or_try_init(|| analyze_stationarity(&self.matrix, &self.config))
    }

    pub fn forecast(&self, start: &str, steps: usize) -> MarkovResult<Forecast> {
        PredictorEngine::new(&self.matrix).forecast(start, steps)
    }

    /// Forecast from the last encoded state over the configured horizon.
    pub fn forecast_from_current(&self) -> MarkovResult<Forecast> {
        let current = self
            .current_state()
            .ok_or(MarkovAnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            })?;
        let index = self
            .alphabet
            .index_of(&current)
            .ok_or_else(|| MarkovAnalysisError::unknown_state(current.label()))?;
        PredictorEngine::new(&self.matrix).forecast_from_index(index, self.config.forecast_steps)
    }

    /// Signal tally along the forecast from the last encoded state.
    pub fn forecast_signals(&self) -> MarkovResult<ForecastSignalSummary> {
        summarize_forecast_signals(&self.forecast_from_current()?)
    }

    pub fn graph(&self) -> GraphAnalysis {
        analyze_graph(&self.matrix, self.config.connectivity)
    }

    pub fn hitting_times<S: AsRef<str>>(&self, targets: &[S]) -> MarkovResult<HittingTimeResult> {
        HittingTimeSolver::with_config(&self.matrix, &self.config).solve_labels(targets)
    }

    pub fn fractal_profile(&self) -> FractalProfile {
        fractal_profile(self.series.prices(), &self.config)
    }

    /// Stationary mass per dimension bucket.
    pub fn dimension_marginals(&self) -> MarkovResult<Vec<DimensionMarginal>> {
        let stationary = self.stationary()?;
        dimension_marginals(self.alphabet.keys(), &stationary.distribution)
    }

    pub fn market_phases(&self) -> MarkovResult<MarketPhaseSummary> {
        Ok(summarize_market_phases(&self.dimension_marginals()?))
    }

    /// Count and share of every state, most frequent first.
    ///
    /// Ties keep first-seen order.
    pub fn state_frequencies(&self) -> Vec<StateFrequency> {
        let mut counts = vec![0usize; self.alphabet.len()];
        for state in &self.encoded.states {
            if let Some(i) = self.alphabet.index_of(state) {
                counts[i] += 1;
            }
        }
        let total = self.encoded.len() as f64;
        let mut frequencies: Vec<StateFrequency> = self
            .alphabet
            .keys()
            .iter()
            .zip(counts)
            .map(|(state, count)| StateFrequency {
                state: state.label(),
                count,
                percent: count as f64 / total * 100.0,
            })
            .collect();
        frequencies.sort_by(|a, b| b.count.cmp(&a.count));
        frequencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{DimensionThresholds, DiscretizationScheme};
    use crate::features::{FeatureVector, IndicatorDimension, NUM_DIMENSIONS};
    use assert_approx_eq::assert_approx_eq;

    fn trend_series(values: &[Option<f64>]) -> FeatureSeries {
        let vectors = values
            .iter()
            .map(|&v| FeatureVector::new([None; NUM_DIMENSIONS]).with(IndicatorDimension::Trend, v))
            .collect();
        let prices = (0..values.len()).map(|i| 100.0 + i as f64).collect();
        FeatureSeries::new(vectors, prices).unwrap()
    }

    fn trend_encoder() -> StateEncoder {
        let scheme = DiscretizationScheme::new(vec![
            DimensionThresholds::inclusive(IndicatorDimension::Trend, &[0.0]).unwrap(),
        ])
        .unwrap();
        StateEncoder::new(scheme)
    }

    #[test]
    fn test_build_and_frequencies() {
        // T1 T1 T0 T1 T1 with one undefined step
        let series = trend_series(&[Some(0.1), Some(0.2), None, Some(-0.1), Some(0.3), Some(0.05)]);
        let session = AnalysisSession::build(series, &trend_encoder(), AnalysisConfig::default()).unwrap();
        assert_eq!(session.encoded().len(), 5);
        assert_eq!(session.encoded().skipped, 1);
        assert_eq!(session.encoded().time_indices, vec![0, 1, 3, 4, 5]);
        assert_eq!(session.matrix().labels(), &["T1".to_string(), "T0".to_string()]);

        let freq = session.state_frequencies();
        assert_eq!(freq[0].state, "T1");
        assert_eq!(freq[0].count, 4);
        assert_approx_eq!(freq[0].percent, 80.0, 1e-12);
        assert_approx_eq!(freq[1].percent, 20.0, 1e-12);
    }

    #[test]
    fn test_stationary_is_cached() {
        let series = trend_series(&[Some(0.1), Some(-0.1), Some(0.1), Some(-0.1), Some(0.1)]);
        let session = AnalysisSession::build(series, &trend_encoder(), AnalysisConfig::default()).unwrap();
        let first = session.stationary().unwrap() as *const StationaryResult;
        let second = session.stationary().unwrap() as *const StationaryResult;
        assert_eq!(first, second);
        assert_approx_eq!(session.stationary().unwrap().probability("T0").unwrap(), 0.5, 1e-9);
    }

    #[test]
    fn test_nothing_encodes() {
        let series = trend_series(&[None, None]);
        match AnalysisSession::build(series, &trend_encoder(), AnalysisConfig::default()) {
            Err(MarkovAnalysisError::InsufficientData { .. }) => {}
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_forecast_from_current() {
        let series = trend_series(&[Some(0.1), Some(-0.1), Some(0.1), Some(-0.1)]);
        let session = AnalysisSession::build(series, &trend_encoder(), AnalysisConfig::default()).unwrap();
        assert_eq!(session.current_state().unwrap().label(), "T0");
        let f = session.forecast_from_current().unwrap();
        assert_eq!(f.steps.len(), AnalysisConfig::default().forecast_steps);
        assert_eq!(f.most_likely_path()[..2], ["T1", "T0"]);
        assert_eq!(session.graph().classes.len(), 1);
        let h = session.hitting_times(&["T1"]).unwrap();
        assert_approx_eq!(h.time("T0").unwrap(), 1.0, 1e-9);
    }
}
