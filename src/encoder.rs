//! State encoding: discretize feature vectors into combinatorial regime states.
//!
//! Each encoded dimension maps a reading to a small bucket code through an ordered
//! list of cut-offs. A [`State`] is the fixed-width array of those codes, so the
//! same vector always encodes to the same state. A step with any encoded dimension
//! undefined produces no state and is skipped.

use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::features::{FeatureSeries, FeatureVector, IndicatorDimension, NUM_DIMENSIONS};
use crate::math_utils::{float_total_cmp, percentile};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Absolute trend cut-off of the standard scheme (±2% over the lookback).
pub const STANDARD_TREND_CUTOFF: f64 = 0.02;

/// Percentiles used for volatility and volume in the standard scheme.
pub const STANDARD_QUANTILES: [f64; 2] = [0.33, 0.67];

/// A single bucket boundary.
///
/// An inclusive cut-off keeps `v <= value` in the lower bucket; an exclusive one
/// keeps only `v < value` there.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cutoff {
    pub value: f64,
    pub inclusive: bool,
}

impl Cutoff {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }

    #[inline]
    fn keeps_below(&self, v: f64) -> bool {
        if self.inclusive {
            v <= self.value
        } else {
            v < self.value
        }
    }
}

/// Ordered cut-offs for one dimension. `k` cut-offs give buckets `0..=k`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DimensionThresholds {
    dimension: IndicatorDimension,
    cutoffs: Vec<Cutoff>,
}

impl DimensionThresholds {
    /// Validates and stores the cut-offs.
    ///
    /// Cut-offs must be finite, non-decreasing and non-empty.
    pub fn new(dimension: IndicatorDimension, cutoffs: Vec<Cutoff>) -> MarkovResult<Self> {
        if cutoffs.is_empty() {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                "no cut-offs supplied",
            ));
        }
        if cutoffs.len() >= u8::MAX as usize {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                format!("too many cut-offs ({})", cutoffs.len()),
            ));
        }
        if let Some(bad) = cutoffs.iter().find(|c| !c.value.is_finite()) {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                format!("cut-off {} is not finite", bad.value),
            ));
        }
        if cutoffs.windows(2).any(|w| w[1].value < w[0].value) {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                "cut-offs must be sorted ascending",
            ));
        }
        Ok(Self { dimension, cutoffs })
    }

    /// All cut-offs inclusive.
    pub fn inclusive(dimension: IndicatorDimension, values: &[f64]) -> MarkovResult<Self> {
        Self::new(dimension, values.iter().map(|&v| Cutoff::inclusive(v)).collect())
    }

    /// All cut-offs exclusive.
    pub fn exclusive(dimension: IndicatorDimension, values: &[f64]) -> MarkovResult<Self> {
        Self::new(dimension, values.iter().map(|&v| Cutoff::exclusive(v)).collect())
    }

    /// Inclusive cut-offs at sample quantiles (linear interpolation between ranks).
    ///
    /// NaN samples are ignored. Fails with a configuration error when no defined
    /// samples remain.
    pub fn from_quantiles(
        dimension: IndicatorDimension,
        sample: &[f64],
        quantiles: &[f64],
    ) -> MarkovResult<Self> {
        let mut sorted: Vec<f64> = sample.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                "no defined values to fit quantiles on",
            ));
        }
        if let Some(&q) = quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(MarkovAnalysisError::configuration(
                dimension.name(),
                format!("quantile {} outside [0, 1]", q),
            ));
        }
        sorted.sort_by(float_total_cmp);
        let values: Vec<f64> = quantiles.iter().map(|&q| percentile(&sorted, q)).collect();
        Self::inclusive(dimension, &values)
    }

    pub fn dimension(&self) -> IndicatorDimension {
        self.dimension
    }

    pub fn cutoffs(&self) -> &[Cutoff] {
        &self.cutoffs
    }

    /// Number of buckets this dimension produces.
    pub fn bucket_count(&self) -> usize {
        self.cutoffs.len() + 1
    }

    /// Bucket code for a defined reading.
    pub fn bucket(&self, value: f64) -> u8 {
        self.cutoffs
            .iter()
            .position(|c| c.keeps_below(value))
            .unwrap_or(self.cutoffs.len()) as u8
    }
}

/// Ordered per-dimension thresholds, fixed before encoding starts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiscretizationScheme {
    thresholds: Vec<DimensionThresholds>,
}

impl DiscretizationScheme {
    /// Builds a scheme; each dimension may appear at most once.
    pub fn new(thresholds: Vec<DimensionThresholds>) -> MarkovResult<Self> {
        if thresholds.is_empty() {
            return Err(MarkovAnalysisError::configuration(
                "<none>",
                "a scheme needs at least one dimension",
            ));
        }
        for (i, t) in thresholds.iter().enumerate() {
            if thresholds[..i].iter().any(|p| p.dimension == t.dimension) {
                return Err(MarkovAnalysisError::configuration(
                    t.dimension.name(),
                    "dimension configured twice",
                ));
            }
        }
        Ok(Self { thresholds })
    }

    /// Reference indicator scheme with the data-dependent cut-offs supplied.
    ///
    /// - trend: below -2% falls, above +2% rises
    /// - volatility, volume: inclusive at the given (usually 33rd/67th percentile) cut-offs
    /// - RSI: below 20 oversold, 80 and above overbought
    /// - MACD minus signal: sign
    /// - ADX: below 25 weak, above 50 strong
    /// - stochastic: below 20 oversold, above 80 overbought
    pub fn standard(volatility_cutoffs: [f64; 2], volume_cutoffs: [f64; 2]) -> MarkovResult<Self> {
        use IndicatorDimension::*;
        Self::new(vec![
            DimensionThresholds::new(
                Trend,
                vec![
                    Cutoff::exclusive(-STANDARD_TREND_CUTOFF),
                    Cutoff::inclusive(STANDARD_TREND_CUTOFF),
                ],
            )?,
            DimensionThresholds::inclusive(Volatility, &volatility_cutoffs)?,
            DimensionThresholds::exclusive(Rsi, &[20.0, 80.0])?,
            DimensionThresholds::inclusive(Volume, &volume_cutoffs)?,
            DimensionThresholds::new(Macd, vec![Cutoff::exclusive(0.0), Cutoff::inclusive(0.0)])?,
            DimensionThresholds::new(Adx, vec![Cutoff::exclusive(25.0), Cutoff::inclusive(50.0)])?,
            DimensionThresholds::new(
                Stochastic,
                vec![Cutoff::exclusive(20.0), Cutoff::inclusive(80.0)],
            )?,
        ])
    }

    /// Reference scheme with volatility and volume cut-offs fitted on the full series.
    pub fn fit_standard(series: &FeatureSeries) -> MarkovResult<Self> {
        let vol = DimensionThresholds::from_quantiles(
            IndicatorDimension::Volatility,
            &series.column(IndicatorDimension::Volatility),
            &STANDARD_QUANTILES,
        )?;
        let volume = DimensionThresholds::from_quantiles(
            IndicatorDimension::Volume,
            &series.column(IndicatorDimension::Volume),
            &STANDARD_QUANTILES,
        )?;
        Self::standard(
            [vol.cutoffs[0].value, vol.cutoffs[1].value],
            [volume.cutoffs[0].value, volume.cutoffs[1].value],
        )
    }

    /// Builds a scheme from a `{dimension_name: [cutoff, ...]}` map.
    ///
    /// Every dimension in `dimensions` must have an entry; cut-offs are inclusive.
    /// Keys that are not dimension names are rejected.
    pub fn from_threshold_map(
        dimensions: &[IndicatorDimension],
        map: &HashMap<String, Vec<f64>>,
    ) -> MarkovResult<Self> {
        let mut by_dimension: HashMap<IndicatorDimension, &Vec<f64>> = HashMap::new();
        for (key, values) in map {
            by_dimension.insert(key.parse()?, values);
        }

        let thresholds = dimensions
            .iter()
            .map(|&dim| {
                let values = by_dimension.get(&dim).ok_or_else(|| {
                    MarkovAnalysisError::configuration(dim.name(), "thresholds missing")
                })?;
                DimensionThresholds::inclusive(dim, values)
            })
            .collect::<MarkovResult<Vec<_>>>()?;
        Self::new(thresholds)
    }

    pub fn thresholds(&self) -> &[DimensionThresholds] {
        &self.thresholds
    }

    /// Dimensions in scheme order.
    pub fn dimensions(&self) -> Vec<IndicatorDimension> {
        self.thresholds.iter().map(|t| t.dimension).collect()
    }

    /// Upper bound on the number of distinct states.
    pub fn max_states(&self) -> usize {
        self.thresholds.iter().map(|t| t.bucket_count()).product()
    }
}

/// Discretized regime: one bucket code per encoded dimension.
///
/// Labels render dimensions in canonical order, e.g. `T2_V0_R1_O1_M2_A0_S1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct State {
    codes: [Option<u8>; NUM_DIMENSIONS],
}

impl State {
    /// Builds a state from `(dimension, bucket)` pairs.
    pub fn from_buckets(buckets: &[(IndicatorDimension, u8)]) -> Self {
        let mut codes = [None; NUM_DIMENSIONS];
        for &(dim, code) in buckets {
            codes[dim.index()] = Some(code);
        }
        Self { codes }
    }

    /// Bucket for `dimension`, if it is encoded in this state.
    pub fn bucket(&self, dimension: IndicatorDimension) -> Option<u8> {
        self.codes[dimension.index()]
    }

    /// Encoded dimensions with their buckets, in canonical order.
    pub fn buckets(&self) -> impl Iterator<Item = (IndicatorDimension, u8)> + '_ {
        IndicatorDimension::ALL
            .into_iter()
            .filter_map(move |d| self.bucket(d).map(|b| (d, b)))
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (dim, code)) in self.buckets().enumerate() {
            if i > 0 {
                f.write_str("_")?;
            }
            write!(f, "{}{}", dim.prefix(), code)?;
        }
        Ok(())
    }
}

impl FromStr for State {
    type Err = MarkovAnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut codes = [None; NUM_DIMENSIONS];
        for part in s.split('_') {
            let mut chars = part.chars();
            let dim = chars
                .next()
                .and_then(IndicatorDimension::from_prefix)
                .ok_or_else(|| MarkovAnalysisError::unknown_state(s))?;
            let code: u8 = chars
                .as_str()
                .parse()
                .map_err(|_| MarkovAnalysisError::unknown_state(s))?;
            if codes[dim.index()].replace(code).is_some() {
                return Err(MarkovAnalysisError::unknown_state(s));
            }
        }
        Ok(Self { codes })
    }
}

/// Output of encoding a feature series.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSequence {
    /// States of the steps that encoded, in time order
    pub states: Vec<State>,
    /// Original time index of each encoded state
    pub time_indices: Vec<usize>,
    /// Number of steps dropped for missing values
    pub skipped: usize,
}

impl EncodedSequence {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Last encoded state, if any.
    pub fn last(&self) -> Option<State> {
        self.states.last().copied()
    }
}

/// Pure mapping from feature vectors to states under a fixed scheme.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateEncoder {
    scheme: DiscretizationScheme,
}

impl StateEncoder {
    pub fn new(scheme: DiscretizationScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &DiscretizationScheme {
        &self.scheme
    }

    /// Encodes one vector; `None` when any encoded dimension is undefined.
    pub fn encode(&self, vector: &FeatureVector) -> Option<State> {
        let mut codes = [None; NUM_DIMENSIONS];
        for t in &self.scheme.thresholds {
            let value = vector.get(t.dimension)?;
            codes[t.dimension.index()] = Some(t.bucket(value));
        }
        Some(State { codes })
    }

    /// Encodes every step, dropping the ones with undefined values.
    pub fn encode_series(&self, series: &FeatureSeries) -> EncodedSequence {
        let mut states = Vec::with_capacity(series.len());
        let mut time_indices = Vec::with_capacity(series.len());
        for (t, vector) in series.vectors().iter().enumerate() {
            if let Some(state) = self.encode(vector) {
                states.push(state);
                time_indices.push(t);
            }
        }
        let skipped = series.len() - states.len();
        if skipped > 0 {
            debug!(
                "Skipped {} of {} time steps with undefined indicator values",
                skipped,
                series.len()
            );
        }
        EncodedSequence {
            states,
            time_indices,
            skipped,
        }
    }
}
