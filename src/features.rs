//! Indicator feature model.
//!
//! A [`FeatureSeries`] is the aligned, in-memory input to the whole pipeline: one
//! [`FeatureVector`] per time step plus the close price used for fractal analysis.
//! Values are `Option<f64>`; `None` and NaN both mean "undefined at this step".

use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::math_utils::pct_change;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of indicator dimensions in a feature vector.
pub const NUM_DIMENSIONS: usize = 7;

/// Default lookback for the trend dimension (percentage change of close).
pub const DEFAULT_TREND_LOOKBACK: usize = 5;

/// Indicator dimension, in canonical encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IndicatorDimension {
    /// Multi-step percentage change of close
    Trend,
    /// Rolling volatility
    Volatility,
    /// RSI-like momentum oscillator
    Rsi,
    /// Normalized volume
    Volume,
    /// MACD minus its signal line
    Macd,
    /// ADX-like trend strength
    Adx,
    /// Stochastic %K
    Stochastic,
}

impl IndicatorDimension {
    /// All dimensions in canonical order.
    pub const ALL: [IndicatorDimension; NUM_DIMENSIONS] = [
        IndicatorDimension::Trend,
        IndicatorDimension::Volatility,
        IndicatorDimension::Rsi,
        IndicatorDimension::Volume,
        IndicatorDimension::Macd,
        IndicatorDimension::Adx,
        IndicatorDimension::Stochastic,
    ];

    /// Position of this dimension inside a [`FeatureVector`].
    pub fn index(self) -> usize {
        match self {
            IndicatorDimension::Trend => 0,
            IndicatorDimension::Volatility => 1,
            IndicatorDimension::Rsi => 2,
            IndicatorDimension::Volume => 3,
            IndicatorDimension::Macd => 4,
            IndicatorDimension::Adx => 5,
            IndicatorDimension::Stochastic => 6,
        }
    }

    /// Single-letter prefix used in state labels.
    pub fn prefix(self) -> char {
        match self {
            IndicatorDimension::Trend => 'T',
            IndicatorDimension::Volatility => 'V',
            IndicatorDimension::Rsi => 'R',
            IndicatorDimension::Volume => 'O',
            IndicatorDimension::Macd => 'M',
            IndicatorDimension::Adx => 'A',
            IndicatorDimension::Stochastic => 'S',
        }
    }

    /// Configuration name of the dimension.
    pub fn name(self) -> &'static str {
        match self {
            IndicatorDimension::Trend => "trend",
            IndicatorDimension::Volatility => "volatility",
            IndicatorDimension::Rsi => "rsi",
            IndicatorDimension::Volume => "volume",
            IndicatorDimension::Macd => "macd",
            IndicatorDimension::Adx => "adx",
            IndicatorDimension::Stochastic => "stochastic",
        }
    }

    /// Looks a dimension up by its label prefix.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.prefix() == prefix)
    }
}

impl fmt::Display for IndicatorDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorDimension {
    type Err = MarkovAnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let dim = match lower.as_str() {
            "trend" => IndicatorDimension::Trend,
            "volatility" => IndicatorDimension::Volatility,
            "rsi" | "momentum" => IndicatorDimension::Rsi,
            "volume" | "volume_norm" => IndicatorDimension::Volume,
            "macd" | "macd_signal" => IndicatorDimension::Macd,
            "adx" | "trend_strength" => IndicatorDimension::Adx,
            "stochastic" | "stoch" | "stoch_k" => IndicatorDimension::Stochastic,
            _ => {
                return Err(MarkovAnalysisError::configuration(
                    s,
                    "not a known indicator dimension",
                ))
            }
        };
        Ok(dim)
    }
}

/// One time step's indicator readings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureVector {
    values: [Option<f64>; NUM_DIMENSIONS],
}

impl FeatureVector {
    /// Builds a vector from per-dimension values in canonical order.
    pub fn new(values: [Option<f64>; NUM_DIMENSIONS]) -> Self {
        Self { values }
    }

    /// Builds a vector where every dimension is defined.
    pub fn from_values(values: [f64; NUM_DIMENSIONS]) -> Self {
        Self {
            values: values.map(Some),
        }
    }

    /// Value of `dimension`, or `None` if missing or NaN.
    pub fn get(&self, dimension: IndicatorDimension) -> Option<f64> {
        self.values[dimension.index()].filter(|v| !v.is_nan())
    }

    /// Returns a copy with `dimension` replaced.
    pub fn with(mut self, dimension: IndicatorDimension, value: Option<f64>) -> Self {
        self.values[dimension.index()] = value;
        self
    }

    /// True when every dimension is defined.
    pub fn is_complete(&self) -> bool {
        IndicatorDimension::ALL.iter().all(|&d| self.get(d).is_some())
    }
}

/// One bar of provider data with precomputed indicators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndicatorBar {
    /// Closing price
    pub close: f64,
    /// Rolling volatility of returns
    pub volatility: Option<f64>,
    /// Relative strength index, 0 to 100
    pub rsi: Option<f64>,
    /// Volume relative to its rolling average
    pub volume_norm: Option<f64>,
    /// MACD line
    pub macd: Option<f64>,
    /// MACD signal line
    pub macd_signal: Option<f64>,
    /// Average directional index
    pub adx: Option<f64>,
    /// Stochastic %K, 0 to 100
    pub stoch_k: Option<f64>,
}

/// Ordered feature series with the close prices it was derived from.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureSeries {
    vectors: Vec<FeatureVector>,
    prices: Vec<f64>,
}

impl FeatureSeries {
    /// Pairs feature vectors with prices; both must have the same length.
    pub fn new(vectors: Vec<FeatureVector>, prices: Vec<f64>) -> MarkovResult<Self> {
        if vectors.len() != prices.len() {
            return Err(MarkovAnalysisError::DimensionMismatch {
                expected: vectors.len(),
                actual: prices.len(),
                context: "feature series prices".to_string(),
            });
        }
        Ok(Self { vectors, prices })
    }

    /// Series without price information (fractal analysis will have nothing to work on).
    pub fn from_vectors(vectors: Vec<FeatureVector>) -> Self {
        Self {
            vectors,
            prices: Vec::new(),
        }
    }

    /// Derives feature vectors from provider bars.
    ///
    /// Trend is the `trend_lookback`-step percentage change of close, so the first
    /// `trend_lookback` steps have no trend value. MACD is MACD minus signal.
    pub fn from_bars(bars: &[IndicatorBar], trend_lookback: usize) -> MarkovResult<Self> {
        if trend_lookback == 0 {
            return Err(MarkovAnalysisError::InvalidParameter {
                parameter: "trend_lookback".to_string(),
                value: 0.0,
                constraint: "at least 1".to_string(),
            });
        }

        let prices: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let changes = pct_change(&prices, trend_lookback);

        let vectors = bars
            .iter()
            .enumerate()
            .map(|(t, bar)| {
                let trend = t
                    .checked_sub(trend_lookback)
                    .and_then(|i| changes.get(i).copied())
                    .filter(|v| v.is_finite());
                let macd = bar.macd.zip(bar.macd_signal).map(|(m, s)| m - s);
                FeatureVector::new([
                    trend,
                    bar.volatility,
                    bar.rsi,
                    bar.volume_norm,
                    macd,
                    bar.adx,
                    bar.stoch_k,
                ])
            })
            .collect();

        Ok(Self { vectors, prices })
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when the series has no time steps.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Feature vectors in time order.
    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    /// Close prices aligned with [`Self::vectors`].
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Defined values of one dimension across the series.
    pub fn column(&self, dimension: IndicatorDimension) -> Vec<f64> {
        self.vectors.iter().filter_map(|v| v.get(dimension)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn bar(close: f64) -> IndicatorBar {
        IndicatorBar {
            close,
            volatility: Some(0.01),
            rsi: Some(50.0),
            volume_norm: Some(1.0),
            macd: Some(0.5),
            macd_signal: Some(0.2),
            adx: Some(30.0),
            stoch_k: Some(50.0),
        }
    }

    #[test]
    fn test_dimension_names_and_prefixes() {
        for dim in IndicatorDimension::ALL {
            assert_eq!(dim.name().parse::<IndicatorDimension>().unwrap(), dim);
            assert_eq!(IndicatorDimension::from_prefix(dim.prefix()), Some(dim));
        }
        assert_eq!("RSI".parse::<IndicatorDimension>().unwrap(), IndicatorDimension::Rsi);
        assert!(matches!(
            "sentiment".parse::<IndicatorDimension>(),
            Err(MarkovAnalysisError::Configuration { dimension, .. }) if dimension == "sentiment"
        ));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let v = FeatureVector::from_values([0.0; NUM_DIMENSIONS]);
        assert!(v.is_complete());
        let v = v.with(IndicatorDimension::Adx, Some(f64::NAN));
        assert_eq!(v.get(IndicatorDimension::Adx), None);
        assert!(!v.is_complete());
    }

    #[test]
    fn test_from_bars_derives_trend_and_macd() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0, 99.0];
        let bars: Vec<_> = closes.iter().map(|&c| bar(c)).collect();
        let series = FeatureSeries::from_bars(&bars, 5).unwrap();

        assert_eq!(series.len(), 7);
        assert_eq!(series.prices(), &closes);
        for t in 0..5 {
            assert_eq!(series.vectors()[t].get(IndicatorDimension::Trend), None);
        }
        assert_approx_eq!(series.vectors()[5].get(IndicatorDimension::Trend).unwrap(), 0.1, 1e-12);
        assert_approx_eq!(series.vectors()[6].get(IndicatorDimension::Trend).unwrap(), -0.0198019801980198, 1e-12);
        assert_approx_eq!(series.vectors()[0].get(IndicatorDimension::Macd).unwrap(), 0.3, 1e-12);
        assert_eq!(series.column(IndicatorDimension::Trend).len(), 2);
    }

    #[test]
    fn test_from_bars_missing_signal_line() {
        let mut b = bar(100.0);
        b.macd_signal = None;
        let series = FeatureSeries::from_bars(&[b], 1).unwrap();
        assert_eq!(series.vectors()[0].get(IndicatorDimension::Macd), None);
        assert!(FeatureSeries::from_bars(&[b], 0).is_err());
    }

    #[test]
    fn test_new_checks_lengths() {
        let v = FeatureVector::default();
        assert!(FeatureSeries::new(vec![v, v], vec![1.0]).is_err());
        assert!(FeatureSeries::new(vec![v], vec![1.0]).is_ok());
    }
}
