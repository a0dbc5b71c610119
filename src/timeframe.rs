//! Multi-timeframe comparison.
//!
//! Each timeframe is an independent session; with the `parallel` feature they
//! are built concurrently. A failing timeframe is reported without aborting the
//! others.

use crate::config::AnalysisConfig;
use crate::encoder::StateEncoder;
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::features::FeatureSeries;
use crate::math_utils::float_total_cmp;
use crate::session::AnalysisSession;
use log::warn;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stationary entropy above which a timeframe is considered informative.
pub const INFORMATIVE_ENTROPY: f64 = 2.0;

/// Open interval of Hurst exponents treated as balanced.
pub const BALANCED_HURST: (f64, f64) = (0.4, 0.6);

/// State count above which a timeframe is considered diverse.
pub const DIVERSE_STATE_COUNT: usize = 10;

/// Minimum score for a timeframe to be recommended.
pub const MIN_RECOMMENDED_SCORE: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeframeSummary {
    pub name: String,
    /// Length of the input series
    pub data_points: usize,
    pub unique_states: usize,
    /// Stationary entropy in nats
    pub entropy: f64,
    pub hurst: f64,
    pub is_fractal: bool,
}

/// Outcome of a multi-timeframe run, in timeframe name order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeReport {
    pub summaries: Vec<TimeframeSummary>,
    pub failures: Vec<(String, MarkovAnalysisError)>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankedTimeframe {
    pub name: String,
    pub score: u32,
    pub entropy: f64,
    pub hurst: f64,
}

/// Summarizes a single timeframe.
pub fn summarize_timeframe(
    name: &str,
    series: &FeatureSeries,
    encoder: &StateEncoder,
    config: &AnalysisConfig,
) -> MarkovResult<TimeframeSummary> {
    let data_points = series.len();
    let session = AnalysisSession::build(series.clone(), encoder, config.clone())?;
    let entropy = session.stationary()?.entropy;
    let profile = session.fractal_profile();
    Ok(TimeframeSummary {
        name: name.to_string(),
        data_points,
        unique_states: session.alphabet().len(),
        entropy,
        hurst: profile.hurst.exponent,
        is_fractal: profile.self_similarity.is_fractal,
    })
}

/// Builds one session per timeframe and summarizes each.
pub fn analyze_timeframes(
    timeframes: &BTreeMap<String, (FeatureSeries, StateEncoder)>,
    config: &AnalysisConfig,
) -> TimeframeReport {
    let entries: Vec<(&String, &(FeatureSeries, StateEncoder))> = timeframes.iter().collect();

    #[cfg(feature = "parallel")]
    let outcomes: Vec<(String, MarkovResult<TimeframeSummary>)> = {
        use rayon::prelude::*;
        entries
            .par_iter()
            .map(|(name, (series, encoder))| {
                ((*name).clone(), summarize_timeframe(name, series, encoder, config))
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<(String, MarkovResult<TimeframeSummary>)> = entries
        .iter()
        .map(|(name, (series, encoder))| {
            ((*name).clone(), summarize_timeframe(name, series, encoder, config))
        })
        .collect();

    let mut report = TimeframeReport {
        summaries: Vec::new(),
        failures: Vec::new(),
    };
    for (name, outcome) in outcomes {
        match outcome {
            Ok(summary) => report.summaries.push(summary),
            Err(e) => {
                warn!("Timeframe '{}' analysis failed: {}", name, e);
                report.failures.push((name, e));
            }
        }
    }
    report
}

/// Scores timeframes and keeps the recommended ones, best first.
///
/// One point each for entropy above 2, Hurst strictly inside (0.4, 0.6) and
/// more than 10 distinct states. Equal scores keep input order.
pub fn rank_timeframes(summaries: &[TimeframeSummary]) -> Vec<RankedTimeframe> {
    let mut ranked: Vec<RankedTimeframe> = summaries
        .iter()
        .map(|s| {
            let score = u32::from(s.entropy > INFORMATIVE_ENTROPY)
                + u32::from(s.hurst > BALANCED_HURST.0 && s.hurst < BALANCED_HURST.1)
                + u32::from(s.unique_states > DIVERSE_STATE_COUNT);
            RankedTimeframe {
                name: s.name.clone(),
                score,
                entropy: s.entropy,
                hurst: s.hurst,
            }
        })
        .filter(|r| r.score >= MIN_RECOMMENDED_SCORE)
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Mean stationary entropy across summaries.
pub fn mean_entropy(summaries: &[TimeframeSummary]) -> Option<f64> {
    if summaries.is_empty() {
        return None;
    }
    Some(summaries.iter().map(|s| s.entropy).sum::<f64>() / summaries.len() as f64)
}

/// Timeframe with the highest stationary entropy.
pub fn most_informative(summaries: &[TimeframeSummary]) -> Option<&TimeframeSummary> {
    summaries
        .iter()
        .max_by(|a, b| float_total_cmp(&a.entropy, &b.entropy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{DimensionThresholds, DiscretizationScheme};
    use crate::features::{FeatureVector, IndicatorDimension, NUM_DIMENSIONS};

    fn summary(name: &str, entropy: f64, hurst: f64, states: usize) -> TimeframeSummary {
        TimeframeSummary {
            name: name.to_string(),
            data_points: 100,
            unique_states: states,
            entropy,
            hurst,
            is_fractal: false,
        }
    }

    #[test]
    fn test_rank_timeframes() {
        let summaries = vec![
            summary("1h", 2.5, 0.5, 5),
            summary("4h", 1.0, 0.5, 3),
            summary("1d", 2.1, 0.45, 12),
            summary("15m", 3.0, 0.7, 20),
        ];
        let ranked = rank_timeframes(&summaries);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["1d", "1h", "15m"]);
        assert_eq!(ranked[0].score, 3);
        assert_eq!(ranked[1].score, 2);
    }

    #[test]
    fn test_boundaries_are_strict() {
        let ranked = rank_timeframes(&[summary("x", 2.0, 0.6, 10)]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_analyze_timeframes_reports_failures() {
        let scheme = DiscretizationScheme::new(vec![
            DimensionThresholds::inclusive(IndicatorDimension::Trend, &[0.0]).unwrap(),
        ])
        .unwrap();
        let encoder = StateEncoder::new(scheme);
        let build = |values: &[Option<f64>]| {
            let vectors = values
                .iter()
                .map(|&v| FeatureVector::new([None; NUM_DIMENSIONS]).with(IndicatorDimension::Trend, v))
                .collect();
            let prices = (0..values.len()).map(|i| 50.0 + i as f64).collect();
            FeatureSeries::new(vectors, prices).unwrap()
        };

        let mut timeframes = BTreeMap::new();
        timeframes.insert(
            "1h".to_string(),
            (build(&[Some(0.1), Some(-0.1), Some(0.1), Some(-0.1)]), encoder.clone()),
        );
        timeframes.insert("1d".to_string(), (build(&[None, None]), encoder));

        let report = analyze_timeframes(&timeframes, &AnalysisConfig::default());
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].name, "1h");
        assert_eq!(report.summaries[0].unique_states, 2);
        assert_eq!(report.summaries[0].data_points, 4);
        assert!((report.summaries[0].entropy - 2f64.ln()).abs() < 1e-9);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "1d");
        assert_eq!(mean_entropy(&report.summaries), Some(report.summaries[0].entropy));
        assert_eq!(most_informative(&report.summaries).unwrap().name, "1h");
    }
}
