//! Fractal diagnostics on the raw price series.
//!
//! The Hurst exponent comes from classical rescaled-range (R/S) analysis of
//! single-step returns over non-overlapping windows. Volatility scaling and a
//! subsampling self-similarity score complete the profile.

use crate::config::AnalysisConfig;
use crate::math_utils::{calculate_variance, least_squares_slope, mean, pct_change, population_std_dev};
use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Exponent reported when fewer than two scales are usable (random walk).
pub const DEFAULT_HURST: f64 = 0.5;

/// Half-width of the random-walk band around 0.5.
pub const RANDOM_WALK_BAND: f64 = 0.05;

/// Average similarity above which a series is called fractal.
pub const FRACTAL_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Minimum subsampled points for a self-similarity comparison.
const MIN_SUBSAMPLED_POINTS: usize = 10;

// ============================================================================
// HURST EXPONENT (R/S)
// ============================================================================

/// Persistence classification of a Hurst exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HurstRegime {
    /// H above 0.55: trends tend to continue
    Persistent,
    /// H within 0.5 ± 0.05
    RandomWalk,
    /// H below 0.45: moves tend to reverse
    MeanReverting,
}

impl HurstRegime {
    pub fn classify(hurst: f64) -> Self {
        if hurst > DEFAULT_HURST + RANDOM_WALK_BAND {
            HurstRegime::Persistent
        } else if hurst < DEFAULT_HURST - RANDOM_WALK_BAND {
            HurstRegime::MeanReverting
        } else {
            HurstRegime::RandomWalk
        }
    }
}

/// Mean rescaled range at one window size.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalePoint {
    pub scale: usize,
    pub mean_rs: f64,
    /// Windows with positive dispersion that entered the mean
    pub windows: usize,
}

/// Hurst exponent estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HurstResult {
    pub exponent: f64,
    /// Usable scales, ascending
    pub points: Vec<ScalePoint>,
    /// True when the exponent is the 0.5 default
    pub insufficient_data: bool,
    pub regime: HurstRegime,
}

impl HurstResult {
    fn default_estimate(points: Vec<ScalePoint>) -> Self {
        Self {
            exponent: DEFAULT_HURST,
            points,
            insufficient_data: true,
            regime: HurstRegime::RandomWalk,
        }
    }
}

/// R/S values of the non-overlapping windows of `data`.
///
/// Windows whose population standard deviation is zero are skipped.
fn rescaled_ranges(data: &[f64], window_size: usize) -> Vec<f64> {
    data.chunks_exact(window_size)
        .filter_map(|window| {
            let m = mean(window);
            let mut cumsum = 0.0;
            let mut max_dev = f64::NEG_INFINITY;
            let mut min_dev = f64::INFINITY;
            for &value in window {
                cumsum += value - m;
                max_dev = max_dev.max(cumsum);
                min_dev = min_dev.min(cumsum);
            }
            let range = max_dev - min_dev;
            let std_dev = population_std_dev(window);
            if std_dev > 0.0 && range.is_finite() {
                Some(range / std_dev)
            } else {
                None
            }
        })
        .collect()
}

/// Hurst exponent by rescaled-range analysis of single-step returns.
///
/// Scales below 2 are ignored. Fewer returns than the largest scale give the
/// 0.5 default with `insufficient_data` set, as do fewer than two usable
/// scales. A scale is usable when at least one of its windows has positive
/// dispersion.
pub fn estimate_hurst(prices: &[f64], scales: &[usize]) -> HurstResult {
    let returns: Vec<f64> = pct_change(prices, 1)
        .into_iter()
        .filter(|r| r.is_finite())
        .collect();

    let mut scales: Vec<usize> = scales.iter().copied().filter(|&s| s >= 2).collect();
    scales.sort_unstable();
    scales.dedup();

    let largest = scales.last().copied().unwrap_or(0);
    if returns.len() < largest {
        warn!(
            "Only {} returns for largest R/S scale {}; reporting H = {}",
            returns.len(),
            largest,
            DEFAULT_HURST
        );
        return HurstResult::default_estimate(Vec::new());
    }

    let points: Vec<ScalePoint> = scales
        .into_iter()
        .filter_map(|scale| {
            let rs = rescaled_ranges(&returns, scale);
            if rs.is_empty() {
                None
            } else {
                Some(ScalePoint {
                    scale,
                    mean_rs: mean(&rs),
                    windows: rs.len(),
                })
            }
        })
        .collect();

    if points.len() < 2 {
        warn!(
            "Only {} usable R/S scales from {} returns; reporting H = {}",
            points.len(),
            returns.len(),
            DEFAULT_HURST
        );
        return HurstResult::default_estimate(points);
    }

    let log_scales: Vec<f64> = points.iter().map(|p| (p.scale as f64).ln()).collect();
    let log_rs: Vec<f64> = points.iter().map(|p| p.mean_rs.ln()).collect();
    match least_squares_slope(&log_scales, &log_rs) {
        Ok(slope) if slope.is_finite() => HurstResult {
            exponent: slope,
            regime: HurstRegime::classify(slope),
            points,
            insufficient_data: false,
        },
        _ => {
            warn!("R/S regression failed; reporting H = {}", DEFAULT_HURST);
            HurstResult::default_estimate(points)
        }
    }
}

// ============================================================================
// VOLATILITY SCALING AND SELF-SIMILARITY
// ============================================================================

/// Volatility of `scale`-step returns, scaled by √scale.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolatilityScale {
    pub scale: usize,
    pub volatility: f64,
}

/// Sample standard deviation of `k`-step returns times √k, for each `k`.
///
/// Horizons with fewer than two finite returns are omitted.
pub fn volatility_scales(prices: &[f64], scales: &[usize]) -> Vec<VolatilityScale> {
    scales
        .iter()
        .filter(|&&k| k >= 1)
        .filter_map(|&k| {
            let returns: Vec<f64> = pct_change(prices, k)
                .into_iter()
                .filter(|r| r.is_finite())
                .collect();
            (returns.len() >= 2).then(|| VolatilityScale {
                scale: k,
                volatility: calculate_variance(&returns).sqrt() * (k as f64).sqrt(),
            })
        })
        .collect()
}

/// Similarity score for one subsampling step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimilarityScore {
    pub scale: usize,
    /// `max(0, 1 − |σ − σₖ| / σ)`
    pub score: f64,
}

/// Self-similarity of return volatility under subsampling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelfSimilarity {
    pub scores: Vec<SimilarityScore>,
    /// Mean score (0 when no scale qualified)
    pub average: f64,
    pub is_fractal: bool,
}

/// Compares the volatility of one-step returns with that of every `k`-th price.
///
/// A scale qualifies when the series has at least `2k` points and the subsample
/// has at least ten.
pub fn self_similarity(prices: &[f64], scales: &[usize]) -> SelfSimilarity {
    let base = finite_return_std(prices);
    let scores: Vec<SimilarityScore> = match base {
        Some(sigma) if sigma > 0.0 => scales
            .iter()
            .filter(|&&k| k >= 1 && prices.len() >= 2 * k)
            .filter_map(|&k| {
                let sampled: Vec<f64> = prices.iter().step_by(k).copied().collect();
                if sampled.len() < MIN_SUBSAMPLED_POINTS {
                    return None;
                }
                let sigma_k = finite_return_std(&sampled)?;
                Some(SimilarityScore {
                    scale: k,
                    score: (1.0 - (sigma - sigma_k).abs() / sigma).max(0.0),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    let average = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
    };

    SelfSimilarity {
        is_fractal: !scores.is_empty() && average > FRACTAL_SIMILARITY_THRESHOLD,
        scores,
        average,
    }
}

/// Sample standard deviation of finite single-step returns.
fn finite_return_std(prices: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = pct_change(prices, 1)
        .into_iter()
        .filter(|r| r.is_finite())
        .collect();
    (returns.len() >= 2).then(|| calculate_variance(&returns).sqrt())
}

/// Hurst estimate, volatility scaling and self-similarity together.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FractalProfile {
    pub hurst: HurstResult,
    pub volatility_scales: Vec<VolatilityScale>,
    pub self_similarity: SelfSimilarity,
}

/// Full fractal profile using the scales in `config`.
pub fn fractal_profile(prices: &[f64], config: &AnalysisConfig) -> FractalProfile {
    FractalProfile {
        hurst: estimate_hurst(prices, &config.hurst_scales),
        volatility_scales: volatility_scales(prices, &config.volatility_scales),
        self_similarity: self_similarity(prices, &config.hurst_scales),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HURST_SCALES;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_short_series_defaults() {
        let prices = vec![100.0, 101.0, 100.5, 102.0];
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert_eq!(h.exponent, 0.5);
        assert!(h.insufficient_data);
        assert_eq!(h.regime, HurstRegime::RandomWalk);
    }

    #[test]
    fn test_period_four_below_largest_scale_defaults() {
        // 32 prices give 31 returns, one short of the 32-step scale
        let pattern = [100.0, 101.0, 100.0, 99.0];
        let prices: Vec<f64> = (0..32).map(|i| pattern[i % 4]).collect();
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert!(h.insufficient_data);
        assert_eq!(h.exponent, 0.5);
        assert!(h.points.is_empty());

        let shorter: Vec<f64> = (0..20).map(|i| pattern[i % 4]).collect();
        assert!(estimate_hurst(&shorter, &DEFAULT_HURST_SCALES).insufficient_data);
    }

    #[test]
    fn test_returns_matching_largest_scale_estimate() {
        let pattern = [100.0, 101.0, 100.0, 99.0];
        let prices: Vec<f64> = (0..33).map(|i| pattern[i % 4]).collect();
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert!(!h.insufficient_data);
        assert!(h.points.len() >= 2);
        assert!(h.exponent < 0.4, "H = {}", h.exponent);
    }

    #[test]
    fn test_flat_prices_default() {
        // Every window has zero dispersion
        let prices = vec![100.0; 200];
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert!(h.insufficient_data);
        assert_eq!(h.exponent, 0.5);
        assert!(h.points.is_empty());
    }

    #[test]
    fn test_monotone_series_is_persistent() {
        let prices: Vec<f64> = (0..200).map(|i| 100.0 + i as f64).collect();
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert!(!h.insufficient_data);
        assert!(h.exponent > 0.6, "H = {}", h.exponent);
        assert_eq!(h.regime, HurstRegime::Persistent);
        assert_eq!(h.points.len(), 5);
    }

    #[test]
    fn test_alternating_series_is_anti_persistent() {
        let pattern = [100.0, 101.0, 100.0, 99.0];
        let prices: Vec<f64> = (0..200).map(|i| pattern[i % 4]).collect();
        let h = estimate_hurst(&prices, &DEFAULT_HURST_SCALES);
        assert!(!h.insufficient_data);
        assert!(h.exponent < 0.4, "H = {}", h.exponent);
        assert_eq!(h.regime, HurstRegime::MeanReverting);
    }

    #[test]
    fn test_rescaled_range_window() {
        // Returns [1, -1]: cumulative deviations [1, 0], range 1, std 1
        let rs = rescaled_ranges(&[1.0, -1.0, 2.0, 2.0], 2);
        assert_eq!(rs.len(), 1);
        assert_approx_eq!(rs[0], 1.0, 1e-12);
    }

    #[test]
    fn test_regime_band() {
        assert_eq!(HurstRegime::classify(0.56), HurstRegime::Persistent);
        assert_eq!(HurstRegime::classify(0.5), HurstRegime::RandomWalk);
        assert_eq!(HurstRegime::classify(0.44), HurstRegime::MeanReverting);
    }

    #[test]
    fn test_volatility_scales() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i % 3) as f64).collect();
        let scales = volatility_scales(&prices, &[1, 5, 10, 20, 50]);
        assert_eq!(scales.len(), 5);
        assert_eq!(scales[0].scale, 1);
        assert!(scales.iter().all(|s| s.volatility >= 0.0));

        // 60 prices give only 10 returns at k = 50, 0 at k = 60
        assert!(volatility_scales(&prices, &[60]).is_empty());
    }

    #[test]
    fn test_self_similarity_flat_series() {
        let prices = vec![100.0; 100];
        let s = self_similarity(&prices, &DEFAULT_HURST_SCALES);
        assert!(s.scores.is_empty());
        assert_eq!(s.average, 0.0);
        assert!(!s.is_fractal);
    }

    #[test]
    fn test_self_similarity_scores_bounded() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + 5.0 * ((i as f64) * 0.7).sin())
            .collect();
        let s = self_similarity(&prices, &DEFAULT_HURST_SCALES);
        assert!(!s.scores.is_empty());
        assert!(s.scores.iter().all(|x| (0.0..=1.0).contains(&x.score)));
        assert_eq!(s.is_fractal, s.average > 0.7);
    }
}
