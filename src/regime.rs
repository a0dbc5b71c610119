//! Regime interpretation.
//!
//! Reads encoded states in trading terms. Buckets are read as 0 = low/bearish,
//! top bucket = high/bullish and anything between as neutral, which matches the
//! three-bucket standard scheme. Dimensions absent from a state count as neutral.

use crate::encoder::State;
use crate::errors::{MarkovAnalysisError, MarkovResult};
use crate::features::IndicatorDimension;
use crate::forecast::Forecast;
use crate::math_utils::argmax;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mass above which a bucket is said to dominate a regime classification.
const DOMINANCE_THRESHOLD: f64 = 0.5;

const HIGH_CONFIDENCE: f64 = 0.7;
const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Highest bucket code of the standard three-bucket scheme.
const TOP_BUCKET: u8 = 2;

/// Human-readable meaning of a bucket.
pub fn bucket_description(dimension: IndicatorDimension, bucket: u8) -> &'static str {
    use IndicatorDimension::*;
    match (dimension, bucket) {
        (Trend, 0) => "falling",
        (Trend, 1) => "sideways",
        (Trend, _) => "rising",
        (Volatility, 0) => "low",
        (Volatility, 1) => "medium",
        (Volatility, _) => "high",
        (Rsi, 0) => "oversold (<20)",
        (Rsi, 1) => "neutral (20-79)",
        (Rsi, _) => "overbought (>=80)",
        (Volume, 0) => "low",
        (Volume, 1) => "medium",
        (Volume, _) => "high",
        (Macd, 0) => "bearish",
        (Macd, 1) => "neutral",
        (Macd, _) => "bullish",
        (Adx, 0) => "weak trend",
        (Adx, 1) => "moderate trend",
        (Adx, _) => "strong trend",
        (Stochastic, 0) => "oversold",
        (Stochastic, 1) => "neutral",
        (Stochastic, _) => "overbought",
    }
}

/// One line per encoded dimension, joined with `" | "`.
///
/// ```rust
/// use markov_finance::{regime::describe_state, State};
///
/// let state: State = "T2_V0_R1".parse().unwrap();
/// assert_eq!(describe_state(&state), "Trend: rising | Volatility: low | RSI: neutral (20-79)");
/// ```
pub fn describe_state(state: &State) -> String {
    state
        .buckets()
        .map(|(dim, b)| format!("{}: {}", display_name(dim), bucket_description(dim, b)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn display_name(dimension: IndicatorDimension) -> &'static str {
    match dimension {
        IndicatorDimension::Trend => "Trend",
        IndicatorDimension::Volatility => "Volatility",
        IndicatorDimension::Rsi => "RSI",
        IndicatorDimension::Volume => "Volume",
        IndicatorDimension::Macd => "MACD",
        IndicatorDimension::Adx => "ADX",
        IndicatorDimension::Stochastic => "Stochastic",
    }
}

// ============================================================================
// SIGNALS
// ============================================================================

/// Directional reading of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

/// Confidence band of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Signal for one state with the reasoning that produced it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalAssessment {
    pub signal: Signal,
    pub confidence: Confidence,
    /// Mean of the state probability and the decisive-factor ratio
    pub combined_score: f64,
    pub reasons: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lean {
    Low,
    Mid,
    High,
}

fn lean(state: &State, dimension: IndicatorDimension) -> Lean {
    match state.bucket(dimension) {
        Some(0) => Lean::Low,
        Some(b) if b >= TOP_BUCKET => Lean::High,
        _ => Lean::Mid,
    }
}

/// Trading signal for a state reached with `probability`.
///
/// Trend sets the base signal; RSI and stochastic extremes flip or set it,
/// MACD contradicting the base neutralizes it and a weak ADX neutralizes
/// any directional signal. Volume and volatility only add reasoning.
pub fn assess_state_signal(state: &State, probability: f64) -> SignalAssessment {
    use IndicatorDimension::*;

    let core = [Trend, Volatility, Rsi, Volume];
    if core.iter().any(|&d| state.bucket(d).is_none()) {
        return SignalAssessment {
            signal: Signal::Neutral,
            confidence: Confidence::Low,
            combined_score: 0.0,
            reasons: vec!["incomplete state".to_string()],
        };
    }

    let mut reasons = Vec::new();
    let mut signal = match lean(state, Trend) {
        Lean::High => {
            reasons.push("uptrend".to_string());
            Signal::Buy
        }
        Lean::Low => {
            reasons.push("downtrend".to_string());
            Signal::Sell
        }
        Lean::Mid => {
            reasons.push("sideways trend".to_string());
            Signal::Neutral
        }
    };

    apply_oscillator(&mut signal, &mut reasons, lean(state, Rsi), "RSI");

    match lean(state, Volume) {
        Lean::High => reasons.push("high volume (confirmation)".to_string()),
        Lean::Low => reasons.push("low volume (weak confirmation)".to_string()),
        Lean::Mid => {}
    }
    match lean(state, Volatility) {
        Lean::High => reasons.push("high volatility (caution)".to_string()),
        Lean::Low => reasons.push("low volatility (stable)".to_string()),
        Lean::Mid => {}
    }

    match (lean(state, Macd), signal) {
        (Lean::High, Signal::Buy) => reasons.push("MACD bullish (confirmation)".to_string()),
        (Lean::High, Signal::Sell) => {
            signal = Signal::Neutral;
            reasons.push("MACD bullish (contradiction)".to_string());
        }
        (Lean::Low, Signal::Sell) => reasons.push("MACD bearish (confirmation)".to_string()),
        (Lean::Low, Signal::Buy) => {
            signal = Signal::Neutral;
            reasons.push("MACD bearish (contradiction)".to_string());
        }
        _ => {}
    }

    match lean(state, Adx) {
        Lean::High => reasons.push("strong trend (reliable)".to_string()),
        Lean::Low => {
            reasons.push("weak trend (unreliable)".to_string());
            signal = Signal::Neutral;
        }
        Lean::Mid => {}
    }

    apply_oscillator(&mut signal, &mut reasons, lean(state, Stochastic), "stochastic");

    // Decisive factors: extremes of trend, RSI, MACD, stochastic; strong ADX; high volume
    let decisive = [
        lean(state, Trend) != Lean::Mid,
        lean(state, Rsi) != Lean::Mid,
        lean(state, Macd) != Lean::Mid,
        lean(state, Adx) == Lean::High,
        lean(state, Stochastic) != Lean::Mid,
        lean(state, Volume) == Lean::High,
    ];
    let ratio = decisive.iter().filter(|&&d| d).count() as f64 / decisive.len() as f64;
    let combined_score = (probability + ratio) / 2.0;
    let confidence = if combined_score > HIGH_CONFIDENCE {
        Confidence::High
    } else if combined_score > MEDIUM_CONFIDENCE {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    SignalAssessment {
        signal,
        confidence,
        combined_score,
        reasons,
    }
}

/// Oversold flips Sell or sets Neutral to Buy; overbought the reverse.
fn apply_oscillator(signal: &mut Signal, reasons: &mut Vec<String>, reading: Lean, name: &str) {
    match (reading, *signal) {
        (Lean::Low, Signal::Sell) => {
            *signal = Signal::Buy;
            reasons.push(format!("{} oversold (reversal)", name));
        }
        (Lean::Low, Signal::Neutral) => {
            *signal = Signal::Buy;
            reasons.push(format!("{} oversold", name));
        }
        (Lean::High, Signal::Buy) => {
            *signal = Signal::Sell;
            reasons.push(format!("{} overbought (reversal)", name));
        }
        (Lean::High, Signal::Neutral) => {
            *signal = Signal::Sell;
            reasons.push(format!("{} overbought", name));
        }
        _ => {}
    }
}

/// Overall direction of a set of signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MarketBias {
    Bullish,
    Bearish,
    Sideways,
}

/// Tally of the signals along a forecast path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastSignalSummary {
    pub assessments: Vec<SignalAssessment>,
    pub buy: usize,
    pub sell: usize,
    pub neutral: usize,
    pub bias: MarketBias,
    /// Share of steps agreeing with `bias`
    pub bias_strength: f64,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
}

/// Assesses the most likely state at every forecast horizon.
///
/// Fails with `UnknownState` when a label does not parse as an encoded state.
pub fn summarize_forecast_signals(forecast: &Forecast) -> MarkovResult<ForecastSignalSummary> {
    let assessments = forecast
        .steps
        .iter()
        .map(|s| {
            let state: State = s.state.parse()?;
            Ok(assess_state_signal(&state, s.probability))
        })
        .collect::<MarkovResult<Vec<_>>>()?;

    let count_signal = |sig: Signal| assessments.iter().filter(|a| a.signal == sig).count();
    let count_conf = |c: Confidence| assessments.iter().filter(|a| a.confidence == c).count();
    let (buy, sell, neutral) = (
        count_signal(Signal::Buy),
        count_signal(Signal::Sell),
        count_signal(Signal::Neutral),
    );

    let total = assessments.len().max(1) as f64;
    let (bias, agreeing) = if buy > sell {
        (MarketBias::Bullish, buy)
    } else if sell > buy {
        (MarketBias::Bearish, sell)
    } else {
        (MarketBias::Sideways, neutral)
    };

    Ok(ForecastSignalSummary {
        high_confidence: count_conf(Confidence::High),
        medium_confidence: count_conf(Confidence::Medium),
        low_confidence: count_conf(Confidence::Low),
        assessments,
        buy,
        sell,
        neutral,
        bias,
        bias_strength: agreeing as f64 / total,
    })
}

// ============================================================================
// STATIONARY MARGINALS AND MARKET PHASES
// ============================================================================

/// Stationary mass of each bucket of one dimension.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DimensionMarginal {
    pub dimension: IndicatorDimension,
    /// Mass indexed by bucket code
    pub mass: Vec<f64>,
    /// Bucket with the most mass (lowest code on ties)
    pub dominant: u8,
}

impl DimensionMarginal {
    pub fn mass_of(&self, bucket: u8) -> f64 {
        self.mass.get(bucket as usize).copied().unwrap_or(0.0)
    }

    fn top_bucket(&self) -> u8 {
        (self.mass.len().max(1) - 1) as u8
    }
}

/// Aggregates a distribution over states into per-dimension bucket masses.
///
/// `states[i]` carries probability `distribution[i]`. Dimensions are reported in
/// canonical order; a dimension appears when any state encodes it.
pub fn dimension_marginals(
    states: &[State],
    distribution: &[f64],
) -> MarkovResult<Vec<DimensionMarginal>> {
    if states.len() != distribution.len() {
        return Err(MarkovAnalysisError::DimensionMismatch {
            expected: states.len(),
            actual: distribution.len(),
            context: "dimension marginals".to_string(),
        });
    }

    let mut marginals = Vec::new();
    for dim in IndicatorDimension::ALL {
        let buckets: Vec<Option<u8>> = states.iter().map(|s| s.bucket(dim)).collect();
        let Some(max_bucket) = buckets.iter().flatten().max().copied() else {
            continue;
        };
        let mut mass = vec![0.0; max_bucket.max(TOP_BUCKET) as usize + 1];
        for (b, &p) in buckets.iter().zip(distribution) {
            if let Some(b) = b {
                mass[*b as usize] += p;
            }
        }
        let dominant = argmax(&mass).unwrap_or(0) as u8;
        marginals.push(DimensionMarginal {
            dimension: dim,
            mass,
            dominant,
        });
    }
    Ok(marginals)
}

/// Parses state labels and aggregates their masses.
pub fn dimension_marginals_from_labels<S: AsRef<str>>(
    labels: &[S],
    distribution: &[f64],
) -> MarkovResult<Vec<DimensionMarginal>> {
    let states = labels
        .iter()
        .map(|l| l.as_ref().parse::<State>())
        .collect::<MarkovResult<Vec<_>>>()?;
    dimension_marginals(&states, distribution)
}

/// Level of a bucketed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
}

/// Consensus across RSI, MACD and stochastic marginals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MomentumConsensus {
    Bullish,
    Bearish,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Long-run market phase read from stationary marginals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarketPhaseSummary {
    pub dominant_trend: Option<u8>,
    /// Dominant ADX bucket
    pub trend_quality: Option<u8>,
    pub dominant_volatility: Option<u8>,
    pub volatility_regime: Option<ActivityLevel>,
    pub dominant_volume: Option<u8>,
    pub volume_regime: Option<ActivityLevel>,
    pub momentum: MomentumConsensus,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
}

fn activity_level(marginal: &DimensionMarginal) -> ActivityLevel {
    if marginal.mass_of(marginal.top_bucket()) > DOMINANCE_THRESHOLD {
        ActivityLevel::High
    } else if marginal.mass_of(0) > DOMINANCE_THRESHOLD {
        ActivityLevel::Low
    } else {
        ActivityLevel::Moderate
    }
}

/// Summarizes market phases from per-dimension marginals.
pub fn summarize_market_phases(marginals: &[DimensionMarginal]) -> MarketPhaseSummary {
    let find = |dim: IndicatorDimension| marginals.iter().find(|m| m.dimension == dim);
    let volatility = find(IndicatorDimension::Volatility);
    let volume = find(IndicatorDimension::Volume);
    let adx = find(IndicatorDimension::Adx);

    // (dimension, bullish bucket is the low one)
    let oscillators = [
        (IndicatorDimension::Rsi, true),
        (IndicatorDimension::Macd, false),
        (IndicatorDimension::Stochastic, true),
    ];
    let (mut bullish, mut bearish) = (0, 0);
    for (dim, low_is_bullish) in oscillators {
        if let Some(m) = find(dim) {
            let low = m.mass_of(0);
            let high = m.mass_of(m.top_bucket());
            let low_wins = low > high;
            let high_wins = high > low;
            if (low_wins && low_is_bullish) || (high_wins && !low_is_bullish) {
                bullish += 1;
            } else if low_wins || high_wins {
                bearish += 1;
            }
        }
    }
    let momentum = match bullish.cmp(&bearish) {
        std::cmp::Ordering::Greater => MomentumConsensus::Bullish,
        std::cmp::Ordering::Less => MomentumConsensus::Bearish,
        std::cmp::Ordering::Equal => MomentumConsensus::Mixed,
    };

    let mut risk_level = RiskLevel::Low;
    let mut risk_factors = Vec::new();
    if volatility.is_some_and(|m| m.dominant == m.top_bucket()) {
        risk_factors.push("high volatility".to_string());
        risk_level = RiskLevel::High;
    }
    if adx.is_some_and(|m| m.dominant == 0) {
        risk_factors.push("weak trend".to_string());
        risk_level = risk_level.max(RiskLevel::Medium);
    }
    if momentum == MomentumConsensus::Mixed {
        risk_factors.push("conflicting momentum signals".to_string());
        risk_level = risk_level.max(RiskLevel::Medium);
    }

    MarketPhaseSummary {
        dominant_trend: find(IndicatorDimension::Trend).map(|m| m.dominant),
        trend_quality: adx.map(|m| m.dominant),
        dominant_volatility: volatility.map(|m| m.dominant),
        volatility_regime: volatility.map(activity_level),
        dominant_volume: volume.map(|m| m.dominant),
        volume_regime: volume.map(activity_level),
        momentum,
        risk_level,
        risk_factors,
    }
}
