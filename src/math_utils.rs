//! Scalar and vector helpers shared by the analyzers.
//!
//! All logarithms are natural logarithms.

use crate::errors::{validate_all_finite, validate_data_length, MarkovAnalysisError, MarkovResult};

/// Numerical constants used across the crate.
pub mod constants {
    /// Default epsilon for approximate float comparisons
    pub const DEFAULT_EPSILON: f64 = 1e-12;

    /// Smallest argument accepted by [`super::float_ops::safe_ln`]
    pub const MIN_LOG_VALUE: f64 = 1e-300;

    /// Tolerance for a probability vector or matrix row to count as summing to one
    pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-9;
}

/// Guarded float operations.
pub mod float_ops {
    use super::constants::DEFAULT_EPSILON;

    /// `|a - b| <= epsilon`
    #[inline]
    pub fn approx_eq_eps(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() <= epsilon
    }

    /// `|x| < DEFAULT_EPSILON`
    #[inline]
    pub fn approx_zero(x: f64) -> bool {
        x.abs() < DEFAULT_EPSILON
    }

    /// `None` for a near-zero denominator or non-finite operands.
    pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
        if approx_zero(denominator) || !numerator.is_finite() || !denominator.is_finite() {
            None
        } else {
            Some(numerator / denominator)
        }
    }

    /// `None` unless `x` is finite and above the log floor.
    pub fn safe_ln(x: f64) -> Option<f64> {
        if x > super::constants::MIN_LOG_VALUE && x.is_finite() {
            Some(x.ln())
        } else {
            None
        }
    }
}

/// Total ordering for f64 that places NaN last.
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.total_cmp(b),
    }
}

/// Arithmetic mean; 0.0 for empty input.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n - 1 denominator) using Welford's single-pass update.
///
/// Returns 0.0 for fewer than two points or any non-finite input.
pub fn calculate_variance(data: &[f64]) -> f64 {
    if data.len() <= 1 || !data.iter().all(|x| x.is_finite()) {
        return 0.0;
    }

    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, &value) in data.iter().enumerate() {
        let count = (i + 1) as f64;
        let delta = value - mean;
        mean += delta / count;
        m2 += delta * (value - mean);
    }

    (m2 / (data.len() - 1) as f64).max(0.0)
}

/// Population standard deviation (n denominator).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let ss: f64 = data
        .iter()
        .map(|x| {
            let d = x - m;
            d * d
        })
        .sum();
    (ss / data.len() as f64).sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted_data` must be sorted ascending; `p` is in [0, 1].
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted_data[0];
    }
    if p >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let index = p * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Fractional change over `lag` steps: `x[t] / x[t - lag] - 1`.
///
/// The output has `data.len() - lag` entries (empty if `lag >= len`). A zero
/// base value yields NaN for that entry.
pub fn pct_change(data: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || lag >= data.len() {
        return Vec::new();
    }
    data.windows(lag + 1)
        .map(|w| {
            let base = w[0];
            if base == 0.0 {
                f64::NAN
            } else {
                w[lag] / base - 1.0
            }
        })
        .collect()
}

/// Least-squares slope of `y` on `x`.
///
/// Unlike a full regression this accepts two points, which is the minimum the
/// scaling fits in this crate need.
pub fn least_squares_slope(x: &[f64], y: &[f64]) -> MarkovResult<f64> {
    if x.len() != y.len() {
        return Err(MarkovAnalysisError::DimensionMismatch {
            expected: x.len(),
            actual: y.len(),
            context: "least_squares_slope".to_string(),
        });
    }
    validate_data_length(x, 2)?;
    validate_all_finite(x, "regression x")?;
    validate_all_finite(y, "regression y")?;

    let mean_x = mean(x);
    let mean_y = mean(y);
    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });

    float_ops::safe_div(sxy, sxx).ok_or_else(|| {
        MarkovAnalysisError::numerical(
            "Predictor variable has zero variance",
            "least_squares_slope",
        )
    })
}

/// Shannon entropy in nats; zero entries contribute nothing.
pub fn shannon_entropy(probabilities: &[f64]) -> f64 {
    -probabilities
        .iter()
        .filter_map(|&p| float_ops::safe_ln(p).map(|ln_p| p * ln_p))
        .sum::<f64>()
}

/// Index of the largest value; the first index wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if v <= bv || v.is_nan() => best,
            _ if v.is_nan() => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the smallest value; the first index wins ties.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if v >= bv || v.is_nan() => best,
            _ if v.is_nan() => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
