// src/strategy/optimization.rs

//! Safety stock and ideal stock calculations.
//!
//! Safety stock buffers forecast demand against recent volatility:
//! `max(0, z * std)` where `std` is the trailing rolling standard deviation
//! of daily demand. The ideal stock for a pair is the horizon mean of
//! `predicted demand + safety stock`, rounded to a whole unit.

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::model::series::DemandSeries;
use crate::model::window::{sample_std_dev, RollingWindow};
use crate::strategy::traits::ForecastPoint;

/// Float noise tolerated before ceiling rounding provisions an extra unit.
const CEILING_TOLERANCE: f64 = 1e-9;

/// How the horizon-mean ideal stock becomes a whole number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RoundingMode {
    /// Nearest integer, ties rounded up.
    #[default]
    Nearest,
    /// Always round up; never under-provisions.
    Ceiling,
}

impl RoundingMode {
    pub fn apply(self, value: f64) -> u64 {
        if !value.is_finite() || value <= 0.0 {
            return 0;
        }
        let rounded = match self {
            RoundingMode::Nearest => value.round(),
            RoundingMode::Ceiling => (value - CEILING_TOLERANCE).ceil(),
        };
        rounded.max(0.0) as u64
    }
}

/// Rational approximation coefficients (Abramowitz & Stegun 26.2.23).
const AS_NUMERATOR: [f64; 3] = [2.515517, 0.802853, 0.010328];
const AS_DENOMINATOR: [f64; 3] = [1.432788, 0.189269, 0.001308];

/// Standard normal quantile for `p` in (0, 1), absolute error below 4.5e-4.
fn inverse_normal_cdf(p: f64) -> f64 {
    // The approximation covers the lower tail; the upper tail is its mirror.
    let tail = p.min(1.0 - p);
    let t = (-2.0 * tail.ln()).sqrt();

    let [c0, c1, c2] = AS_NUMERATOR;
    let [d1, d2, d3] = AS_DENOMINATOR;
    let z = t - (c0 + t * (c1 + t * c2)) / (1.0 + t * (d1 + t * (d2 + t * d3)));

    if p < 0.5 {
        -z
    } else {
        z
    }
}

/// Converts a target service level (probability of not stocking out) into
/// the z-factor used for safety stock. `0.95` gives roughly `1.645`.
pub fn z_for_service_level(service_level: f64) -> Result<f64> {
    if !(service_level > 0.0 && service_level < 1.0) {
        return Err(ForecastError::invalid_config(format!(
            "service level must be strictly between 0 and 1, got {service_level}"
        )));
    }
    Ok(inverse_normal_cdf(service_level))
}

/// Calculates the safety stock for a pair from its recent demand volatility.
///
/// - Empty series: 0.
/// - Shorter than `window`: standard deviation over the whole series.
/// - Otherwise: standard deviation over the trailing `window` days; if that
///   is undefined (window narrower than two days), the whole-series value is
///   used instead. This fallback is a deliberate discontinuity at the window
///   boundary.
///
/// A single-day series has no defined deviation and yields 0.
pub fn safety_stock(series: &DemandSeries, z_factor: f64, window: usize) -> f64 {
    let values = series.values();
    if values.is_empty() {
        return 0.0;
    }

    let std = if values.len() < window {
        sample_std_dev(&values)
    } else {
        let mut rolling = RollingWindow::new(window);
        for value in &values[values.len() - window..] {
            rolling.push(*value);
        }
        rolling.std_dev().or_else(|| sample_std_dev(&values))
    };

    (z_factor * std.unwrap_or(0.0)).max(0.0)
}

/// Single ideal-stock target for a pair: the mean over the horizon of
/// `predicted_demand + safety`, rounded by `mode`. No forecast points
/// gives 0.
pub fn ideal_stock(points: &[ForecastPoint], safety: f64, mode: RoundingMode) -> u64 {
    mode.apply(mean_ideal_stock(points, safety))
}

/// Unrounded horizon mean of `predicted_demand + safety`.
pub fn mean_ideal_stock(points: &[ForecastPoint], safety: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let total: f64 = points.iter().map(|p| p.predicted_demand + safety).sum();
    total / points.len() as f64
}
