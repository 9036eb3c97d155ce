// src/strategy/additive.rs

//! Additive seasonal demand model.
//!
//! `y(t) = trend(t) + weekly(t) + noise`, fitted per pair:
//!
//! - trend: piecewise linear with changepoints spread over the first part
//!   of the history,
//! - weekly: Fourier series on the absolute day number (period 7),
//! - no yearly or daily terms.
//!
//! The fit is a maximum a posteriori estimate under Gaussian priors, which
//! reduces to ridge-penalised least squares. Forecast bounds come from
//! Monte Carlo paths that add future trend changes and observation noise.

use chrono::{Datelike, Days, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::model::series::DemandSeries;
use crate::strategy::traits::{DemandForecaster, ForecastPoint};

const WEEK_DAYS: f64 = 7.0;

/// Keeps the normal equations positive definite when columns are degenerate
/// (e.g. the slope column of a one-day history).
const JITTER: f64 = 1e-10;

/// Floor for the noise variance used to weight the priors (scaled units).
const MIN_NOISE_VARIANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct AdditiveConfig {
    /// Number of sine/cosine pairs for the weekly cycle.
    pub weekly_fourier_order: usize,
    /// Upper bound on trend changepoints.
    pub n_changepoints: usize,
    /// Share of the history (from the start) where changepoints may sit.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    /// Width of the forecast interval, e.g. 0.8 for the 10th-90th percentiles.
    pub interval_width: f64,
    /// Monte Carlo paths for the bounds; 0 collapses bounds onto `yhat`.
    pub uncertainty_samples: usize,
    pub seed: u64,
}

impl Default for AdditiveConfig {
    fn default() -> Self {
        Self {
            weekly_fourier_order: 3,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 0,
        }
    }
}

/// Parameters of a fitted model, all on the scaled axes
/// (`t` in history spans, `y` divided by `y_scale`).
#[derive(Debug, Clone)]
pub struct FittedModel {
    first_day: i64,
    t_span: f64,
    y_scale: f64,
    fourier_order: usize,
    changepoints: Vec<f64>,
    intercept: f64,
    slope: f64,
    deltas: Vec<f64>,
    betas: Vec<f64>,
    sigma: f64,
}

impl FittedModel {
    fn time_of(&self, date: NaiveDate) -> f64 {
        (epoch_day(date) - self.first_day) as f64 / self.t_span
    }

    fn trend(&self, t: f64) -> f64 {
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(s, d)| d * (t - s).max(0.0))
            .sum();
        self.intercept + self.slope * t + bends
    }

    fn weekly(&self, date: NaiveDate) -> f64 {
        fourier_terms(epoch_day(date) as f64, self.fourier_order)
            .iter()
            .zip(&self.betas)
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Point prediction for `date`, in demand units (not clipped).
    pub fn predict(&self, date: NaiveDate) -> f64 {
        (self.trend(self.time_of(date)) + self.weekly(date)) * self.y_scale
    }

    /// Residual standard deviation, in demand units.
    pub fn noise_std(&self) -> f64 {
        self.sigma * self.y_scale
    }

    /// One simulated future trend: the fitted trend plus new changepoints
    /// arriving at the historical rate with Laplace-distributed magnitudes.
    fn sample_trend(&self, rng: &mut StdRng, horizon_end: f64) -> Vec<(f64, f64)> {
        let future_span = horizon_end - 1.0;
        let rate = self.changepoints.len() as f64 * future_span;
        if rate <= 0.0 {
            return Vec::new();
        }
        let n_changes = match Poisson::new(rate) {
            Ok(poisson) => poisson.sample(rng) as usize,
            Err(_) => return Vec::new(),
        };
        let mean_abs_delta = if self.deltas.is_empty() {
            0.0
        } else {
            self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
        };
        let Ok(magnitude) = Exp::new(1.0 / (mean_abs_delta + 1e-8)) else {
            return Vec::new();
        };

        (0..n_changes)
            .map(|_| {
                let at = 1.0 + rng.gen::<f64>() * future_span;
                let size: f64 = magnitude.sample(rng);
                let delta = if rng.gen_bool(0.5) { size } else { -size };
                (at, delta)
            })
            .collect()
    }
}

/// The additive seasonal forecaster used for every pair.
#[derive(Debug, Clone, Default)]
pub struct AdditiveForecaster {
    config: AdditiveConfig,
}

impl AdditiveForecaster {
    pub fn new(config: AdditiveConfig) -> Self {
        Self { config }
    }

    /// Fits the model to `series`. Empty series give `None`.
    pub fn fit(&self, series: &DemandSeries) -> Result<Option<FittedModel>> {
        let Some(first_date) = series.first_date() else {
            return Ok(None);
        };

        let values = series.values();
        let n = values.len();
        let y_scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

        let t_span = (n.saturating_sub(1)).max(1) as f64;
        let t: Vec<f64> = (0..n).map(|i| i as f64 / t_span).collect();
        let changepoints = self.changepoints(&t);
        let first_day = epoch_day(first_date);
        let order = self.config.weekly_fourier_order;

        let n_cp = changepoints.len();
        let p = 2 + n_cp + 2 * order;
        let mut x = DMatrix::<f64>::zeros(n, p);
        for (i, ti) in t.iter().enumerate() {
            x[(i, 0)] = 1.0;
            x[(i, 1)] = *ti;
            for (j, s) in changepoints.iter().enumerate() {
                x[(i, 2 + j)] = (ti - s).max(0.0);
            }
            let day = (first_day + i as i64) as f64;
            for (j, term) in fourier_terms(day, order).into_iter().enumerate() {
                x[(i, 2 + n_cp + j)] = term;
            }
        }
        let y_vec = DVector::from_vec(y);

        // Two passes: weight the priors by the variance of the data, then by
        // the residual variance of the first fit.
        let data_var = variance(y_vec.as_slice()).max(MIN_NOISE_VARIANCE);
        let first = self.solve(&x, &y_vec, n_cp, data_var)?;
        let first_var = (&y_vec - &x * &first).norm_squared() / n as f64;
        let beta = self.solve(&x, &y_vec, n_cp, first_var.max(MIN_NOISE_VARIANCE))?;
        let residual_var = (&y_vec - &x * &beta).norm_squared() / n as f64;

        if beta.iter().any(|b| !b.is_finite()) || !residual_var.is_finite() {
            return Err(ForecastError::fit_failed(format!(
                "non-finite coefficients for {}",
                series.pair
            )));
        }

        let coefficients = beta.as_slice();
        let model = FittedModel {
            first_day,
            t_span,
            y_scale,
            fourier_order: order,
            changepoints,
            intercept: coefficients[0],
            slope: coefficients[1],
            deltas: coefficients[2..2 + n_cp].to_vec(),
            betas: coefficients[2 + n_cp..].to_vec(),
            sigma: residual_var.sqrt(),
        };
        debug!(
            pair = %series.pair,
            days = n,
            changepoints = n_cp,
            noise_std = model.noise_std(),
            "Fitted additive model"
        );
        Ok(Some(model))
    }

    /// Changepoint locations on the scaled time axis.
    fn changepoints(&self, t: &[f64]) -> Vec<f64> {
        let hist_size = (t.len() as f64 * self.config.changepoint_range).floor() as usize;
        let n_cp = self.config.n_changepoints.min(hist_size.saturating_sub(1));
        if n_cp == 0 {
            return Vec::new();
        }
        (1..=n_cp)
            .map(|j| {
                let idx = (j as f64 * (hist_size - 1) as f64 / n_cp as f64).round() as usize;
                t[idx]
            })
            .collect()
    }

    fn solve(
        &self,
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        n_cp: usize,
        noise_var: f64,
    ) -> Result<DVector<f64>> {
        let cp_penalty = noise_var / self.config.changepoint_prior_scale.powi(2);
        let season_penalty = noise_var / self.config.seasonality_prior_scale.powi(2);

        let xt = x.transpose();
        let mut gram = &xt * x;
        for j in 0..gram.ncols() {
            let penalty = match j {
                0 | 1 => 0.0,
                j if j < 2 + n_cp => cp_penalty,
                _ => season_penalty,
            };
            gram[(j, j)] += penalty + JITTER;
        }
        let rhs = &xt * y;

        let cholesky = gram
            .cholesky()
            .ok_or_else(|| ForecastError::fit_failed("normal equations are not positive definite"))?;
        Ok(cholesky.solve(&rhs))
    }

    /// Projects a fitted model over `horizon_days` days after `last_date`.
    pub fn project(
        &self,
        model: &FittedModel,
        last_date: NaiveDate,
        horizon_days: usize,
    ) -> Vec<ForecastPoint> {
        let dates: Vec<NaiveDate> = (1..=horizon_days as u64)
            .filter_map(|h| last_date.checked_add_days(Days::new(h)))
            .collect();
        let yhat: Vec<f64> = dates.iter().map(|d| model.predict(*d)).collect();

        let samples = self.config.uncertainty_samples;
        if samples == 0 || dates.is_empty() {
            return dates
                .iter()
                .zip(&yhat)
                .map(|(d, y)| ForecastPoint::from_raw(*d, *y, *y, *y))
                .collect();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let noise = (model.sigma > 0.0)
            .then(|| Normal::new(0.0, model.sigma).ok())
            .flatten();
        let times: Vec<f64> = dates.iter().map(|d| model.time_of(*d)).collect();
        let horizon_end = times.last().copied().unwrap_or(1.0);
        let seasonal: Vec<f64> = dates.iter().map(|d| model.weekly(*d)).collect();

        let mut paths: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); dates.len()];
        for _ in 0..samples {
            let new_changes = model.sample_trend(&mut rng, horizon_end);
            for (day, t) in times.iter().enumerate() {
                let extra: f64 = new_changes
                    .iter()
                    .map(|(at, delta)| delta * (t - at).max(0.0))
                    .sum();
                let eps = noise.as_ref().map_or(0.0, |n| n.sample(&mut rng));
                let value = model.trend(*t) + extra + seasonal[day] + eps;
                paths[day].push(value * model.y_scale);
            }
        }

        let lower_q = (1.0 - self.config.interval_width) / 2.0;
        let upper_q = (1.0 + self.config.interval_width) / 2.0;
        dates
            .iter()
            .zip(&yhat)
            .zip(paths.iter_mut())
            .map(|((date, y), path)| {
                path.sort_by(|a, b| a.total_cmp(b));
                ForecastPoint::from_raw(*date, *y, quantile(path, lower_q), quantile(path, upper_q))
            })
            .collect()
    }
}

impl DemandForecaster for AdditiveForecaster {
    fn name(&self) -> &'static str {
        "additive-weekly"
    }

    fn forecast(
        &self,
        series: &DemandSeries,
        horizon_days: usize,
    ) -> Result<Option<Vec<ForecastPoint>>> {
        let (Some(model), Some(last_date)) = (self.fit(series)?, series.last_date()) else {
            return Ok(None);
        };
        Ok(Some(self.project(&model, last_date, horizon_days)))
    }
}

/// Absolute day number; only its value modulo 7 matters for the weekly terms.
fn epoch_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// `[sin(2πkd/7), cos(2πkd/7)]` for `k = 1..=order`.
fn fourier_terms(day: f64, order: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(2 * order);
    let phase = day.rem_euclid(WEEK_DAYS);
    for k in 1..=order {
        let angle = 2.0 * std::f64::consts::PI * k as f64 * phase / WEEK_DAYS;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::PairKey;
    use chrono::Weekday;

    fn series(values: &[f64]) -> DemandSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DemandSeries::from_daily(PairKey::new("Bandung", "Gula"), start, values)
    }

    #[test]
    fn test_empty_series_has_no_model() {
        let forecaster = AdditiveForecaster::default();
        let result = forecaster.forecast(&series(&[]), 14).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_constant_demand_forecasts_constant() {
        let forecaster = AdditiveForecaster::default();
        let s = series(&[10.0; 20]);
        let points = forecaster.forecast(&s, 14).unwrap().unwrap();

        assert_eq!(points.len(), 14);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 21).unwrap());
        assert_eq!(points[13].date, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        for p in &points {
            assert!((p.predicted_demand - 10.0).abs() < 1e-6, "{p:?}");
            assert!((p.lower_bound - 10.0).abs() < 1e-3, "{p:?}");
            assert!((p.upper_bound - 10.0).abs() < 1e-3, "{p:?}");
        }
    }

    #[test]
    fn test_consecutive_future_days() {
        let forecaster = AdditiveForecaster::default();
        let s = series(&[1.0, 2.0, 3.0, 2.0, 1.0, 4.0, 2.0, 3.0]);
        let points = forecaster.forecast(&s, 5).unwrap().unwrap();
        let last = s.last_date().unwrap();
        for (h, p) in points.iter().enumerate() {
            assert_eq!((p.date - last).num_days(), h as i64 + 1);
        }
    }

    #[test]
    fn test_linear_trend_is_extrapolated() {
        let forecaster = AdditiveForecaster::default();
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let points = forecaster.forecast(&series(&values), 7).unwrap().unwrap();
        for (h, p) in points.iter().enumerate() {
            let expected = 29.0 + (h + 1) as f64;
            assert!((p.predicted_demand - expected).abs() < 0.5, "{p:?}");
        }
    }

    #[test]
    fn test_weekly_pattern_is_learned() {
        let forecaster = AdditiveForecaster::default();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values: Vec<f64> = start
            .iter_days()
            .take(56)
            .map(|d| if d.weekday() == Weekday::Sat { 20.0 } else { 5.0 })
            .collect();
        let s = series(&values);
        let points = forecaster.forecast(&s, 14).unwrap().unwrap();

        for p in &points {
            if p.date.weekday() == Weekday::Sat {
                assert!((p.predicted_demand - 20.0).abs() < 1.0, "{p:?}");
            } else {
                assert!((p.predicted_demand - 5.0).abs() < 1.0, "{p:?}");
            }
        }
    }

    #[test]
    fn test_declining_demand_is_clipped() {
        let forecaster = AdditiveForecaster::default();
        let values: Vec<f64> = (0..20).map(|i| (30.0 - 1.5 * i as f64).max(0.0)).collect();
        let points = forecaster.forecast(&series(&values), 14).unwrap().unwrap();

        assert!(points.iter().any(|p| p.yhat < 0.0));
        for p in &points {
            assert!(p.predicted_demand >= 0.0);
            assert!(p.lower_bound >= 0.0);
            assert!(p.upper_bound >= 0.0);
        }
    }

    #[test]
    fn test_bounds_bracket_prediction() {
        let forecaster = AdditiveForecaster::default();
        let values: Vec<f64> = (0..42).map(|i| 20.0 + ((i * 7) % 5) as f64 * 2.0).collect();
        let points = forecaster.forecast(&series(&values), 14).unwrap().unwrap();
        for p in &points {
            assert!(p.lower_bound <= p.predicted_demand, "{p:?}");
            assert!(p.predicted_demand <= p.upper_bound, "{p:?}");
            assert!(p.upper_bound > p.lower_bound, "{p:?}");
        }
    }

    #[test]
    fn test_seeded_bounds_are_reproducible() {
        let forecaster = AdditiveForecaster::default();
        let values: Vec<f64> = (0..21).map(|i| 3.0 + (i % 4) as f64).collect();
        let a = forecaster.forecast(&series(&values), 7).unwrap();
        let b = forecaster.forecast(&series(&values), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_day_history_still_fits() {
        let forecaster = AdditiveForecaster::default();
        let points = forecaster.forecast(&series(&[6.0]), 3).unwrap().unwrap();
        assert_eq!(points.len(), 3);
        for p in &points {
            assert!(p.predicted_demand.is_finite());
        }
    }

    #[test]
    fn test_changepoints_stay_in_leading_range() {
        let forecaster = AdditiveForecaster::default();
        let t: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let cps = forecaster.changepoints(&t);
        assert_eq!(cps.len(), 25);
        assert!(cps.iter().all(|c| *c > 0.0 && *c <= 0.8));

        let three: Vec<f64> = (0..3).map(|i| i as f64 / 2.0).collect();
        assert_eq!(forecaster.changepoints(&three), vec![0.5]);

        let two = [0.0, 1.0];
        assert!(forecaster.changepoints(&two).is_empty());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 0.5), 3.0);
        assert!((quantile(&sorted, 0.1) - 1.4).abs() < 1e-12);
    }
}
