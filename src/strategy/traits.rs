// src/strategy/traits.rs

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Debug;

use crate::error::Result;
use crate::model::series::DemandSeries;

/// One future day of a demand forecast.
///
/// `yhat*` are the model's raw values; the remaining fields are the same
/// values clipped at zero, since demand cannot be negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub predicted_demand: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    pub fn from_raw(date: NaiveDate, yhat: f64, yhat_lower: f64, yhat_upper: f64) -> Self {
        Self {
            date,
            yhat,
            yhat_lower,
            yhat_upper,
            predicted_demand: yhat.max(0.0),
            lower_bound: yhat_lower.max(0.0),
            upper_bound: yhat_upper.max(0.0),
        }
    }
}

/// Fits a model to one pair's history and projects it forward.
///
/// Fits run on worker and timeout-guard threads, hence `Send + Sync`.
pub trait DemandForecaster: Debug + Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Forecasts exactly `horizon_days` days following the last day of
    /// `series`.
    ///
    /// Returns `Ok(None)` ("no model") when the series is too short to fit;
    /// callers treat that the same as insufficient history.
    fn forecast(
        &self,
        series: &DemandSeries,
        horizon_days: usize,
    ) -> Result<Option<Vec<ForecastPoint>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_clips_each_field() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let point = ForecastPoint::from_raw(date, -0.5, -2.0, 1.5);
        assert_eq!(point.predicted_demand, 0.0);
        assert_eq!(point.lower_bound, 0.0);
        assert_eq!(point.upper_bound, 1.5);
        assert_eq!(point.yhat, -0.5);
    }
}
