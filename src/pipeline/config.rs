// src/pipeline/config.rs

use std::time::Duration;

use crate::error::{ForecastError, Result};
use crate::strategy::optimization::RoundingMode;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub horizon_days: usize,
    pub z_factor: f64,
    /// Trailing window (days) for the safety-stock standard deviation.
    pub safety_window: usize,
    /// Distinct observed days a pair needs before it is forecast.
    pub min_history_days: usize,
    pub rounding: RoundingMode,
    pub workers: usize,
    /// Per-pair fit budget; `None` runs fits inline with no limit.
    pub fit_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            z_factor: 1.0,
            safety_window: 14,
            min_history_days: 14,
            rounding: RoundingMode::Nearest,
            workers: default_workers(),
            fit_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(ForecastError::invalid_config("horizon must be at least one day"));
        }
        if !self.z_factor.is_finite() || self.z_factor < 0.0 {
            return Err(ForecastError::invalid_config(format!(
                "z-factor must be a non-negative number, got {}",
                self.z_factor
            )));
        }
        if self.safety_window == 0 {
            return Err(ForecastError::invalid_config("safety window must be at least one day"));
        }
        if self.workers == 0 {
            return Err(ForecastError::invalid_config("at least one worker is required"));
        }
        if self.fit_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ForecastError::invalid_config("fit timeout must be positive"));
        }
        Ok(())
    }
}

/// One worker per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.horizon_days, 14);
        assert_eq!(config.min_history_days, 14);
        assert_eq!(config.rounding, RoundingMode::Nearest);
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            PipelineConfig { horizon_days: 0, ..Default::default() },
            PipelineConfig { z_factor: -0.5, ..Default::default() },
            PipelineConfig { z_factor: f64::NAN, ..Default::default() },
            PipelineConfig { safety_window: 0, ..Default::default() },
            PipelineConfig { workers: 0, ..Default::default() },
            PipelineConfig { fit_timeout: Some(Duration::ZERO), ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ForecastError::InvalidConfig(_))));
        }
    }
}
