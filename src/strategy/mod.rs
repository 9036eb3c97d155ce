pub mod additive;
pub mod optimization;
pub mod traits;

pub use additive::{AdditiveConfig, AdditiveForecaster, FittedModel};
pub use optimization::{ideal_stock, mean_ideal_stock, safety_stock, z_for_service_level, RoundingMode};
pub use traits::{DemandForecaster, ForecastPoint};
