//! Daily demand forecasting and ideal-stock targets per (branch, material).
//!
//! The flow is: load the ledger extract, build a gap-free daily series per
//! pair, forecast it, add a volatility buffer, and write the targets back
//! onto the extract.

pub mod error;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod strategy;

pub use error::{ForecastError, Result};
