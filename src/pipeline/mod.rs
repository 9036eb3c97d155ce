pub mod config;
pub mod engine;
pub mod reconcile;

pub use config::PipelineConfig;
pub use engine::{
    Diagnostic, ForecastRow, PairOutcome, PairStatus, PipelineOutput, ReplenishmentPipeline,
    ReplenishmentTarget, RunSummary,
};
pub use reconcile::{reconcile, AugmentedTable, COL_IDEAL_STOCK};
