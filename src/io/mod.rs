pub mod loader;
pub mod plot;
pub mod reporting;

pub use loader::{load_extract, load_extract_file, LoadedExtract, RawTable};
pub use plot::{render_diagnostic, ChartOptions};
pub use reporting::{
    augmented_output_path, write_augmented, write_forecast_table, write_per_branch,
    FORECAST_COLUMNS,
};
