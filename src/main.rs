use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ideal_stock::io::{loader, plot, reporting};
use ideal_stock::pipeline::{reconcile, PipelineConfig, ReplenishmentPipeline};
use ideal_stock::strategy::{z_for_service_level, AdditiveConfig, AdditiveForecaster, RoundingMode};

#[derive(Parser, Debug)]
#[command(name = "ideal-stock")]
#[command(about = "Forecast daily material demand and compute ideal stock per branch", long_about = None)]
struct Args {
    /// Stock ledger extract (CSV with namaCabang, namaBahan, tanggal, jmlhKeluar)
    #[arg(long)]
    input: PathBuf,

    /// Detailed forecast table to write
    #[arg(long)]
    output: PathBuf,

    /// Forecast horizon in days
    #[arg(long, default_value = "14")]
    days: usize,

    /// Safety-stock multiplier on the demand standard deviation
    #[arg(long, default_value = "1.0", conflicts_with = "service_level")]
    z: f64,

    /// Target service level in (0, 1); derives the multiplier instead of --z
    #[arg(long)]
    service_level: Option<f64>,

    /// Distinct observed days a pair needs before it is forecast
    #[arg(long, default_value = "14")]
    min_history: usize,

    /// Trailing window (days) for the demand standard deviation
    #[arg(long, default_value = "14")]
    safety_window: usize,

    /// Also write one forecast table per branch into this directory
    #[arg(long)]
    per_branch_dir: Option<PathBuf>,

    /// Round ideal stock up instead of to the nearest unit
    #[arg(long)]
    ceil: bool,

    /// Print a text chart of the last forecast pair
    #[arg(long)]
    plot: bool,

    /// Where to write the extract with the stokIdeal column
    /// (default: <input stem>_dengan_stokIdeal.csv next to the input)
    #[arg(long)]
    augmented_output: Option<PathBuf>,

    /// Worker threads (default: available cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Per-pair model fit budget in seconds; 0 disables the limit
    #[arg(long, default_value = "30")]
    fit_timeout_secs: u64,

    /// Seed for the forecast interval sampling
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Debug logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let z_factor = match self.service_level {
            Some(p) => z_for_service_level(p)?,
            None => self.z,
        };
        let defaults = PipelineConfig::default();
        Ok(PipelineConfig {
            horizon_days: self.days,
            z_factor,
            safety_window: self.safety_window,
            min_history_days: self.min_history,
            rounding: if self.ceil {
                RoundingMode::Ceiling
            } else {
                RoundingMode::Nearest
            },
            workers: self.workers.unwrap_or(defaults.workers),
            fit_timeout: (self.fit_timeout_secs > 0)
                .then(|| Duration::from_secs(self.fit_timeout_secs)),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let config = args.pipeline_config()?;
    info!(input = %args.input.display(), ?config, "Starting ideal stock run");

    let extract = loader::load_extract_file(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;

    let forecaster = AdditiveForecaster::new(AdditiveConfig {
        seed: args.seed,
        ..Default::default()
    });
    let pipeline = ReplenishmentPipeline::new(config, Arc::new(forecaster))?;
    let output = pipeline.run(&extract.records);

    reporting::write_forecast_table(&args.output, &output.rows)?;
    if let Some(dir) = &args.per_branch_dir {
        reporting::write_per_branch(dir, &output.rows)?;
    }

    let augmented = reconcile(&extract.table, &output.targets);
    let augmented_path = args
        .augmented_output
        .clone()
        .unwrap_or_else(|| reporting::augmented_output_path(&args.input));
    reporting::write_augmented(&augmented_path, &augmented)?;

    if args.plot {
        match &output.diagnostic {
            Some(diagnostic) => {
                let mut stdout = io::stdout().lock();
                if let Err(e) = plot::render_diagnostic(&mut stdout, diagnostic, Default::default()) {
                    warn!(error = %e, "Could not render diagnostic chart");
                }
            }
            None => warn!("No pair was forecast; nothing to plot"),
        }
    }

    let summary = &output.summary;
    println!("\n=== Run Summary ===");
    println!("Pairs:                {}", summary.pairs);
    println!("Forecast:             {}", summary.forecast);
    println!("Insufficient history: {}", summary.insufficient_history);
    println!("No model:             {}", summary.no_model);
    println!("Fit failed:           {}", summary.fit_failed);
    println!("Timed out:            {}", summary.timed_out);
    println!("Rows with bad dates:  {}", summary.skipped_rows);
    println!("Rows with bad qty:    {}", extract.skipped_quantity_rows);
    println!("Forecast table:       {}", args.output.display());
    println!("Augmented extract:    {}", augmented_path.display());

    Ok(())
}
