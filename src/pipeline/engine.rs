// src/pipeline/engine.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ForecastError, Result};
use crate::model::record::{distinct_pairs, group_by_pair, ConsumptionRecord, PairKey};
use crate::model::series::{build_series, DemandSeries};
use crate::pipeline::config::PipelineConfig;
use crate::strategy::optimization::{ideal_stock, safety_stock};
use crate::strategy::traits::{DemandForecaster, ForecastPoint};

/// One row of the detailed forecast table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    #[serde(rename = "pred_keluar")]
    pub predicted_demand: f64,
    #[serde(rename = "pred_low")]
    pub lower_bound: f64,
    #[serde(rename = "pred_high")]
    pub upper_bound: f64,
    pub safety_stock: f64,
    /// Predicted demand plus safety stock for this day.
    #[serde(rename = "stok_ideal")]
    pub ideal_stock: f64,
    #[serde(rename = "namaCabang")]
    pub branch: String,
    #[serde(rename = "namaBahan")]
    pub material: String,
}

impl ForecastRow {
    fn new(pair: &PairKey, point: &ForecastPoint, safety: f64) -> Self {
        Self {
            date: point.date,
            yhat: point.yhat,
            yhat_lower: point.yhat_lower,
            yhat_upper: point.yhat_upper,
            predicted_demand: point.predicted_demand,
            lower_bound: point.lower_bound,
            upper_bound: point.upper_bound,
            safety_stock: safety,
            ideal_stock: point.predicted_demand + safety,
            branch: pair.branch.clone(),
            material: pair.material.clone(),
        }
    }
}

/// Final whole-unit stock recommendation for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplenishmentTarget {
    pub branch: String,
    pub material: String,
    pub ideal_stock: u64,
}

/// How a single pair ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum PairStatus {
    Forecast,
    InsufficientHistory { observed_days: usize, required: usize },
    /// The forecaster declined to fit.
    NoModel,
    FitFailed(String),
    TimedOut,
}

/// Immutable result of processing one pair.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub index: usize,
    pub pair: PairKey,
    pub status: PairStatus,
    pub safety_stock: f64,
    pub skipped_rows: usize,
    pub rows: Vec<ForecastRow>,
    pub target: Option<ReplenishmentTarget>,
    pub diagnostic: Option<Diagnostic>,
}

impl PairOutcome {
    fn without_forecast(index: usize, series: DemandSeries, status: PairStatus) -> Self {
        Self {
            index,
            skipped_rows: series.skipped_rows,
            pair: series.pair,
            status,
            safety_stock: 0.0,
            rows: Vec::new(),
            target: None,
            diagnostic: None,
        }
    }
}

/// History and forecast of one trained pair, kept for the diagnostic plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub pair: PairKey,
    pub history: DemandSeries,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pairs: usize,
    pub forecast: usize,
    pub insufficient_history: usize,
    pub no_model: usize,
    pub fit_failed: usize,
    pub timed_out: usize,
    /// Rows dropped for unparseable dates, across all pairs.
    pub skipped_rows: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &PairOutcome) {
        self.pairs += 1;
        self.skipped_rows += outcome.skipped_rows;
        match outcome.status {
            PairStatus::Forecast => self.forecast += 1,
            PairStatus::InsufficientHistory { .. } => self.insufficient_history += 1,
            PairStatus::NoModel => self.no_model += 1,
            PairStatus::FitFailed(_) => self.fit_failed += 1,
            PairStatus::TimedOut => self.timed_out += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Detail rows, grouped by pair in first-appearance order.
    pub rows: Vec<ForecastRow>,
    pub targets: Vec<ReplenishmentTarget>,
    pub summary: RunSummary,
    /// Last pair (in enumeration order) that produced a forecast.
    pub diagnostic: Option<Diagnostic>,
}

pub struct ReplenishmentPipeline {
    config: PipelineConfig,
    forecaster: Arc<dyn DemandForecaster>,
    pool: rayon::ThreadPool,
    /// Fit threads that have not returned yet, including abandoned ones.
    running_fits: Arc<AtomicUsize>,
}

/// Counts a fit thread as running until dropped.
struct RunningFit(Arc<AtomicUsize>);

impl RunningFit {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for RunningFit {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReplenishmentPipeline {
    pub fn new(config: PipelineConfig, forecaster: Arc<dyn DemandForecaster>) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("pair-worker-{i}"))
            .build()?;
        Ok(Self {
            config,
            forecaster,
            pool,
            running_fits: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Fit threads still running, e.g. ones abandoned after a timeout.
    pub fn running_fits(&self) -> usize {
        self.running_fits.load(Ordering::SeqCst)
    }

    /// Runs every pair of the log to completion and reduces the results.
    ///
    /// Never fails on data: pairs that cannot be forecast are reported in
    /// the summary and simply contribute no rows or target.
    pub fn run(&self, records: &[ConsumptionRecord]) -> PipelineOutput {
        let pairs = distinct_pairs(records);
        let groups = group_by_pair(records);
        info!(
            pairs = pairs.len(),
            workers = self.pool.current_num_threads(),
            model = self.forecaster.name(),
            "Forecasting pairs"
        );

        let outcomes = self.process_all(&pairs, &groups);
        let output = reduce(outcomes);

        info!(
            forecast = output.summary.forecast,
            insufficient_history = output.summary.insufficient_history,
            no_model = output.summary.no_model,
            fit_failed = output.summary.fit_failed,
            timed_out = output.summary.timed_out,
            skipped_rows = output.summary.skipped_rows,
            "Forecasting complete"
        );
        let abandoned = self.running_fits();
        if abandoned > 0 {
            warn!(abandoned, "Timed-out fits are still running in the background");
        }
        output
    }

    fn process_all(
        &self,
        pairs: &[PairKey],
        groups: &HashMap<PairKey, Vec<ConsumptionRecord>>,
    ) -> Vec<PairOutcome> {
        self.pool.install(|| {
            pairs
                .par_iter()
                .enumerate()
                .map(|(index, pair)| {
                    let records = groups.get(pair).map(Vec::as_slice).unwrap_or(&[]);
                    self.process_pair(index, pair, records)
                })
                .collect()
        })
    }

    /// Series -> safety stock + forecast -> rows and target for one pair.
    pub fn process_pair(
        &self,
        index: usize,
        pair: &PairKey,
        records: &[ConsumptionRecord],
    ) -> PairOutcome {
        let series = build_series(records, pair);

        if series.observed_days < self.config.min_history_days {
            debug!(
                pair = %pair,
                observed_days = series.observed_days,
                required = self.config.min_history_days,
                "Insufficient history"
            );
            let status = PairStatus::InsufficientHistory {
                observed_days: series.observed_days,
                required: self.config.min_history_days,
            };
            return PairOutcome::without_forecast(index, series, status);
        }

        let safety = safety_stock(&series, self.config.z_factor, self.config.safety_window);

        let points = match self.fit(index, &series) {
            Ok(Some(points)) if !points.is_empty() => points,
            Ok(_) => {
                debug!(pair = %pair, "Forecaster declined to fit");
                return PairOutcome::without_forecast(index, series, PairStatus::NoModel);
            }
            Err(ForecastError::FitTimeout(limit)) => {
                warn!(pair = %pair, ?limit, "Model fit timed out");
                return PairOutcome::without_forecast(index, series, PairStatus::TimedOut);
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "Model fit failed");
                return PairOutcome::without_forecast(index, series, PairStatus::FitFailed(e.to_string()));
            }
        };

        let rows: Vec<ForecastRow> = points
            .iter()
            .map(|point| ForecastRow::new(pair, point, safety))
            .collect();
        let target = ReplenishmentTarget {
            branch: pair.branch.clone(),
            material: pair.material.clone(),
            ideal_stock: ideal_stock(&points, safety, self.config.rounding),
        };
        debug!(
            pair = %pair,
            days = series.len(),
            safety_stock = safety,
            ideal_stock = target.ideal_stock,
            "Pair forecast"
        );

        PairOutcome {
            index,
            pair: pair.clone(),
            status: PairStatus::Forecast,
            safety_stock: safety,
            skipped_rows: series.skipped_rows,
            rows,
            target: Some(target),
            diagnostic: Some(Diagnostic {
                pair: pair.clone(),
                history: series,
                forecast: points,
            }),
        }
    }

    /// Runs the forecaster, on a watched thread when a timeout is set.
    ///
    /// A timed-out fit thread is left to finish on its own; its result is
    /// discarded.
    fn fit(&self, index: usize, series: &DemandSeries) -> Result<Option<Vec<ForecastPoint>>> {
        let horizon = self.config.horizon_days;
        let Some(limit) = self.config.fit_timeout else {
            return self.forecaster.forecast(series, horizon);
        };

        let (tx, rx) = mpsc::channel();
        let forecaster = Arc::clone(&self.forecaster);
        let owned = series.clone();
        let running = RunningFit::start(&self.running_fits);
        thread::Builder::new()
            .name(format!("fit-{index}"))
            .spawn(move || {
                let result = forecaster.forecast(&owned, horizon);
                drop(running);
                // Receiver may be gone after a timeout.
                let _ = tx.send(result);
            })
            .map_err(|e| ForecastError::fit_failed(format!("could not start fit thread: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ForecastError::FitTimeout(limit)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ForecastError::fit_failed("fit thread panicked"))
            }
        }
    }
}

/// Orders worker outputs by pair and folds them into the run output.
pub fn reduce(mut outcomes: Vec<PairOutcome>) -> PipelineOutput {
    outcomes.sort_by_key(|o| o.index);

    let mut output = PipelineOutput::default();
    for outcome in outcomes {
        output.summary.record(&outcome);
        output.rows.extend(outcome.rows);
        output.targets.extend(outcome.target);
        if outcome.diagnostic.is_some() {
            output.diagnostic = outcome.diagnostic;
        }
    }
    output
}
