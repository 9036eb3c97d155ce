// src/io/reporting.rs

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ForecastError, Result};
use crate::pipeline::engine::ForecastRow;
use crate::pipeline::reconcile::AugmentedTable;

/// Header of the detailed forecast table, matching `ForecastRow`'s serde names.
pub const FORECAST_COLUMNS: [&str; 11] = [
    "ds",
    "yhat",
    "yhat_lower",
    "yhat_upper",
    "pred_keluar",
    "pred_low",
    "pred_high",
    "safety_stock",
    "stok_ideal",
    "namaCabang",
    "namaBahan",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Opens a headerless CSV writer on `path`, creating parent directories and
/// writing a UTF-8 BOM first so spreadsheet tools pick the right encoding.
fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ForecastError::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| ForecastError::io(path, e))?;
    file.write_all(UTF8_BOM).map_err(|e| ForecastError::io(path, e))?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

/// Writes the detailed per-day forecast table. An empty `rows` still
/// produces a file with the header.
pub fn write_forecast_table(path: &Path, rows: &[ForecastRow]) -> Result<()> {
    let mut wtr = create_writer(path)?;
    wtr.write_record(FORECAST_COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| ForecastError::io(path, e))?;

    info!(rows = rows.len(), path = %path.display(), "Wrote forecast table");
    Ok(())
}

/// Writes one forecast table per branch into `dir`, named
/// `prediksi_<branch>.csv`. Returns the files written, in branch
/// first-appearance order.
pub fn write_per_branch(dir: &Path, rows: &[ForecastRow]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| ForecastError::io(dir, e))?;

    let mut order: Vec<&str> = Vec::new();
    let mut by_branch: HashMap<&str, Vec<ForecastRow>> = HashMap::new();
    for row in rows {
        by_branch
            .entry(row.branch.as_str())
            .or_insert_with(|| {
                order.push(row.branch.as_str());
                Vec::new()
            })
            .push(row.clone());
    }

    let mut used_names: Vec<String> = Vec::new();
    let mut written = Vec::with_capacity(order.len());
    for branch in order {
        let name = unique_name(&mut used_names, &sanitize_file_stem(branch));
        let path = dir.join(format!("prediksi_{name}.csv"));
        write_forecast_table(&path, &by_branch[branch])?;
        written.push(path);
    }

    info!(files = written.len(), dir = %dir.display(), "Wrote per-branch forecast tables");
    Ok(written)
}

/// Writes the original extract with the appended `stokIdeal` column.
pub fn write_augmented(path: &Path, table: &AugmentedTable) -> Result<()> {
    let mut wtr = create_writer(path)?;
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush().map_err(|e| ForecastError::io(path, e))?;

    info!(rows = table.len(), path = %path.display(), "Wrote extract with stokIdeal");
    Ok(())
}

/// `<input dir>/<input stem>_dengan_stokIdeal.csv`
pub fn augmented_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    input.with_file_name(format!("{stem}_dengan_stokIdeal.csv"))
}

/// Replaces characters that are unsafe in file names with `_`.
fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Suffixes `_2`, `_3`, ... when two branches sanitize to the same name.
fn unique_name(used: &mut Vec<String>, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    used.push(candidate.clone());
    candidate
}
