// src/io/loader.rs

//! CSV extract loader.
//!
//! Reads the flattened ledger extract. Expected columns (any order, extra
//! columns allowed and preserved):
//!   namaCabang, namaBahan, tanggal, jmlhKeluar

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::error::{ForecastError, Result};
use crate::model::record::ConsumptionRecord;

pub const COL_BRANCH: &str = "namaCabang";
pub const COL_MATERIAL: &str = "namaBahan";
pub const COL_DATE: &str = "tanggal";
pub const COL_QUANTITY_OUT: &str = "jmlhKeluar";

const REQUIRED_COLUMNS: [&str; 4] = [COL_BRANCH, COL_MATERIAL, COL_DATE, COL_QUANTITY_OUT];

/// Positions of the required columns in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredColumns {
    pub branch: usize,
    pub material: usize,
    pub date: usize,
    pub quantity_out: usize,
}

impl RequiredColumns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();

        match (find(COL_BRANCH), find(COL_MATERIAL), find(COL_DATE), find(COL_QUANTITY_OUT)) {
            (Some(branch), Some(material), Some(date), Some(quantity_out)) => Ok(Self {
                branch,
                material,
                date,
                quantity_out,
            }),
            _ => Err(ForecastError::MissingColumns(missing)),
        }
    }
}

/// The extract exactly as read: header plus every row, in order.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub columns: RequiredColumns,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn branch_of<'a>(&self, row: &'a StringRecord) -> &'a str {
        row.get(self.columns.branch).unwrap_or("")
    }

    pub fn material_of<'a>(&self, row: &'a StringRecord) -> &'a str {
        row.get(self.columns.material).unwrap_or("")
    }
}

/// A loaded extract: the verbatim table for reconciliation and the
/// consumption log for forecasting.
#[derive(Debug, Clone)]
pub struct LoadedExtract {
    pub table: RawTable,
    pub records: Vec<ConsumptionRecord>,
    /// Rows left out of the log because `jmlhKeluar` was not a number.
    pub skipped_quantity_rows: usize,
}

/// Parses a `jmlhKeluar` cell. Empty cells count as zero.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load the extract from any CSV reader.
pub fn load_extract<R: Read>(reader: R) -> Result<LoadedExtract> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut headers = csv_reader.headers()?.clone();
    let bom_stripped = headers
        .get(0)
        .and_then(|first| first.strip_prefix('\u{feff}'))
        .map(str::to_owned);
    if let Some(first) = bom_stripped {
        let mut fixed = StringRecord::new();
        fixed.push_field(&first);
        for field in headers.iter().skip(1) {
            fixed.push_field(field);
        }
        headers = fixed;
    }
    let columns = RequiredColumns::locate(&headers)?;

    let mut rows = Vec::new();
    let mut records = Vec::new();
    let mut skipped_quantity_rows = 0;

    for (line_num, result) in csv_reader.records().enumerate() {
        let row = result?;
        let field = |idx: usize| row.get(idx).unwrap_or("");

        match parse_quantity(field(columns.quantity_out)) {
            Some(quantity_out) => records.push(ConsumptionRecord::new(
                field(columns.branch),
                field(columns.material),
                field(columns.date),
                quantity_out,
            )),
            None => {
                skipped_quantity_rows += 1;
                warn!(
                    line = line_num + 2,
                    value = field(columns.quantity_out),
                    "Skipping row with non-numeric jmlhKeluar"
                );
            }
        }
        rows.push(row);
    }

    Ok(LoadedExtract {
        table: RawTable {
            headers,
            rows,
            columns,
        },
        records,
        skipped_quantity_rows,
    })
}

/// Load the extract from a CSV file path.
pub fn load_extract_file(path: &Path) -> Result<LoadedExtract> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    let extract = load_extract(file)?;
    info!(
        path = %path.display(),
        rows = extract.table.len(),
        usable = extract.records.len(),
        "Loaded consumption extract"
    );
    Ok(extract)
}
