#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub const HEADER: &str = "idStok,namaCabang,namaBahan,tanggal,jmlhKeluar";

/// Daily demand drawn from a Normal distribution, rounded and clamped at 0.
pub fn normal_demand(days: usize, mean: f64, std_dev: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(mean, std_dev).unwrap();
    (0..days)
        .map(|_| normal.sample(&mut rng).round().max(0.0))
        .collect()
}

/// Ledger lines for one pair, one row per day starting at `start`.
pub fn ledger_lines(branch: &str, material: &str, start: NaiveDate, demand: &[f64]) -> Vec<String> {
    start
        .iter_days()
        .zip(demand)
        .map(|(date, qty)| format!("{branch},{material},{date},{qty}"))
        .collect()
}

/// Writes an extract with a running `idStok` column in front of `lines`.
pub fn write_extract(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let mut body = String::from(HEADER);
    body.push('\n');
    for (i, line) in lines.iter().enumerate() {
        body.push_str(&format!("{},{line}\n", i + 1));
    }
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

/// Reads one of the written CSV artifacts back, BOM included.
pub fn read_artifact(path: &Path) -> (StringRecord, Vec<StringRecord>) {
    let bytes = fs::read(path).unwrap();
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").expect("artifact starts with a BOM");
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(body);
    let headers = reader.headers().unwrap().clone();
    let rows = reader.records().map(Result::unwrap).collect();
    (headers, rows)
}

pub fn column(headers: &StringRecord, name: &str) -> usize {
    headers.iter().position(|h| h == name).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
