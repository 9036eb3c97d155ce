// src/model/record.rs

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Identity of one unit of forecasting work: a material stocked at a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub branch: String,
    pub material: String,
}

impl PairKey {
    pub fn new(branch: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            material: material.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.branch, self.material)
    }
}

/// One row of the flattened consumption extract.
///
/// The date stays as the raw text of the `tanggal` cell; turning it into a
/// calendar day (or rejecting it) is the series builder's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub branch: String,
    pub material: String,
    pub date: String,
    pub quantity_out: f64,
}

impl ConsumptionRecord {
    pub fn new(
        branch: impl Into<String>,
        material: impl Into<String>,
        date: impl Into<String>,
        quantity_out: f64,
    ) -> Self {
        Self {
            branch: branch.into(),
            material: material.into(),
            date: date.into(),
            quantity_out,
        }
    }

    pub fn matches(&self, pair: &PairKey) -> bool {
        self.branch == pair.branch && self.material == pair.material
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.branch.clone(), self.material.clone())
    }
}

/// Lists every (branch, material) pair in first-appearance order:
/// branches in the order they first occur, and within a branch, materials
/// in the order they first occur for that branch.
pub fn distinct_pairs(records: &[ConsumptionRecord]) -> Vec<PairKey> {
    let mut branches: Vec<&str> = Vec::new();
    let mut materials: HashMap<&str, Vec<&str>> = HashMap::new();

    for record in records {
        let seen = materials.entry(record.branch.as_str()).or_insert_with(|| {
            branches.push(record.branch.as_str());
            Vec::new()
        });
        if !seen.contains(&record.material.as_str()) {
            seen.push(record.material.as_str());
        }
    }

    let mut pairs = Vec::new();
    for branch in branches {
        if let Some(list) = materials.get(branch) {
            for material in list {
                pairs.push(PairKey::new(branch, *material));
            }
        }
    }
    pairs
}

/// Splits the log into per-pair slices, keyed by pair, preserving row order.
pub fn group_by_pair(records: &[ConsumptionRecord]) -> HashMap<PairKey, Vec<ConsumptionRecord>> {
    let mut groups: HashMap<PairKey, Vec<ConsumptionRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.pair()).or_default().push(record.clone());
    }
    groups
}
