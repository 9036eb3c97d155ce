// src/pipeline/reconcile.rs

//! Merges ideal-stock targets back onto the original extract.
//!
//! Every original row is kept, in order, with its original cells; one
//! integer column is appended holding the target of the row's
//! (branch, material) pair, or 0 when that pair has no target.

use std::collections::HashMap;

use csv::StringRecord;
use tracing::info;

use crate::io::loader::RawTable;
use crate::pipeline::engine::ReplenishmentTarget;

pub const COL_IDEAL_STOCK: &str = "stokIdeal";

/// Original table plus the appended ideal-stock column.
#[derive(Debug, Clone)]
pub struct AugmentedTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    /// The appended value for each row, in row order.
    pub ideal_stock: Vec<u64>,
}

impl AugmentedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Left-joins `table` against `targets` on (branch, material).
pub fn reconcile(table: &RawTable, targets: &[ReplenishmentTarget]) -> AugmentedTable {
    let lookup: HashMap<(&str, &str), u64> = targets
        .iter()
        .map(|t| ((t.branch.as_str(), t.material.as_str()), t.ideal_stock))
        .collect();

    let width = table.headers.len();
    let mut headers = table.headers.clone();
    headers.push_field(COL_IDEAL_STOCK);

    let mut rows = Vec::with_capacity(table.len());
    let mut ideal_stock = Vec::with_capacity(table.len());
    let mut defaulted = 0usize;

    for row in &table.rows {
        let key = (table.branch_of(row), table.material_of(row));
        let value = lookup.get(&key).copied().unwrap_or_else(|| {
            defaulted += 1;
            0
        });

        // Ragged rows are padded so the new column lines up with the header.
        let mut augmented = row.clone();
        for _ in augmented.len()..width {
            augmented.push_field("");
        }
        augmented.push_field(&value.to_string());

        rows.push(augmented);
        ideal_stock.push(value);
    }

    if targets.is_empty() {
        info!(rows = rows.len(), "No pair was trained; every row gets stokIdeal = 0");
    } else {
        info!(rows = rows.len(), defaulted, "Reconciled ideal stock onto extract");
    }

    AugmentedTable {
        headers,
        rows,
        ideal_stock,
    }
}
