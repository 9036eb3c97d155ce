// src/io/plot.rs

//! Text chart of one pair's history and forecast, for eyeballing a run.

use std::io::{self, Write};

use chrono::NaiveDate;

use crate::pipeline::engine::Diagnostic;

const LABEL_WIDTH: usize = 9;

#[derive(Debug, Clone, Copy)]
pub struct ChartOptions {
    /// Maximum number of day columns; older history is cut first.
    pub width: usize,
    pub height: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 72,
            height: 12,
        }
    }
}

enum Column {
    History(f64),
    Forecast { value: f64, lower: f64, upper: f64 },
}

/// Draws history as `*`, the forecast as `+` and its interval as `.`.
pub fn render_diagnostic<W: Write>(
    out: &mut W,
    diagnostic: &Diagnostic,
    options: ChartOptions,
) -> io::Result<()> {
    let width = options.width.max(10);
    let height = options.height.max(3);

    let mut columns: Vec<(NaiveDate, Column)> = diagnostic
        .history
        .points
        .iter()
        .map(|p| (p.date, Column::History(p.demand)))
        .chain(diagnostic.forecast.iter().map(|f| {
            (
                f.date,
                Column::Forecast {
                    value: f.predicted_demand,
                    lower: f.lower_bound,
                    upper: f.upper_bound,
                },
            )
        }))
        .collect();
    if columns.len() > width {
        columns.drain(..columns.len() - width);
    }

    writeln!(out, "Demand history vs forecast: {}", diagnostic.pair)?;
    let (Some((first, _)), Some((last, _))) = (columns.first(), columns.last()) else {
        return writeln!(out, "(no data)");
    };

    let peak = columns
        .iter()
        .map(|(_, c)| match c {
            Column::History(v) => *v,
            Column::Forecast { value, upper, .. } => value.max(*upper),
        })
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let scale = if peak > 0.0 { peak } else { 1.0 };
    let row_of = |v: f64| -> usize {
        let scaled = (v.max(0.0) / scale * (height - 1) as f64).round();
        (scaled as usize).min(height - 1)
    };

    // grid[0] is the bottom row
    let mut grid = vec![vec![' '; columns.len()]; height];
    for (x, (_, column)) in columns.iter().enumerate() {
        match column {
            Column::History(v) => grid[row_of(*v)][x] = '*',
            Column::Forecast { value, lower, upper } => {
                for row in grid.iter_mut().take(row_of(*upper) + 1).skip(row_of(*lower)) {
                    row[x] = '.';
                }
                grid[row_of(*value)][x] = '+';
            }
        }
    }

    for (level, row) in grid.iter().enumerate().rev() {
        let label = if level == height - 1 || level == 0 || level == (height - 1) / 2 {
            format!("{:>8.1}", scale * level as f64 / (height - 1) as f64)
        } else {
            String::new()
        };
        let line: String = row.iter().collect();
        writeln!(out, "{label:>8} |{}", line.trim_end())?;
    }
    writeln!(out, "{:>LABEL_WIDTH$}{}", "+", "-".repeat(columns.len()))?;

    let first = first.to_string();
    let last = last.to_string();
    let gap = (columns.len() + 1).saturating_sub(first.len() + last.len()).max(1);
    writeln!(out, "{:LABEL_WIDTH$}{first}{}{last}", "", " ".repeat(gap))?;
    writeln!(out, "{:LABEL_WIDTH$}* history  + forecast  . interval", "")?;
    Ok(())
}
