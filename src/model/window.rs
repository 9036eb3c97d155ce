// src/model/window.rs

use std::collections::VecDeque;

/// Fixed-width trailing window over a daily series.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buffer: VecDeque<f64>,
    width: usize,
}

impl RollingWindow {
    pub fn new(width: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(width),
            width,
        }
    }

    /// Pushes the newest value, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.width == 0 {
            return;
        }
        if self.buffer.len() == self.width {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_full(&self) -> bool {
        self.width > 0 && self.buffer.len() == self.width
    }

    /// Sample standard deviation of the window contents.
    ///
    /// `None` until the window is full, and for windows narrower than two
    /// values, matching a trailing rolling statistic with no partial windows.
    pub fn std_dev(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let values: Vec<f64> = self.buffer.iter().copied().collect();
        sample_std_dev(&values)
    }
}

/// Sample standard deviation (n - 1 denominator).
///
/// `None` for fewer than two values or non-finite input.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let m2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    let std = (m2 / (n - 1.0)).sqrt();
    std.is_finite().then_some(std)
}
