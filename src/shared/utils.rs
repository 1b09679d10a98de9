//! Utility functions and helpers

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Minutes in one day, used to express windows in days
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Window length expressed in days
pub fn window_days(window_minutes: usize) -> f64 {
    window_minutes as f64 / MINUTES_PER_DAY
}

/// Percentage return from `base` to `current`.
///
/// Returns `None` when the base price is zero or the result is not finite,
/// so the sample can be excluded instead of leaking NaN/Inf downstream.
pub fn pct_return(base: f64, current: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    let r = (current - base) / base * 100.0;
    r.is_finite().then_some(r)
}

/// Arithmetic mean and Bessel-corrected sample standard deviation.
///
/// A single sample yields a zero standard deviation; an empty slice yields `None`.
pub fn mean_and_sample_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() == 1 {
        return Some((mean, 0.0));
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((mean, (sum_sq / (n - 1.0)).sqrt()))
}

/// Thread-safe progress counter that logs at a fixed cadence.
///
/// Safe to share across rayon workers; the log lines may arrive out of order.
pub struct ProgressTracker {
    label: &'static str,
    total: usize,
    every: usize,
    done: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(label: &'static str, total: usize, every: usize) -> Self {
        Self {
            label,
            total,
            every: every.max(1),
            done: AtomicUsize::new(0),
        }
    }

    /// Record one finished unit of work
    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.every == 0 || done == self.total {
            let pct = if self.total == 0 {
                100.0
            } else {
                done as f64 / self.total as f64 * 100.0
            };
            info!("{}: {:.1}% ({}/{})", self.label, pct, done, self.total);
        }
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}
