//! Volatility domain - per-window return baselines

mod profiler;

pub use profiler::VolatilityProfiler;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::shared::utils::window_days;

/// Return distribution for one lookback window over the full history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStat {
    pub window_minutes: usize,
    pub mean_return_pct: f64,
    pub std_dev_return_pct: f64,
    pub sample_count: usize,
}

impl WindowStat {
    pub fn window_days(&self) -> f64 {
        window_days(self.window_minutes)
    }

    /// Standardize a return against this window's baseline.
    ///
    /// A degenerate (zero) spread yields a defined zero rather than NaN/Inf.
    pub fn z_score(&self, return_pct: f64) -> f64 {
        if self.std_dev_return_pct > 0.0 {
            (return_pct - self.mean_return_pct) / self.std_dev_return_pct
        } else {
            0.0
        }
    }
}

/// Baseline statistics keyed by window length, read-only once built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineTable {
    stats: BTreeMap<usize, WindowStat>,
}

impl BaselineTable {
    pub fn get(&self, window_minutes: usize) -> Option<&WindowStat> {
        self.stats.get(&window_minutes)
    }

    pub fn contains(&self, window_minutes: usize) -> bool {
        self.stats.contains_key(&window_minutes)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Largest window with an entry
    pub fn max_window(&self) -> Option<usize> {
        self.stats.keys().next_back().copied()
    }

    /// Stats in ascending window order
    pub fn iter(&self) -> impl Iterator<Item = &WindowStat> {
        self.stats.values()
    }
}

impl FromIterator<WindowStat> for BaselineTable {
    /// Later entries for the same window replace earlier ones
    fn from_iter<I: IntoIterator<Item = WindowStat>>(iter: I) -> Self {
        Self {
            stats: iter.into_iter().map(|s| (s.window_minutes, s)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(window: usize, mean: f64, std: f64) -> WindowStat {
        WindowStat {
            window_minutes: window,
            mean_return_pct: mean,
            std_dev_return_pct: std,
            sample_count: 10,
        }
    }

    #[test]
    fn test_z_score_with_zero_std_is_zero() {
        assert_eq!(stat(1, 0.5, 0.0).z_score(10.0), 0.0);
        assert!((stat(1, 0.5, 2.0).z_score(4.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_table_ordering_and_lookup() {
        let table: BaselineTable = vec![stat(5, 0.0, 1.0), stat(1, 0.0, 1.0), stat(3, 0.0, 1.0)]
            .into_iter()
            .collect();
        let windows: Vec<usize> = table.iter().map(|s| s.window_minutes).collect();
        assert_eq!(windows, vec![1, 3, 5]);
        assert_eq!(table.max_window(), Some(5));
        assert!(table.contains(3));
        assert!(table.get(2).is_none());
        assert!(BaselineTable::default().max_window().is_none());
    }
}
