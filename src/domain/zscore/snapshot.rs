//! Per-window z-scores of a single point in time

use serde::Serialize;

use crate::domain::series::PriceSeries;
use crate::domain::volatility::BaselineTable;
use crate::shared::utils::window_days;

/// One row of the per-window summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowZScore {
    pub window_minutes: usize,
    pub return_pct: f64,
    pub mean_pct: f64,
    pub std_dev_pct: f64,
    pub z_score: f64,
}

impl WindowZScore {
    pub fn window_days(&self) -> f64 {
        window_days(self.window_minutes)
    }
}

/// Z-scores of the price at `time_index` across windows `1..=max_window`.
///
/// Windows without look-back, without a baseline, or with a zero base price
/// are left out rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreSnapshot {
    pub time_index: usize,
    pub price: f64,
    pub windows: Vec<WindowZScore>,
}

impl ZScoreSnapshot {
    /// Snapshot of the latest price in `series`
    pub fn latest(series: &PriceSeries, baseline: &BaselineTable, max_window: usize) -> Option<Self> {
        let last = series.len().checked_sub(1)?;
        Self::at(series, last, baseline, max_window)
    }

    /// Snapshot of the price at `time_index`; `None` if the index is out of range
    pub fn at(
        series: &PriceSeries,
        time_index: usize,
        baseline: &BaselineTable,
        max_window: usize,
    ) -> Option<Self> {
        let price = series.close(time_index)?;
        let windows = (1..=max_window.min(time_index))
            .filter_map(|window| {
                let stat = baseline.get(window)?;
                let return_pct = series.return_pct(time_index, window)?;
                Some(WindowZScore {
                    window_minutes: window,
                    return_pct,
                    mean_pct: stat.mean_return_pct,
                    std_dev_pct: stat.std_dev_return_pct,
                    z_score: stat.z_score(return_pct),
                })
            })
            .collect();

        Some(Self {
            time_index,
            price,
            windows,
        })
    }

    pub fn get(&self, window_minutes: usize) -> Option<&WindowZScore> {
        self.windows
            .binary_search_by_key(&window_minutes, |w| w.window_minutes)
            .ok()
            .map(|i| &self.windows[i])
    }

    /// Highest z-score; the first window wins ties
    pub fn max(&self) -> Option<&WindowZScore> {
        self.windows
            .iter()
            .fold(None, |best: Option<&WindowZScore>, w| match best {
                Some(b) if b.z_score >= w.z_score => Some(b),
                _ => Some(w),
            })
    }

    /// Lowest z-score; the first window wins ties
    pub fn min(&self) -> Option<&WindowZScore> {
        self.windows
            .iter()
            .fold(None, |best: Option<&WindowZScore>, w| match best {
                Some(b) if b.z_score <= w.z_score => Some(b),
                _ => Some(w),
            })
    }
}
