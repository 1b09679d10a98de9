//! Strided price and z-score trajectories over a row range

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::series::PriceSeries;
use crate::domain::zscore::{CellState, ZScoreMatrix};
use crate::shared::utils::pct_return;

/// Price change windows of the hourly view (1h, 4h, 1d)
pub const PRICE_WINDOWS: [usize; 3] = [60, 240, 1440];
/// Z-score windows of the intraday view (1m, 15m, 1h, 4h)
pub const ZSCORE_WINDOWS: [usize; 4] = [1, 15, 60, 240];

/// Rows `start, start + stride, ...` up to `end` (inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryQuery {
    pub start: usize,
    pub end: usize,
    pub stride: usize,
    pub windows: Vec<usize>,
}

impl TrajectoryQuery {
    pub fn new(start: usize, end: usize, stride: usize) -> Self {
        Self {
            start,
            end,
            stride,
            windows: PRICE_WINDOWS.to_vec(),
        }
    }

    /// `radius` rows either side of `center`
    pub fn around(center: usize, radius: usize, stride: usize) -> Self {
        Self::new(center.saturating_sub(radius), center.saturating_add(radius), stride)
    }

    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.windows = windows;
        self
    }

    /// Visited rows, clamped to a grid of `len` rows. A zero stride counts as 1.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let Some(last) = len.checked_sub(1) else {
            return Vec::new();
        };
        let end = self.end.min(last);
        if self.start > end {
            return Vec::new();
        }
        (self.start..=end).step_by(self.stride.max(1)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowChange {
    pub window_minutes: usize,
    /// `None` when the look-back price is missing or zero
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStep {
    pub time_index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Change against the first visited row
    pub since_start_pct: Option<f64>,
    pub changes: Vec<WindowChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowReading {
    pub window_minutes: usize,
    pub state: CellState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreStep {
    pub time_index: usize,
    pub readings: Vec<WindowReading>,
}

pub fn price_trajectory(series: &PriceSeries, query: &TrajectoryQuery) -> Vec<PriceStep> {
    let indices = query.indices(series.len());
    let base = indices.first().and_then(|&t| series.close(t));

    indices
        .into_iter()
        .filter_map(|t| {
            let point = series.point(t)?;
            let changes = query
                .windows
                .iter()
                .map(|&window| WindowChange {
                    window_minutes: window,
                    change_pct: if window == 0 { None } else { series.return_pct(t, window) },
                })
                .collect();
            Some(PriceStep {
                time_index: t,
                timestamp: point.timestamp,
                price: point.close,
                since_start_pct: base.and_then(|b| pct_return(b, point.close)),
                changes,
            })
        })
        .collect()
}

/// Matrix readings along the same rows. Windows the matrix cannot answer
/// carry their undefined reason instead of a number.
pub fn zscore_trajectory(matrix: &ZScoreMatrix, query: &TrajectoryQuery, windows: &[usize]) -> Vec<ZScoreStep> {
    query
        .indices(matrix.rows())
        .into_iter()
        .map(|t| ZScoreStep {
            time_index: t,
            readings: windows
                .iter()
                .filter_map(|&window| {
                    matrix.state_at(t, window).map(|state| WindowReading {
                        window_minutes: window,
                        state,
                    })
                })
                .collect(),
        })
        .collect()
}
