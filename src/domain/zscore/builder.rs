//! Dense z-score matrix construction

use rayon::prelude::*;
use tracing::info;

use super::{CellState, UndefinedReason, ZScoreMatrix};
use crate::domain::series::PriceSeries;
use crate::domain::volatility::BaselineTable;
use crate::shared::utils::{pct_return, ProgressTracker};

/// Builds a `T x W` surface from a recent price slice and a baseline table
pub struct ZScoreMatrixBuilder<'a> {
    baseline: &'a BaselineTable,
    max_window: usize,
}

impl<'a> ZScoreMatrixBuilder<'a> {
    /// Columns default to the largest window in the baseline
    pub fn new(baseline: &'a BaselineTable) -> Self {
        Self {
            baseline,
            max_window: baseline.max_window().unwrap_or(0),
        }
    }

    /// Override the number of window columns
    pub fn with_max_window(mut self, max_window: usize) -> Self {
        self.max_window = max_window;
        self
    }

    pub fn max_window(&self) -> usize {
        self.max_window
    }

    /// Compute every cell. Rows are filled in parallel; each worker owns a
    /// disjoint row so no locking is involved.
    pub fn build(&self, recent: &PriceSeries) -> ZScoreMatrix {
        let rows = recent.len();
        let width = self.max_window;
        info!("Building {} x {} z-score matrix", rows, width);

        let mut cells = vec![CellState::Undefined(UndefinedReason::InsufficientHistory); rows * width];
        if width > 0 {
            let closes = recent.closes();
            let progress = ProgressTracker::new("Z-score matrix", rows, 1000);
            cells
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(time_index, row)| {
                    self.fill_row(closes, time_index, row);
                    progress.tick();
                });
        }

        let matrix = ZScoreMatrix::from_cells(rows, width, cells);
        info!(
            "Matrix complete: {} of {} cells defined",
            matrix.defined_count(),
            rows * width
        );
        matrix
    }

    fn fill_row(&self, closes: &[f64], time_index: usize, row: &mut [CellState]) {
        for (offset, cell) in row.iter_mut().enumerate() {
            *cell = self.compute_cell(closes, time_index, offset + 1);
        }
    }

    fn compute_cell(&self, closes: &[f64], time_index: usize, window: usize) -> CellState {
        if time_index < window {
            return CellState::Undefined(UndefinedReason::InsufficientHistory);
        }
        let Some(return_pct) = pct_return(closes[time_index - window], closes[time_index]) else {
            return CellState::Undefined(UndefinedReason::ZeroBasePrice);
        };
        match self.baseline.get(window) {
            Some(stat) => CellState::Defined {
                return_pct,
                z_score: stat.z_score(return_pct),
            },
            None => CellState::Undefined(UndefinedReason::MissingBaseline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::volatility::{VolatilityProfiler, WindowStat};

    fn flat_baseline(max_window: usize, std: f64) -> BaselineTable {
        (1..=max_window)
            .map(|w| WindowStat {
                window_minutes: w,
                mean_return_pct: 0.0,
                std_dev_return_pct: std,
                sample_count: 100,
            })
            .collect()
    }

    #[test]
    fn test_cells_before_window_are_undefined_regardless_of_prices() {
        let recent = PriceSeries::from_closes(vec![100.0, 250.0, 3.0, 99.0, 100.0]).unwrap();
        let baseline = flat_baseline(5, 1.0);
        let matrix = ZScoreMatrixBuilder::new(&baseline).build(&recent);

        assert_eq!(matrix.rows(), 5);
        assert_eq!(matrix.max_window(), 5);
        for cell in matrix.iter() {
            if cell.time_index < cell.window_minutes {
                assert_eq!(cell.state, CellState::Undefined(UndefinedReason::InsufficientHistory));
            } else {
                assert!(cell.is_defined());
            }
        }
    }

    #[test]
    fn test_scenario_b_zero_std_gives_defined_zero() {
        let series = PriceSeries::from_closes(vec![100.0; 20]).unwrap();
        let baseline = VolatilityProfiler::new(3).profile(&series).unwrap();
        let matrix = ZScoreMatrixBuilder::new(&baseline).build(&series);

        for t in 1..20 {
            let cell = matrix.cell(t, 1).unwrap();
            assert!(cell.is_defined());
            assert_eq!(cell.z_score(), Some(0.0));
        }
        assert!(!matrix.cell(0, 1).unwrap().is_defined());
    }

    #[test]
    fn test_missing_baseline_window_is_undefined() {
        let recent = PriceSeries::from_closes(vec![100.0, 101.0, 102.0, 103.0]).unwrap();
        let baseline: BaselineTable = flat_baseline(3, 1.0).iter().filter(|s| s.window_minutes != 2).copied().collect();
        let matrix = ZScoreMatrixBuilder::new(&baseline).build(&recent);

        assert_eq!(
            matrix.cell(3, 2).unwrap().state,
            CellState::Undefined(UndefinedReason::MissingBaseline)
        );
        assert!(matrix.cell(3, 1).unwrap().is_defined());
        assert!(matrix.cell(3, 3).unwrap().is_defined());
    }

    #[test]
    fn test_z_score_formula() {
        let recent = PriceSeries::from_closes(vec![100.0, 102.0]).unwrap();
        let baseline: BaselineTable = vec![WindowStat {
            window_minutes: 1,
            mean_return_pct: 0.5,
            std_dev_return_pct: 0.75,
            sample_count: 50,
        }]
        .into_iter()
        .collect();
        let cell = ZScoreMatrixBuilder::new(&baseline).build(&recent).cell(1, 1).unwrap();
        assert!((cell.return_pct().unwrap() - 2.0).abs() < 1e-12);
        assert!((cell.z_score().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_base_price_cell_is_undefined() {
        let recent = PriceSeries::from_closes(vec![0.0, 100.0]).unwrap();
        let baseline = flat_baseline(1, 1.0);
        let matrix = ZScoreMatrixBuilder::new(&baseline).build(&recent);
        assert_eq!(
            matrix.cell(1, 1).unwrap().state,
            CellState::Undefined(UndefinedReason::ZeroBasePrice)
        );
    }

    #[test]
    fn test_width_override_and_empty_baseline() {
        let recent = PriceSeries::from_closes(vec![100.0, 101.0, 102.0]).unwrap();
        let baseline = flat_baseline(10, 1.0);
        let matrix = ZScoreMatrixBuilder::new(&baseline).with_max_window(2).build(&recent);
        assert_eq!(matrix.max_window(), 2);
        assert!(matrix.cell(2, 3).is_none());

        let empty = BaselineTable::default();
        let matrix = ZScoreMatrixBuilder::new(&empty).build(&recent);
        assert_eq!(matrix.max_window(), 0);
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.defined_count(), 0);
    }
}
