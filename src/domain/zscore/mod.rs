//! Z-score domain - standardized return surfaces against a baseline

mod builder;
mod snapshot;

pub use builder::ZScoreMatrixBuilder;
pub use snapshot::{WindowZScore, ZScoreSnapshot};

use serde::Serialize;
use std::fmt;

/// Why a cell carries no statistical reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UndefinedReason {
    /// The time index is smaller than the window, so there is no look-back price
    InsufficientHistory,
    /// The baseline table has no entry for the window
    MissingBaseline,
    /// The look-back price is zero and the return is excluded
    ZeroBasePrice,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::InsufficientHistory => "insufficient history",
            UndefinedReason::MissingBaseline => "no baseline",
            UndefinedReason::ZeroBasePrice => "zero base price",
        };
        f.write_str(text)
    }
}

/// Contents of a matrix cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CellState {
    Defined { return_pct: f64, z_score: f64 },
    Undefined(UndefinedReason),
}

/// One (time index, window) entry of the surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScoreCell {
    pub time_index: usize,
    pub window_minutes: usize,
    pub state: CellState,
}

impl ZScoreCell {
    pub fn is_defined(&self) -> bool {
        matches!(self.state, CellState::Defined { .. })
    }

    pub fn z_score(&self) -> Option<f64> {
        match self.state {
            CellState::Defined { z_score, .. } => Some(z_score),
            CellState::Undefined(_) => None,
        }
    }

    pub fn return_pct(&self) -> Option<f64> {
        match self.state {
            CellState::Defined { return_pct, .. } => Some(return_pct),
            CellState::Undefined(_) => None,
        }
    }
}

/// Dense surface over time indices `[0, rows)` and windows `[1, max_window]`.
///
/// Row-major storage; immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScoreMatrix {
    rows: usize,
    max_window: usize,
    cells: Vec<CellState>,
}

impl ZScoreMatrix {
    /// Assemble a matrix from row-major cell states. `cells.len()` must equal
    /// `rows * max_window`.
    pub(crate) fn from_cells(rows: usize, max_window: usize, cells: Vec<CellState>) -> Self {
        debug_assert_eq!(cells.len(), rows * max_window);
        Self {
            rows,
            max_window,
            cells,
        }
    }

    /// Number of time indices
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Largest window column
    pub fn max_window(&self) -> usize {
        self.max_window
    }

    /// Cell at `(time_index, window)`, or `None` outside the grid
    pub fn cell(&self, time_index: usize, window_minutes: usize) -> Option<ZScoreCell> {
        if time_index >= self.rows || window_minutes == 0 || window_minutes > self.max_window {
            return None;
        }
        let state = self.cells[time_index * self.max_window + window_minutes - 1];
        Some(ZScoreCell {
            time_index,
            window_minutes,
            state,
        })
    }

    /// State at `(time_index, window)` for any window, including those past
    /// the matrix width, which read as undefined. `None` only for rows outside
    /// the matrix.
    pub fn state_at(&self, time_index: usize, window_minutes: usize) -> Option<CellState> {
        if time_index >= self.rows {
            return None;
        }
        Some(match self.cell(time_index, window_minutes) {
            Some(cell) => cell.state,
            None if time_index < window_minutes => CellState::Undefined(UndefinedReason::InsufficientHistory),
            None => CellState::Undefined(UndefinedReason::MissingBaseline),
        })
    }

    /// Cell states of one row, indexed by `window - 1`
    pub fn row(&self, time_index: usize) -> Option<&[CellState]> {
        if time_index >= self.rows {
            return None;
        }
        let start = time_index * self.max_window;
        Some(&self.cells[start..start + self.max_window])
    }

    /// Every cell in row-major order
    pub fn iter(&self) -> impl Iterator<Item = ZScoreCell> + '_ {
        let width = self.max_window;
        self.cells.iter().enumerate().map(move |(i, state)| ZScoreCell {
            time_index: i / width,
            window_minutes: i % width + 1,
            state: *state,
        })
    }

    pub fn defined_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c, CellState::Defined { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_accessors_distinguish_undefined_from_zero() {
        let zero = ZScoreCell {
            time_index: 3,
            window_minutes: 1,
            state: CellState::Defined {
                return_pct: 0.0,
                z_score: 0.0,
            },
        };
        let missing = ZScoreCell {
            time_index: 0,
            window_minutes: 1,
            state: CellState::Undefined(UndefinedReason::InsufficientHistory),
        };
        assert!(zero.is_defined());
        assert_eq!(zero.z_score(), Some(0.0));
        assert!(!missing.is_defined());
        assert_eq!(missing.z_score(), None);
        assert_eq!(missing.return_pct(), None);
    }

    #[test]
    fn test_matrix_indexing() {
        let u = CellState::Undefined(UndefinedReason::InsufficientHistory);
        let d = |z: f64| CellState::Defined {
            return_pct: z,
            z_score: z,
        };
        // 2 rows x 2 windows
        let matrix = ZScoreMatrix::from_cells(2, 2, vec![u, u, d(1.5), u]);
        assert_eq!(matrix.cell(1, 1).unwrap().z_score(), Some(1.5));
        assert!(!matrix.cell(1, 2).unwrap().is_defined());
        assert!(matrix.cell(2, 1).is_none());
        assert!(matrix.cell(0, 0).is_none());
        assert!(matrix.cell(0, 3).is_none());
        assert_eq!(matrix.defined_count(), 1);
        assert_eq!(matrix.row(1).unwrap().len(), 2);

        let positions: Vec<(usize, usize)> = matrix.iter().map(|c| (c.time_index, c.window_minutes)).collect();
        assert_eq!(positions, vec![(0, 1), (0, 2), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_state_at_reads_past_the_width_as_undefined() {
        let d = CellState::Defined {
            return_pct: 0.5,
            z_score: 0.5,
        };
        let matrix = ZScoreMatrix::from_cells(
            6,
            1,
            vec![CellState::Undefined(UndefinedReason::InsufficientHistory), d, d, d, d, d],
        );
        assert_eq!(matrix.state_at(3, 1), Some(d));
        assert_eq!(
            matrix.state_at(3, 5),
            Some(CellState::Undefined(UndefinedReason::InsufficientHistory))
        );
        assert_eq!(
            matrix.state_at(5, 5),
            Some(CellState::Undefined(UndefinedReason::MissingBaseline))
        );
        assert_eq!(matrix.state_at(6, 1), None);
    }

    #[test]
    fn test_undefined_reason_display() {
        assert_eq!(UndefinedReason::InsufficientHistory.to_string(), "insufficient history");
        assert_eq!(UndefinedReason::MissingBaseline.to_string(), "no baseline");
    }
}
