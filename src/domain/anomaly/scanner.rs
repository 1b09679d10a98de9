//! Threshold scanning over a z-score matrix

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use super::{AnomalyEvent, Classification, Direction, WindowSelection, DEFAULT_THRESHOLD};
use crate::domain::zscore::{CellState, UndefinedReason, ZScoreMatrix};

/// Result of a range scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub start: usize,
    pub end: usize,
    pub threshold: f64,
    /// Ordered by `(time_index, window_minutes)`
    pub events: Vec<AnomalyEvent>,
    /// Largest `|z|`; ties go to the earliest time index, then the smallest window
    pub strongest: Option<AnomalyEvent>,
    pub cells_scanned: usize,
    pub undefined_skipped: usize,
}

impl ScanReport {
    fn empty(start: usize, end: usize, threshold: f64) -> Self {
        Self {
            start,
            end,
            threshold,
            events: Vec::new(),
            strongest: None,
            cells_scanned: 0,
            undefined_skipped: 0,
        }
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.events.iter().filter(|e| e.direction == direction).count()
    }
}

/// Outcome of explaining one window at one time index
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExplanationOutcome {
    Classified {
        z_score: f64,
        return_pct: f64,
        classification: Classification,
    },
    Unavailable {
        reason: UndefinedReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Explanation {
    pub window_minutes: usize,
    pub outcome: ExplanationOutcome,
}

#[derive(Default)]
struct RowScan {
    events: Vec<AnomalyEvent>,
    scanned: usize,
    skipped: usize,
}

/// Flags cells whose z-score magnitude exceeds a threshold
#[derive(Debug, Clone, Copy)]
pub struct AnomalyScanner {
    threshold: f64,
}

impl Default for AnomalyScanner {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AnomalyScanner {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scan time indices `start..=end` (clamped to the matrix) over the
    /// selected windows. Rows are scanned in parallel and merged in order.
    pub fn scan_range(
        &self,
        matrix: &ZScoreMatrix,
        start: usize,
        end: usize,
        selection: &WindowSelection,
    ) -> ScanReport {
        let Some((start, end)) = clamp_range(matrix, start, end) else {
            debug!("Scan range {}..={} lies outside the matrix", start, end);
            return ScanReport::empty(start, end, self.threshold);
        };
        let windows = selection.resolve(matrix.max_window());

        let rows: Vec<RowScan> = (start..=end)
            .into_par_iter()
            .map(|t| self.scan_row(matrix, t, &windows))
            .collect();

        let mut report = ScanReport::empty(start, end, self.threshold);
        for row in rows {
            report.cells_scanned += row.scanned;
            report.undefined_skipped += row.skipped;
            report.events.extend(row.events);
        }
        report.strongest = report.events.iter().fold(None, |best: Option<AnomalyEvent>, e| match best {
            Some(b) if b.z_score.abs() >= e.z_score.abs() => Some(b),
            _ => Some(*e),
        });

        info!(
            "Scanned rows {}..={} over {} windows: {} anomalies ({} surges, {} crashes), {} undefined cells skipped",
            start,
            end,
            windows.len(),
            report.events.len(),
            report.count(Direction::Surge),
            report.count(Direction::Crash),
            report.undefined_skipped
        );
        report
    }

    fn scan_row(&self, matrix: &ZScoreMatrix, time_index: usize, windows: &[usize]) -> RowScan {
        let mut row = RowScan::default();
        for &window in windows {
            let Some(cell) = matrix.cell(time_index, window) else {
                continue;
            };
            match cell.z_score() {
                Some(z) => {
                    row.scanned += 1;
                    if let Some(direction) = Direction::classify(z, self.threshold) {
                        row.events.push(AnomalyEvent {
                            time_index,
                            window_minutes: window,
                            z_score: z,
                            direction,
                        });
                    }
                }
                None => row.skipped += 1,
            }
        }
        row
    }

    /// Explain `time_index` for each requested window. Undefined cells are
    /// reported with their reason and never classified.
    ///
    /// Returns `None` if `time_index` is outside the matrix.
    pub fn explain(&self, matrix: &ZScoreMatrix, time_index: usize, windows: &[usize]) -> Option<Vec<Explanation>> {
        if time_index >= matrix.rows() {
            return None;
        }
        let explanations = windows
            .iter()
            .map(|&window| {
                let outcome = match matrix.state_at(time_index, window) {
                    Some(CellState::Defined { return_pct, z_score }) => ExplanationOutcome::Classified {
                        z_score,
                        return_pct,
                        classification: Classification::from_z(z_score),
                    },
                    Some(CellState::Undefined(reason)) => ExplanationOutcome::Unavailable { reason },
                    None => ExplanationOutcome::Unavailable {
                        reason: UndefinedReason::MissingBaseline,
                    },
                };
                Explanation {
                    window_minutes: window,
                    outcome,
                }
            })
            .collect();
        Some(explanations)
    }

    /// Number of defined cells in `window` over `start..=end` that are beyond
    /// the threshold in `direction`. Crossings need not be adjacent.
    pub fn count_crossings(
        &self,
        matrix: &ZScoreMatrix,
        window: usize,
        start: usize,
        end: usize,
        direction: Direction,
    ) -> usize {
        self.crossing_flags(matrix, window, start, end, direction)
            .filter(|crossed| *crossed)
            .count()
    }

    /// Longest run of adjacent time indices crossing the threshold in
    /// `direction`. Undefined cells break a run.
    pub fn longest_run(
        &self,
        matrix: &ZScoreMatrix,
        window: usize,
        start: usize,
        end: usize,
        direction: Direction,
    ) -> usize {
        let (longest, _) = self
            .crossing_flags(matrix, window, start, end, direction)
            .fold((0, 0), |(longest, current), crossed| {
                let current = if crossed { current + 1 } else { 0 };
                (longest.max(current), current)
            });
        longest
    }

    fn crossing_flags<'m>(
        &self,
        matrix: &'m ZScoreMatrix,
        window: usize,
        start: usize,
        end: usize,
        direction: Direction,
    ) -> impl Iterator<Item = bool> + 'm {
        let threshold = self.threshold;
        let range = clamp_range(matrix, start, end)
            .filter(|_| window >= 1 && window <= matrix.max_window())
            .map(|(s, e)| s..e + 1)
            .unwrap_or(0..0);
        range.map(move |t| {
            matrix
                .cell(t, window)
                .and_then(|c| c.z_score())
                .and_then(|z| Direction::classify(z, threshold))
                == Some(direction)
        })
    }
}

fn clamp_range(matrix: &ZScoreMatrix, start: usize, end: usize) -> Option<(usize, usize)> {
    let last = matrix.rows().checked_sub(1)?;
    let end = end.min(last);
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::PriceSeries;
    use crate::domain::volatility::{BaselineTable, WindowStat};
    use crate::domain::zscore::ZScoreMatrixBuilder;

    fn stat(window: usize, std: f64) -> WindowStat {
        WindowStat {
            window_minutes: window,
            mean_return_pct: 0.0,
            std_dev_return_pct: std,
            sample_count: 1000,
        }
    }

    /// Flat at 100, stepping to 110 at index 20. Window 1 has a 1% std so
    /// the step is a +10 sigma move; wider windows are too noisy to flag it.
    fn step_matrix() -> ZScoreMatrix {
        let mut closes = vec![100.0; 20];
        closes.extend(vec![110.0; 20]);
        let recent = PriceSeries::from_closes(closes).unwrap();
        let baseline: BaselineTable = std::iter::once(stat(1, 1.0)).chain((2..=10).map(|w| stat(w, 100.0))).collect();
        ZScoreMatrixBuilder::new(&baseline).build(&recent)
    }

    fn matrix_from_z(rows: &[Vec<Option<f64>>]) -> ZScoreMatrix {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let cells = rows
            .iter()
            .flat_map(|row| {
                row.iter().map(|z| match z {
                    Some(z) => CellState::Defined {
                        return_pct: *z,
                        z_score: *z,
                    },
                    None => CellState::Undefined(UndefinedReason::InsufficientHistory),
                })
            })
            .collect();
        ZScoreMatrix::from_cells(rows.len(), width, cells)
    }

    #[test]
    fn test_scenario_c_single_surge_is_reported_and_strongest() {
        let matrix = step_matrix();
        let report = AnomalyScanner::default().scan_range(&matrix, 0, 39, &WindowSelection::All);

        assert_eq!(report.events.len(), 1);
        let event = report.events[0];
        assert_eq!(event.time_index, 20);
        assert_eq!(event.window_minutes, 1);
        assert_eq!(event.direction, Direction::Surge);
        assert!((event.z_score - 10.0).abs() < 1e-9);
        assert_eq!(report.strongest, Some(event));
    }

    #[test]
    fn test_scan_counts_scanned_and_skipped_cells() {
        let matrix = step_matrix();
        let report = AnomalyScanner::default().scan_range(&matrix, 0, 39, &WindowSelection::All);
        // 40 rows x 10 windows, minus the upper-left triangle where t < w
        let undefined: usize = (1..=10).sum();
        assert_eq!(report.undefined_skipped, undefined);
        assert_eq!(report.cells_scanned, 400 - undefined);
    }

    #[test]
    fn test_scan_range_is_clamped_and_ordered() {
        let matrix = matrix_from_z(&[
            vec![Some(3.0), Some(-2.5)],
            vec![Some(0.1), Some(2.5)],
            vec![Some(-3.0), None],
        ]);
        let report = AnomalyScanner::default().scan_range(&matrix, 0, 99, &WindowSelection::All);
        assert_eq!(report.end, 2);
        let positions: Vec<(usize, usize)> = report.events.iter().map(|e| (e.time_index, e.window_minutes)).collect();
        assert_eq!(positions, vec![(0, 1), (0, 2), (1, 2), (2, 1)]);
        assert_eq!(report.count(Direction::Crash), 2);

        // |3.0| at (0, 1) and |-3.0| at (2, 1) tie; the earlier row wins
        let strongest = report.strongest.unwrap();
        assert_eq!((strongest.time_index, strongest.window_minutes), (0, 1));

        let empty = AnomalyScanner::default().scan_range(&matrix, 5, 9, &WindowSelection::All);
        assert!(empty.events.is_empty());
        assert!(empty.strongest.is_none());
    }

    #[test]
    fn test_window_selection_limits_scan() {
        let matrix = matrix_from_z(&[vec![Some(3.0), Some(-2.5), Some(5.0)]]);
        let report = AnomalyScanner::default().scan_range(&matrix, 0, 0, &WindowSelection::List(vec![2]));
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].window_minutes, 2);
        assert_eq!(report.cells_scanned, 1);

        let report = AnomalyScanner::new(4.0).scan_range(&matrix, 0, 0, &WindowSelection::Range(1, 3));
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].window_minutes, 3);
    }

    #[test]
    fn test_scenario_d_explain_window_beyond_history() {
        let matrix = step_matrix();
        let explanations = AnomalyScanner::default().explain(&matrix, 5, &[1, 8, 50]).unwrap();

        assert!(matches!(
            explanations[0].outcome,
            ExplanationOutcome::Classified {
                classification: Classification::Near,
                ..
            }
        ));
        for e in &explanations[1..] {
            assert_eq!(
                e.outcome,
                ExplanationOutcome::Unavailable {
                    reason: UndefinedReason::InsufficientHistory
                }
            );
        }
    }

    #[test]
    fn test_explain_classifies_and_reports_missing_baseline() {
        let matrix = step_matrix();
        let explanations = AnomalyScanner::default().explain(&matrix, 20, &[1, 50]).unwrap();
        match explanations[0].outcome {
            ExplanationOutcome::Classified {
                z_score,
                return_pct,
                classification,
            } => {
                assert!((z_score - 10.0).abs() < 1e-9);
                assert!((return_pct - 10.0).abs() < 1e-9);
                assert_eq!(classification, Classification::SignificantlyAbove);
            }
            other => panic!("expected a classified outcome, got {:?}", other),
        }
        // Window 50 is outside the matrix and wider than t
        assert_eq!(
            explanations[1].outcome,
            ExplanationOutcome::Unavailable {
                reason: UndefinedReason::InsufficientHistory
            }
        );

        let explanations = AnomalyScanner::default().explain(&matrix, 39, &[11]).unwrap();
        assert_eq!(
            explanations[0].outcome,
            ExplanationOutcome::Unavailable {
                reason: UndefinedReason::MissingBaseline
            }
        );
        assert!(AnomalyScanner::default().explain(&matrix, 40, &[1]).is_none());
    }

    #[test]
    fn test_crossing_count_is_not_a_streak() {
        // window 1: surge, calm, surge, surge, surge, undefined, surge
        let column = [Some(2.5), Some(0.0), Some(3.0), Some(4.0), Some(2.1), None, Some(9.0)];
        let matrix = matrix_from_z(&column.iter().map(|z| vec![*z]).collect::<Vec<_>>());
        let scanner = AnomalyScanner::default();

        assert_eq!(scanner.count_crossings(&matrix, 1, 0, 6, Direction::Surge), 5);
        assert_eq!(scanner.longest_run(&matrix, 1, 0, 6, Direction::Surge), 3);
        assert_eq!(scanner.count_crossings(&matrix, 1, 0, 6, Direction::Crash), 0);
        assert_eq!(scanner.longest_run(&matrix, 1, 0, 6, Direction::Crash), 0);

        assert_eq!(scanner.count_crossings(&matrix, 1, 3, 100, Direction::Surge), 3);
        assert_eq!(scanner.count_crossings(&matrix, 2, 0, 6, Direction::Surge), 0);
    }
}
