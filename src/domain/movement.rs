//! Largest raw price moves inside an index range

use serde::Serialize;

use crate::domain::anomaly::Direction;
use crate::domain::series::PriceSeries;
use crate::shared::utils::pct_return;

/// Windows checked when looking for the largest gain (1h, 4h, 1d)
pub const GAIN_WINDOWS: [usize; 3] = [60, 240, 1440];
/// Windows checked when looking for the largest drop (10m to 6h)
pub const DROP_WINDOWS: [usize; 5] = [10, 30, 60, 120, 360];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceMove {
    pub time_index: usize,
    pub window_minutes: usize,
    pub from_price: f64,
    pub to_price: f64,
    /// Signed percentage change from `from_price` to `to_price`
    pub change_pct: f64,
}

/// Search parameters for [`largest_move`]
#[derive(Debug, Clone)]
pub struct MoveQuery {
    pub direction: Direction,
    pub windows: Vec<usize>,
    pub start: usize,
    pub end: usize,
    /// Require the look-back price to lie inside `start..=end` as well
    pub anchor_within_range: bool,
}

impl MoveQuery {
    pub fn gains(start: usize, end: usize) -> Self {
        Self {
            direction: Direction::Surge,
            windows: GAIN_WINDOWS.to_vec(),
            start,
            end,
            anchor_within_range: false,
        }
    }

    pub fn drops(start: usize, end: usize) -> Self {
        Self {
            direction: Direction::Crash,
            windows: DROP_WINDOWS.to_vec(),
            start,
            end,
            anchor_within_range: true,
        }
    }

    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.windows = windows;
        self
    }
}

/// Largest strictly positive gain or drop ending at an index in
/// `start..=end` (clamped to the series). The first index and window reaching
/// the maximum win ties. `None` when no move in the requested direction exists.
pub fn largest_move(series: &PriceSeries, query: &MoveQuery) -> Option<PriceMove> {
    let last = series.len().checked_sub(1)?;
    let end = query.end.min(last);
    let closes = series.closes();
    let mut best: Option<PriceMove> = None;

    for t in query.start..=end {
        for &window in &query.windows {
            if window == 0 || t < window {
                continue;
            }
            let anchor = t - window;
            if query.anchor_within_range && anchor < query.start {
                continue;
            }
            let Some(change_pct) = pct_return(closes[anchor], closes[t]) else {
                continue;
            };
            let magnitude = match query.direction {
                Direction::Surge => change_pct,
                Direction::Crash => -change_pct,
            };
            let best_magnitude = best.map_or(0.0, |m| match query.direction {
                Direction::Surge => m.change_pct,
                Direction::Crash => -m.change_pct,
            });
            if magnitude > best_magnitude {
                best = Some(PriceMove {
                    time_index: t,
                    window_minutes: window,
                    from_price: closes[anchor],
                    to_price: closes[t],
                    change_pct,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> PriceSeries {
        // 100 flat, rally to 120, slide to 90
        PriceSeries::from_closes(vec![100.0, 100.0, 110.0, 120.0, 115.0, 100.0, 90.0, 95.0]).unwrap()
    }

    #[test]
    fn test_largest_gain() {
        let query = MoveQuery::gains(0, 7).with_windows(vec![1, 2]);
        let m = largest_move(&series(), &query).unwrap();
        assert_eq!((m.time_index, m.window_minutes), (3, 2));
        assert_eq!((m.from_price, m.to_price), (100.0, 120.0));
        assert!((m.change_pct - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_largest_drop_respects_anchor() {
        let query = MoveQuery::drops(0, 7).with_windows(vec![3]);
        let m = largest_move(&series(), &query).unwrap();
        // 120 -> 90
        assert_eq!((m.time_index, m.window_minutes), (6, 3));
        assert!((m.change_pct + 25.0).abs() < 1e-12);

        // Anchors before index 5 are excluded, leaving 100 -> 90
        let anchored = MoveQuery::drops(5, 7).with_windows(vec![1, 3]);
        let m = largest_move(&series(), &anchored).unwrap();
        assert_eq!((m.time_index, m.window_minutes), (6, 1));
        assert!((m.change_pct + 10.0).abs() < 1e-12);

        let mut unanchored = anchored.clone();
        unanchored.anchor_within_range = false;
        let m = largest_move(&series(), &unanchored).unwrap();
        assert_eq!((m.time_index, m.window_minutes), (6, 3));
    }

    #[test]
    fn test_no_move_in_direction() {
        let rising = PriceSeries::from_closes(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(largest_move(&rising, &MoveQuery::drops(0, 3).with_windows(vec![1])).is_none());
        assert!(largest_move(&rising, &MoveQuery::gains(0, 3)).is_none());
    }
}
