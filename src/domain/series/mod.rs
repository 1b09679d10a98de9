//! Price series domain - ordered closing prices with timestamps

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::errors::SeriesError;
use crate::shared::utils::pct_return;

/// Single closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// Immutable, time-ordered sequence of closing prices. Index 0 is the oldest.
///
/// Timestamps and closes are kept in separate vectors so the hot loops in the
/// profiler and matrix builder walk a plain `&[f64]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    timestamps: Vec<DateTime<Utc>>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series, checking ordering and that every close is finite
    pub fn new(points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        let mut timestamps = Vec::with_capacity(points.len());
        let mut closes = Vec::with_capacity(points.len());

        for (index, point) in points.into_iter().enumerate() {
            if !point.close.is_finite() {
                return Err(SeriesError::InvalidPrice { index });
            }
            if let Some(prev) = timestamps.last() {
                if point.timestamp < *prev {
                    return Err(SeriesError::OutOfOrder { index });
                }
            }
            timestamps.push(point.timestamp);
            closes.push(point.close);
        }

        Ok(Self { timestamps, closes })
    }

    /// Series of closes stamped one minute apart starting at the Unix epoch
    pub fn from_closes(closes: Vec<f64>) -> Result<Self, SeriesError> {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let points = closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| PricePoint::new(start + Duration::minutes(i as i64), close))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.closes.get(index).copied()
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(index).copied()
    }

    pub fn point(&self, index: usize) -> Option<PricePoint> {
        Some(PricePoint::new(self.timestamp(index)?, self.close(index)?))
    }

    pub fn latest(&self) -> Option<PricePoint> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }

    /// Percentage return at `index` over `window` minutes, if both prices exist
    /// and the look-back price is non-zero
    pub fn return_pct(&self, index: usize, window: usize) -> Option<f64> {
        let base_index = index.checked_sub(window)?;
        pct_return(self.close(base_index)?, self.close(index)?)
    }

    /// Fail with a descriptive error unless the series has at least `required` points
    pub fn require_len(&self, required: usize) -> Result<(), SeriesError> {
        if self.len() < required {
            return Err(SeriesError::InsufficientHistory {
                required,
                actual: self.len(),
            });
        }
        Ok(())
    }

    /// Copy of the points in `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self, SeriesError> {
        if start > end || end > self.len() {
            return Err(SeriesError::SliceOutOfBounds {
                start,
                end,
                len: self.len(),
            });
        }
        Ok(Self {
            timestamps: self.timestamps[start..end].to_vec(),
            closes: self.closes[start..end].to_vec(),
        })
    }

    /// The most recent `n` points (all of them if the series is shorter)
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            timestamps: self.timestamps[start..].to_vec(),
            closes: self.closes[start..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_series_rejects_out_of_order_timestamps() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = PriceSeries::new(vec![PricePoint::new(t0, 1.0), PricePoint::new(t1, 2.0)]).unwrap_err();
        assert_eq!(err, SeriesError::OutOfOrder { index: 1 });
    }

    #[test]
    fn test_series_accepts_equal_timestamps() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = PriceSeries::new(vec![PricePoint::new(t0, 1.0), PricePoint::new(t0, 2.0)]).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_series_rejects_non_finite_close() {
        let err = PriceSeries::from_closes(vec![1.0, f64::NAN]).unwrap_err();
        assert_eq!(err, SeriesError::InvalidPrice { index: 1 });
    }

    #[test]
    fn test_from_closes_spaces_points_one_minute_apart() {
        let series = PriceSeries::from_closes(vec![100.0, 101.0, 99.0]).unwrap();
        let gap = series.timestamp(2).unwrap() - series.timestamp(1).unwrap();
        assert_eq!(gap, Duration::minutes(1));
        assert_eq!(series.latest().unwrap().close, 99.0);
    }

    #[test]
    fn test_return_pct_requires_lookback() {
        let series = PriceSeries::from_closes(vec![100.0, 101.0, 99.0, 100.0]).unwrap();
        assert!((series.return_pct(1, 1).unwrap() - 1.0).abs() < 1e-12);
        assert!((series.return_pct(3, 3).unwrap() - 0.0).abs() < 1e-12);
        assert_eq!(series.return_pct(2, 3), None);
        assert_eq!(series.return_pct(10, 1), None);
    }

    #[test]
    fn test_require_len() {
        let series = PriceSeries::from_closes(vec![1.0; 5]).unwrap();
        assert!(series.require_len(5).is_ok());
        assert_eq!(
            series.require_len(6).unwrap_err(),
            SeriesError::InsufficientHistory { required: 6, actual: 5 }
        );
    }

    #[test]
    fn test_tail_and_slice() {
        let series = PriceSeries::from_closes(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(series.tail(2).closes(), &[4.0, 5.0]);
        assert_eq!(series.tail(10).len(), 5);
        assert_eq!(series.slice(1, 3).unwrap().closes(), &[2.0, 3.0]);
        assert!(series.slice(3, 6).is_err());
        // the tail keeps the original timestamps
        assert_eq!(series.tail(2).timestamp(0), series.timestamp(3));
    }
}
