//! Full-history return profiling across every lookback window

use rayon::prelude::*;
use tracing::{debug, info};

use super::{BaselineTable, WindowStat};
use crate::domain::series::PriceSeries;
use crate::shared::errors::SeriesError;
use crate::shared::utils::{mean_and_sample_std, pct_return, ProgressTracker};

/// Computes the baseline return distribution for windows `1..=max_window`
#[derive(Debug, Clone, Copy)]
pub struct VolatilityProfiler {
    max_window: usize,
}

impl VolatilityProfiler {
    pub fn new(max_window: usize) -> Self {
        Self { max_window }
    }

    pub fn max_window(&self) -> usize {
        self.max_window
    }

    /// Profile every window `w = 1..=min(max_window, len - 1)`.
    ///
    /// Windows are independent and run on the rayon pool; the merge into the
    /// table is keyed by window so the result does not depend on scheduling.
    pub fn profile(&self, series: &PriceSeries) -> Result<BaselineTable, SeriesError> {
        series.require_len(2)?;

        let closes = series.closes();
        let upper = self.max_window.min(closes.len() - 1);
        info!(
            "Profiling windows 1..={} over {} prices",
            upper,
            closes.len()
        );

        let progress = ProgressTracker::new("Volatility profile", upper, 100);
        let stats: Vec<WindowStat> = (1..=upper)
            .into_par_iter()
            .filter_map(|window| {
                let stat = Self::profile_window(closes, window);
                progress.tick();
                stat
            })
            .collect();

        let table: BaselineTable = stats.into_iter().collect();
        info!("Profiled {} windows", table.len());
        Ok(table)
    }

    /// Baseline for a single window, or `None` when no valid sample exists
    pub fn profile_window(closes: &[f64], window: usize) -> Option<WindowStat> {
        if window == 0 || window >= closes.len() {
            return None;
        }

        let returns: Vec<f64> = (window..closes.len())
            .filter_map(|t| pct_return(closes[t - window], closes[t]))
            .collect();

        let excluded = (closes.len() - window) - returns.len();
        if excluded > 0 {
            debug!("Window {}: excluded {} samples with a zero base price", window, excluded);
        }

        let (mean, std_dev) = mean_and_sample_std(&returns)?;
        let stat = WindowStat {
            window_minutes: window,
            mean_return_pct: mean,
            std_dev_return_pct: std_dev,
            sample_count: returns.len(),
        };

        if window <= 10 || (window <= 100 && window % 10 == 0) || window % 100 == 0 {
            debug!(
                "Window {} min ({:.4} d): std = {:.6}%, samples = {}",
                window,
                stat.window_days(),
                stat.std_dev_return_pct,
                stat.sample_count
            );
        }
        Some(stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_form_sample_std(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)).sqrt()
    }

    #[test]
    fn test_scenario_a_window_one() {
        let series = PriceSeries::from_closes(vec![100.0, 101.0, 99.0, 100.0]).unwrap();
        let table = VolatilityProfiler::new(10).profile(&series).unwrap();

        let returns = [1.0, -1.980198019801980, 1.010101010101010];
        let stat = table.get(1).unwrap();
        assert_eq!(stat.sample_count, 3);
        assert!((stat.mean_return_pct - 0.0099677).abs() < 1e-6);
        assert!((stat.std_dev_return_pct - closed_form_sample_std(&returns)).abs() < 1e-9);
        assert!((stat.std_dev_return_pct - 1.723541).abs() < 1e-6);
    }

    #[test]
    fn test_windows_capped_at_series_length_minus_one() {
        let series = PriceSeries::from_closes(vec![100.0, 101.0, 99.0, 100.0]).unwrap();
        let table = VolatilityProfiler::new(10).profile(&series).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.max_window(), Some(3));

        // window 3 has a single sample: its own mean, zero spread
        let last = table.get(3).unwrap();
        assert_eq!(last.sample_count, 1);
        assert!((last.mean_return_pct - 0.0).abs() < 1e-12);
        assert_eq!(last.std_dev_return_pct, 0.0);
    }

    #[test]
    fn test_scenario_b_constant_series() {
        let series = PriceSeries::from_closes(vec![100.0; 20]).unwrap();
        let table = VolatilityProfiler::new(5).profile(&series).unwrap();
        let stat = table.get(1).unwrap();
        assert_eq!(stat.mean_return_pct, 0.0);
        assert_eq!(stat.std_dev_return_pct, 0.0);
        assert_eq!(stat.sample_count, 19);
    }

    #[test]
    fn test_sample_std_matches_textbook_for_every_window() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.01)
            .collect();
        let series = PriceSeries::from_closes(closes.clone()).unwrap();
        let table = VolatilityProfiler::new(50).profile(&series).unwrap();
        assert_eq!(table.len(), 50);

        for stat in table.iter() {
            let w = stat.window_minutes;
            let returns: Vec<f64> = (w..closes.len())
                .map(|t| (closes[t] - closes[t - w]) / closes[t - w] * 100.0)
                .collect();
            assert_eq!(stat.sample_count, returns.len());
            assert!(stat.std_dev_return_pct >= 0.0);
            assert!((stat.std_dev_return_pct - closed_form_sample_std(&returns)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_profiling_is_idempotent() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + ((i * 7) % 13) as f64).collect();
        let series = PriceSeries::from_closes(closes).unwrap();
        let profiler = VolatilityProfiler::new(60);
        assert_eq!(profiler.profile(&series).unwrap(), profiler.profile(&series).unwrap());
    }

    #[test]
    fn test_zero_base_price_is_excluded_not_propagated() {
        let series = PriceSeries::from_closes(vec![0.0, 100.0, 101.0, 102.0]).unwrap();
        let table = VolatilityProfiler::new(3).profile(&series).unwrap();

        // window 1 loses the 0 -> 100 sample
        let w1 = table.get(1).unwrap();
        assert_eq!(w1.sample_count, 2);
        assert!(w1.mean_return_pct.is_finite());
        assert!(w1.std_dev_return_pct.is_finite());

        // window 3 has only the excluded sample, so it is skipped
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_short_series_is_rejected() {
        let series = PriceSeries::from_closes(vec![100.0]).unwrap();
        assert_eq!(
            VolatilityProfiler::new(5).profile(&series).unwrap_err(),
            SeriesError::InsufficientHistory { required: 2, actual: 1 }
        );
    }
}
