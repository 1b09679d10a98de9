//! Standard-normal tail probabilities of a z-score

use serde::Serialize;
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// How likely a reading at least this extreme is under a normal baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TailProbability {
    pub z_score: f64,
    /// `P(Z <= z)`
    pub cumulative: f64,
    /// `P(|Z| >= |z|)`
    pub two_tailed: f64,
}

impl TailProbability {
    pub fn of(z_score: f64) -> Self {
        let abs = z_score.abs();
        Self {
            z_score,
            cumulative: normal_cdf(z_score),
            two_tailed: erfc(abs / SQRT_2),
        }
    }
}

/// Standard normal CDF
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.959964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.959964) - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_tail_probability_is_symmetric() {
        let low = TailProbability::of(-2.5432);
        let high = TailProbability::of(2.5432);
        assert!((low.two_tailed - high.two_tailed).abs() < 1e-12);
        assert!((low.cumulative + high.cumulative - 1.0).abs() < 1e-12);
        // P(Z <= -2.5432) is roughly 0.55%
        assert!((low.cumulative - 0.00549).abs() < 1e-4);
        assert!((low.two_tailed - 2.0 * low.cumulative).abs() < 1e-12);
    }
}
