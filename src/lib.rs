//! volsurface - multi-window volatility baselines, z-score surfaces and
//! anomaly scanning over minute-bar price history

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use domain::anomaly::{AnomalyScanner, Direction};
pub use domain::series::{PricePoint, PriceSeries};
pub use domain::volatility::{BaselineTable, VolatilityProfiler};
pub use domain::zscore::{ZScoreMatrix, ZScoreMatrixBuilder};
