//! Domain layer - price series, baselines, z-score surfaces and anomaly logic

pub mod anomaly;
pub mod movement;
pub mod series;
pub mod trajectory;
pub mod volatility;
pub mod zscore;
