//! Common configuration types used across the application

use serde::{Deserialize, Serialize};

/// Seven days of minute bars
pub const WEEK_MINUTES: usize = 1440 * 7;

/// Batch analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Largest window profiled for the baseline table
    pub max_window: usize,
    /// Length of the recent slice the matrix is built over
    pub recent_minutes: usize,
    /// Minimum number of prices a run requires before doing anything
    pub min_history: usize,
    /// Largest window in the single-point z-score summary
    pub snapshot_max_window: usize,
    /// Anomaly magnitude threshold
    pub threshold: f64,
    /// Windows shown in point explanations and key-window summaries
    pub key_windows: Vec<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_window: WEEK_MINUTES,
            recent_minutes: WEEK_MINUTES,
            min_history: WEEK_MINUTES,
            snapshot_max_window: 1440,
            threshold: 2.0,
            key_windows: vec![1, 5, 15, 30, 60, 240, 1440],
        }
    }
}

/// Exchange product-list collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub endpoint: String,
    pub interval_secs: u64,
    pub coins: Vec<String>,
    pub option_types: Vec<String>,
    pub quote_coin: String,
    pub page_size: u32,
    pub recv_window_ms: u64,
    pub request_timeout_secs: u64,
    /// Directory for the rotating product log
    pub log_dir: String,
    pub log_file_prefix: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.binance.com/sapi/v1/dci/product/list".to_string(),
            interval_secs: 5,
            coins: vec!["BTC".to_string(), "ETH".to_string(), "WBETH".to_string()],
            option_types: vec!["PUT".to_string(), "CALL".to_string()],
            quote_coin: "USDT".to_string(),
            page_size: 100,
            recv_window_ms: 5000,
            request_timeout_secs: 10,
            log_dir: "logs".to_string(),
            log_file_prefix: "dci_products.log".to_string(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub collector: CollectorConfig,
}
