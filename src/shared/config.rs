use std::fs;
use std::path::Path;
use tracing::info;

use crate::infrastructure::collector::OptionType;
use crate::shared::errors::AppError;
use crate::shared::types::AppConfig;

/// Loads the TOML configuration file
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file; missing sections fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AppConfig, AppError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config = Self::parse_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn parse_str(content: &str) -> Result<AppConfig, AppError> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, AppError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn validate(config: &AppConfig) -> Result<(), AppError> {
        let analysis = &config.analysis;
        if analysis.max_window == 0 {
            return Err(AppError::ConfigError("analysis.max_window must be at least 1".to_string()));
        }
        if !(analysis.threshold.is_finite() && analysis.threshold > 0.0) {
            return Err(AppError::ConfigError(
                "analysis.threshold must be a positive number".to_string(),
            ));
        }
        if analysis.recent_minutes == 0 {
            return Err(AppError::ConfigError("analysis.recent_minutes must be at least 1".to_string()));
        }
        if analysis.snapshot_max_window == 0 {
            return Err(AppError::ConfigError(
                "analysis.snapshot_max_window must be at least 1".to_string(),
            ));
        }
        if analysis.min_history < 2 {
            return Err(AppError::ConfigError("analysis.min_history must be at least 2".to_string()));
        }

        let collector = &config.collector;
        if collector.interval_secs == 0 {
            return Err(AppError::ConfigError("collector.interval_secs must be at least 1".to_string()));
        }
        if collector.page_size == 0 {
            return Err(AppError::ConfigError("collector.page_size must be at least 1".to_string()));
        }
        for option_type in &collector.option_types {
            option_type
                .parse::<OptionType>()
                .map_err(|e| AppError::ConfigError(format!("collector.option_types: {}", e)))?;
        }
        Ok(())
    }
}
