//! Application services and use cases

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::report::{
    ExplainReport, MatrixReport, MoveReport, ProfileReport, ScanSummary, SnapshotReport, TimedEvent,
    TrajectoryReport,
};
use crate::domain::anomaly::{AnomalyScanner, Direction, WindowSelection};
use crate::domain::movement::{largest_move, MoveQuery};
use crate::domain::series::PriceSeries;
use crate::domain::trajectory::{price_trajectory, zscore_trajectory, TrajectoryQuery};
use crate::domain::volatility::{BaselineTable, VolatilityProfiler};
use crate::domain::zscore::{ZScoreMatrix, ZScoreMatrixBuilder, ZScoreSnapshot};
use crate::infrastructure::collector::{
    BinanceProductClient, CollectorScheduler, Credentials, JsonLinesSink, OptionType, ProductQuery, RunSummary,
};
use crate::infrastructure::storage::{self, MatrixEncoding};
use crate::shared::types::{AnalysisConfig, CollectorConfig};

/// Recent price slice together with the surface built over it
pub struct RecentSurface {
    pub recent: PriceSeries,
    pub matrix: ZScoreMatrix,
}

/// Batch analysis over a kline history
pub struct AnalysisService {
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load klines and require at least `min_len` prices
    fn load_history(&self, input: &Path, min_len: usize) -> Result<(PriceSeries, usize)> {
        let load = storage::load_klines(input).with_context(|| format!("loading klines from {}", input.display()))?;
        load.series
            .require_len(min_len)
            .with_context(|| format!("{} does not hold enough history", input.display()))?;
        Ok((load.series, load.skipped))
    }

    /// The last `recent_minutes` prices. A shorter history is an error so
    /// row indices always count from the same minute.
    pub fn recent_series(&self, input: &Path) -> Result<PriceSeries> {
        let (series, _) = self.load_history(input, self.config.recent_minutes.max(2))?;
        Ok(series.tail(self.config.recent_minutes))
    }

    fn load_baseline(&self, baseline: &Path) -> Result<BaselineTable> {
        let table = storage::load_baseline(baseline)
            .with_context(|| format!("loading baseline from {}", baseline.display()))?;
        anyhow::ensure!(!table.is_empty(), "baseline {} has no usable rows", baseline.display());
        Ok(table)
    }

    /// Profile the full history and write the baseline table
    pub fn profile(&self, input: &Path, output: &Path) -> Result<ProfileReport> {
        let (series, skipped_rows) = self.load_history(input, self.config.min_history.max(2))?;
        info!("📊 Profiling {} prices up to {} minute windows", series.len(), self.config.max_window);

        let table = VolatilityProfiler::new(self.config.max_window)
            .profile(&series)
            .context("profiling volatility")?;
        storage::save_baseline(&table, output).with_context(|| format!("writing {}", output.display()))?;

        Ok(ProfileReport {
            input: input.display().to_string(),
            output: output.display().to_string(),
            prices: series.len(),
            skipped_rows,
            windows: table.len(),
            key_windows: self
                .config
                .key_windows
                .iter()
                .filter_map(|w| table.get(*w).copied())
                .collect(),
        })
    }

    /// Per-window z-scores of one price (the latest by default)
    pub fn snapshot(
        &self,
        input: &Path,
        baseline: &Path,
        at: Option<usize>,
        output: Option<&Path>,
    ) -> Result<SnapshotReport> {
        let (series, _) = self.load_history(input, 2)?;
        let table = self.load_baseline(baseline)?;
        let time_index = at.unwrap_or(series.len() - 1);

        let snapshot = ZScoreSnapshot::at(&series, time_index, &table, self.config.snapshot_max_window)
            .with_context(|| format!("time index {} is outside a series of {}", time_index, series.len()))?;
        if let Some(output) = output {
            storage::save_snapshot(&snapshot, output).with_context(|| format!("writing {}", output.display()))?;
        }

        Ok(SnapshotReport {
            timestamp: series.timestamp(time_index),
            key_windows: self
                .config
                .key_windows
                .iter()
                .filter_map(|w| snapshot.get(*w).copied())
                .collect(),
            max: snapshot.max().copied(),
            min: snapshot.min().copied(),
            snapshot,
        })
    }

    /// Build the surface over the recent slice from a stored baseline
    pub fn build_surface(&self, input: &Path, baseline: &Path) -> Result<RecentSurface> {
        let recent = self.recent_series(input)?;
        let table = self.load_baseline(baseline)?;
        let matrix = ZScoreMatrixBuilder::new(&table)
            .with_max_window(self.config.max_window.min(table.max_window().unwrap_or(0)))
            .build(&recent);
        Ok(RecentSurface { recent, matrix })
    }

    /// Use a stored matrix when given, otherwise rebuild it from the baseline
    pub fn load_surface(&self, input: &Path, baseline: &Path, matrix: Option<&Path>) -> Result<RecentSurface> {
        match matrix {
            Some(path) => {
                let recent = self.recent_series(input)?;
                let matrix = storage::load_matrix(path, &recent)
                    .with_context(|| format!("loading matrix from {}", path.display()))?;
                Ok(RecentSurface { recent, matrix })
            }
            None => self.build_surface(input, baseline),
        }
    }

    pub fn write_matrix(
        &self,
        input: &Path,
        baseline: &Path,
        output: &Path,
        encoding: MatrixEncoding,
    ) -> Result<MatrixReport> {
        let surface = self.build_surface(input, baseline)?;
        storage::save_matrix(&surface.matrix, encoding, output).with_context(|| format!("writing {}", output.display()))?;
        Ok(MatrixReport {
            output: output.display().to_string(),
            rows: surface.matrix.rows(),
            max_window: surface.matrix.max_window(),
            defined_cells: surface.matrix.defined_count(),
            from: surface.recent.timestamp(0),
            to: surface.recent.latest().map(|p| p.timestamp),
        })
    }

    pub fn scan(
        &self,
        surface: &RecentSurface,
        start: Option<usize>,
        end: Option<usize>,
        selection: &WindowSelection,
    ) -> ScanSummary {
        let scanner = AnomalyScanner::new(self.config.threshold);
        let report = scanner.scan_range(
            &surface.matrix,
            start.unwrap_or(0),
            end.unwrap_or(usize::MAX),
            selection,
        );
        let timed = |e: &crate::domain::anomaly::AnomalyEvent| TimedEvent {
            timestamp: surface.recent.timestamp(e.time_index),
            price: surface.recent.close(e.time_index),
            event: *e,
        };
        ScanSummary {
            events: report.events.iter().map(timed).collect(),
            strongest: report.strongest.as_ref().map(timed),
            report,
        }
    }

    pub fn explain(&self, surface: &RecentSurface, time_index: usize, windows: &[usize]) -> Result<ExplainReport> {
        let scanner = AnomalyScanner::new(self.config.threshold);
        let explanations = scanner
            .explain(&surface.matrix, time_index, windows)
            .with_context(|| format!("time index {} is outside a matrix of {} rows", time_index, surface.matrix.rows()))?;
        Ok(ExplainReport {
            time_index,
            timestamp: surface.recent.timestamp(time_index),
            price: surface.recent.close(time_index),
            explanations,
        })
    }

    /// Crossing count and longest run for one window
    pub fn crossings(
        &self,
        surface: &RecentSurface,
        window: usize,
        start: usize,
        end: usize,
        direction: Direction,
    ) -> (usize, usize) {
        let scanner = AnomalyScanner::new(self.config.threshold);
        (
            scanner.count_crossings(&surface.matrix, window, start, end, direction),
            scanner.longest_run(&surface.matrix, window, start, end, direction),
        )
    }

    /// Largest gain or drop in the recent slice
    pub fn moves(&self, input: &Path, query: MoveQuery) -> Result<MoveReport> {
        let recent = self.recent_series(input)?;
        let found = largest_move(&recent, &query);
        Ok(MoveReport {
            direction: query.direction,
            start: query.start,
            end: query.end.min(recent.len().saturating_sub(1)),
            timestamp: found.and_then(|m| recent.timestamp(m.time_index)),
            found,
        })
    }

    /// Strided price changes over the recent slice, plus matrix readings at
    /// the same rows when a surface is given
    pub fn trajectory(
        &self,
        recent: &PriceSeries,
        matrix: Option<&ZScoreMatrix>,
        query: &TrajectoryQuery,
        zscore_windows: &[usize],
    ) -> TrajectoryReport {
        let end = query.end.min(recent.len().saturating_sub(1));
        TrajectoryReport {
            start: query.start,
            end,
            stride: query.stride.max(1),
            price_windows: query.windows.clone(),
            zscore_windows: matrix.map(|_| zscore_windows.to_vec()).unwrap_or_default(),
            prices: price_trajectory(recent, query),
            zscores: matrix
                .map(|m| zscore_trajectory(m, query, zscore_windows))
                .unwrap_or_default(),
        }
    }
}

/// Queries for every configured coin and option type
pub fn collector_queries(config: &CollectorConfig) -> Result<Vec<ProductQuery>> {
    let option_types = config
        .option_types
        .iter()
        .map(|t| t.parse::<OptionType>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;
    Ok(config
        .coins
        .iter()
        .flat_map(|coin| {
            option_types.iter().map(move |option_type| ProductQuery {
                coin: coin.clone(),
                option_type: *option_type,
                quote_coin: config.quote_coin.clone(),
            })
        })
        .collect())
}

/// Wires credentials, client, rotating sink and scheduler together
pub struct CollectorService {
    config: CollectorConfig,
}

impl CollectorService {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    fn scheduler(&self) -> Result<CollectorScheduler> {
        let credentials = Credentials::from_env().context("collector credentials")?;
        let client = BinanceProductClient::new(&self.config, credentials).context("building HTTP client")?;
        let sink = JsonLinesSink::daily(&self.config.log_dir, &self.config.log_file_prefix)
            .with_context(|| format!("opening product log in {}", self.config.log_dir))?;
        Ok(CollectorScheduler::new(
            Arc::new(client),
            Box::new(sink),
            collector_queries(&self.config)?,
            Duration::from_secs(self.config.interval_secs),
        ))
    }

    /// Poll until Ctrl-C, or until `max_cycles` cycles have run
    pub async fn run(&self, max_cycles: Option<usize>) -> Result<RunSummary> {
        let scheduler = self.scheduler()?;
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        Ok(scheduler.run(shutdown, max_cycles).await)
    }
}
