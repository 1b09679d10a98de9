//! CLI commands and handlers

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use super::report::{print_report, CrossingReport, ProbabilityReport};
use super::services::{AnalysisService, CollectorService};
use crate::domain::anomaly::{Direction, WindowSelection};
use crate::domain::movement::MoveQuery;
use crate::domain::trajectory::{TrajectoryQuery, ZSCORE_WINDOWS};
use crate::infrastructure::storage::MatrixEncoding;
use crate::shared::config::ConfigLoader;
use crate::shared::types::AppConfig;

#[derive(Parser)]
#[command(name = "volsurface")]
#[command(version, about = "Multi-window volatility profiler, z-score surface and anomaly scanner")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Kline input plus the optional overrides shared by the analysis commands
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Kline CSV (open time ms, open time UTC, ..., close in column 6)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Largest window in minutes
    #[arg(long)]
    pub max_window: Option<usize>,

    /// Minutes in the recent slice
    #[arg(long)]
    pub recent_minutes: Option<usize>,
}

/// Where the z-score surface comes from
#[derive(Args, Debug, Clone)]
pub struct SurfaceArgs {
    #[command(flatten)]
    pub history: HistoryArgs,

    /// Baseline table written by `profile`
    #[arg(short, long, default_value = "volatility_baseline.csv")]
    pub baseline: PathBuf,

    /// Read a stored matrix instead of rebuilding it
    #[arg(long)]
    pub matrix: Option<PathBuf>,

    /// Anomaly threshold in standard deviations
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the per-window return baseline from the full history
    Profile {
        #[command(flatten)]
        history: HistoryArgs,

        #[arg(short, long, default_value = "volatility_baseline.csv")]
        output: PathBuf,

        /// Minimum number of prices required
        #[arg(long)]
        min_history: Option<usize>,
    },

    /// Per-window z-scores of one price against the baseline
    Zscore {
        #[command(flatten)]
        history: HistoryArgs,

        #[arg(short, long, default_value = "volatility_baseline.csv")]
        baseline: PathBuf,

        /// Index into the full history; defaults to the latest price
        #[arg(long)]
        at: Option<usize>,

        /// Write the per-window summary CSV here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the z-score matrix over the recent slice and write it as CSV
    Matrix {
        #[command(flatten)]
        history: HistoryArgs,

        #[arg(short, long, default_value = "volatility_baseline.csv")]
        baseline: PathBuf,

        #[arg(short, long, default_value = "zscore_matrix.csv")]
        output: PathBuf,

        /// Undefined cells: `blank` or `legacy-zero`
        #[arg(long, default_value = "blank")]
        encoding: MatrixEncoding,
    },

    /// Flag every cell beyond the threshold in a row range
    Scan {
        #[command(flatten)]
        surface: SurfaceArgs,

        /// First row of the recent slice
        #[arg(long)]
        start: Option<usize>,

        /// Last row, inclusive
        #[arg(long)]
        end: Option<usize>,

        /// `all`, a range `1-240`, or a list `1,5,15`
        #[arg(short, long, default_value = "all")]
        windows: WindowSelection,

        /// Also report crossings and the longest run for this window
        #[arg(long)]
        crossings: Option<usize>,

        /// Direction for `--crossings`
        #[arg(long, default_value = "surge")]
        direction: Direction,
    },

    /// Classify one row of the matrix window by window
    Explain {
        #[command(flatten)]
        surface: SurfaceArgs,

        /// Row of the recent slice
        #[arg(long)]
        at: usize,

        /// Windows to explain; defaults to the configured key windows
        #[arg(short, long)]
        windows: Option<WindowSelection>,
    },

    /// Largest raw gain or drop in the recent slice
    Moves {
        #[command(flatten)]
        history: HistoryArgs,

        #[arg(long, default_value = "surge")]
        direction: Direction,

        #[arg(long, default_value_t = 0)]
        start: usize,

        #[arg(long)]
        end: Option<usize>,

        /// Comma-separated windows; defaults depend on the direction
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,

        /// Require the look-back price to lie inside the range
        #[arg(long)]
        anchored: Option<bool>,
    },

    /// Strided price changes, and optionally z-scores, over the recent slice
    Trajectory {
        #[command(flatten)]
        surface: SurfaceArgs,

        /// First row of the recent slice
        #[arg(long, default_value_t = 0, conflicts_with = "around")]
        start: usize,

        /// Last row, inclusive
        #[arg(long, conflicts_with = "around")]
        end: Option<usize>,

        /// Center the view on this row instead
        #[arg(long)]
        around: Option<usize>,

        /// Rows either side of `--around`
        #[arg(long, default_value_t = 360)]
        radius: usize,

        /// Rows between points
        #[arg(long, default_value_t = 60)]
        stride: usize,

        /// Comma-separated price change windows
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,

        /// Also read the z-score surface at the same rows
        #[arg(long)]
        zscores: bool,

        /// Comma-separated z-score windows
        #[arg(long, value_delimiter = ',')]
        zscore_windows: Option<Vec<usize>>,
    },

    /// Normal tail probabilities of a z-score
    Probability {
        #[arg(allow_hyphen_values = true)]
        z: f64,
    },

    /// Poll the exchange product list on a fixed interval
    Collect {
        /// Seconds between cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Load configuration and run the selected command
    pub async fn run(cli: Cli) -> Result<()> {
        let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
        Self::execute(cli.command, config, cli.json).await
    }

    /// Execute the selected command
    pub async fn execute(command: Commands, mut config: AppConfig, json: bool) -> Result<()> {
        match command {
            Commands::Profile {
                history,
                output,
                min_history,
            } => {
                apply_history(&mut config, &history);
                if let Some(min_history) = min_history {
                    config.analysis.min_history = min_history;
                }
                ConfigLoader::validate(&config)?;
                let service = AnalysisService::new(config.analysis);
                print_report(&service.profile(&history.input, &output)?, json)
            }
            Commands::Zscore {
                history,
                baseline,
                at,
                output,
            } => {
                if let Some(max_window) = history.max_window {
                    config.analysis.snapshot_max_window = max_window;
                }
                ConfigLoader::validate(&config)?;
                let service = AnalysisService::new(config.analysis);
                let report = service.snapshot(&history.input, &baseline, at, output.as_deref())?;
                print_report(&report, json)
            }
            Commands::Matrix {
                history,
                baseline,
                output,
                encoding,
            } => {
                apply_history(&mut config, &history);
                ConfigLoader::validate(&config)?;
                let service = AnalysisService::new(config.analysis);
                print_report(&service.write_matrix(&history.input, &baseline, &output, encoding)?, json)
            }
            Commands::Scan {
                surface,
                start,
                end,
                windows,
                crossings,
                direction,
            } => {
                let service = surface_service(&mut config, &surface)?;
                let loaded = load_surface(&service, &surface)?;
                print_report(&service.scan(&loaded, start, end, &windows), json)?;
                if let Some(window) = crossings {
                    let (count, run) = service.crossings(
                        &loaded,
                        window,
                        start.unwrap_or(0),
                        end.unwrap_or(usize::MAX),
                        direction,
                    );
                    let report = CrossingReport {
                        window_minutes: window,
                        direction,
                        threshold: service.config().threshold,
                        crossings: count,
                        longest_run: run,
                    };
                    print_report(&report, json)?;
                }
                Ok(())
            }
            Commands::Explain { surface, at, windows } => {
                let service = surface_service(&mut config, &surface)?;
                let loaded = load_surface(&service, &surface)?;
                let windows = match windows {
                    Some(WindowSelection::List(list)) => list,
                    Some(selection) => selection.resolve(loaded.matrix.max_window()),
                    None => service.config().key_windows.clone(),
                };
                print_report(&service.explain(&loaded, at, &windows)?, json)
            }
            Commands::Moves {
                history,
                direction,
                start,
                end,
                windows,
                anchored,
            } => {
                apply_history(&mut config, &history);
                let end = end.unwrap_or(usize::MAX);
                let mut query = match direction {
                    Direction::Surge => MoveQuery::gains(start, end),
                    Direction::Crash => MoveQuery::drops(start, end),
                };
                if let Some(windows) = windows {
                    query = query.with_windows(windows);
                }
                if let Some(anchored) = anchored {
                    query.anchor_within_range = anchored;
                }
                ConfigLoader::validate(&config)?;
                let service = AnalysisService::new(config.analysis);
                print_report(&service.moves(&history.input, query)?, json)
            }
            Commands::Trajectory {
                surface,
                start,
                end,
                around,
                radius,
                stride,
                windows,
                zscores,
                zscore_windows,
            } => {
                let service = surface_service(&mut config, &surface)?;
                let mut query = match around {
                    Some(center) => TrajectoryQuery::around(center, radius, stride),
                    None => TrajectoryQuery::new(start, end.unwrap_or(usize::MAX), stride),
                };
                if let Some(windows) = windows {
                    query = query.with_windows(windows);
                }
                let zscore_windows = zscore_windows.unwrap_or_else(|| ZSCORE_WINDOWS.to_vec());
                let report = if zscores {
                    let loaded = load_surface(&service, &surface)?;
                    service.trajectory(&loaded.recent, Some(&loaded.matrix), &query, &zscore_windows)
                } else {
                    let recent = service.recent_series(&surface.history.input)?;
                    service.trajectory(&recent, None, &query, &zscore_windows)
                };
                print_report(&report, json)
            }
            Commands::Probability { z } => print_report(&ProbabilityReport::from(z), json),
            Commands::Collect {
                interval,
                max_cycles,
                once,
            } => {
                if let Some(interval) = interval {
                    config.collector.interval_secs = interval.max(1);
                }
                ConfigLoader::validate(&config)?;
                let service = CollectorService::new(config.collector);
                let max_cycles = if once { Some(1) } else { max_cycles };
                let summary = service.run(max_cycles).await?;
                info!(
                    "Collector stopped after {} cycles ({} ticks skipped)",
                    summary.cycles, summary.skipped_ticks
                );
                Ok(())
            }
        }
    }
}

fn apply_history(config: &mut AppConfig, history: &HistoryArgs) {
    if let Some(max_window) = history.max_window {
        config.analysis.max_window = max_window;
    }
    if let Some(recent_minutes) = history.recent_minutes {
        config.analysis.recent_minutes = recent_minutes;
    }
}

/// Apply the surface overrides and validate the result
fn surface_service(config: &mut AppConfig, surface: &SurfaceArgs) -> Result<AnalysisService> {
    apply_history(config, &surface.history);
    if let Some(threshold) = surface.threshold {
        config.analysis.threshold = threshold;
    }
    ConfigLoader::validate(config)?;
    Ok(AnalysisService::new(config.analysis.clone()))
}

fn load_surface(service: &AnalysisService, surface: &SurfaceArgs) -> Result<super::services::RecentSurface> {
    service.load_surface(&surface.history.input, &surface.baseline, surface.matrix.as_deref())
}
