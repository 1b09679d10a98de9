//! Printable command results: plain text by default, JSON on request

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

use crate::domain::anomaly::{AnomalyEvent, Classification, Direction, Explanation, ExplanationOutcome, ScanReport, TailProbability};
use crate::domain::movement::PriceMove;
use crate::domain::trajectory::{PriceStep, ZScoreStep};
use crate::domain::volatility::WindowStat;
use crate::domain::zscore::{CellState, WindowZScore, ZScoreSnapshot};
use crate::shared::utils::window_days;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait Report: Serialize {
    fn render_text(&self) -> String;
}

/// Print `report` to stdout
pub fn print_report<R: Report>(report: &R, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn fmt_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(|| "-".to_string(), |t| t.format(TIME_FORMAT).to_string())
}

fn fmt_window(window_minutes: usize) -> String {
    if window_minutes % 1440 == 0 {
        format!("{}m ({}d)", window_minutes, window_minutes / 1440)
    } else if window_minutes % 60 == 0 {
        format!("{}m ({}h)", window_minutes, window_minutes / 60)
    } else {
        format!("{}m", window_minutes)
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileReport {
    pub input: String,
    pub output: String,
    pub prices: usize,
    pub skipped_rows: usize,
    pub windows: usize,
    pub key_windows: Vec<WindowStat>,
}

impl Report for ProfileReport {
    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "📊 Volatility baseline");
        let _ = writeln!(out, "   Input:    {} ({} prices, {} rows skipped)", self.input, self.prices, self.skipped_rows);
        let _ = writeln!(out, "   Output:   {} ({} windows)", self.output, self.windows);
        let _ = writeln!(out, "\n{:>14} {:>12} {:>12} {:>10}", "Window", "Mean %", "StdDev %", "Samples");
        for stat in &self.key_windows {
            let _ = writeln!(
                out,
                "{:>14} {:>12.6} {:>12.6} {:>10}",
                fmt_window(stat.window_minutes),
                stat.mean_return_pct,
                stat.std_dev_return_pct,
                stat.sample_count
            );
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub timestamp: Option<DateTime<Utc>>,
    pub snapshot: ZScoreSnapshot,
    pub key_windows: Vec<WindowZScore>,
    pub max: Option<WindowZScore>,
    pub min: Option<WindowZScore>,
}

impl Report for SnapshotReport {
    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "📈 Z-scores at {} (index {}, price {:.2})",
            fmt_time(self.timestamp),
            self.snapshot.time_index,
            self.snapshot.price
        );
        let _ = writeln!(out, "\n{:>14} {:>12} {:>10}  {}", "Window", "Return %", "Z", "Reading");
        for w in &self.key_windows {
            let _ = writeln!(
                out,
                "{:>14} {:>12.4} {:>10.4}  {}",
                fmt_window(w.window_minutes),
                w.return_pct,
                w.z_score,
                Classification::from_z(w.z_score)
            );
        }
        if let (Some(max), Some(min)) = (self.max, self.min) {
            let _ = writeln!(out, "\n   Highest z: {:.4} at {}", max.z_score, fmt_window(max.window_minutes));
            let _ = writeln!(out, "   Lowest z:  {:.4} at {}", min.z_score, fmt_window(min.window_minutes));
        }
        let _ = writeln!(out, "   {} windows evaluated", self.snapshot.windows.len());
        out
    }
}

#[derive(Debug, Serialize)]
pub struct MatrixReport {
    pub output: String,
    pub rows: usize,
    pub max_window: usize,
    pub defined_cells: usize,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Report for MatrixReport {
    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "🧮 Z-score matrix written to {}", self.output);
        let _ = writeln!(out, "   {} rows x {} windows, {} defined cells", self.rows, self.max_window, self.defined_cells);
        let _ = writeln!(out, "   {} -> {}", fmt_time(self.from), fmt_time(self.to));
        out
    }
}

/// Anomaly event with the price and time it refers to
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimedEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    #[serde(flatten)]
    pub event: AnomalyEvent,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub report: ScanReport,
    pub events: Vec<TimedEvent>,
    pub strongest: Option<TimedEvent>,
}

impl Report for ScanSummary {
    fn render_text(&self) -> String {
        let r = &self.report;
        let mut out = String::new();
        let _ = writeln!(out, "🔍 Anomaly scan over rows {}..={} (threshold {:.2})", r.start, r.end, r.threshold);
        let _ = writeln!(
            out,
            "   {} cells scanned, {} undefined skipped, {} surges, {} crashes",
            r.cells_scanned,
            r.undefined_skipped,
            r.count(Direction::Surge),
            r.count(Direction::Crash)
        );
        if let Some(s) = &self.strongest {
            let _ = writeln!(
                out,
                "   Strongest: {} z={:.4} at {} over {}",
                s.event.direction,
                s.event.z_score,
                fmt_time(s.timestamp),
                fmt_window(s.event.window_minutes)
            );
        }
        for e in &self.events {
            let _ = writeln!(
                out,
                "{:>8} {:>20} {:>14} {:>10.4} {:>7}",
                e.event.time_index,
                fmt_time(e.timestamp),
                fmt_window(e.event.window_minutes),
                e.event.z_score,
                e.event.direction
            );
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ExplainReport {
    pub time_index: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub explanations: Vec<Explanation>,
}

impl Report for ExplainReport {
    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "🔎 Row {} at {} (price {})",
            self.time_index,
            fmt_time(self.timestamp),
            self.price.map_or_else(|| "-".to_string(), |p| format!("{:.2}", p))
        );
        for e in &self.explanations {
            let line = match e.outcome {
                ExplanationOutcome::Classified {
                    z_score,
                    return_pct,
                    classification,
                } => format!("z={:>9.4}  return={:>9.4}%  {}", z_score, return_pct, classification),
                ExplanationOutcome::Unavailable { reason } => format!("unavailable: {}", reason),
            };
            let _ = writeln!(out, "{:>14}  {}", fmt_window(e.window_minutes), line);
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct CrossingReport {
    pub window_minutes: usize,
    pub direction: Direction,
    pub threshold: f64,
    pub crossings: usize,
    pub longest_run: usize,
}

impl Report for CrossingReport {
    fn render_text(&self) -> String {
        format!(
            "📐 {} over {}: {} cells beyond {:.2} sigma, longest consecutive run {}\n",
            self.direction,
            fmt_window(self.window_minutes),
            self.crossings,
            self.threshold,
            self.longest_run
        )
    }
}

#[derive(Debug, Serialize)]
pub struct MoveReport {
    pub direction: Direction,
    pub start: usize,
    pub end: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub found: Option<PriceMove>,
}

impl Report for MoveReport {
    fn render_text(&self) -> String {
        let label = match self.direction {
            Direction::Surge => "Largest gain",
            Direction::Crash => "Largest drop",
        };
        match &self.found {
            Some(m) => format!(
                "📉 {} in rows {}..={}: {:.4}% at {} (row {})\n   {:.2} -> {:.2} over {} ({:.2} days)\n",
                label,
                self.start,
                self.end,
                m.change_pct,
                fmt_time(self.timestamp),
                m.time_index,
                m.from_price,
                m.to_price,
                fmt_window(m.window_minutes),
                window_days(m.window_minutes)
            ),
            None => format!("{} in rows {}..={}: none\n", label, self.start, self.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrajectoryReport {
    pub start: usize,
    pub end: usize,
    pub stride: usize,
    pub price_windows: Vec<usize>,
    pub zscore_windows: Vec<usize>,
    pub prices: Vec<PriceStep>,
    pub zscores: Vec<ZScoreStep>,
}

fn fmt_change(change: Option<f64>) -> String {
    change.map_or_else(|| "N/A".to_string(), |c| format!("{:.4}%", c))
}

impl Report for TrajectoryReport {
    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "🧭 Trajectory over rows {}..={} every {} rows",
            self.start, self.end, self.stride
        );

        let _ = write!(out, "\n{:>20} {:>12}", "Time", "Price");
        for w in &self.price_windows {
            let _ = write!(out, " {:>12}", fmt_window(*w));
        }
        let _ = writeln!(out, " {:>12}", "Since start");
        for step in &self.prices {
            let _ = write!(out, "{:>20} {:>12.2}", fmt_time(Some(step.timestamp)), step.price);
            for change in &step.changes {
                let _ = write!(out, " {:>12}", fmt_change(change.change_pct));
            }
            let _ = writeln!(out, " {:>12}", fmt_change(step.since_start_pct));
        }

        if !self.zscore_windows.is_empty() {
            let _ = write!(out, "\n{:>8}", "Row");
            for w in &self.zscore_windows {
                let _ = write!(out, " {:>22}", format!("z {}", fmt_window(*w)));
            }
            let _ = writeln!(out);
            for step in &self.zscores {
                let _ = write!(out, "{:>8}", step.time_index);
                for reading in &step.readings {
                    let cell = match reading.state {
                        CellState::Defined { z_score, .. } => format!("{:.2}", z_score),
                        CellState::Undefined(reason) => reason.to_string(),
                    };
                    let _ = write!(out, " {:>22}", cell);
                }
                let _ = writeln!(out);
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct ProbabilityReport {
    #[serde(flatten)]
    pub probability: TailProbability,
    pub classification: Classification,
}

impl Report for ProbabilityReport {
    fn render_text(&self) -> String {
        let p = &self.probability;
        format!(
            "🎲 z = {:.4} ({})\n   P(Z <= z)     = {:.6} ({:.4}%)\n   P(|Z| >= |z|) = {:.6} ({:.4}%)\n",
            p.z_score,
            self.classification,
            p.cumulative,
            p.cumulative * 100.0,
            p.two_tailed,
            p.two_tailed * 100.0
        )
    }
}

impl From<f64> for ProbabilityReport {
    fn from(z: f64) -> Self {
        Self {
            probability: TailProbability::of(z),
            classification: Classification::from_z(z),
        }
    }
}
