//! Anomaly domain - threshold scans, point explanations and tail probabilities

mod probability;
mod scanner;

pub use probability::TailProbability;
pub use scanner::{AnomalyScanner, Explanation, ExplanationOutcome, ScanReport};

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Default anomaly magnitude threshold in standard deviations
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Sign of an anomalous move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Surge,
    Crash,
}

impl Direction {
    /// Direction of `z` against `threshold`, if it is beyond it
    pub fn classify(z: f64, threshold: f64) -> Option<Self> {
        if z > threshold {
            Some(Direction::Surge)
        } else if z < -threshold {
            Some(Direction::Crash)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Surge => "surge",
            Direction::Crash => "crash",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "surge" | "up" => Ok(Direction::Surge),
            "crash" | "down" => Ok(Direction::Crash),
            other => Err(format!("unknown direction '{}', expected surge or crash", other)),
        }
    }
}

/// A cell whose z-score is beyond the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub time_index: usize,
    pub window_minutes: usize,
    pub z_score: f64,
    pub direction: Direction,
}

/// Qualitative bucket of a z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    SignificantlyBelow,
    Below,
    Near,
    Above,
    SignificantlyAbove,
}

impl Classification {
    /// `z < -2`, `-2 <= z < -1`, `-1 <= z <= 1`, `1 < z <= 2`, `z > 2`
    pub fn from_z(z: f64) -> Self {
        if z < -2.0 {
            Classification::SignificantlyBelow
        } else if z < -1.0 {
            Classification::Below
        } else if z <= 1.0 {
            Classification::Near
        } else if z <= 2.0 {
            Classification::Above
        } else {
            Classification::SignificantlyAbove
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::SignificantlyBelow => "significantly below mean",
            Classification::Below => "below mean",
            Classification::Near => "near mean",
            Classification::Above => "above mean",
            Classification::SignificantlyAbove => "significantly above mean",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which window columns a scan looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSelection {
    All,
    /// Inclusive range
    Range(usize, usize),
    List(Vec<usize>),
}

impl WindowSelection {
    /// Concrete windows within `1..=max_window`, ascending and deduplicated
    pub fn resolve(&self, max_window: usize) -> Vec<usize> {
        let mut windows: Vec<usize> = match self {
            WindowSelection::All => (1..=max_window).collect(),
            WindowSelection::Range(lo, hi) => ((*lo).max(1)..=(*hi).min(max_window)).collect(),
            WindowSelection::List(list) => list
                .iter()
                .copied()
                .filter(|w| *w >= 1 && *w <= max_window)
                .collect(),
        };
        windows.sort_unstable();
        windows.dedup();
        windows
    }
}

impl FromStr for WindowSelection {
    type Err = String;

    /// Accepts `all`, an inclusive range `a-b`, or a comma list `1,5,15`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(WindowSelection::All);
        }
        let parse = |part: &str| match part.trim().parse::<usize>() {
            Ok(0) => Err("windows start at 1 minute".to_string()),
            Ok(window) => Ok(window),
            Err(e) => Err(format!("invalid window '{}': {}", part.trim(), e)),
        };
        if let Some((lo, hi)) = s.split_once('-') {
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            if lo > hi {
                return Err(format!("window range {}-{} is reversed", lo, hi));
            }
            return Ok(WindowSelection::Range(lo, hi));
        }
        let list = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
        Ok(WindowSelection::List(list))
    }
}
