//! Baseline table and per-window summary CSVs

use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::volatility::{BaselineTable, WindowStat};
use crate::domain::zscore::ZScoreSnapshot;
use crate::shared::errors::StorageError;

const BASELINE_HEADER: [&str; 5] = ["Window_Minutes", "Window_Days", "Mean_Pct", "StdDev_Pct", "Sample_Count"];
const SUMMARY_HEADER: [&str; 6] = [
    "Window_Minutes",
    "Window_Days",
    "Return_Pct",
    "Mean_Pct",
    "StdDev_Pct",
    "Z_Score",
];

pub fn write_baseline<W: Write>(table: &BaselineTable, writer: W) -> Result<(), StorageError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(BASELINE_HEADER)?;
    for stat in table.iter() {
        csv.write_record([
            stat.window_minutes.to_string(),
            format!("{:.4}", stat.window_days()),
            format!("{:.6}", stat.mean_return_pct),
            format!("{:.6}", stat.std_dev_return_pct),
            stat.sample_count.to_string(),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn save_baseline<P: AsRef<Path>>(table: &BaselineTable, path: P) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_baseline(table, super::create(path)?)?;
    info!("💾 Saved {} baseline windows to {}", table.len(), path.display());
    Ok(())
}

/// Read a baseline table; malformed rows are skipped. Returns the table and
/// the number of skipped rows.
pub fn read_baseline<R: Read>(reader: R) -> Result<(BaselineTable, usize), StorageError> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut stats = Vec::new();
    let mut skipped = 0usize;

    for result in csv.records() {
        let parsed = result.ok().and_then(|record| {
            let window_minutes = record.get(0)?.trim().parse::<usize>().ok().filter(|w| *w >= 1)?;
            let mean_return_pct = record.get(2)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
            let std_dev_return_pct = record
                .get(3)?
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)?;
            let sample_count = record.get(4)?.trim().parse::<usize>().ok()?;
            Some(WindowStat {
                window_minutes,
                mean_return_pct,
                std_dev_return_pct,
                sample_count,
            })
        });
        match parsed {
            Some(stat) => stats.push(stat),
            None => {
                debug!("Skipping malformed baseline row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed baseline rows", skipped);
    }
    Ok((stats.into_iter().collect(), skipped))
}

pub fn load_baseline<P: AsRef<Path>>(path: P) -> Result<BaselineTable, StorageError> {
    let path = path.as_ref();
    let (table, _) = read_baseline(super::open(path)?)?;
    info!("📂 Loaded {} baseline windows from {}", table.len(), path.display());
    Ok(table)
}

/// Write the per-window z-score summary of one time index
pub fn write_snapshot<W: Write>(snapshot: &ZScoreSnapshot, writer: W) -> Result<(), StorageError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(SUMMARY_HEADER)?;
    for w in &snapshot.windows {
        csv.write_record([
            w.window_minutes.to_string(),
            format!("{:.4}", w.window_days()),
            format!("{:.6}", w.return_pct),
            format!("{:.6}", w.mean_pct),
            format!("{:.6}", w.std_dev_pct),
            format!("{:.4}", w.z_score),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn save_snapshot<P: AsRef<Path>>(snapshot: &ZScoreSnapshot, path: P) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_snapshot(snapshot, super::create(path)?)?;
    info!("💾 Saved z-scores for {} windows to {}", snapshot.windows.len(), path.display());
    Ok(())
}
