//! Kline (minute candle) CSV loading

use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::series::{PricePoint, PriceSeries};
use crate::shared::errors::StorageError;

const OPEN_TIME_MS: usize = 0;
const OPEN_TIME_UTC: usize = 1;
const CLOSE: usize = 5;
const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Price series read from a kline file plus the number of rows dropped
#[derive(Debug, Clone)]
pub struct KlineLoad {
    pub series: PriceSeries,
    pub skipped: usize,
}

/// Load a kline CSV from disk
pub fn load_klines<P: AsRef<Path>>(path: P) -> Result<KlineLoad, StorageError> {
    let path = path.as_ref();
    info!("📂 Loading klines from {}", path.display());
    read_klines(super::open(path)?)
}

/// Parse kline CSV rows: open time in ms at column 0, open time as UTC text
/// at column 1, close at column 5. The header row is ignored.
///
/// Short rows, unparseable closes or timestamps, and rows stamped earlier
/// than the previous kept row are skipped and counted.
pub fn read_klines<R: Read>(reader: R) -> Result<KlineLoad, StorageError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut points: Vec<PricePoint> = Vec::new();
    let mut skipped = 0usize;

    for result in csv.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unreadable kline row: {}", e);
                skipped += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() <= CLOSE {
            debug!("Skipping kline line {}: only {} columns", line, record.len());
            skipped += 1;
            continue;
        }
        let Some(close) = record[CLOSE].trim().parse::<f64>().ok().filter(|c| c.is_finite()) else {
            debug!("Skipping kline line {}: bad close '{}'", line, &record[CLOSE]);
            skipped += 1;
            continue;
        };
        let Some(timestamp) = parse_open_time(&record[OPEN_TIME_MS], &record[OPEN_TIME_UTC]) else {
            debug!("Skipping kline line {}: bad open time", line);
            skipped += 1;
            continue;
        };
        if points.last().is_some_and(|prev| timestamp < prev.timestamp) {
            debug!("Skipping kline line {}: timestamp goes backwards", line);
            skipped += 1;
            continue;
        }
        points.push(PricePoint::new(timestamp, close));
    }

    if skipped > 0 {
        warn!("Skipped {} malformed kline rows", skipped);
    }
    let series = PriceSeries::new(points)?;
    info!("✅ Loaded {} prices", series.len());
    Ok(KlineLoad { series, skipped })
}

fn parse_open_time(millis: &str, utc: &str) -> Option<DateTime<Utc>> {
    millis
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .or_else(|| {
            NaiveDateTime::parse_from_str(utc.trim(), UTC_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}
