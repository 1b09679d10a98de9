//! Z-score matrix CSV: `TimeIndex,1,2,...,W` with one row per time index

use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::series::PriceSeries;
use crate::domain::zscore::{CellState, UndefinedReason, ZScoreMatrix};
use crate::shared::errors::StorageError;
use crate::shared::utils::pct_return;

/// How undefined cells are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatrixEncoding {
    /// Empty field
    #[default]
    Blank,
    /// `0.0000`, for consumers of the older file layout
    LegacyZero,
}

impl FromStr for MatrixEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blank" => Ok(MatrixEncoding::Blank),
            "legacy-zero" | "legacy" | "zero" => Ok(MatrixEncoding::LegacyZero),
            other => Err(format!("unknown matrix encoding '{}', expected blank or legacy-zero", other)),
        }
    }
}

pub fn write_matrix<W: Write>(
    matrix: &ZScoreMatrix,
    encoding: MatrixEncoding,
    writer: W,
) -> Result<(), StorageError> {
    let undefined = match encoding {
        MatrixEncoding::Blank => "",
        MatrixEncoding::LegacyZero => "0.0000",
    };

    let mut csv = csv::Writer::from_writer(writer);
    let header = std::iter::once("TimeIndex".to_string()).chain((1..=matrix.max_window()).map(|w| w.to_string()));
    csv.write_record(header)?;

    let mut record = Vec::with_capacity(matrix.max_window() + 1);
    for t in 0..matrix.rows() {
        record.clear();
        record.push(t.to_string());
        for state in matrix.row(t).unwrap_or_default() {
            record.push(match state {
                CellState::Defined { z_score, .. } => format!("{:.4}", z_score),
                CellState::Undefined(_) => undefined.to_string(),
            });
        }
        csv.write_record(&record)?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn save_matrix<P: AsRef<Path>>(
    matrix: &ZScoreMatrix,
    encoding: MatrixEncoding,
    path: P,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    write_matrix(matrix, encoding, super::create(path)?)?;
    info!(
        "💾 Saved {} x {} z-score matrix to {}",
        matrix.rows(),
        matrix.max_window(),
        path.display()
    );
    Ok(())
}

/// Read a matrix written by [`write_matrix`].
///
/// `recent` must be the price slice the matrix was built from; returns are
/// recomputed from it. Cells with `t < w` are undefined whatever their literal
/// value, and empty fields are undefined.
pub fn read_matrix<R: Read>(reader: R, recent: &PriceSeries) -> Result<ZScoreMatrix, StorageError> {
    let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let max_window = parse_header(csv.headers()?)?;
    let closes = recent.closes();
    let mut cells = Vec::with_capacity(closes.len() * max_window);
    let mut rows = 0usize;

    for result in csv.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if rows >= closes.len() {
            return Err(StorageError::MatrixShape {
                rows: rows + 1,
                prices: closes.len(),
            });
        }
        let t = record[0].trim().parse::<usize>().ok().filter(|t| *t == rows).ok_or_else(|| {
            StorageError::MalformedRow {
                line,
                detail: format!("expected time index {}, found '{}'", rows, &record[0]),
            }
        })?;

        for w in 1..=max_window {
            let field = record[w].trim();
            let state = if t < w {
                CellState::Undefined(UndefinedReason::InsufficientHistory)
            } else {
                match pct_return(closes[t - w], closes[t]) {
                    None => CellState::Undefined(UndefinedReason::ZeroBasePrice),
                    Some(_) if field.is_empty() => CellState::Undefined(UndefinedReason::MissingBaseline),
                    Some(return_pct) => {
                        let z_score = field.parse::<f64>().ok().filter(|z| z.is_finite()).ok_or_else(|| {
                            StorageError::MalformedRow {
                                line,
                                detail: format!("bad z-score '{}' for window {}", field, w),
                            }
                        })?;
                        CellState::Defined { return_pct, z_score }
                    }
                }
            };
            cells.push(state);
        }
        rows += 1;
    }

    if rows != closes.len() {
        return Err(StorageError::MatrixShape {
            rows,
            prices: closes.len(),
        });
    }
    Ok(ZScoreMatrix::from_cells(rows, max_window, cells))
}

pub fn load_matrix<P: AsRef<Path>>(path: P, recent: &PriceSeries) -> Result<ZScoreMatrix, StorageError> {
    let path = path.as_ref();
    let matrix = read_matrix(super::open(path)?, recent)?;
    info!(
        "📂 Loaded {} x {} z-score matrix from {}",
        matrix.rows(),
        matrix.max_window(),
        path.display()
    );
    Ok(matrix)
}

/// Window columns must read `1, 2, ..., W`
fn parse_header(header: &csv::StringRecord) -> Result<usize, StorageError> {
    if header.is_empty() {
        return Err(StorageError::BadHeader("empty header".to_string()));
    }
    for (i, field) in header.iter().enumerate().skip(1) {
        if field.trim().parse::<usize>().ok() != Some(i) {
            return Err(StorageError::BadHeader(format!(
                "column {} should be window {}, found '{}'",
                i, i, field
            )));
        }
    }
    Ok(header.len() - 1)
}
