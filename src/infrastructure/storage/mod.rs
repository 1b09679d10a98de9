//! Flat-file CSV storage for price history, baselines and z-score surfaces

mod baseline;
mod klines;
mod matrix;

pub use baseline::{load_baseline, read_baseline, save_baseline, save_snapshot, write_baseline, write_snapshot};
pub use klines::{load_klines, read_klines, KlineLoad};
pub use matrix::{load_matrix, read_matrix, save_matrix, write_matrix, MatrixEncoding};

use std::fs::File;
use std::path::Path;

use crate::shared::errors::StorageError;

fn open(path: &Path) -> Result<File, StorageError> {
    File::open(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn create(path: &Path) -> Result<File, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    File::create(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })
}
