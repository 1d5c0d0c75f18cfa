use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to access table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to process table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Row at line {line} of {path} is unusable: {reason}")]
    DataIntegrity {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// A row type that can be written as a table. `COLUMNS` is the header,
/// in serialization order, so an empty table still names its columns.
pub trait Table: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// Read a delimited table with a header row, binding columns by name.
///
/// Rows that cannot be decoded into `T` (an empty cell in a required
/// column, a malformed number) are dropped with a warning; only failing
/// to read the file itself is an error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let csv_error = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    reader.headers().map_err(csv_error)?;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(csv_error(err)),
            Err(err) => {
                let integrity = DatasetError::DataIntegrity {
                    path: path.to_path_buf(),
                    line: err.position().map_or(0, |position| position.line()),
                    reason: err.to_string(),
                };
                warn!(error = %integrity, "dropping row");
                dropped += 1;
            }
        }
    }

    info!(rows = rows.len(), dropped, "table loaded");
    Ok(rows)
}

/// Write rows as a delimited table with a header row, creating parent
/// directories as needed.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<(), DatasetError> {
    let io_error = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = File::create(path).map_err(io_error)?;

    let csv_error = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(file);
    if rows.is_empty() {
        writer.write_record(T::COLUMNS).map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(io_error)?;
    debug!("table written");
    Ok(())
}
