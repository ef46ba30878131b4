//! Import of candidate station tables
//!
//! Reads an export of the `Estacoes_Novas` table into raw records. The
//! header must contain the required columns; everything else about a row is
//! left to per-record validation.

use crate::constants::fields;
use crate::error::{CoderError, Result};
use crate::models::RawRecord;
use crate::table::{column_names, read_text_frame, text_column};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rows of an import file together with its column order
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub path: PathBuf,
    /// Column names in file order, reused for the export layout
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl ImportBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a delimited station table
pub fn read_station_csv(path: &Path, delimiter: u8) -> Result<ImportBatch> {
    if !path.exists() {
        return Err(CoderError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let df = read_text_frame(path, delimiter)
        .map_err(|e| CoderError::invalid_format(path, format!("unreadable CSV: {}", e)))?;
    let columns = column_names(&df);

    let missing: Vec<&str> = fields::REQUIRED
        .iter()
        .copied()
        .filter(|required| !columns.iter().any(|c| c == required))
        .collect();
    if !missing.is_empty() {
        return Err(CoderError::invalid_format(
            path,
            format!("missing required columns: {}", missing.join(", ")),
        ));
    }

    let mut records = vec![RawRecord::new(); df.height()];
    for column in &columns {
        for (record, value) in records.iter_mut().zip(text_column(&df, column)?) {
            if let Some(value) = value {
                record.insert(column.as_str(), value);
            }
        }
    }

    debug!(
        "Imported {} station records with columns {:?}",
        records.len(),
        columns
    );

    Ok(ImportBatch {
        path: path.to_path_buf(),
        columns,
        records,
    })
}
