//! Export of coded station tables
//!
//! Writes every input column in its original order with the `Codigo`
//! column filled in, followed by a status and a note per row.

use crate::constants::fields;
use crate::error::{CoderError, Result};
use crate::processor::{BatchResult, RecordOutcome};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Export layout: input columns plus the code, status and note columns
pub fn export_columns(input_columns: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = input_columns
        .iter()
        .filter(|c| *c != fields::STATUS && *c != fields::NOTE)
        .cloned()
        .collect();
    if !columns.iter().any(|c| c == fields::CODE) {
        columns.push(fields::CODE.to_string());
    }
    columns.push(fields::STATUS.to_string());
    columns.push(fields::NOTE.to_string());
    columns
}

fn cell_value(outcome: &RecordOutcome, column: &str) -> Option<String> {
    match column {
        fields::CODE => outcome.code().map(str::to_string),
        fields::STATUS => Some(outcome.status_label().to_string()),
        fields::NOTE => outcome.note(),
        other => outcome.raw.get(other).map(str::to_string),
    }
}

/// Write a batch result as a delimited file, returning the number of rows
pub fn write_station_csv(
    path: &Path,
    input_columns: &[String],
    result: &BatchResult,
    delimiter: u8,
) -> Result<usize> {
    if result.is_empty() {
        return Err(CoderError::EmptyBatch);
    }

    let columns: Vec<Column> = export_columns(input_columns)
        .iter()
        .map(|name| {
            let values: Vec<Option<String>> = result
                .outcomes
                .iter()
                .map(|outcome| cell_value(outcome, name))
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    let mut df = DataFrame::new(columns)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(delimiter)
        .finish(&mut df)?;

    info!("Wrote {} station rows to {}", df.height(), path.display());
    Ok(df.height())
}
