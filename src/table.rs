//! Plain-text CSV table access.
//!
//! Every column is read as text so that codes keep their leading zeros and
//! coordinates keep whatever notation the source used; typing happens later
//! in validation.

use crate::error::Result;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// Read a delimited file with a header row, all columns as strings
pub fn read_text_frame(path: &Path, delimiter: u8) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_separator(delimiter))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Column names in file order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Values of one column as optional owned strings
pub fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let values = series.str()?;
    Ok(values
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_leading_zeros_survive() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Codigo;Nome").unwrap();
        writeln!(file, "0006037001;Sítio Novo").unwrap();
        writeln!(file, ";Sem código").unwrap();

        let df = read_text_frame(file.path(), b';').unwrap();

        assert_eq!(column_names(&df), ["Codigo", "Nome"]);
        assert_eq!(
            text_column(&df, "Codigo").unwrap(),
            [Some("0006037001".to_string()), None]
        );
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Nome").unwrap();
        writeln!(file, "A").unwrap();

        let df = read_text_frame(file.path(), b',').unwrap();
        assert!(text_column(&df, "Latitude").is_err());
    }
}
