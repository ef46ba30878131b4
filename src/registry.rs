//! Registry of station codes already issued
//!
//! The batch processor only needs to ask which codes exist in a grid cell.
//! `InMemoryRegistry` answers from a prepared set; `CsvRegistry` builds one
//! from an export of the national station table, keeping only live
//! rainfall stations.

use crate::config::RegistryFilter;
use crate::constants::STATION_CODE_LEN;
use crate::error::{CoderError, Result};
use crate::models::{GridCell, StationCode};
use crate::table::{column_names, read_text_frame, text_column};
use crate::validator::parse_flag;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read access to persisted station codes
///
/// Implementations must be safe to query from several threads; the
/// concurrent batch path fetches distinct grid cells in parallel.
pub trait RegistryAdapter: Send + Sync {
    /// Codes already persisted for a grid cell
    ///
    /// An error here means the registry could not be consulted at all and
    /// aborts the run.
    fn existing_codes(&self, cell: &GridCell) -> Result<BTreeSet<StationCode>>;
}

/// Registry held entirely in memory, indexed by grid cell
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    cells: HashMap<GridCell, BTreeSet<StationCode>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: StationCode) -> bool {
        self.cells.entry(code.grid_cell()).or_default().insert(code)
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl FromIterator<StationCode> for InMemoryRegistry {
    fn from_iter<I: IntoIterator<Item = StationCode>>(iter: I) -> Self {
        let mut registry = Self::new();
        for code in iter {
            registry.insert(code);
        }
        registry
    }
}

impl RegistryAdapter for InMemoryRegistry {
    fn existing_codes(&self, cell: &GridCell) -> Result<BTreeSet<StationCode>> {
        Ok(self.cells.get(cell).cloned().unwrap_or_default())
    }
}

/// Counters collected while loading a registry export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryLoadStats {
    pub rows_read: usize,
    pub rows_filtered: usize,
    pub malformed_codes: usize,
    pub codes_loaded: usize,
}

/// Registry loaded from a CSV export of the station table
#[derive(Debug, Clone)]
pub struct CsvRegistry {
    path: PathBuf,
    codes: InMemoryRegistry,
    stats: RegistryLoadStats,
}

impl CsvRegistry {
    /// Load and filter a registry export
    ///
    /// A missing or unreadable file is reported as `RegistryUnavailable`.
    pub fn load(path: &Path, filter: &RegistryFilter, delimiter: u8) -> Result<Self> {
        if !path.exists() {
            return Err(CoderError::registry_unavailable(format!(
                "registry file not found: {}",
                path.display()
            )));
        }

        let df = read_text_frame(path, delimiter).map_err(|e| {
            CoderError::registry_unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let columns = column_names(&df);

        if !columns.contains(&filter.code_column) {
            return Err(CoderError::invalid_format(
                path,
                format!("registry export has no '{}' column", filter.code_column),
            ));
        }

        let codes = text_column(&df, &filter.code_column)?;
        let station_types = match filter.station_type {
            Some(_) if columns.contains(&filter.station_type_column) => {
                Some(text_column(&df, &filter.station_type_column)?)
            }
            _ => None,
        };
        let mut flag_columns = Vec::new();
        for name in &filter.exclusion_flag_columns {
            if columns.contains(name) {
                flag_columns.push(text_column(&df, name)?);
            } else {
                debug!("Registry export has no '{}' column, not filtering on it", name);
            }
        }

        let mut registry = InMemoryRegistry::new();
        let mut stats = RegistryLoadStats {
            rows_read: df.height(),
            ..Default::default()
        };

        for (row, raw_code) in codes.iter().enumerate() {
            let type_matches = match (&station_types, filter.station_type) {
                (Some(types), Some(wanted)) => types[row]
                    .as_deref()
                    .and_then(parse_whole_number)
                    .is_some_and(|t| t == wanted),
                _ => true,
            };
            let live = flag_columns
                .iter()
                .all(|flags| flags[row].as_deref().is_none_or(flag_cleared));

            if !type_matches || !live {
                stats.rows_filtered += 1;
                continue;
            }

            match raw_code.as_deref().and_then(normalise_code) {
                Some(code) => {
                    if registry.insert(code) {
                        stats.codes_loaded += 1;
                    }
                }
                None => {
                    stats.malformed_codes += 1;
                    warn!(
                        "Ignoring malformed registry code {:?} on row {}",
                        raw_code.as_deref().unwrap_or(""),
                        row + 1
                    );
                }
            }
        }

        info!(
            "Loaded {} registry codes in {} grid cells from {} ({} rows filtered, {} malformed)",
            stats.codes_loaded,
            registry.cell_count(),
            path.display(),
            stats.rows_filtered,
            stats.malformed_codes
        );

        Ok(Self {
            path: path.to_path_buf(),
            codes: registry,
            stats,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &RegistryLoadStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl RegistryAdapter for CsvRegistry {
    fn existing_codes(&self, cell: &GridCell) -> Result<BTreeSet<StationCode>> {
        self.codes.existing_codes(cell)
    }
}

/// Integer cells exported through a float column come back as `2.0`
fn parse_whole_number(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

fn flag_cleared(value: &str) -> bool {
    match parse_whole_number(value) {
        Some(number) => number == 0,
        None => parse_flag(value) == Some(false),
    }
}

/// Codes exported through a numeric column lose their leading zeros
fn normalise_code(value: &str) -> Option<StationCode> {
    let value = value.trim();
    let value = value.strip_suffix(".0").unwrap_or(value);
    if value.is_empty() || value.len() > STATION_CODE_LEN {
        return None;
    }
    StationCode::parse(&format!("{:0>width$}", value, width = STATION_CODE_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn code(value: &str) -> StationCode {
        StationCode::parse(value).unwrap()
    }

    #[test]
    fn test_in_memory_registry_groups_by_cell() {
        let registry: InMemoryRegistry = ["0006037000", "0006037005", "0007037000"]
            .into_iter()
            .map(code)
            .collect();

        let codes = registry.existing_codes(&GridCell::new(6, 37)).unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains(&code("0006037005")));
        assert!(
            registry
                .existing_codes(&GridCell::new(50, 50))
                .unwrap()
                .is_empty()
        );
        assert_eq!(registry.cell_count(), 2);
    }

    #[test]
    fn test_normalise_code() {
        assert_eq!(normalise_code("6037001"), Some(code("0006037001")));
        assert_eq!(normalise_code("6037001.0"), Some(code("0006037001")));
        assert_eq!(normalise_code("0006037001"), Some(code("0006037001")));
        assert_eq!(normalise_code("12345678901"), None);
        assert_eq!(normalise_code("abc"), None);
        assert_eq!(normalise_code(""), None);
    }

    #[test]
    fn test_csv_registry_applies_filter() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Codigo,TipoEstacao,Importado,Removido,Temporario,ImportadoRepetido").unwrap();
        writeln!(file, "0006037000,2,0,0,0,0").unwrap();
        writeln!(file, "6037001,2,0,0,0,").unwrap();
        writeln!(file, "0006037002,1,0,0,0,0").unwrap();
        writeln!(file, "0006037003,2,0,1,0,0").unwrap();
        writeln!(file, "bad,2,0,0,0,0").unwrap();

        let registry =
            CsvRegistry::load(file.path(), &RegistryFilter::default(), b',').unwrap();

        let codes = registry.existing_codes(&GridCell::new(6, 37)).unwrap();
        let suffixes: Vec<u16> = codes.iter().map(StationCode::suffix).collect();
        assert_eq!(suffixes, [0, 1]);
        assert_eq!(
            registry.stats(),
            &RegistryLoadStats {
                rows_read: 5,
                rows_filtered: 2,
                malformed_codes: 1,
                codes_loaded: 2,
            }
        );
    }

    #[test]
    fn test_csv_registry_reads_float_exports() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Codigo,TipoEstacao,Importado,Removido,Temporario,ImportadoRepetido").unwrap();
        writeln!(file, "6037000.0,2.0,0.0,0.0,0.0,0.0").unwrap();
        writeln!(file, "6037001.0,2.0,0.0,1.0,0.0,0.0").unwrap();
        writeln!(file, "6037002,2,False,Não,0,0").unwrap();

        let registry =
            CsvRegistry::load(file.path(), &RegistryFilter::default(), b',').unwrap();

        let codes = registry.existing_codes(&GridCell::new(6, 37)).unwrap();
        assert_eq!(codes, BTreeSet::from([code("0006037000"), code("0006037002")]));
        assert_eq!(registry.stats().rows_filtered, 1);
    }

    #[test]
    fn test_flag_cleared() {
        assert!(flag_cleared("0"));
        assert!(flag_cleared("0.0"));
        assert!(!flag_cleared("falso"));
        assert!(flag_cleared("NAO"));
        assert!(!flag_cleared("1.0"));
        assert!(!flag_cleared("Sim"));
    }

    #[test]
    fn test_csv_registry_without_filter_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Codigo").unwrap();
        writeln!(file, "0006037000").unwrap();
        writeln!(file, "0006037001").unwrap();

        let registry =
            CsvRegistry::load(file.path(), &RegistryFilter::default(), b',').unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_registry_file_is_unavailable() {
        let result = CsvRegistry::load(
            Path::new("/nonexistent/registry.csv"),
            &RegistryFilter::default(),
            b',',
        );
        assert!(matches!(
            result,
            Err(CoderError::RegistryUnavailable { .. })
        ));
    }

    #[test]
    fn test_registry_without_code_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Nome").unwrap();
        writeln!(file, "A").unwrap();

        let result = CsvRegistry::load(file.path(), &RegistryFilter::default(), b',');
        assert!(matches!(result, Err(CoderError::InvalidFormat { .. })));
    }
}
