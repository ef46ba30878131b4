//! Configuration management and validation.
//!
//! Provides the run configuration for the batch processor: suffix
//! allocation strategy, handling of rows that already carry a code,
//! concurrency, and the filter applied when loading a registry export.

use crate::constants::{DEFAULT_DELIMITER, registry};
use crate::error::{CoderError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the sequential suffix of a new code is chosen within a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuffixStrategy {
    /// Lowest suffix from 000 upward that is free in both registry and run
    #[default]
    LowestFree,
    /// One past the highest suffix in use, starting at 001 for an empty cell
    AfterHighest,
}

impl FromStr for SuffixStrategy {
    type Err = CoderError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "lowest-free" | "lowest" => Ok(Self::LowestFree),
            "after-highest" | "highest" => Ok(Self::AfterHighest),
            other => Err(CoderError::configuration(format!(
                "Unknown suffix strategy '{}' (expected lowest-free or after-highest)",
                other
            ))),
        }
    }
}

/// Which rows of a registry export count as live station codes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFilter {
    /// Column holding the station code
    pub code_column: String,

    /// Column holding the station type
    pub station_type_column: String,

    /// Station type to keep; `None` keeps every type
    pub station_type: Option<i64>,

    /// Flag columns that must be zero for a row to count
    pub exclusion_flag_columns: Vec<String>,
}

impl Default for RegistryFilter {
    fn default() -> Self {
        Self {
            code_column: registry::CODE_COLUMN.to_string(),
            station_type_column: registry::STATION_TYPE_COLUMN.to_string(),
            station_type: Some(registry::RAINFALL_STATION_TYPE),
            exclusion_flag_columns: registry::EXCLUSION_FLAG_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Global configuration for a coding run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoderConfig {
    /// Suffix allocation strategy
    pub suffix_strategy: SuffixStrategy,

    /// Leave rows that already carry a code untouched and reserve their codes
    pub skip_coded_records: bool,

    /// Number of concurrent workers for registry queries and per-cell allocation
    pub workers: usize,

    /// Show a progress bar while processing
    pub show_progress: bool,

    /// CSV field separator for import and export
    pub delimiter: u8,

    /// Registry export filter
    pub registry_filter: RegistryFilter,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            suffix_strategy: SuffixStrategy::default(),
            skip_coded_records: true,
            workers: num_cpus::get().max(1),
            show_progress: false,
            delimiter: DEFAULT_DELIMITER,
            registry_filter: RegistryFilter::default(),
        }
    }
}

impl CoderConfig {
    pub fn with_suffix_strategy(mut self, strategy: SuffixStrategy) -> Self {
        self.suffix_strategy = strategy;
        self
    }

    /// Generate fresh codes even for rows that already carry one
    pub fn without_skip_coded_records(mut self) -> Self {
        self.skip_coded_records = false;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_registry_filter(mut self, filter: RegistryFilter) -> Self {
        self.registry_filter = filter;
        self
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CoderError::configuration("workers must be at least 1"));
        }
        if !self.delimiter.is_ascii() || self.delimiter == b'"' || self.delimiter == b'\n' {
            return Err(CoderError::configuration(format!(
                "unsupported CSV delimiter {:?}",
                self.delimiter as char
            )));
        }
        if self.registry_filter.code_column.trim().is_empty() {
            return Err(CoderError::configuration(
                "registry code column name must not be empty",
            ));
        }
        Ok(())
    }
}
