//! Core data structures for station code generation.
//!
//! Defines raw import rows, validated station records, grid cells and the
//! two code types (partial and complete), plus batch statistics.

use crate::constants::{
    BAND_WIDTH, LEADING_DIGIT, MAX_SUFFIX, PARTIAL_CODE_LEN, STATION_CODE_LEN, SUFFIX_WIDTH,
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One row of an import batch, keyed by column name
///
/// Blank cells are not stored, so `get` only ever returns non-empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// Store a cell value; blank values are dropped
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.fields.insert(column.into(), trimmed.to_string());
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Coerced value of a recognised optional attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Integer(i64),
    Decimal(f64),
    Flag(bool),
    Text(String),
}

/// Non-fatal defect found while coercing an optional attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.field, self.value, self.message)
    }
}

/// A validated candidate station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Code already present in the import row, if any
    pub existing_code: Option<String>,
    /// Recognised optional attributes after coercion
    pub attributes: BTreeMap<String, AttributeValue>,
    pub warnings: Vec<FieldWarning>,
}

impl StationRecord {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            existing_code: None,
            attributes: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Integer-degree spatial bucket in which sequential numbers are scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub latitude_band: u16,
    pub longitude_band: u16,
}

impl GridCell {
    pub fn new(latitude_band: u16, longitude_band: u16) -> Self {
        Self {
            latitude_band,
            longitude_band,
        }
    }

    /// The 7-digit prefix shared by every code in this cell
    pub fn partial_code(&self) -> PartialCode {
        PartialCode(format!(
            "{}{:0width$}{:0width$}",
            LEADING_DIGIT,
            self.latitude_band,
            self.longitude_band,
            width = BAND_WIDTH
        ))
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0width$}/{:0width$}",
            self.latitude_band,
            self.longitude_band,
            width = BAND_WIDTH
        )
    }
}

/// Coordinate-derived code prefix (`0LLLOOO`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct PartialCode(String);

impl TryFrom<String> for PartialCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_code_shaped(&value, PARTIAL_CODE_LEN) {
            Ok(Self(value))
        } else {
            Err(format!("'{}' is not a {}-digit partial code", value, PARTIAL_CODE_LEN))
        }
    }
}

impl PartialCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete 10-digit station code (`0LLLOOONNN`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct StationCode(String);

impl TryFrom<String> for StationCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| format!("'{}' is not a {}-digit station code", value, STATION_CODE_LEN))
    }
}

impl StationCode {
    /// Append a sequential suffix to a partial code
    ///
    /// Returns `None` when the suffix exceeds the three-digit range.
    pub fn from_parts(partial: &PartialCode, suffix: u16) -> Option<Self> {
        if suffix > MAX_SUFFIX {
            return None;
        }
        Some(Self(format!(
            "{}{:0width$}",
            partial.as_str(),
            suffix,
            width = SUFFIX_WIDTH
        )))
    }

    /// Parse a code as stored in the registry or an import row
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        is_code_shaped(value, STATION_CODE_LEN).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn partial(&self) -> &str {
        &self.0[..PARTIAL_CODE_LEN]
    }

    pub fn suffix(&self) -> u16 {
        // Digits were checked on construction.
        self.0[PARTIAL_CODE_LEN..].parse().unwrap_or_default()
    }

    /// Grid cell encoded in the code's prefix
    pub fn grid_cell(&self) -> GridCell {
        let lat_end = 1 + BAND_WIDTH;
        GridCell {
            latitude_band: self.0[1..lat_end].parse().unwrap_or_default(),
            longitude_band: self.0[lat_end..PARTIAL_CODE_LEN]
                .parse()
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_code_shaped(value: &str, len: usize) -> bool {
    value.len() == len
        && value.bytes().all(|b| b.is_ascii_digit())
        && value.starts_with(LEADING_DIGIT)
}

/// Summary counters for one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    pub started_at: DateTime<Local>,
    pub total_records: usize,
    pub coded: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub warnings: usize,
    pub distinct_cells: usize,
    pub registry_queries: usize,
    pub processing_time_ms: u128,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self {
            started_at: Local::now(),
            total_records: 0,
            coded: 0,
            skipped: 0,
            rejected: 0,
            warnings: 0,
            distinct_cells: 0,
            registry_queries: 0,
            processing_time_ms: 0,
        }
    }
}

impl BatchStats {
    /// Share of input records that received a new code, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            100.0
        } else {
            (self.coded as f64 / self.total_records as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::IntoDeserializer;
    use serde::de::value::{Error as ValueError, StringDeserializer};

    fn deserialize_code(value: &str) -> Result<StationCode, ValueError> {
        let deserializer: StringDeserializer<ValueError> = value.to_string().into_deserializer();
        StationCode::deserialize(deserializer)
    }

    #[test]
    fn test_deserialized_codes_are_checked() {
        assert_eq!(deserialize_code("0006037004").unwrap().suffix(), 4);
        assert!(deserialize_code("6037004").is_err());
        assert!(deserialize_code("00060370ä").is_err());
        assert!(PartialCode::try_from("0006037".to_string()).is_ok());
        assert!(PartialCode::try_from("063".to_string()).is_err());
    }

    #[test]
    fn test_raw_record_drops_blank_cells() {
        let record = RawRecord::new()
            .with("Nome", "  Estação A ")
            .with("Altitude", "   ");

        assert_eq!(record.get("Nome"), Some("Estação A"));
        assert_eq!(record.get("Altitude"), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_partial_code_padding() {
        let cell = GridCell::new(6, 37);
        assert_eq!(cell.partial_code().as_str(), "0006037");
        assert_eq!(cell.to_string(), "006/037");
    }

    #[test]
    fn test_station_code_parts() {
        let partial = GridCell::new(86, 150).partial_code();
        let code = StationCode::from_parts(&partial, 42).unwrap();

        assert_eq!(code.as_str(), "0086150042");
        assert_eq!(code.partial(), "0086150");
        assert_eq!(code.suffix(), 42);
        assert_eq!(code.grid_cell(), GridCell::new(86, 150));
        assert!(StationCode::from_parts(&partial, 1000).is_none());
    }

    #[test]
    fn test_station_code_parse() {
        assert!(StationCode::parse("0006037001").is_some());
        assert!(StationCode::parse(" 0006037001 ").is_some());
        assert!(StationCode::parse("06337001").is_none());
        assert!(StationCode::parse("1006037001").is_none());
        assert!(StationCode::parse("00060370a1").is_none());
    }

    #[test]
    fn test_success_rate() {
        let stats = BatchStats {
            total_records: 4,
            coded: 3,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(BatchStats::default().success_rate(), 100.0);
    }
}
