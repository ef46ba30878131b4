//! Station record validation and optional-field coercion
//!
//! Required fields are checked in a fixed order and the first failure
//! rejects the record. Recognised optional attributes are coerced to typed
//! values; a malformed optional value only produces a warning on the record.

use crate::constants::{LATITUDE_RANGE, LONGITUDE_RANGE, fields, flag_values};
use crate::error::RecordError;
use crate::models::{AttributeValue, FieldWarning, RawRecord, StationRecord};
use tracing::warn;

/// Expected type of a recognised optional attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Integer,
    Decimal,
    Flag,
    Text,
}

/// Look up the coercion rule for a column, if it is a recognised attribute
pub fn attribute_kind(column: &str) -> Option<AttributeKind> {
    if fields::INTEGER_ATTRIBUTES.contains(&column) {
        Some(AttributeKind::Integer)
    } else if fields::DECIMAL_ATTRIBUTES.contains(&column) {
        Some(AttributeKind::Decimal)
    } else if fields::FLAG_ATTRIBUTES.contains(&column) {
        Some(AttributeKind::Flag)
    } else if fields::TEXT_ATTRIBUTES.contains(&column) {
        Some(AttributeKind::Text)
    } else {
        None
    }
}

/// Validate one raw import row into a station record
pub fn validate(raw: &RawRecord) -> Result<StationRecord, RecordError> {
    let name = raw
        .get(fields::NAME)
        .ok_or_else(|| RecordError::missing(fields::NAME))?;
    let latitude = parse_coordinate(raw, fields::LATITUDE, LATITUDE_RANGE)?;
    let longitude = parse_coordinate(raw, fields::LONGITUDE, LONGITUDE_RANGE)?;

    let mut record = StationRecord::new(name, latitude, longitude);
    record.existing_code = raw.get(fields::CODE).map(str::to_string);

    let mut columns: Vec<&str> = raw.columns().collect();
    columns.sort_unstable();
    for column in columns {
        let (Some(kind), Some(value)) = (attribute_kind(column), raw.get(column)) else {
            continue;
        };
        match coerce(kind, value) {
            Ok(coerced) => {
                record.attributes.insert(column.to_string(), coerced);
            }
            Err(message) => {
                warn!("Station '{}': {} '{}' {}", record.name, column, value, message);
                record.warnings.push(FieldWarning {
                    field: column.to_string(),
                    value: value.to_string(),
                    message,
                });
            }
        }
    }

    Ok(record)
}

fn parse_coordinate(
    raw: &RawRecord,
    field: &str,
    (min, max): (f64, f64),
) -> Result<f64, RecordError> {
    let text = raw.get(field).ok_or_else(|| RecordError::missing(field))?;
    parse_decimal(text)
        .filter(|value| (min..=max).contains(value))
        .ok_or_else(|| RecordError::invalid_coordinate(field, text))
}

/// Parse a decimal, accepting a comma as the decimal separator
pub fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    let normalised = if text.contains(',') && !text.contains('.') {
        text.replace(',', ".")
    } else {
        text.to_string()
    };
    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interpret a yes/no capability flag
pub fn parse_flag(text: &str) -> Option<bool> {
    let upper = text.trim().to_uppercase();
    if flag_values::TRUTHY.contains(&upper.as_str()) {
        Some(true)
    } else if flag_values::FALSY.contains(&upper.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn coerce(kind: AttributeKind, value: &str) -> Result<AttributeValue, String> {
    match kind {
        AttributeKind::Integer => value
            .parse::<i64>()
            .ok()
            .or_else(|| {
                // Spreadsheet exports often write identifiers as "12.0"
                parse_decimal(value)
                    .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                    .map(|v| v as i64)
            })
            .map(AttributeValue::Integer)
            .ok_or_else(|| "is not a whole number".to_string()),
        AttributeKind::Decimal => parse_decimal(value)
            .map(AttributeValue::Decimal)
            .ok_or_else(|| "is not a decimal number".to_string()),
        AttributeKind::Flag => parse_flag(value)
            .map(AttributeValue::Flag)
            .ok_or_else(|| "is not a yes/no value".to_string()),
        AttributeKind::Text => Ok(AttributeValue::Text(value.to_string())),
    }
}
