//! Coordinate encoding into grid cells and partial station codes.
//!
//! Latitude and longitude are truncated toward zero to whole degrees.
//! Southern latitudes keep their absolute degree; latitudes on or north of
//! the Equator are shifted by 80. Longitude keeps only its magnitude.

use crate::constants::{LATITUDE_RANGE, LONGITUDE_RANGE, NORTHERN_LATITUDE_OFFSET};
use crate::error::RecordError;
use crate::models::{GridCell, PartialCode};

/// Map decimal coordinates to their grid cell and 7-digit partial code
pub fn encode(latitude: f64, longitude: f64) -> Result<(GridCell, PartialCode), RecordError> {
    if !in_range(latitude, LATITUDE_RANGE) || !in_range(longitude, LONGITUDE_RANGE) {
        return Err(RecordError::OutOfRangeCoordinate {
            latitude,
            longitude,
        });
    }

    let cell = GridCell::new(latitude_band(latitude), longitude_band(longitude));
    Ok((cell, cell.partial_code()))
}

/// NaN fails both comparisons, so it is rejected here too
fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value >= min && value <= max
}

fn latitude_band(latitude: f64) -> u16 {
    let degrees = latitude.trunc().abs() as u16;
    if latitude < 0.0 {
        degrees
    } else {
        NORTHERN_LATITUDE_OFFSET + degrees
    }
}

fn longitude_band(longitude: f64) -> u16 {
    longitude.trunc().abs() as u16
}
