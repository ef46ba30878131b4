//! Integration tests for the processor module
//!
//! Exercise the complete pipeline against in-memory and file-backed
//! registries.

pub mod file_roundtrip;

use crate::error::{CoderError, Result};
use crate::models::{GridCell, RawRecord, StationCode};
use crate::registry::{InMemoryRegistry, RegistryAdapter};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Build a raw import row with the three required fields
pub fn station(name: &str, latitude: &str, longitude: &str) -> RawRecord {
    RawRecord::new()
        .with("Nome", name)
        .with("Latitude", latitude)
        .with("Longitude", longitude)
}

pub fn code(value: &str) -> StationCode {
    StationCode::parse(value).unwrap()
}

/// Registry wrapper that records every cell it is asked about
#[derive(Default)]
pub struct CountingRegistry {
    pub inner: InMemoryRegistry,
    pub queries: Mutex<Vec<GridCell>>,
}

impl CountingRegistry {
    pub fn new(inner: InMemoryRegistry) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queried_cells(&self) -> Vec<GridCell> {
        self.queries.lock().unwrap().clone()
    }
}

impl RegistryAdapter for CountingRegistry {
    fn existing_codes(&self, cell: &GridCell) -> Result<BTreeSet<StationCode>> {
        self.queries.lock().unwrap().push(*cell);
        self.inner.existing_codes(cell)
    }
}

/// Registry whose backing store cannot be reached
pub struct UnreachableRegistry;

impl RegistryAdapter for UnreachableRegistry {
    fn existing_codes(&self, _cell: &GridCell) -> Result<BTreeSet<StationCode>> {
        Err(CoderError::registry_unavailable("connection refused"))
    }
}
