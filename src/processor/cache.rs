//! Per-run cache of registry codes
//!
//! Each distinct grid cell in a batch is looked up in the registry exactly
//! once, before any allocation starts. Codes committed to the registry by
//! other actors after that point are not observed during the run.

use crate::error::Result;
use crate::models::{GridCell, StationCode};
use crate::registry::RegistryAdapter;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

static NO_CODES: BTreeSet<StationCode> = BTreeSet::new();

#[derive(Debug, Default)]
pub struct RegistryCache {
    cells: HashMap<GridCell, BTreeSet<StationCode>>,
}

impl RegistryCache {
    /// Query the registry once for every cell
    pub fn prefetch<'a>(
        registry: &dyn RegistryAdapter,
        cells: impl IntoIterator<Item = &'a GridCell>,
    ) -> Result<Self> {
        let mut cache = Self::default();
        for cell in cells {
            if cache.cells.contains_key(cell) {
                continue;
            }
            let codes = registry.existing_codes(cell)?;
            debug!("Registry holds {} codes for cell {}", codes.len(), cell);
            cache.cells.insert(*cell, codes);
        }
        Ok(cache)
    }

    /// Build from results already fetched elsewhere
    pub fn from_entries(entries: impl IntoIterator<Item = (GridCell, BTreeSet<StationCode>)>) -> Self {
        Self {
            cells: entries.into_iter().collect(),
        }
    }

    /// Registry codes for a cell; empty if the cell was never fetched
    pub fn codes(&self, cell: &GridCell) -> &BTreeSet<StationCode> {
        self.cells.get(cell).unwrap_or(&NO_CODES)
    }

    /// Number of registry queries this cache answered for
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
