//! Sequential suffix allocation within a grid cell
//!
//! The allocator picks the suffix for a new code from the codes already in
//! the registry and those handed out earlier in the same run. Run state
//! lives in an explicit `AllocationSet` so that separate runs, and separate
//! grid cells within one run, never share hidden state.

use crate::config::SuffixStrategy;
use crate::constants::MAX_SUFFIX;
use crate::error::RecordError;
use crate::models::{GridCell, PartialCode, StationCode};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Codes handed out (or reserved) during one batch run, grouped by grid cell
#[derive(Debug, Clone, Default)]
pub struct AllocationSet {
    cells: HashMap<GridCell, BTreeSet<StationCode>>,
}

impl AllocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a code as taken for this run
    ///
    /// Returns `false` if the code was already present.
    pub fn reserve(&mut self, code: StationCode) -> bool {
        self.cells.entry(code.grid_cell()).or_default().insert(code)
    }

    pub fn contains(&self, code: &StationCode) -> bool {
        self.cells
            .get(&code.grid_cell())
            .is_some_and(|codes| codes.contains(code))
    }

    /// Codes taken in a cell, in ascending order
    pub fn codes(&self, cell: &GridCell) -> impl Iterator<Item = &StationCode> {
        self.cells.get(cell).into_iter().flatten()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move one cell's codes out into a set of their own
    pub fn split_cell(&mut self, cell: &GridCell) -> AllocationSet {
        let mut split = AllocationSet::new();
        if let Some(codes) = self.cells.remove(cell) {
            split.cells.insert(*cell, codes);
        }
        split
    }

    /// Fold another set's codes into this one
    pub fn merge(&mut self, other: AllocationSet) {
        for (cell, codes) in other.cells {
            self.cells.entry(cell).or_default().extend(codes);
        }
    }
}

/// Picks the next sequential suffix for a grid cell
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceAllocator {
    strategy: SuffixStrategy,
}

impl SequenceAllocator {
    pub fn new(strategy: SuffixStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SuffixStrategy {
        self.strategy
    }

    /// Allocate a new code in `cell`
    ///
    /// The chosen code is absent from both `registry_codes` and `run`, and is
    /// added to `run` before returning. On `GridCellExhausted` the run set is
    /// left unchanged.
    pub fn allocate(
        &self,
        cell: &GridCell,
        partial: &PartialCode,
        registry_codes: &BTreeSet<StationCode>,
        run: &mut AllocationSet,
    ) -> Result<StationCode, RecordError> {
        let taken: HashSet<u16> = registry_codes
            .iter()
            .chain(run.codes(cell))
            .filter(|code| code.partial() == partial.as_str())
            .map(StationCode::suffix)
            .collect();

        let suffix = match self.strategy {
            SuffixStrategy::LowestFree => (0..=MAX_SUFFIX).find(|n| !taken.contains(n)),
            SuffixStrategy::AfterHighest => match taken.iter().max() {
                Some(&highest) if highest >= MAX_SUFFIX => None,
                Some(&highest) => Some(highest + 1),
                None => Some(1),
            },
        };

        let code = suffix
            .and_then(|n| StationCode::from_parts(partial, n))
            .ok_or(RecordError::GridCellExhausted { cell: *cell })?;

        debug!(
            "Allocated {} in cell {} ({} suffixes taken)",
            code,
            cell,
            taken.len()
        );
        run.reserve(code.clone());
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> (GridCell, PartialCode) {
        let cell = GridCell::new(6, 37);
        (cell, cell.partial_code())
    }

    fn codes(partial: &PartialCode, suffixes: impl IntoIterator<Item = u16>) -> BTreeSet<StationCode> {
        suffixes
            .into_iter()
            .map(|n| StationCode::from_parts(partial, n).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_cell_starts_at_zero() {
        let (cell, partial) = cell();
        let mut run = AllocationSet::new();
        let allocator = SequenceAllocator::default();

        let code = allocator
            .allocate(&cell, &partial, &BTreeSet::new(), &mut run)
            .unwrap();

        assert_eq!(code.as_str(), "0006037000");
        assert!(run.contains(&code));
    }

    #[test]
    fn test_next_after_taken_prefix() {
        let (cell, partial) = cell();
        let registry = codes(&partial, 0..=5);
        let mut run = AllocationSet::new();

        let code = SequenceAllocator::default()
            .allocate(&cell, &partial, &registry, &mut run)
            .unwrap();

        assert_eq!(code.suffix(), 6);
    }

    #[test]
    fn test_gaps_are_filled_first() {
        let (cell, partial) = cell();
        let registry = codes(&partial, [0, 1, 3, 7]);
        let mut run = AllocationSet::new();
        let allocator = SequenceAllocator::default();

        let first = allocator.allocate(&cell, &partial, &registry, &mut run).unwrap();
        let second = allocator.allocate(&cell, &partial, &registry, &mut run).unwrap();
        let third = allocator.allocate(&cell, &partial, &registry, &mut run).unwrap();

        assert_eq!(
            [first.suffix(), second.suffix(), third.suffix()],
            [2, 4, 5]
        );
    }

    #[test]
    fn test_run_allocations_are_never_reused() {
        let (cell, partial) = cell();
        let registry = codes(&partial, [1, 2]);
        let mut run = AllocationSet::new();
        let allocator = SequenceAllocator::default();

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let code = allocator.allocate(&cell, &partial, &registry, &mut run).unwrap();
            assert!(!registry.contains(&code));
            assert!(seen.insert(code));
        }
        assert_eq!(run.len(), 50);
    }

    #[test]
    fn test_exhausted_cell() {
        let (cell, partial) = cell();
        let registry = codes(&partial, 0..=MAX_SUFFIX);
        let mut run = AllocationSet::new();

        let result = SequenceAllocator::default().allocate(&cell, &partial, &registry, &mut run);

        assert_eq!(result, Err(RecordError::GridCellExhausted { cell }));
        assert!(run.is_empty());
    }

    #[test]
    fn test_exhaustion_across_registry_and_run() {
        let (cell, partial) = cell();
        let registry = codes(&partial, 0..500);
        let mut run = AllocationSet::new();
        for code in codes(&partial, 500..=MAX_SUFFIX) {
            run.reserve(code);
        }

        let result = SequenceAllocator::default().allocate(&cell, &partial, &registry, &mut run);
        assert!(matches!(result, Err(RecordError::GridCellExhausted { .. })));
        assert_eq!(run.len(), 500);
    }

    #[test]
    fn test_after_highest_strategy() {
        let (cell, partial) = cell();
        let allocator = SequenceAllocator::new(SuffixStrategy::AfterHighest);
        let mut run = AllocationSet::new();

        let first = allocator
            .allocate(&cell, &partial, &BTreeSet::new(), &mut run)
            .unwrap();
        assert_eq!(first.suffix(), 1);

        let registry = codes(&partial, [2, 40]);
        let next = allocator.allocate(&cell, &partial, &registry, &mut run).unwrap();
        assert_eq!(next.suffix(), 41);

        let full = codes(&partial, [MAX_SUFFIX]);
        assert!(allocator.allocate(&cell, &partial, &full, &mut run).is_err());
    }

    #[test]
    fn test_other_cells_do_not_interfere() {
        let (cell, partial) = cell();
        let other = GridCell::new(7, 37).partial_code();
        let registry = codes(&other, 0..10);
        let mut run = AllocationSet::new();

        let code = SequenceAllocator::default()
            .allocate(&cell, &partial, &registry, &mut run)
            .unwrap();
        assert_eq!(code.suffix(), 0);
    }

    #[test]
    fn test_split_and_merge() {
        let (cell, partial) = cell();
        let other = GridCell::new(10, 40);
        let mut run = AllocationSet::new();
        run.reserve(StationCode::from_parts(&partial, 3).unwrap());
        run.reserve(StationCode::from_parts(&other.partial_code(), 9).unwrap());

        let split = run.split_cell(&cell);
        assert_eq!(split.len(), 1);
        assert_eq!(run.len(), 1);
        assert_eq!(run.codes(&cell).count(), 0);

        run.merge(split);
        assert_eq!(run.len(), 2);
        assert_eq!(run.cell_count(), 2);
    }
}
