//! Batch processing engine.
//!
//! Runs every candidate station through validation, coordinate encoding
//! and suffix allocation, producing exactly one outcome per input record in
//! input order. A rejected record never stops the batch; only a registry
//! failure aborts the run.

pub mod cache;
pub mod reader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::cache::RegistryCache;

use crate::allocator::{AllocationSet, SequenceAllocator};
use crate::config::CoderConfig;
use crate::constants::{fields, status_labels};
use crate::encoder::encode;
use crate::error::{CoderError, RecordError, Result};
use crate::models::{BatchStats, GridCell, PartialCode, RawRecord, StationCode, StationRecord};
use crate::registry::RegistryAdapter;
use crate::validator::validate;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info, warn};

/// Furthest point a record reached in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordStage {
    Pending,
    Validated,
    Encoded,
    Allocated,
    Done,
}

/// Final state of one input record
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new code was generated
    Coded {
        record: StationRecord,
        code: StationCode,
    },
    /// The row already carried a code and was left as it was
    Skipped {
        record: StationRecord,
        existing_code: String,
    },
    /// The record failed after reaching `stage`
    Rejected {
        reason: RecordError,
        stage: RecordStage,
    },
}

/// An input record paired with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Position in the input batch
    pub index: usize,
    pub raw: RawRecord,
    pub outcome: Outcome,
}

impl RecordOutcome {
    /// Code written to the export: the new one, or the one the row already had
    pub fn code(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Coded { code, .. } => Some(code.as_str()),
            Outcome::Skipped { existing_code, .. } => Some(existing_code),
            Outcome::Rejected { .. } => self.raw.get(fields::CODE),
        }
    }

    pub fn stage(&self) -> RecordStage {
        match &self.outcome {
            Outcome::Coded { .. } | Outcome::Skipped { .. } => RecordStage::Done,
            Outcome::Rejected { stage, .. } => *stage,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match &self.outcome {
            Outcome::Coded { .. } => status_labels::CODED,
            Outcome::Skipped { .. } => status_labels::SKIPPED,
            Outcome::Rejected { .. } => status_labels::REJECTED,
        }
    }

    /// Rejection reason, or the record's coercion warnings joined together
    pub fn note(&self) -> Option<String> {
        let record = match &self.outcome {
            Outcome::Rejected { reason, .. } => return Some(reason.to_string()),
            Outcome::Coded { record, .. } | Outcome::Skipped { record, .. } => record,
        };
        if record.warnings.is_empty() {
            None
        } else {
            let warnings: Vec<String> = record.warnings.iter().map(|w| w.to_string()).collect();
            Some(warnings.join("; "))
        }
    }

    pub fn is_coded(&self) -> bool {
        matches!(self.outcome, Outcome::Coded { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, Outcome::Rejected { .. })
    }
}

/// Outcomes of one run, in input order, plus summary counters
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub outcomes: Vec<RecordOutcome>,
    pub stats: BatchStats,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Newly coded stations with their codes
    pub fn coded(&self) -> impl Iterator<Item = (&StationRecord, &StationCode)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Coded { record, code } => Some((record, code)),
            _ => None,
        })
    }

    /// Rejected input rows with their reasons
    pub fn rejected(&self) -> impl Iterator<Item = (&RawRecord, &RecordError)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Rejected { reason, .. } => Some((&o.raw, reason)),
            _ => None,
        })
    }
}

/// A record that passed validation and encoding and awaits its suffix
#[derive(Debug)]
struct Encoded {
    record: StationRecord,
    cell: GridCell,
    partial: PartialCode,
}

impl Encoded {
    fn allocate(
        self,
        allocator: &SequenceAllocator,
        registry_codes: &BTreeSet<StationCode>,
        run: &mut AllocationSet,
    ) -> Outcome {
        match allocator.allocate(&self.cell, &self.partial, registry_codes, run) {
            Ok(code) => Outcome::Coded {
                record: self.record,
                code,
            },
            Err(reason) => {
                warn!("Station '{}' not coded: {}", self.record.name, reason);
                Outcome::Rejected {
                    reason,
                    stage: RecordStage::Encoded,
                }
            }
        }
    }
}

/// Record state between staging and allocation
#[derive(Debug)]
enum Staged {
    Settled(Outcome),
    Encoded(Encoded),
}

/// Assigns station codes to a batch of candidate records
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: CoderConfig,
    allocator: SequenceAllocator,
}

impl BatchProcessor {
    pub fn new(config: CoderConfig) -> Self {
        let allocator = SequenceAllocator::new(config.suffix_strategy);
        Self { config, allocator }
    }

    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    /// Process a batch one record at a time
    pub fn process(
        &self,
        records: Vec<RawRecord>,
        registry: &dyn RegistryAdapter,
    ) -> Result<BatchResult> {
        self.process_with_progress(records, registry, None)
    }

    /// Process a batch, advancing `progress` once per record
    pub fn process_with_progress(
        &self,
        records: Vec<RawRecord>,
        registry: &dyn RegistryAdapter,
        progress: Option<&ProgressBar>,
    ) -> Result<BatchResult> {
        let start_time = Instant::now();
        info!("Processing batch of {} station records", records.len());

        // Validate and encode everything before touching the registry
        let mut run = AllocationSet::new();
        let staged = self.stage(&records, &mut run);

        // One registry query per grid cell
        let cells = distinct_cells(&staged);
        let cache = RegistryCache::prefetch(registry, &cells)?;

        // Allocate in input order so earlier rows get lower suffixes
        let outcomes: Vec<Outcome> = staged
            .into_iter()
            .map(|item| {
                let outcome = match item {
                    Staged::Settled(outcome) => outcome,
                    Staged::Encoded(encoded) => {
                        let registry_codes = cache.codes(&encoded.cell);
                        encoded.allocate(&self.allocator, registry_codes, &mut run)
                    }
                };
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                outcome
            })
            .collect();
        debug!("{} codes reserved in this run", run.len());

        Ok(assemble(records, outcomes, cells.len(), cache.len(), start_time))
    }

    /// Process a batch with registry queries and per-cell allocation in parallel
    ///
    /// Records sharing a grid cell are allocated by a single task in input
    /// order, so the result is identical to [`BatchProcessor::process`].
    pub async fn process_concurrent(
        &self,
        records: Vec<RawRecord>,
        registry: Arc<dyn RegistryAdapter>,
    ) -> Result<BatchResult> {
        let start_time = Instant::now();
        let workers = self.config.workers.max(1);
        info!(
            "Processing batch of {} station records with {} workers",
            records.len(),
            workers
        );

        // Stage 1: validate, reserve existing codes, encode
        let mut run = AllocationSet::new();
        let staged = self.stage(&records, &mut run);
        let cells = distinct_cells(&staged);

        // Stage 2: fetch registry codes for every cell in parallel
        let fetched = stream::iter(cells.iter().copied())
            .map(|cell| {
                let registry = Arc::clone(&registry);
                async move {
                    task::spawn_blocking(move || {
                        registry.existing_codes(&cell).map(|codes| (cell, codes))
                    })
                    .await
                    .map_err(|e| {
                        CoderError::processing_interrupted(format!(
                            "registry query for cell {} failed: {}",
                            cell, e
                        ))
                    })?
                }
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        let cache = RegistryCache::from_entries(fetched);

        // Stage 3: group encoded records by cell, keeping settled outcomes aside
        let mut outcomes: Vec<(usize, Outcome)> = Vec::with_capacity(staged.len());
        let mut groups: BTreeMap<GridCell, Vec<(usize, Encoded)>> = BTreeMap::new();
        for (index, item) in staged.into_iter().enumerate() {
            match item {
                Staged::Settled(outcome) => outcomes.push((index, outcome)),
                Staged::Encoded(encoded) => {
                    groups.entry(encoded.cell).or_default().push((index, encoded))
                }
            }
        }
        debug!("Allocating across {} grid cells", groups.len());

        // Stage 4: one allocation task per cell, each with its own slice of the run
        let allocator = self.allocator;
        let jobs: Vec<_> = groups
            .into_iter()
            .map(|(cell, entries)| {
                let registry_codes = cache.codes(&cell).clone();
                let cell_run = run.split_cell(&cell);
                async move {
                    task::spawn_blocking(move || {
                        allocate_cell(allocator, entries, registry_codes, cell_run)
                    })
                    .await
                    .map_err(|e| {
                        CoderError::processing_interrupted(format!(
                            "allocation for cell {} failed: {}",
                            cell, e
                        ))
                    })
                }
            })
            .collect();

        let finished = stream::iter(jobs)
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        // Fold the per-cell reservations back and restore input order
        for job in finished {
            let (cell_run, results) = job?;
            run.merge(cell_run);
            outcomes.extend(results);
        }
        debug!("{} codes reserved in this run", run.len());

        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        Ok(assemble(records, outcomes, cells.len(), cache.len(), start_time))
    }

    /// Validate and encode every record, reserving codes of rows that keep theirs
    fn stage(&self, records: &[RawRecord], run: &mut AllocationSet) -> Vec<Staged> {
        records
            .iter()
            .enumerate()
            .map(|(index, raw)| self.stage_record(index, raw, run))
            .collect()
    }

    fn stage_record(&self, index: usize, raw: &RawRecord, run: &mut AllocationSet) -> Staged {
        // Codes already on the row are reserved even if the row is rejected below
        let keeps_code = self.config.skip_coded_records && raw.get(fields::CODE).is_some();
        if keeps_code {
            reserve_existing(raw, run);
        }

        let record = match validate(raw) {
            Ok(record) => record,
            Err(reason) => {
                warn!("Record {} rejected: {}", index + 1, reason);
                return Staged::Settled(Outcome::Rejected {
                    reason,
                    stage: RecordStage::Pending,
                });
            }
        };

        if keeps_code {
            if let Some(existing_code) = record.existing_code.clone() {
                return Staged::Settled(Outcome::Skipped {
                    record,
                    existing_code,
                });
            }
        }

        match encode(record.latitude, record.longitude) {
            Ok((cell, partial)) => Staged::Encoded(Encoded {
                record,
                cell,
                partial,
            }),
            Err(reason) => {
                warn!("Station '{}' rejected: {}", record.name, reason);
                Staged::Settled(Outcome::Rejected {
                    reason,
                    stage: RecordStage::Validated,
                })
            }
        }
    }
}

fn reserve_existing(raw: &RawRecord, run: &mut AllocationSet) {
    let Some(existing_code) = raw.get(fields::CODE) else {
        return;
    };
    match StationCode::parse(existing_code) {
        Some(code) => {
            if !run.reserve(code) {
                warn!(
                    "Code {} appears more than once in this batch",
                    existing_code
                );
            }
        }
        None => warn!("Keeping non-standard code '{}'", existing_code),
    }
}

fn distinct_cells(staged: &[Staged]) -> BTreeSet<GridCell> {
    staged
        .iter()
        .filter_map(|item| match item {
            Staged::Encoded(encoded) => Some(encoded.cell),
            Staged::Settled(_) => None,
        })
        .collect()
}

/// Allocate every entry of one grid cell in input order
fn allocate_cell(
    allocator: SequenceAllocator,
    entries: Vec<(usize, Encoded)>,
    registry_codes: BTreeSet<StationCode>,
    mut run: AllocationSet,
) -> (AllocationSet, Vec<(usize, Outcome)>) {
    let results: Vec<_> = entries
        .into_iter()
        .map(|(index, encoded)| (index, encoded.allocate(&allocator, &registry_codes, &mut run)))
        .collect();
    (run, results)
}

fn assemble(
    records: Vec<RawRecord>,
    outcomes: Vec<Outcome>,
    distinct_cells: usize,
    registry_queries: usize,
    start_time: Instant,
) -> BatchResult {
    let mut stats = BatchStats {
        total_records: records.len(),
        distinct_cells,
        registry_queries,
        ..Default::default()
    };

    for outcome in &outcomes {
        match outcome {
            Outcome::Coded { record, .. } => {
                stats.coded += 1;
                stats.warnings += record.warnings.len();
            }
            Outcome::Skipped { record, .. } => {
                stats.skipped += 1;
                stats.warnings += record.warnings.len();
            }
            Outcome::Rejected { .. } => stats.rejected += 1,
        }
    }

    let outcomes: Vec<RecordOutcome> = records
        .into_iter()
        .zip(outcomes)
        .enumerate()
        .map(|(index, (raw, outcome))| RecordOutcome {
            index,
            raw,
            outcome,
        })
        .collect();
    stats.processing_time_ms = start_time.elapsed().as_millis();

    info!(
        "Batch complete: {} coded, {} skipped, {} rejected across {} grid cells",
        stats.coded, stats.skipped, stats.rejected, stats.distinct_cells
    );

    BatchResult { outcomes, stats }
}
