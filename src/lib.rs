//! Pluvio Coder Library
//!
//! Assigns national station codes (`0LLLOOONNN`) to new rainfall-monitoring
//! stations. A code is built from the station's integer-degree grid cell
//! plus a three-digit sequential number that is unique within that cell,
//! across both the persisted registry and the codes generated earlier in
//! the same batch.
//!
//! This library provides tools for:
//! - Validating candidate station rows and coercing their optional fields
//! - Encoding coordinates into grid cells and partial codes
//! - Allocating sequential suffixes against a registry of issued codes
//! - Processing whole batches with per-record outcomes, sequentially or
//!   concurrently per grid cell
//! - Reading import tables and registry exports, and writing coded exports

pub mod allocator;
pub mod cli;
pub mod config;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod models;
pub mod processor;
pub mod registry;
pub mod table;
pub mod validator;

// Re-export commonly used types
pub use allocator::{AllocationSet, SequenceAllocator};
pub use config::{CoderConfig, SuffixStrategy};
pub use encoder::encode;
pub use error::{CoderError, RecordError, Result};
pub use models::{GridCell, PartialCode, RawRecord, StationCode, StationRecord};
pub use processor::{BatchProcessor, BatchResult, Outcome, RecordOutcome};
pub use registry::{CsvRegistry, InMemoryRegistry, RegistryAdapter};
pub use validator::validate;
