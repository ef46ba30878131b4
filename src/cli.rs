//! Command-line interface components.

use crate::config::{CoderConfig, SuffixStrategy};
use crate::constants::DEFAULT_OUTPUT_SUFFIX;
use crate::models::BatchStats;
use crate::processor::BatchProcessor;
use crate::processor::reader::read_station_csv;
use crate::processor::writer::write_station_csv;
use crate::registry::{CsvRegistry, InMemoryRegistry, RegistryAdapter};

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "pluvio-coder")]
#[command(about = "Generate national station codes for new rainfall stations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// CSV export of the candidate stations table (Estacoes_Novas)
    #[arg(value_name = "INPUT")]
    pub input_path: PathBuf,

    /// Output CSV path (defaults to <input>_codificadas.csv)
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// CSV export of the station registry used to avoid existing codes
    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    /// Suffix allocation strategy (lowest-free, after-highest)
    #[arg(long, default_value = "lowest-free")]
    pub strategy: String,

    /// Generate new codes even for rows that already have one
    #[arg(long)]
    pub no_skip_coded: bool,

    /// Field delimiter used by the input, registry and output files
    #[arg(short, long, default_value_t = ',')]
    pub delimiter: char,

    /// Process grid cells in parallel
    #[arg(long)]
    pub concurrent: bool,

    /// Number of parallel workers (defaults to the CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Get the output path, defaulting to <input stem>_codificadas.csv beside the input
    pub fn get_output_path(&self) -> PathBuf {
        match &self.output_path {
            Some(path) => path.clone(),
            None => default_output_path(&self.input_path),
        }
    }

    pub fn get_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Build the run configuration from command-line flags
    pub fn to_config(&self) -> Result<CoderConfig> {
        let strategy: SuffixStrategy = self.strategy.parse()?;
        if !self.delimiter.is_ascii() {
            anyhow::bail!("Delimiter must be a single ASCII character");
        }

        let mut config = CoderConfig::default()
            .with_suffix_strategy(strategy)
            .with_delimiter(self.delimiter as u8)
            .with_progress();
        if self.no_skip_coded {
            config = config.without_skip_coded_records();
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config.validate()?;
        Ok(config)
    }
}

fn default_output_path(input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    input_path.with_file_name(format!("{}{}.csv", stem, DEFAULT_OUTPUT_SUFFIX))
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pluvio_coder={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Run a complete import, coding and export cycle
pub async fn run(args: Args) -> Result<BatchStats> {
    setup_logging(&args);
    let config = args.to_config()?;
    let output_path = args.get_output_path();
    let delimiter = config.delimiter;

    println!("{}", "Starting station coding".bright_green().bold());
    println!("  {} {}", "Input:".bright_cyan(), args.input_path.display());
    println!("  {} {}", "Output:".bright_cyan(), output_path.display());

    // Read the import table
    let input_path = args.input_path.clone();
    let batch = task::spawn_blocking(move || read_station_csv(&input_path, delimiter))
        .await
        .context("Import task failed")?
        .with_context(|| format!("Failed to read {}", args.input_path.display()))?;
    println!(
        "  {} {} candidate stations",
        "Found".bright_green(),
        batch.len().to_string().bright_white().bold()
    );

    // Load the registry, or fall back to an empty one
    let registry: Arc<dyn RegistryAdapter> = match &args.registry {
        Some(path) => {
            let path = path.clone();
            let filter = config.registry_filter.clone();
            let registry = task::spawn_blocking(move || CsvRegistry::load(&path, &filter, delimiter))
                .await
                .context("Registry task failed")??;
            println!(
                "  {} {} existing codes from {}",
                "Loaded".bright_green(),
                registry.len().to_string().bright_white().bold(),
                registry.path().display()
            );
            Arc::new(registry)
        }
        None => {
            warn!("No registry given; codes are only unique within this batch");
            Arc::new(InMemoryRegistry::new())
        }
    };

    // Code the batch
    let columns = batch.columns.clone();
    let processor = BatchProcessor::new(config);
    let result = if args.concurrent {
        processor.process_concurrent(batch.records, registry).await?
    } else {
        let records = batch.records;
        task::spawn_blocking(move || {
            let pb = ProgressBar::new(records.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message("Coding stations");
            let progress = processor.config().show_progress.then_some(&pb);
            let result = processor.process_with_progress(records, registry.as_ref(), progress);
            pb.finish_and_clear();
            result
        })
        .await
        .context("Processing task failed")??
    };

    // Write the export and report
    let out = output_path.clone();
    task::spawn_blocking(move || {
        write_station_csv(&out, &columns, &result, delimiter).map(|_| result)
    })
    .await
    .context("Export task failed")?
    .map(|result| print_summary(&result.stats, &output_path))
    .with_context(|| format!("Failed to write {}", output_path.display()))
}

fn print_summary(stats: &BatchStats, output_path: &Path) -> BatchStats {
    println!("\n{}", "Coding Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Started:".bright_cyan(),
        stats.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {} ({:.1}%)",
        "Coded:".bright_cyan(),
        stats.coded.to_string().bright_white().bold(),
        stats.success_rate()
    );
    if stats.skipped > 0 {
        println!(
            "  {} {}",
            "Already coded:".bright_yellow(),
            stats.skipped.to_string().bright_yellow()
        );
    }
    if stats.rejected > 0 {
        println!(
            "  {} {}",
            "Rejected:".bright_red(),
            stats.rejected.to_string().bright_red().bold()
        );
    }
    if stats.warnings > 0 {
        println!(
            "  {} {}",
            "Field warnings:".bright_yellow(),
            stats.warnings.to_string().bright_yellow()
        );
    }
    println!(
        "  {} {}",
        "Grid cells:".bright_cyan(),
        stats.distinct_cells.to_string().bright_white()
    );
    println!("  {} {}", "Saved to:".bright_cyan(), output_path.display());
    stats.clone()
}
