//! CLI command implementations

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tracealloc_core::trace::{SampleSummary, TraceSamples, size_histogram};
use tracealloc_core::{
    AllocatorStatistics, ExtractionConfig, FirstFitAllocator, NopAllocator, SimulationConfig,
    TraceAllocConfig, TraceAllocError, TraceRecord,
};
use tracealloc_sim::{ReplayReport, SampleParameters, SimulationError, WorkloadSimulation};

/// Default simulated heap for the first-fit allocator (1 GiB).
const DEFAULT_HEAP_SIZE: u64 = 1 << 30;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Replay a sampled workload against an allocator
    Simulate(SimulateArgs),
    /// Extract size, interval and lifetime samples from a trace
    Extract {
        /// Normalized trace file, stdin when omitted
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Largest allocation size kept
        #[arg(long)]
        max_size: Option<u64>,
        /// Largest gap between allocations kept
        #[arg(long)]
        max_interval: Option<u64>,
        /// Lifetimes at or below this are dropped
        #[arg(long)]
        lifetime_floor: Option<u64>,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a bucketed allocation size histogram
    Histogram {
        /// Bucket width in bytes
        #[arg(short, long)]
        bucket: Option<u64>,
        /// Sizes above this are dropped
        #[arg(short, long)]
        limit: Option<u64>,
        /// Normalized trace file, stdin when omitted
        #[arg(short, long)]
        trace: Option<PathBuf>,
    },
    /// Print the reference distribution parameters
    Params,
}

/// Allocator replayed by `simulate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AllocatorKind {
    /// Accepts every request without tracking memory
    Nop,
    /// First-fit free list over a simulated heap
    FirstFit,
}

/// Arguments of the `simulate` command
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of allocation requests
    #[arg(short, long)]
    pub events: Option<usize>,
    /// Size alignment in bytes
    #[arg(short, long)]
    pub alignment: Option<u64>,
    /// Fraction of requests between periodic statistics reports
    #[arg(long)]
    pub report_fraction: Option<f64>,
    /// Seed for reproducible runs
    #[arg(short, long)]
    pub seed: Option<u64>,
    /// JSON file with size, interval and duration parameters
    #[arg(short, long)]
    pub params: Option<PathBuf>,
    /// Allocator to replay against
    #[arg(long, value_enum, default_value_t = AllocatorKind::Nop)]
    pub allocator: AllocatorKind,
    /// Heap capacity of the first-fit allocator in bytes
    #[arg(long, default_value_t = DEFAULT_HEAP_SIZE)]
    pub heap_size: u64,
}

#[derive(Serialize)]
struct SimulationOutput {
    report: ReplayReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    statistics: Vec<AllocatorStatistics>,
}

#[derive(Serialize)]
struct ExtractionOutput {
    samples: TraceSamples,
    sizes: SampleSummary,
    intervals: SampleSummary,
    lifetimes: SampleSummary,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub fn handle_command(command: Commands) -> Result<()> {
    let config = TraceAllocConfig::from_env();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Simulate(args) => simulate(&args, config.simulation, &mut out),
        Commands::Extract {
            trace,
            max_size,
            max_interval,
            lifetime_floor,
            output,
        } => {
            let mut extraction = config.extraction;
            extraction.max_size = max_size.unwrap_or(extraction.max_size);
            extraction.max_interval = max_interval.unwrap_or(extraction.max_interval);
            extraction.lifetime_floor = lifetime_floor.unwrap_or(extraction.lifetime_floor);

            let records = load_records(trace.as_deref())?;
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    extract(&records, &extraction, &mut BufWriter::new(file))?;
                    writeln!(out, "Samples written to {}", path.display())?;
                    Ok(())
                }
                None => extract(&records, &extraction, &mut out),
            }
        }
        Commands::Histogram {
            bucket,
            limit,
            trace,
        } => {
            let mut extraction = config.extraction;
            extraction.histogram_bucket = bucket.unwrap_or(extraction.histogram_bucket);
            extraction.histogram_limit = limit.unwrap_or(extraction.histogram_limit);

            let records = load_records(trace.as_deref())?;
            histogram(&records, &extraction, &mut out)
        }
        Commands::Params => print_params(&mut out),
    }
}

/// Applies `simulate` flags over the environment-derived configuration.
pub fn apply_overrides(mut config: SimulationConfig, args: &SimulateArgs) -> SimulationConfig {
    if let Some(events) = args.events {
        config.event_count = events;
    }
    if let Some(alignment) = args.alignment {
        config.alignment = alignment;
    }
    if let Some(fraction) = args.report_fraction {
        config.report_threshold_fraction = fraction;
    }
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }
    config
}

/// Replay a sampled workload and print the report as JSON
///
/// # Errors
/// - Parameter file missing or not valid JSON
/// - `SimulationError` - Invalid configuration, parameters or allocator fault
pub fn simulate(args: &SimulateArgs, base: SimulationConfig, out: &mut impl Write) -> Result<()> {
    let config = apply_overrides(base, args);
    let parameters = match &args.params {
        Some(path) => load_params(path)?,
        None => SampleParameters::reference_workload(),
    };

    let mut simulation = WorkloadSimulation::new(config, &parameters)
        .context("Failed to configure simulation")?;

    tracing::info!(
        "Replaying {} requests against {:?} allocator (seed {})",
        simulation.config().event_count,
        args.allocator,
        simulation.seed()
    );

    let output = match args.allocator {
        AllocatorKind::Nop => SimulationOutput {
            report: simulation.run(&mut NopAllocator::new())?,
            statistics: Vec::new(),
        },
        AllocatorKind::FirstFit => {
            let mut allocator = FirstFitAllocator::new(args.heap_size);
            let report = simulation.run(&mut allocator)?;
            let mut statistics = allocator.reports().to_vec();
            statistics.push(allocator.statistics());
            SimulationOutput { report, statistics }
        }
    };

    tracing::info!("{}", output.report.summary());

    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

/// Extract samples and write them with summaries as JSON
///
/// # Errors
/// - Output could not be written
pub fn extract(
    records: &[TraceRecord],
    config: &ExtractionConfig,
    out: &mut impl Write,
) -> Result<()> {
    let samples = TraceSamples::extract(records, config);
    let output = ExtractionOutput {
        sizes: SampleSummary::of(&samples.sizes),
        intervals: SampleSummary::of(&samples.intervals),
        lifetimes: SampleSummary::of(&samples.lifetimes),
        samples,
    };

    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Print `size count` lines of the size histogram
///
/// # Errors
/// - `TraceAllocError::Configuration` - Bucket width or limit is zero
pub fn histogram(
    records: &[TraceRecord],
    config: &ExtractionConfig,
    out: &mut impl Write,
) -> Result<()> {
    config.validate()?;
    let bucket = NonZeroU64::new(config.histogram_bucket)
        .context("histogram bucket must be a positive integer")?;

    for (size, count) in size_histogram(records, bucket, config.histogram_limit) {
        writeln!(out, "{size} {count}")?;
    }
    Ok(())
}

/// Print the reference parameters as JSON
///
/// # Errors
/// - Output could not be written
pub fn print_params(out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &SampleParameters::reference_workload())?;
    writeln!(out)?;
    Ok(())
}

fn load_params(path: &Path) -> Result<SampleParameters> {
    let file =
        File::open(path).with_context(|| format!("Failed to open parameters {}", path.display()))?;
    parse_params(BufReader::new(file))
        .with_context(|| format!("Invalid parameters in {}", path.display()))
}

fn parse_params(reader: impl Read) -> tracealloc_core::Result<SampleParameters> {
    Ok(serde_json::from_reader(reader)?)
}

fn load_records(trace: Option<&Path>) -> Result<Vec<TraceRecord>> {
    match trace {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open trace {}", path.display()))?;
            read_trace(BufReader::new(file))
                .with_context(|| format!("Failed to read trace {}", path.display()))
        }
        None => read_trace(io::stdin().lock()).context("Failed to read trace from stdin"),
    }
}

fn read_trace(reader: impl BufRead) -> tracealloc_core::Result<Vec<TraceRecord>> {
    Ok(tracealloc_core::trace::read_records(reader)?)
}

/// Whether a failed command was caused by bad input rather than the
/// environment.
pub fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(failure) = cause.downcast_ref::<TraceAllocError>() {
            return failure.is_user_error();
        }
        matches!(
            cause.downcast_ref::<SimulationError>(),
            Some(
                SimulationError::InvalidConfiguration { .. }
                    | SimulationError::InvalidParameters { .. }
            )
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const TRACE: &str = "\
1 100 malloc 16 4096
1 150 malloc 4000 8192
1 2000000 free 4096
";

    fn simulate_args() -> SimulateArgs {
        SimulateArgs {
            events: Some(50),
            alignment: None,
            report_fraction: Some(0.5),
            seed: Some(11),
            params: None,
            allocator: AllocatorKind::Nop,
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }

    #[test]
    fn test_flags_override_environment() {
        let base = SimulationConfig {
            event_count: 10,
            alignment: 16,
            random_seed: Some(1),
            ..Default::default()
        };

        let config = apply_overrides(base, &simulate_args());
        assert_eq!(config.event_count, 50);
        assert_eq!(config.alignment, 16);
        assert_eq!(config.report_threshold_fraction, 0.5);
        assert_eq!(config.random_seed, Some(11));
    }

    #[test]
    fn test_simulate_prints_report_json() {
        let mut out = Vec::new();
        simulate(&simulate_args(), SimulationConfig::default(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["report"]["events_dispatched"], 100);
        assert_eq!(value["report"]["periodic_reports"], 2);
        assert_eq!(value["report"]["seed"], 11);
        assert!(value.get("statistics").is_none());
    }

    #[test]
    fn test_simulate_first_fit_includes_statistics() {
        let args = SimulateArgs {
            allocator: AllocatorKind::FirstFit,
            heap_size: 1 << 20,
            ..simulate_args()
        };

        let mut out = Vec::new();
        simulate(&args, SimulationConfig::default(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let statistics = value["statistics"].as_array().unwrap();
        // Two periodic snapshots plus the final one
        assert_eq!(statistics.len(), 3);
        assert_eq!(statistics[2]["bytes_in_use"], 0);
    }

    #[test]
    fn test_simulate_reads_params_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let parameters = SampleParameters::constant(10.0, 1.0, 5.0);
        std::fs::write(&path, serde_json::to_vec(&parameters).unwrap()).unwrap();

        let args = SimulateArgs {
            params: Some(path),
            ..simulate_args()
        };
        let mut out = Vec::new();
        simulate(&args, SimulationConfig::default(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        // Births 0..49, each living 5 ticks
        assert_eq!(value["report"]["final_time"], 54);
        assert_eq!(value["report"]["peak_live_objects"], 5);
    }

    #[test]
    fn test_invalid_params_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{\"size\": 3}").unwrap();

        let args = SimulateArgs {
            params: Some(path),
            ..simulate_args()
        };
        let error = simulate(&args, SimulationConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(error.to_string().starts_with("Invalid parameters"));
        assert!(is_user_error(&error));
    }

    #[test]
    fn test_missing_trace_is_not_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_records(Some(&dir.path().join("missing.trace"))).unwrap_err();
        assert!(!is_user_error(&error));
    }

    #[test]
    fn test_malformed_trace_is_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.trace");
        std::fs::write(&path, "1 100 malloc big 4096\n").unwrap();

        let error = load_records(Some(&path)).unwrap_err();
        assert!(error.to_string().starts_with("Failed to read trace"));
        assert!(is_user_error(&error));
    }

    #[test]
    fn test_invalid_alignment_is_user_error() {
        let args = SimulateArgs {
            alignment: Some(0),
            ..simulate_args()
        };
        let error = simulate(&args, SimulationConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(is_user_error(&error));
    }

    #[test]
    fn test_histogram_lines() {
        let records = read_trace(Cursor::new(TRACE)).unwrap();
        let mut out = Vec::new();
        histogram(&records, &ExtractionConfig::default(), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "0 1\n4000 1\n");
    }

    #[test]
    fn test_histogram_rejects_zero_bucket() {
        let config = ExtractionConfig {
            histogram_bucket: 0,
            ..Default::default()
        };
        assert!(histogram(&[], &config, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_extract_json() {
        let records = read_trace(Cursor::new(TRACE)).unwrap();
        let mut out = Vec::new();
        extract(&records, &ExtractionConfig::default(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["samples"]["sizes"], serde_json::json!([16]));
        assert_eq!(value["samples"]["intervals"], serde_json::json!([50]));
        assert_eq!(value["samples"]["lifetimes"], serde_json::json!([1999900]));
        assert_eq!(value["sizes"]["count"], 1);
    }
}
