//! Sample extraction from normalized trace files

use std::fs::File;
use std::io::{BufReader, Write};
use std::num::NonZeroU64;

use tempfile::NamedTempFile;
use tracealloc_core::trace::{SampleSummary, TraceSamples, read_records, size_histogram};
use tracealloc_core::{ExtractionConfig, TraceError, TraceOp};

/// Two processes sharing addresses, a failed malloc and an unknown free.
const TRACE: &str = "\
100 1000 malloc 24 4096
100 1500 malloc 4096 8192
200 1600 malloc 40 4096
100 1700 malloc 8 0
200 30000 malloc 16 12288
200 500000 free 12288
100 2000000 free 4096
200 2000100 free 4096
100 2000200 free 999
100 2600000 realloc 4096 16
short line
";

fn write_trace(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load(file: &NamedTempFile) -> Result<Vec<tracealloc_core::TraceRecord>, TraceError> {
    read_records(BufReader::new(File::open(file.path()).unwrap()))
}

#[test]
fn test_records_skip_incomplete_lines() {
    let file = write_trace(TRACE);
    let records = load(&file).unwrap();

    assert_eq!(records.len(), 9);
    assert_eq!(
        records[3].op,
        TraceOp::Malloc {
            size: 8,
            address: 0
        }
    );
    assert_eq!(records[5].pid, 200);
    assert_eq!(records[5].op, TraceOp::Free { address: 12288 });
}

#[test]
fn test_extracted_samples_match_trace() {
    let file = write_trace(TRACE);
    let records = load(&file).unwrap();

    let samples = TraceSamples::extract(&records, &ExtractionConfig::default());

    // 4096 exceeds the default 2048 size limit
    assert_eq!(samples.sizes, vec![24, 40, 8, 16]);
    // Malloc times 1000, 1500, 1600, 1700, 30000; the last gap exceeds 20000
    assert_eq!(samples.intervals, vec![500, 100, 100]);
    // Address 4096 tracked per process; 12288 lives too briefly
    assert_eq!(samples.lifetimes, vec![1_999_000, 1_998_500]);

    let summary = SampleSummary::of(&samples.sizes);
    assert_eq!(summary.count, 4);
    assert_eq!(summary.min, 8);
    assert_eq!(summary.max, 40);
    assert_eq!(summary.mean, 22.0);
}

#[test]
fn test_extraction_limits_are_configurable() {
    let file = write_trace(TRACE);
    let records = load(&file).unwrap();

    let config = ExtractionConfig {
        max_size: 8192,
        max_interval: 100_000,
        lifetime_floor: 0,
        ..Default::default()
    };
    let samples = TraceSamples::extract(&records, &config);

    assert_eq!(samples.sizes.len(), 5);
    assert_eq!(samples.intervals, vec![500, 100, 100, 28_300]);
    assert_eq!(samples.lifetimes, vec![470_000, 1_999_000, 1_998_500]);
}

#[test]
fn test_histogram_from_file() {
    let file = write_trace(TRACE);
    let records = load(&file).unwrap();

    let histogram = size_histogram(&records, NonZeroU64::new(32).unwrap(), 50_000);
    let buckets: Vec<(u64, u64)> = histogram.into_iter().collect();

    assert_eq!(buckets, vec![(0, 3), (32, 1), (4096, 1)]);
}

#[test]
fn test_malformed_line_reports_line_number() {
    let file = write_trace("1 10 malloc 16 4096\n1 x malloc 16 4096\n");

    match load(&file) {
        Err(TraceError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected malformed record, got {other:?}"),
    }
}
