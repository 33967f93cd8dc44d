//! Normalized allocation trace records.
//!
//! Each line is `pid timestamp malloc size address` or
//! `pid timestamp free address`, whitespace separated, with timestamps in
//! microseconds. Short lines and unknown operations are skipped.

pub mod samples;

use std::io::BufRead;

use serde::{Deserialize, Serialize};

pub use samples::{SampleSummary, TraceSamples, size_histogram};

/// Errors raised while reading a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Malformed trace record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),
}

/// Operation recorded in a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOp {
    Malloc { size: u64, address: u64 },
    Free { address: u64 },
}

/// One allocator call observed in a traced process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub pid: u32,
    pub timestamp: u64,
    pub op: TraceOp,
}

impl TraceRecord {
    /// Parses one normalized line.
    ///
    /// Returns `Ok(None)` for lines that do not describe a complete
    /// `malloc` or `free` call.
    ///
    /// # Errors
    ///
    /// - `TraceError::MalformedRecord` - A numeric field fails to parse
    pub fn parse(line: &str, line_number: usize) -> Result<Option<Self>, TraceError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 3 {
            return Ok(None);
        }

        let field = |index: usize, name: &str| -> Result<u64, TraceError> {
            words[index]
                .parse()
                .map_err(|_| TraceError::MalformedRecord {
                    line: line_number,
                    reason: format!("invalid {name} '{}'", words[index]),
                })
        };

        let op = match words[2] {
            "malloc" if words.len() >= 5 => TraceOp::Malloc {
                size: field(3, "size")?,
                address: field(4, "address")?,
            },
            "free" if words.len() >= 4 => TraceOp::Free {
                address: field(3, "address")?,
            },
            _ => return Ok(None),
        };

        let pid = words[0]
            .parse()
            .map_err(|_| TraceError::MalformedRecord {
                line: line_number,
                reason: format!("invalid pid '{}'", words[0]),
            })?;

        Ok(Some(Self {
            pid,
            timestamp: field(1, "timestamp")?,
            op,
        }))
    }
}

/// Reads every record from a normalized trace.
///
/// Line numbers in errors are one-based.
///
/// # Errors
///
/// - `TraceError::Io` - The reader fails
/// - `TraceError::MalformedRecord` - A line has a non-numeric field
pub fn read_records(reader: impl BufRead) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        if let Some(record) = TraceRecord::parse(&line?, index + 1)? {
            records.push(record);
        }
    }

    tracing::debug!("Read {} trace records", records.len());
    Ok(records)
}
