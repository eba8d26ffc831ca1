//! # SPICE Raw File Reader - Core Library
//!
//! Reads the "raw" waveform files written by circuit simulators into
//! plain numeric columns.
//!
//! ## Supported Formats
//!
//! - ngspice raw (single-byte header, binary or ASCII data)
//! - LTspice raw (UTF-16LE header, binary or ASCII data, float32 or float64 values)
//! - Real and complex (AC analysis) data
//!
//! ## Features
//!
//! - Dialect detection from the first line
//! - Chunked binary decoding with bounded memory
//! - Skip/limit slicing of the sample rows
//! - Optional memory-mapped input
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spice_raw_core::{read, VectorData};
//!
//! let data = read("rc.raw").unwrap();
//! println!("Plot: {}", data.metadata.plot_name);
//!
//! if let Some(VectorData::Real(time)) = data.get("time") {
//!     println!("Time points: {}", time.len());
//! }
//! ```
//!
//! ## Slicing Large Files
//!
//! ```rust,no_run
//! use spice_raw_core::{ColumnBuffer, SpiceReader};
//!
//! let mut reader = SpiceReader::new("large.raw");
//! if reader.open() && reader.is_valid() {
//!     let rows = reader.expected_rows(1000, Some(500));
//!     let mut buffer = ColumnBuffer::new(reader.column_count(), rows);
//!     let n = reader.read_data(&mut buffer, 1000, Some(500));
//!     buffer.truncate(n);
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//!
//! let data = spice_raw_core::read("rc.raw").unwrap();
//! ```

mod ascii_reader;
mod binary_reader;
mod flags;
mod header;
mod reader;
mod sink;
mod text;
mod types;

pub use flags::Flags;
pub use header::{detect_dialect, parse_header};
pub use reader::SpiceReader;
pub use sink::{ColumnBuffer, ColumnSink, ProgressFn};
pub use types::{
    Channel, Dialect, FileMetadata, Framing, ReaderState, Result, SpiceData, SpiceError,
    VectorData, BINARY_MARKER, DEFAULT_CHUNK_ROWS, TITLE_PREFIX,
};

use binary_reader::RowLayout;
use num_complex::Complex64;
use std::path::Path;
use tracing::{info, instrument, warn};

// ============================================================================
// Public API Functions
// ============================================================================

fn open_valid(path: &Path) -> Result<SpiceReader> {
    let mut reader = SpiceReader::new(path);
    if !reader.open() || !reader.is_valid() {
        return Err(reader
            .take_error()
            .unwrap_or_else(|| SpiceError::format("reader could not be initialized")));
    }
    Ok(reader)
}

/// Read a whole raw file into memory.
///
/// A binary data section that ends in the middle of a row yields the
/// complete rows before it; the truncation is logged. I/O failures are
/// returned as errors.
///
/// # Example
/// ```rust,no_run
/// let data = spice_raw_core::read("ac.raw").unwrap();
/// println!("Scale: {}", data.scale_name());
/// if let Some(vout) = data.get("v(out)") {
///     println!("v(out): {} points, complex: {}", vout.len(), vout.is_complex());
/// }
/// ```
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read<P: AsRef<Path>>(path: P) -> Result<SpiceData> {
    let path = path.as_ref();
    let mut reader = open_valid(path)?;
    let metadata = match reader.metadata() {
        Some(meta) => meta.clone(),
        None => return Err(SpiceError::format("missing header")),
    };

    // A corrupt point count must not drive the allocation
    let payload = std::fs::metadata(path)?
        .len()
        .saturating_sub(metadata.data_start) as usize;
    let max_rows = match metadata.framing {
        Framing::Binary => payload / RowLayout::new(&metadata).row_len().max(1),
        Framing::Ascii => payload,
    };
    let rows = metadata.point_count.min(max_rows);

    let mut buffer = ColumnBuffer::new(metadata.column_count(), rows);
    let n = reader.read_data(&mut buffer, 0, None);
    match reader.take_error() {
        Some(SpiceError::Io(e)) => return Err(SpiceError::Io(e)),
        Some(e) => warn!(error = %e, rows = n, "Keeping rows read before the error"),
        None => {}
    }
    buffer.truncate(n);

    let columns = buffer.into_columns();
    let vectors = if metadata.is_complex() {
        columns
            .chunks_exact(2)
            .map(|pair| {
                VectorData::Complex(
                    pair[0]
                        .iter()
                        .zip(&pair[1])
                        .map(|(&re, &im)| Complex64::new(re, im))
                        .collect(),
                )
            })
            .collect()
    } else {
        columns.into_iter().map(VectorData::Real).collect()
    };

    info!(rows = n, vectors = metadata.channels.len(), "File read");
    Ok(SpiceData { metadata, vectors })
}

/// Check whether `path` is a readable raw file and report its data framing.
pub fn probe<P: AsRef<Path>>(path: P) -> Option<Framing> {
    let mut reader = open_valid(path.as_ref()).ok()?;
    reader.metadata().map(|m| m.framing)
}

/// Read the first `rows` rows of a file, row-major, for import previews.
///
/// Each row holds one value per output column (two per channel when complex).
pub fn preview<P: AsRef<Path>>(path: P, rows: usize) -> Result<Vec<Vec<f64>>> {
    let mut reader = open_valid(path.as_ref())?;
    let rows = reader.expected_rows(0, Some(rows));
    let mut buffer = ColumnBuffer::new(reader.column_count(), rows);
    let n = reader.read_data(&mut buffer, 0, Some(rows));
    if let Some(SpiceError::Io(e)) = reader.take_error() {
        return Err(SpiceError::Io(e));
    }
    Ok((0..n).filter_map(|i| buffer.row(i)).collect())
}
