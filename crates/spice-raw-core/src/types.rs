//! Common types, errors, and constants for SPICE raw file operations

use crate::flags::Flags;
use num_complex::Complex64;

// ============================================================================
// Constants
// ============================================================================

/// Literal prefix every raw file starts with, in either dialect
pub const TITLE_PREFIX: &str = "Title:";

pub const DATE_KEY: &str = "Date:";
pub const PLOTNAME_KEY: &str = "Plotname:";
pub const FLAGS_KEY: &str = "Flags:";
pub const VARIABLE_COUNT_KEY: &str = "No. Variables:";
pub const POINT_COUNT_KEY: &str = "No. Points:";
pub const OFFSET_KEY: &str = "Offset:";
pub const COMMAND_KEY: &str = "Command:";
pub const VARIABLES_KEY: &str = "Variables:";

/// Data section marker for packed binary samples
pub const BINARY_MARKER: &str = "Binary";

/// Width of the independent variable, always a double
pub const SCALE_WIDTH: usize = 8;

/// Default number of rows decoded per binary chunk
pub const DEFAULT_CHUNK_ROWS: usize = 100_000;

// ============================================================================
// Enums
// ============================================================================

/// Producer family the file was written by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Single-byte text header, dependent values always 8 bytes wide
    NgSpice,
    /// UTF-16LE text header, `Offset:`/`Command:` lines, 4-byte values by default
    LtSpice,
}

/// Layout of the data section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Binary,
    Ascii,
}

/// Lifecycle of a [`crate::SpiceReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    Opened,
    Invalid,
    Initialized,
}

/// Vector data - either real or complex
#[derive(Debug, Clone)]
pub enum VectorData {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl VectorData {
    pub fn len(&self) -> usize {
        match self {
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, VectorData::Complex(_))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            VectorData::Real(v) => Some(v),
            VectorData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            VectorData::Complex(v) => Some(v),
            VectorData::Real(_) => None,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for SPICE raw reading operations
#[derive(Debug, thiserror::Error)]
pub enum SpiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid SPICE file: {0}")]
    Format(String),

    #[error("corrupted data: {trailing_bytes} trailing bytes do not fill a {row_len}-byte row after {rows} rows")]
    Framing {
        row_len: usize,
        trailing_bytes: usize,
        rows: usize,
    },
}

impl SpiceError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        SpiceError::Format(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpiceError>;

/// Rows produced by one data read, plus the error that ended it early
#[derive(Debug)]
pub struct ReadOutcome {
    pub rows: usize,
    pub error: Option<SpiceError>,
}

impl ReadOutcome {
    pub fn rows(rows: usize) -> Self {
        Self { rows, error: None }
    }

    pub fn failed(rows: usize, error: impl Into<SpiceError>) -> Self {
        Self {
            rows,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One named data series declared in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Declared ordinal, 0 is the independent variable
    pub index: usize,
    pub name: String,
    /// Free-form kind tag such as "time" or "voltage"
    pub kind: String,
}

impl Channel {
    /// Column label as shown by import dialogs: `"name, kind"`
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.kind)
    }
}

/// Header information, frozen once parsed
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub dialect: Dialect,
    pub title: String,
    pub date: String,
    pub plot_name: String,
    /// Only present in LtSpice files
    pub command: Option<String>,
    /// LtSpice bias of the independent variable; not applied to decoded data
    pub offset: f64,
    pub flags: Flags,
    pub point_count: usize,
    pub channels: Vec<Channel>,
    pub framing: Framing,
    /// Byte offset of the first sample
    pub data_start: u64,
    /// Decoded header lines up to the data marker
    pub header_text: String,
}

impl FileMetadata {
    #[inline]
    pub fn is_complex(&self) -> bool {
        self.flags.is_complex()
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.framing == Framing::Binary
    }

    /// Number of output columns: one per channel, two when complex
    #[inline]
    pub fn column_count(&self) -> usize {
        self.channels.len() * if self.is_complex() { 2 } else { 1 }
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.column_count());
        for channel in &self.channels {
            let label = channel.label();
            if self.is_complex() {
                names.push(format!("{} REAL", label));
                names.push(format!("{} IMAGINARY", label));
            } else {
                names.push(label);
            }
        }
        names
    }
}

/// Result of a one-shot [`crate::read`]
#[derive(Debug, Clone)]
pub struct SpiceData {
    pub metadata: FileMetadata,
    /// One vector per channel, in declaration order
    pub vectors: Vec<VectorData>,
}

impl SpiceData {
    /// Look up a channel's vector by name
    pub fn get(&self, name: &str) -> Option<&VectorData> {
        self.metadata
            .channels
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.vectors.get(i))
    }

    /// Name of the independent variable
    pub fn scale_name(&self) -> &str {
        self.metadata
            .channels
            .first()
            .map(|c| c.name.as_str())
            .unwrap_or("")
    }

    /// Number of rows read
    pub fn len(&self) -> usize {
        self.vectors.first().map(VectorData::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
