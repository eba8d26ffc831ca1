//! Packed binary data section reader
//!
//! Rows are fixed width, so skipping is a single seek and the data is
//! decoded in bounded chunks through a reusable scratch buffer.
//! Peak memory is O(chunk_rows * row_len), not O(file_size).

use crate::sink::{ColumnSink, ProgressFn};
use crate::types::{Dialect, FileMetadata, ReadOutcome, Result, SpiceError, SCALE_WIDTH};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use tracing::{debug, warn};

// ============================================================================
// Row Layout
// ============================================================================

/// Byte layout of one sample row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    channels: usize,
    complex: bool,
    /// Width of each dependent value (and of each imaginary part)
    value_width: usize,
}

impl RowLayout {
    pub fn new(meta: &FileMetadata) -> Self {
        let complex = meta.is_complex();
        let value_width = match meta.dialect {
            Dialect::NgSpice => 8,
            Dialect::LtSpice if meta.flags.high_precision || complex => 8,
            Dialect::LtSpice => 4,
        };
        Self {
            channels: meta.channels.len(),
            complex,
            value_width,
        }
    }

    #[inline]
    fn parts(&self) -> usize {
        if self.complex {
            2
        } else {
            1
        }
    }

    #[inline]
    pub fn value_width(&self) -> usize {
        self.value_width
    }

    /// Bytes per row: `(8 + width * (n - 1)) * (1 + complex)`
    #[inline]
    pub fn row_len(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        (SCALE_WIDTH + self.value_width * (self.channels - 1)) * self.parts()
    }

    /// Byte offset of a channel's real part within a row
    #[inline]
    pub fn offset(&self, channel: usize) -> usize {
        if channel == 0 {
            0
        } else {
            (SCALE_WIDTH + (channel - 1) * self.value_width) * self.parts()
        }
    }

    #[inline]
    fn read_value(&self, bytes: &[u8], width: usize) -> f64 {
        if width == 8 {
            LittleEndian::read_f64(&bytes[..8])
        } else {
            LittleEndian::read_f32(&bytes[..4]) as f64
        }
    }

    /// Decode one row into sink row `out_row`
    pub fn decode_row<S: ColumnSink + ?Sized>(&self, row: &[u8], out_row: usize, sink: &mut S) {
        let parts = self.parts();
        for channel in 0..self.channels {
            let width = if channel == 0 {
                SCALE_WIDTH
            } else {
                self.value_width
            };
            let start = self.offset(channel);
            sink.write(channel * parts, out_row, self.read_value(&row[start..], width));
            if self.complex {
                let imag = self.read_value(&row[start + width..], width);
                sink.write(channel * parts + 1, out_row, imag);
            }
        }
    }
}

// ============================================================================
// Chunked Reader
// ============================================================================

/// Chunked reader over the binary data section
pub struct BinaryReader<'a, R> {
    reader: &'a mut R,
    layout: RowLayout,
    chunk_rows: usize,
    /// Number of chunks read so far
    chunk_count: usize,
}

impl<'a, R: Read + Seek> BinaryReader<'a, R> {
    pub fn new(reader: &'a mut R, layout: RowLayout, chunk_rows: usize) -> Self {
        Self {
            reader,
            layout,
            chunk_rows: chunk_rows.max(1),
            chunk_count: 0,
        }
    }

    /// Position the stream at row `row` of the data section
    pub fn seek_to_row(&mut self, data_start: u64, row: usize) -> Result<()> {
        let offset = (row as u64)
            .checked_mul(self.layout.row_len() as u64)
            .and_then(|n| n.checked_add(data_start))
            .ok_or_else(|| {
                SpiceError::format(format!("row {} is beyond any addressable offset", row))
            })?;
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Fill `buf` as far as the stream allows, returning the bytes read
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Decode up to `expected` rows into the sink, starting at sink row 0.
    ///
    /// Stops at end of stream, at `expected`, or at the first incomplete
    /// row. Rows completed before the failure are always kept.
    pub fn read_into<S: ColumnSink + ?Sized>(
        &mut self,
        sink: &mut S,
        expected: usize,
        scratch: &mut Vec<u8>,
        progress: &mut Option<ProgressFn>,
    ) -> ReadOutcome {
        let row_len = self.layout.row_len();
        let mut produced = 0;
        if row_len == 0 {
            return ReadOutcome::rows(0);
        }

        while produced < expected {
            let want = (expected - produced).min(self.chunk_rows) * row_len;
            if scratch.len() < want {
                scratch.resize(want, 0);
            }

            let filled = match self.fill(&mut scratch[..want]) {
                Ok(n) => n,
                Err(e) => return ReadOutcome::failed(produced, e),
            };

            let rows = filled / row_len;
            for (i, row) in scratch[..rows * row_len].chunks_exact(row_len).enumerate() {
                self.layout.decode_row(row, produced + i, sink);
            }
            produced += rows;
            self.chunk_count += 1;

            debug!(
                chunk = self.chunk_count,
                rows,
                total = produced,
                "Binary chunk decoded"
            );
            if let Some(notify) = progress.as_mut() {
                notify(100.0 * produced as f64 / expected as f64);
            }

            let trailing = filled % row_len;
            if trailing != 0 {
                let error = SpiceError::Framing {
                    row_len,
                    trailing_bytes: trailing,
                    rows: produced,
                };
                warn!(%error, "Stopping binary read");
                return ReadOutcome::failed(produced, error);
            }
            if filled < want {
                break;
            }
        }

        ReadOutcome::rows(produced)
    }

    /// Get the number of chunks read
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

// ============================================================================
// Tests
// ============================================================================
