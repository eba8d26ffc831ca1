//! Public reader facade
//!
//! Owns the input stream and the parsed header. The header is parsed
//! lazily, exactly once, on the first query that needs it. Failures never
//! escape as errors: they show up as `false`/empty/zero results, with the
//! cause kept in [`SpiceReader::last_error`].

use crate::ascii_reader::AsciiReader;
use crate::binary_reader::{BinaryReader, RowLayout};
use crate::header::parse_header;
use crate::sink::{ColumnSink, ProgressFn};
use crate::types::{
    Channel, Dialect, FileMetadata, Framing, ReadOutcome, ReaderState, SpiceError,
    DEFAULT_CHUNK_ROWS,
};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Reader for one SPICE raw file
pub struct SpiceReader<R = File> {
    /// Source path, if the reader opens the stream itself
    path: Option<PathBuf>,
    stream: Option<BufReader<R>>,
    state: ReaderState,
    /// Set once by `init`, never mutated afterwards
    metadata: Option<FileMetadata>,
    /// Maximum rows per binary chunk
    chunk_rows: usize,
    /// Reusable binary chunk buffer
    scratch: Vec<u8>,
    progress: Option<ProgressFn>,
    /// Rows already consumed from the ASCII section (skipped or decoded)
    ascii_rows_consumed: usize,
    last_error: Option<SpiceError>,
}

impl SpiceReader<File> {
    /// Create a reader for `path`. Nothing is touched until [`open`](Self::open).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::unopened(Some(path.as_ref().to_path_buf()))
    }

    /// Open the file. Returns false if it cannot be opened.
    #[instrument(skip_all, fields(path = ?self.path))]
    pub fn open(&mut self) -> bool {
        let result = self.path.as_deref().map(File::open);
        self.attach(result)
    }
}

impl SpiceReader<Cursor<Mmap>> {
    /// Create a reader that memory-maps `path` when opened
    pub fn new_mapped<P: AsRef<Path>>(path: P) -> Self {
        Self::unopened(Some(path.as_ref().to_path_buf()))
    }

    /// Map the file. Returns false if it cannot be opened or mapped.
    #[instrument(skip_all, fields(path = ?self.path))]
    pub fn open(&mut self) -> bool {
        let result = self.path.as_deref().map(|path| {
            let file = File::open(path)?;
            // SAFETY: the mapping is read-only and owned by this reader
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(Cursor::new(mmap))
        });
        self.attach(result)
    }
}

impl<R: Read + Seek> SpiceReader<R> {
    fn unopened(path: Option<PathBuf>) -> Self {
        Self {
            path,
            stream: None,
            state: ReaderState::Unopened,
            metadata: None,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            scratch: Vec::new(),
            progress: None,
            ascii_rows_consumed: 0,
            last_error: None,
        }
    }

    /// Wrap an already open stream, positioned at the start of the file
    pub fn from_stream(stream: R) -> Self {
        let mut reader = Self::unopened(None);
        reader.attach(Some(Ok(stream)));
        reader
    }

    fn attach(&mut self, result: Option<io::Result<R>>) -> bool {
        if self.state != ReaderState::Unopened {
            return self.stream.is_some();
        }
        match result {
            Some(Ok(stream)) => {
                self.stream = Some(BufReader::new(stream));
                self.state = ReaderState::Opened;
                self.last_error = None;
                debug!("Stream opened");
                true
            }
            Some(Err(e)) => {
                warn!(error = %e, "Failed to open stream");
                self.last_error = Some(e.into());
                false
            }
            None => false,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set the maximum number of rows decoded per binary chunk
    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.set_chunk_rows(rows);
        self
    }

    pub fn set_chunk_rows(&mut self, rows: usize) {
        let rows = rows.max(1);
        if rows != self.chunk_rows {
            self.chunk_rows = rows;
            self.scratch = Vec::new();
        }
    }

    #[inline]
    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    /// Install a progress callback, called with a percentage during reads
    pub fn with_progress<F: FnMut(f64) + 'static>(mut self, callback: F) -> Self {
        self.set_progress(callback);
        self
    }

    pub fn set_progress<F: FnMut(f64) + 'static>(&mut self, callback: F) {
        self.progress = Some(Box::new(callback));
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    // ========================================================================
    // State
    // ========================================================================

    #[inline]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Most recent failure: open, header, framing or I/O
    pub fn last_error(&self) -> Option<&SpiceError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<SpiceError> {
        self.last_error.take()
    }

    /// Parse the header once; later calls are no-ops
    fn init(&mut self) {
        if self.state != ReaderState::Opened {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        match parse_header(stream) {
            Ok(meta) => {
                info!(
                    dialect = ?meta.dialect,
                    channels = meta.channels.len(),
                    points = meta.point_count,
                    framing = ?meta.framing,
                    complex = meta.is_complex(),
                    "Header parsed"
                );
                self.metadata = Some(meta);
                self.state = ReaderState::Initialized;
            }
            Err(e) => {
                warn!(error = %e, "Not a valid SPICE file");
                self.last_error = Some(e);
                self.state = ReaderState::Invalid;
            }
        }
    }

    /// Whether the stream holds a SPICE raw file of a supported dialect
    pub fn is_valid(&mut self) -> bool {
        self.init();
        self.state == ReaderState::Initialized
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn metadata(&mut self) -> Option<&FileMetadata> {
        self.init();
        self.metadata.as_ref()
    }

    pub fn channels(&mut self) -> &[Channel] {
        self.init();
        self.metadata
            .as_ref()
            .map(|m| m.channels.as_slice())
            .unwrap_or(&[])
    }

    pub fn point_count(&mut self) -> usize {
        self.metadata().map(|m| m.point_count).unwrap_or(0)
    }

    pub fn is_complex(&mut self) -> bool {
        self.metadata().map(FileMetadata::is_complex).unwrap_or(false)
    }

    pub fn is_high_precision(&mut self) -> bool {
        self.metadata()
            .map(|m| m.flags.high_precision)
            .unwrap_or(false)
    }

    pub fn is_binary(&mut self) -> bool {
        self.metadata().map(FileMetadata::is_binary).unwrap_or(false)
    }

    pub fn dialect(&mut self) -> Option<Dialect> {
        self.metadata().map(|m| m.dialect)
    }

    /// Number of sink columns a read needs
    pub fn column_count(&mut self) -> usize {
        self.metadata().map(FileMetadata::column_count).unwrap_or(0)
    }

    pub fn column_names(&mut self) -> Vec<String> {
        self.metadata()
            .map(FileMetadata::column_names)
            .unwrap_or_default()
    }

    /// Header text up to the data marker
    pub fn file_info(&mut self) -> Option<&str> {
        self.metadata().map(|m| m.header_text.as_str())
    }

    /// Rows a `read_data(skip, max_count)` would produce from a complete file;
    /// use it to size the sink.
    pub fn expected_rows(&mut self, skip: usize, max_count: Option<usize>) -> usize {
        let consumed = self.ascii_rows_consumed;
        let Some(meta) = self.metadata() else {
            return 0;
        };
        let available = match meta.framing {
            Framing::Binary => meta.point_count,
            Framing::Ascii => meta.point_count.saturating_sub(consumed),
        };
        available
            .saturating_sub(skip)
            .min(max_count.unwrap_or(usize::MAX))
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Move the ASCII cursor back to the first row. Binary reads always
    /// seek, so this only matters for ASCII files.
    pub fn reset(&mut self) -> bool {
        if !self.is_valid() {
            return false;
        }
        let (Some(meta), Some(stream)) = (self.metadata.as_ref(), self.stream.as_mut()) else {
            return false;
        };
        match stream.seek(SeekFrom::Start(meta.data_start)) {
            Ok(_) => {
                self.ascii_rows_consumed = 0;
                true
            }
            Err(e) => {
                self.last_error = Some(e.into());
                false
            }
        }
    }

    /// Decode rows into `sink`, skipping `skip` rows first and producing at
    /// most `max_count` rows (`None` for all). Returns the rows produced,
    /// written at sink rows `0..n`.
    ///
    /// Binary files are read from `skip` rows after the data start on every
    /// call. ASCII files are read forward from where the previous call
    /// stopped; `skip` counts from there.
    pub fn read_data<S: ColumnSink + ?Sized>(
        &mut self,
        sink: &mut S,
        skip: usize,
        max_count: Option<usize>,
    ) -> usize {
        if !self.is_valid() {
            return 0;
        }
        let (Some(meta), Some(stream)) = (self.metadata.as_ref(), self.stream.as_mut()) else {
            return 0;
        };

        let columns = meta.column_count();
        if sink.column_count() < columns {
            warn!(
                needed = columns,
                provided = sink.column_count(),
                "Sink has too few columns"
            );
            self.last_error = Some(SpiceError::format(format!(
                "sink provides {} columns, {} needed",
                sink.column_count(),
                columns
            )));
            return 0;
        }
        let limit = max_count.unwrap_or(usize::MAX).min(sink.row_capacity());

        let outcome = match meta.framing {
            Framing::Binary => {
                let expected = meta.point_count.saturating_sub(skip).min(limit);
                if expected == 0 {
                    return 0;
                }
                let layout = RowLayout::new(meta);
                let mut reader = BinaryReader::new(stream, layout, self.chunk_rows);
                match reader.seek_to_row(meta.data_start, skip) {
                    Ok(()) => reader.read_into(sink, expected, &mut self.scratch, &mut self.progress),
                    Err(e) => ReadOutcome::failed(0, e),
                }
            }
            Framing::Ascii => {
                let remaining = meta.point_count.saturating_sub(self.ascii_rows_consumed);
                let mut reader = AsciiReader::new(stream, meta);
                match reader.skip_rows(skip.min(remaining)) {
                    Ok(skipped) => {
                        self.ascii_rows_consumed += skipped;
                        let expected = if skipped < skip.min(remaining) {
                            0
                        } else {
                            (remaining - skipped).min(limit)
                        };
                        let outcome =
                            reader.read_into(sink, expected, self.chunk_rows, &mut self.progress);
                        self.ascii_rows_consumed += outcome.rows;
                        outcome
                    }
                    Err(e) => ReadOutcome::failed(0, e),
                }
            }
        };

        debug!(rows = outcome.rows, skip, "Read finished");
        if let Some(e) = outcome.error {
            self.last_error = Some(e);
        }
        outcome.rows
    }
}
