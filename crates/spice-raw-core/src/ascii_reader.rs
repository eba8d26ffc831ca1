//! Delimited text data section reader
//!
//! Each row is `channels` lines of `<row-index>\t<value>` followed by one
//! separator line. The section is line oriented, so it can only be walked
//! forward: skipping means reading and discarding lines.

use crate::sink::{ColumnSink, ProgressFn};
use crate::text::TextCodec;
use crate::types::{FileMetadata, ReadOutcome, Result};
use std::io::BufRead;
use tracing::{debug, trace};

/// Parse a value with the fixed `.` decimal convention; garbage becomes NaN
#[inline]
pub fn parse_value(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

/// Split `re,im` into its parts; a missing or unparsable part is NaN
pub fn parse_complex_value(s: &str) -> (f64, f64) {
    let mut parts = s.splitn(2, ',');
    let re = parts.next().map(parse_value).unwrap_or(f64::NAN);
    let im = parts.next().map(parse_value).unwrap_or(f64::NAN);
    (re, im)
}

pub struct AsciiReader<'a, R> {
    reader: &'a mut R,
    codec: TextCodec,
    channels: usize,
    complex: bool,
    buf: Vec<u8>,
}

impl<'a, R: BufRead> AsciiReader<'a, R> {
    pub fn new(reader: &'a mut R, meta: &FileMetadata) -> Self {
        Self {
            reader,
            codec: TextCodec::for_dialect(meta.dialect),
            channels: meta.channels.len(),
            complex: meta.is_complex(),
            buf: Vec::with_capacity(128),
        }
    }

    /// Discard up to `rows` rows; returns the number of complete rows skipped
    pub fn skip_rows(&mut self, rows: usize) -> Result<usize> {
        for skipped in 0..rows {
            for _ in 0..self.channels {
                if self.codec.read_raw_line(&mut *self.reader, &mut self.buf)? == 0 {
                    return Ok(skipped);
                }
            }
            self.codec.read_raw_line(&mut *self.reader, &mut self.buf)?;
        }
        Ok(rows)
    }

    /// Decode one channel line into its sink slot(s)
    fn decode_line<S: ColumnSink + ?Sized>(&self, line: &str, channel: usize, row: usize, sink: &mut S) {
        let value = match line.split('\t').nth(1) {
            Some(v) => v.trim(),
            None => {
                trace!(channel, row, "Value line without tab, skipped");
                return;
            }
        };

        if self.complex {
            let (re, im) = parse_complex_value(value);
            sink.write(2 * channel, row, re);
            sink.write(2 * channel + 1, row, im);
        } else {
            sink.write(channel, row, parse_value(value));
        }
    }

    /// Read one row into sink row `row`. `Ok(false)` at end of stream.
    fn read_row<S: ColumnSink + ?Sized>(&mut self, row: usize, sink: &mut S) -> Result<bool> {
        for channel in 0..self.channels {
            let line = match self.codec.read_line(&mut *self.reader, &mut self.buf)? {
                Some(line) => line,
                None => return Ok(false),
            };
            self.decode_line(&line, channel, row, sink);
        }
        // separator between rows, may be missing after the last one
        self.codec.read_raw_line(&mut *self.reader, &mut self.buf)?;
        Ok(true)
    }

    /// Decode up to `expected` rows into the sink, starting at sink row 0
    pub fn read_into<S: ColumnSink + ?Sized>(
        &mut self,
        sink: &mut S,
        expected: usize,
        progress_every: usize,
        progress: &mut Option<ProgressFn>,
    ) -> ReadOutcome {
        let progress_every = progress_every.max(1);
        let mut produced = 0;
        if self.channels == 0 {
            return ReadOutcome::rows(0);
        }

        while produced < expected {
            match self.read_row(produced, sink) {
                Ok(true) => produced += 1,
                Ok(false) => break,
                Err(e) => return ReadOutcome::failed(produced, e),
            }
            if produced % progress_every == 0 {
                notify(progress, produced, expected);
            }
        }
        if produced % progress_every != 0 {
            notify(progress, produced, expected);
        }

        debug!(rows = produced, expected, "ASCII rows decoded");
        ReadOutcome::rows(produced)
    }
}

fn notify(progress: &mut Option<ProgressFn>, produced: usize, expected: usize) {
    if let Some(callback) = progress.as_mut() {
        callback(100.0 * produced as f64 / expected as f64);
    }
}
