//! Line-oriented text decoding for both header dialects
//!
//! NgSpice writes its header (and ASCII data) as single-byte text, LtSpice
//! as UTF-16LE. Lines are split on the raw bytes first and decoded second,
//! so the byte position of the underlying stream always stays exact.

use crate::types::Dialect;
use encoding_rs::Encoding;
use std::io::{self, BufRead};

/// Text codec selected by the detected dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCodec {
    SingleByte,
    Utf16Le,
}

impl TextCodec {
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::NgSpice => TextCodec::SingleByte,
            Dialect::LtSpice => TextCodec::Utf16Le,
        }
    }

    #[inline]
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            TextCodec::SingleByte => encoding_rs::UTF_8,
            TextCodec::Utf16Le => encoding_rs::UTF_16LE,
        }
    }

    /// Read the raw bytes of one line, terminator included.
    ///
    /// Returns the number of bytes in `buf`, 0 at end of stream.
    pub fn read_raw_line<R: BufRead>(&self, reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        match self {
            TextCodec::SingleByte => reader.read_until(b'\n', buf),
            TextCodec::Utf16Le => {
                loop {
                    if reader.read_until(b'\n', buf)? == 0 || !buf.ends_with(b"\n") {
                        break;
                    }
                    // 0x0A on an even offset is the low byte of a code unit
                    if buf.len() % 2 == 1 {
                        match read_byte(reader)? {
                            Some(b) => buf.push(b),
                            None => break,
                        }
                        if buf.ends_with(&[b'\n', 0]) {
                            break;
                        }
                    }
                }
                Ok(buf.len())
            }
        }
    }

    /// Decode raw line bytes, dropping the line terminator.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding().decode_without_bom_handling(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        text.trim_end_matches(&['\n', '\r'][..]).to_string()
    }

    /// Read and decode one line. `None` at end of stream.
    pub fn read_line<R: BufRead>(&self, reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
        if self.read_raw_line(reader, buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.decode(buf)))
    }
}

/// Pull a single byte from a buffered reader
pub(crate) fn read_byte<R: BufRead>(reader: &mut R) -> io::Result<Option<u8>> {
    let byte = match reader.fill_buf()?.first() {
        Some(&b) => b,
        None => return Ok(None),
    };
    reader.consume(1);
    Ok(Some(byte))
}
