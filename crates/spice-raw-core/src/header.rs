//! Raw file header parser
//!
//! Detects the producing dialect from the first line, then walks the
//! key-prefixed header fields in their fixed order. Any missing or
//! malformed required field rejects the whole file; no partial metadata
//! ever escapes this module.

use crate::flags::Flags;
use crate::text::{read_byte, TextCodec};
use crate::types::*;
use std::io::{BufRead, Seek};
use tracing::{debug, trace};

/// Sniff the dialect from the raw bytes of the first line.
///
/// Returns the dialect and the decoded first line. The reader is left
/// at the start of the second line, aligned for the dialect's codec.
pub fn detect_dialect<R: BufRead>(reader: &mut R) -> Result<(Dialect, String)> {
    let mut first = Vec::with_capacity(256);
    if reader.read_until(b'\n', &mut first)? == 0 {
        return Err(SpiceError::format("file is empty"));
    }

    if first.starts_with(TITLE_PREFIX.as_bytes()) {
        let line = TextCodec::SingleByte.decode(&first);
        return Ok((Dialect::NgSpice, line));
    }

    // A UTF-16LE newline is 0x0A 0x00; the byte split above stopped one short
    if first.len() % 2 == 1 {
        if let Some(b) = read_byte(reader)? {
            first.push(b);
        }
    }
    let codec = TextCodec::Utf16Le;
    if !codec.decode(&first).starts_with(TITLE_PREFIX) {
        return Err(SpiceError::format("first line does not start with `Title:`"));
    }

    // 0x0A was the low or high byte of a title character, not the newline
    if !first.ends_with(&[b'\n', 0]) {
        let mut rest = Vec::with_capacity(256);
        codec.read_raw_line(reader, &mut rest)?;
        first.extend_from_slice(&rest);
    }
    Ok((Dialect::LtSpice, codec.decode(&first)))
}

/// Sequential access to decoded header lines
struct HeaderLines<'a, R> {
    reader: &'a mut R,
    codec: TextCodec,
    buf: Vec<u8>,
    text: Vec<String>,
}

impl<'a, R: BufRead> HeaderLines<'a, R> {
    fn next_line(&mut self) -> Result<String> {
        match self.codec.read_line(&mut *self.reader, &mut self.buf)? {
            Some(line) => {
                trace!(line = %line, "Header line");
                Ok(line)
            }
            None => Err(SpiceError::format("unexpected end of header")),
        }
    }

    /// Read the next line, which must start with `key`, and return its value
    fn field(&mut self, key: &str) -> Result<String> {
        let line = self.next_line()?;
        let value = match line.strip_prefix(key) {
            Some(v) => v.trim().to_string(),
            None => return Err(SpiceError::format(format!("expected `{}` line", key))),
        };
        self.text.push(line);
        Ok(value)
    }

    fn count_field(&mut self, key: &str) -> Result<usize> {
        let value = self.field(key)?;
        value
            .parse()
            .map_err(|_| SpiceError::format(format!("`{}` is not a count: {:?}", key, value)))
    }
}

/// Parse a single variable declaration: `<unused>\t<index>\t<name>\t<type>`
fn parse_channel(line: &str) -> Result<Channel> {
    let tokens: Vec<&str> = line.split('\t').collect();
    if tokens.len() < 4 {
        return Err(SpiceError::format(format!("malformed variable line: {:?}", line)));
    }
    let index = tokens[1]
        .trim()
        .parse()
        .map_err(|_| SpiceError::format(format!("bad variable index: {:?}", tokens[1])))?;

    Ok(Channel {
        index,
        name: tokens[2].trim().to_string(),
        kind: tokens[3].trim().to_string(),
    })
}

/// Parse the full header and leave `reader` at the first data byte
pub fn parse_header<R: BufRead + Seek>(reader: &mut R) -> Result<FileMetadata> {
    let (dialect, title_line) = detect_dialect(reader)?;
    let title = title_line[TITLE_PREFIX.len()..].trim().to_string();

    let mut lines = HeaderLines {
        reader: &mut *reader,
        codec: TextCodec::for_dialect(dialect),
        buf: Vec::with_capacity(256),
        text: vec![title_line],
    };

    let date = lines.field(DATE_KEY)?;
    let plot_name = lines.field(PLOTNAME_KEY)?;
    let flags = Flags::parse(&lines.field(FLAGS_KEY)?);
    let variable_count = lines.count_field(VARIABLE_COUNT_KEY)?;
    let point_count = lines.count_field(POINT_COUNT_KEY)?;

    let (offset, command) = match dialect {
        Dialect::NgSpice => {
            lines.field(VARIABLES_KEY)?;
            (0.0, None)
        }
        Dialect::LtSpice => {
            let raw = lines.field(OFFSET_KEY)?;
            let offset: f64 = raw
                .parse()
                .map_err(|_| SpiceError::format(format!("`Offset:` is not a number: {:?}", raw)))?;
            let command = lines.field(COMMAND_KEY)?;

            // Informational lines such as `Backannotation:` may precede the variables
            loop {
                let line = lines.next_line()?;
                let is_variables = line.starts_with(VARIABLES_KEY);
                if !is_variables {
                    debug!(line = %line, "Skipping extra header line");
                }
                lines.text.push(line);
                if is_variables {
                    break;
                }
            }
            (offset, Some(command))
        }
    };

    // The declared count is untrusted until the lines are actually there
    let mut channels = Vec::with_capacity(variable_count.min(1024));
    for _ in 0..variable_count {
        let line = lines.next_line()?;
        channels.push(parse_channel(&line)?);
        lines.text.push(line);
    }

    let framing = match lines.codec.read_line(&mut *lines.reader, &mut lines.buf)? {
        Some(marker) if marker.trim().trim_end_matches(':') == BINARY_MARKER => Framing::Binary,
        _ => Framing::Ascii,
    };

    let header_text = lines.text.join("\n");
    let data_start = reader.stream_position()?;

    Ok(FileMetadata {
        dialect,
        title,
        date,
        plot_name,
        command,
        offset,
        flags,
        point_count,
        channels,
        framing,
        data_start,
        header_text,
    })
}
