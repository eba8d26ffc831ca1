//! Integration tests for spice-raw-core
//!
//! All inputs are synthetic raw files written to temp files:
//! - dialect detection and header metadata
//! - binary row accounting, slicing and chunking
//! - complex layouts
//! - ASCII decoding and its forward-only cursor
//! - one-shot helpers: read, probe, preview

mod common;

use common::{ramp, write_temp, RawBuilder};
use spice_raw_core::{
    preview, probe, read, ColumnBuffer, Dialect, Framing, ReaderState, SpiceError, SpiceReader,
    VectorData,
};
use std::cell::RefCell;
use std::rc::Rc;

fn transient(builder: RawBuilder) -> RawBuilder {
    builder.var("time", "time").var("v(out)", "voltage")
}

fn open(bytes: &[u8]) -> (tempfile::NamedTempFile, SpiceReader) {
    let file = write_temp(bytes);
    let mut reader = SpiceReader::new(file.path());
    assert!(reader.open(), "temp file should open");
    (file, reader)
}

fn read_all(reader: &mut SpiceReader) -> ColumnBuffer {
    let rows = reader.expected_rows(0, None);
    let mut buffer = ColumnBuffer::new(reader.column_count(), rows);
    let n = reader.read_data(&mut buffer, 0, None);
    buffer.truncate(n);
    buffer
}

// =============================================================================
// Dialect Detection
// =============================================================================

#[test]
fn test_detects_ngspice() {
    let bytes = transient(RawBuilder::ngspice("real")).binary(&ramp(3));
    let (_file, mut reader) = open(&bytes);

    assert!(reader.is_valid());
    assert_eq!(reader.dialect(), Some(Dialect::NgSpice));
    assert!(reader.is_binary());
    assert!(!reader.is_complex());
    assert_eq!(reader.point_count(), 3);

    let meta = reader.metadata().unwrap();
    assert_eq!(meta.title, "* synthetic circuit");
    assert_eq!(meta.plot_name, "Transient Analysis");
    assert!(meta.command.is_none());
}

#[test]
fn test_detects_ltspice() {
    let bytes = transient(RawBuilder::ltspice("real forward")).binary(&ramp(3));
    let (_file, mut reader) = open(&bytes);

    assert!(reader.is_valid());
    assert_eq!(reader.dialect(), Some(Dialect::LtSpice));
    let meta = reader.metadata().unwrap();
    assert!(meta.command.as_deref().unwrap().contains("LTspice"));
    assert_eq!(reader.channels()[1].name, "v(out)");
    assert!(reader.file_info().unwrap().starts_with("Title: * synthetic circuit"));
}

#[test]
fn test_rejects_non_spice_file() {
    let file = write_temp(b"Plotname: no title here\n");
    let mut reader = SpiceReader::new(file.path());
    assert!(reader.open());
    assert!(!reader.is_valid());
    assert_eq!(reader.state(), ReaderState::Invalid);
    assert!(matches!(reader.last_error(), Some(SpiceError::Format(_))));
    assert!(reader.channels().is_empty());
    assert_eq!(probe(file.path()), None);
    assert!(read(file.path()).is_err());
}

#[test]
fn test_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.raw");

    let mut reader = SpiceReader::new(&missing);
    assert!(!reader.open());
    assert_eq!(reader.state(), ReaderState::Unopened);
    assert!(!reader.is_valid());
    assert!(matches!(read(&missing), Err(SpiceError::Io(_))));
}

#[test]
fn test_init_is_idempotent() {
    let bytes = transient(RawBuilder::ngspice("real")).binary(&ramp(5));
    let (_file, mut reader) = open(&bytes);

    assert!(reader.is_valid());
    let names = reader.column_names();
    let _ = read_all(&mut reader);
    assert!(reader.is_valid());
    assert!(reader.is_valid());
    assert_eq!(reader.column_names(), names);
    assert_eq!(names, vec!["time, time", "v(out), voltage"]);
}

// =============================================================================
// Binary Data
// =============================================================================

#[test]
fn test_binary_row_accounting() {
    let rows = ramp(25);
    let bytes = transient(RawBuilder::ngspice("real")).binary(&rows);
    let (_file, mut reader) = open(&bytes);

    let buffer = read_all(&mut reader);
    assert_eq!(buffer.rows(), 25);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(buffer.row(i).as_ref(), Some(row));
    }
    assert!(reader.last_error().is_none());
}

#[test]
fn test_binary_skip_and_limit() {
    let rows = ramp(10);
    let bytes = transient(RawBuilder::ngspice("real")).binary(&rows);
    let (_file, mut reader) = open(&bytes);

    let mut buffer = ColumnBuffer::new(2, 4);
    assert_eq!(reader.read_data(&mut buffer, 3, Some(4)), 4);
    for i in 0..4 {
        assert_eq!(buffer.row(i), Some(rows[3 + i].clone()));
    }

    // Binary reads are random access: a second read starts over
    let mut buffer = ColumnBuffer::new(2, 10);
    assert_eq!(reader.read_data(&mut buffer, 8, None), 2);
    assert_eq!(buffer.row(1), Some(rows[9].clone()));

    let mut buffer = ColumnBuffer::new(2, 10);
    assert_eq!(reader.read_data(&mut buffer, 10, None), 0);
    assert_eq!(reader.read_data(&mut buffer, 0, Some(0)), 0);
}

#[test]
fn test_binary_result_independent_of_chunk_size() {
    let rows = ramp(17);
    let bytes = transient(RawBuilder::ltspice("real forward")).binary(&rows);
    let file = write_temp(&bytes);

    let mut expected = None;
    for chunk in [1, 3, 16, 17, 1000] {
        let mut reader = SpiceReader::new(file.path()).with_chunk_rows(chunk);
        assert!(reader.open());
        let buffer = read_all(&mut reader);
        match &expected {
            None => expected = Some(buffer),
            Some(first) => assert_eq!(&buffer, first, "chunk size {}", chunk),
        }
    }
}

#[test]
fn test_ltspice_float32_and_double() {
    let rows = ramp(4);

    let bytes = transient(RawBuilder::ltspice("real forward")).binary(&rows);
    let (_file, mut reader) = open(&bytes);
    assert!(!reader.is_high_precision());
    let buffer = read_all(&mut reader);
    // 0.5 steps are exact in f32
    assert_eq!(buffer.column(1).unwrap(), &[0.0, 0.5, 1.0, 1.5]);

    let rows = vec![vec![0.0, 0.1], vec![1e-3, 0.2]];
    let bytes = transient(RawBuilder::ltspice("real forward double")).binary(&rows);
    let (_file, mut reader) = open(&bytes);
    assert!(reader.is_high_precision());
    let buffer = read_all(&mut reader);
    assert_eq!(buffer.column(1).unwrap(), &[0.1, 0.2]);
}

#[test]
fn test_ngspice_ignores_double_flag() {
    let rows = vec![vec![0.0, 0.1], vec![1e-3, 0.2], vec![2e-3, 0.3]];
    let bytes = transient(RawBuilder::ngspice("real double")).binary(&rows);
    let (_file, mut reader) = open(&bytes);

    assert!(reader.is_high_precision());
    // 8-byte scale + one 8-byte value per row
    let header_len = reader.metadata().unwrap().data_start as usize;
    assert_eq!(bytes.len() - header_len, 3 * 16);

    let buffer = read_all(&mut reader);
    assert_eq!(buffer.rows(), 3);
    assert_eq!(buffer.column(1).unwrap(), &[0.1, 0.2, 0.3]);
    assert!(reader.last_error().is_none());
}

#[test]
fn test_corrupted_tail_keeps_complete_rows() {
    let rows = ramp(6);
    let mut bytes = transient(RawBuilder::ngspice("real")).binary(&rows);
    // Drop the last row but 3 bytes
    bytes.truncate(bytes.len() - 13);
    let (file, mut reader) = open(&bytes);

    let mut buffer = ColumnBuffer::new(2, 6);
    assert_eq!(reader.read_data(&mut buffer, 0, None), 5);
    assert!(matches!(
        reader.last_error(),
        Some(SpiceError::Framing { trailing_bytes: 3, row_len: 16, rows: 5 })
    ));
    assert_eq!(buffer.row(4), Some(rows[4].clone()));

    let data = read(file.path()).unwrap();
    assert_eq!(data.len(), 5);
}

#[test]
fn test_short_file_without_partial_row() {
    let rows = ramp(4);
    let bytes = transient(RawBuilder::ngspice("real").points(10)).binary(&rows);
    let (_file, mut reader) = open(&bytes);

    let mut buffer = ColumnBuffer::new(2, 10);
    assert_eq!(reader.read_data(&mut buffer, 0, None), 4);
    assert!(reader.last_error().is_none());
}

#[test]
fn test_progress_reaches_100() {
    let bytes = transient(RawBuilder::ngspice("real")).binary(&ramp(9));
    let file = write_temp(&bytes);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let mut reader = SpiceReader::new(file.path())
        .with_chunk_rows(3)
        .with_progress(move |pct| log.borrow_mut().push(pct));
    assert!(reader.open());
    let _ = read_all(&mut reader);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen.last(), Some(&100.0));
}

#[test]
fn test_memory_mapped_reader() {
    let rows = ramp(7);
    let bytes = transient(RawBuilder::ngspice("real")).binary(&rows);
    let file = write_temp(&bytes);

    let mut reader = SpiceReader::new_mapped(file.path());
    assert!(reader.open());
    assert!(reader.is_valid());
    let mut buffer = ColumnBuffer::new(2, 7);
    assert_eq!(reader.read_data(&mut buffer, 0, None), 7);
    assert_eq!(buffer.row(6), Some(rows[6].clone()));
}

// =============================================================================
// Complex Data
// =============================================================================

#[test]
fn test_complex_byte_offsets() {
    // Output columns: freq re, freq im, v re, v im
    let rows = vec![vec![1.0, 0.0, 0.5, -0.25], vec![10.0, 0.0, 0.125, -2.0]];
    let bytes = RawBuilder::ngspice("complex")
        .plot("AC Analysis")
        .var("frequency", "frequency")
        .var("v(out)", "voltage")
        .binary(&rows);
    let (_file, mut reader) = open(&bytes);

    assert!(reader.is_complex());
    assert_eq!(reader.column_count(), 4);
    assert_eq!(
        reader.column_names(),
        vec![
            "frequency, frequency REAL",
            "frequency, frequency IMAGINARY",
            "v(out), voltage REAL",
            "v(out), voltage IMAGINARY",
        ]
    );

    // Offsets computed by hand: row length 32, channel 1 real at 16, imaginary at 24
    let header_len = bytes.len() - 2 * 32;
    let raw = &bytes[header_len + 32..];
    let v_im = f64::from_le_bytes(raw[24..32].try_into().unwrap());
    assert_eq!(v_im, -2.0);

    let buffer = read_all(&mut reader);
    assert_eq!(buffer.row(1), Some(rows[1].clone()));
    assert_eq!(buffer.column(3).unwrap()[1], v_im);
}

#[test]
fn test_ltspice_complex_uses_double_width() {
    let rows = vec![vec![100.0, 0.0, 0.1, 0.2], vec![1000.0, 0.0, 0.3, 0.4]];
    let bytes = RawBuilder::ltspice("complex forward log")
        .plot("AC Analysis")
        .var("frequency", "frequency")
        .var("V(out)", "voltage")
        .binary(&rows);
    let file = write_temp(&bytes);

    let data = read(file.path()).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data.scale_name(), "frequency");
    let v = data.get("V(out)").unwrap().as_complex().unwrap();
    assert_eq!(v[1].re, 0.3);
    assert_eq!(v[1].im, 0.4);
}

#[test]
fn test_undersized_sink_reads_nothing() {
    let bytes = RawBuilder::ngspice("complex")
        .var("frequency", "frequency")
        .var("v(out)", "voltage")
        .binary(&[vec![1.0, 0.0, 1.0, 1.0]]);
    let (_file, mut reader) = open(&bytes);

    let mut sink = vec![vec![0.0; 1]; 2];
    assert_eq!(reader.read_data(&mut sink, 0, None), 0);
    assert!(matches!(reader.last_error(), Some(SpiceError::Format(_))));
    assert_eq!(sink, vec![vec![0.0], vec![0.0]]);
}

// =============================================================================
// ASCII Data
// =============================================================================

#[test]
fn test_ascii_garbage_value_is_nan() {
    let bytes = RawBuilder::ngspice("real")
        .var("time", "time")
        .var("v(out)", "voltage")
        .ascii(&[vec!["0", "1.0"], vec!["1", "2.5"], vec!["2", "NaN-producing-garbage"]]);
    let (_file, mut reader) = open(&bytes);

    assert!(!reader.is_binary());
    let mut buffer = ColumnBuffer::new(2, 3);
    assert_eq!(reader.read_data(&mut buffer, 0, None), 3);
    assert_eq!(buffer.row(0), Some(vec![0.0, 1.0]));
    assert_eq!(buffer.row(1), Some(vec![1.0, 2.5]));
    assert_eq!(buffer.column(0).unwrap()[2], 2.0);
    assert!(buffer.column(1).unwrap()[2].is_nan());
}

#[test]
fn test_ascii_is_forward_only() {
    let values: Vec<(String, String)> = (0..6)
        .map(|i| (format!("{}", i), format!("{}", i * 10)))
        .collect();
    let rows: Vec<Vec<&str>> = values
        .iter()
        .map(|(t, v)| vec![t.as_str(), v.as_str()])
        .collect();
    let bytes = transient(RawBuilder::ngspice("real")).ascii(&rows);
    let (_file, mut reader) = open(&bytes);

    let mut buffer = ColumnBuffer::new(2, 2);
    assert_eq!(reader.read_data(&mut buffer, 0, Some(2)), 2);
    assert_eq!(buffer.row(1), Some(vec![1.0, 10.0]));

    // Continues after row 1; skip counts from the cursor
    assert_eq!(reader.read_data(&mut buffer, 1, Some(2)), 2);
    assert_eq!(buffer.row(0), Some(vec![3.0, 30.0]));
    assert_eq!(reader.expected_rows(0, None), 1);

    assert_eq!(reader.read_data(&mut buffer, 0, None), 1);
    assert_eq!(buffer.row(0), Some(vec![5.0, 50.0]));
    assert_eq!(reader.read_data(&mut buffer, 0, None), 0);

    assert!(reader.reset());
    assert_eq!(reader.read_data(&mut buffer, 4, None), 2);
    assert_eq!(buffer.row(0), Some(vec![4.0, 40.0]));
}

#[test]
fn test_ltspice_ascii_complex() {
    let bytes = RawBuilder::ltspice("complex forward")
        .var("frequency", "frequency")
        .var("V(out)", "voltage")
        .ascii(&[vec!["1.0,0.0", "0.5,-0.5"], vec!["2.0,0.0", "0.25,garbage"]]);
    let (_file, mut reader) = open(&bytes);

    assert_eq!(reader.dialect(), Some(Dialect::LtSpice));
    assert!(!reader.is_binary());
    let buffer = read_all(&mut reader);
    assert_eq!(buffer.rows(), 2);
    assert_eq!(buffer.row(0), Some(vec![1.0, 0.0, 0.5, -0.5]));
    assert_eq!(buffer.column(2).unwrap()[1], 0.25);
    assert!(buffer.column(3).unwrap()[1].is_nan());
}

#[test]
fn test_ascii_truncated_section() {
    let bytes = transient(RawBuilder::ngspice("real").points(5))
        .ascii(&[vec!["0", "1.0"], vec!["1", "2.0"]]);
    let (_file, mut reader) = open(&bytes);

    let mut buffer = ColumnBuffer::new(2, 5);
    assert_eq!(reader.read_data(&mut buffer, 0, None), 2);
}

// =============================================================================
// One-shot Helpers
// =============================================================================

#[test]
fn test_probe_reports_framing() {
    let binary = write_temp(&transient(RawBuilder::ngspice("real")).binary(&ramp(2)));
    let ascii = write_temp(&transient(RawBuilder::ltspice("real")).ascii(&[vec!["0", "1"]]));

    assert_eq!(probe(binary.path()), Some(Framing::Binary));
    assert_eq!(probe(ascii.path()), Some(Framing::Ascii));
}

#[test]
fn test_preview_is_row_major() {
    let rows = ramp(50);
    let file = write_temp(&transient(RawBuilder::ngspice("real")).binary(&rows));

    let head = preview(file.path(), 3).unwrap();
    assert_eq!(head, rows[..3].to_vec());

    let all = preview(file.path(), 1000).unwrap();
    assert_eq!(all.len(), 50);
}

#[test]
fn test_read_real_vectors() {
    let rows = ramp(8);
    let file = write_temp(&transient(RawBuilder::ngspice("real")).binary(&rows));

    let data = read(file.path()).unwrap();
    assert_eq!(data.len(), 8);
    assert_eq!(data.vectors.len(), 2);
    match data.get("v(out)") {
        Some(VectorData::Real(v)) => assert_eq!(v[7], 3.5),
        other => panic!("unexpected vector: {:?}", other),
    }
    assert!(data.get("v(missing)").is_none());
}
