//! C Foreign Function Interface (FFI) for the SPICE raw reader
//!
//! This module provides a C-compatible API for reading raw files
//! from C, C++, and other languages that support C FFI.
//!
//! The caller owns the output columns: one `double` array per output
//! column, each at least `row_capacity` long.

use spice_raw_core::{ColumnSink, SpiceReader};
use std::ffi::{c_char, c_double, c_int, c_void, CStr, CString};
use std::ptr;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Install a stderr log subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Returns 1 if installed, 0 if a subscriber was already set.
#[no_mangle]
pub extern "C" fn spice_init_logging() -> c_int {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => 1,
        Err(_) => 0,
    }
}

// ============================================================================
// Opaque Types for C
// ============================================================================

/// Opaque handle to a SpiceReader
#[repr(C)]
pub struct CSpiceReader {
    reader: SpiceReader,
    channel_names: Vec<CString>,
    channel_types: Vec<CString>,
    column_names: Vec<CString>,
    last_error: Option<CString>,
}

impl CSpiceReader {
    fn new(mut reader: SpiceReader) -> Self {
        let to_c = |s: &str| CString::new(s).unwrap_or_default();
        let channel_names = reader.channels().iter().map(|c| to_c(&c.name)).collect();
        let channel_types = reader.channels().iter().map(|c| to_c(&c.kind)).collect();
        let column_names = reader.column_names().iter().map(|n| to_c(n)).collect();
        Self {
            reader,
            channel_names,
            channel_types,
            column_names,
            last_error: None,
        }
    }
}

/// Caller-provided column pointers
struct RawColumns {
    columns: Vec<*mut c_double>,
    rows: usize,
}

impl ColumnSink for RawColumns {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn row_capacity(&self) -> usize {
        self.rows
    }

    fn write(&mut self, column: usize, row: usize, value: c_double) {
        // SAFETY: spice_reader_read checked every pointer is non-null and
        // the caller guarantees `rows` slots behind each
        unsafe { *self.columns[column].add(row) = value }
    }
}

/// Counts above `c_int::MAX` saturate
fn count(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

fn flag(value: bool) -> c_int {
    if value {
        1
    } else {
        0
    }
}

// ============================================================================
// Reader Creation and Destruction
// ============================================================================

/// Open a raw file and parse its header.
///
/// Returns null if the file cannot be opened. A file that opens but is not
/// a valid raw file still returns a handle; check `spice_reader_is_valid`.
#[no_mangle]
pub unsafe extern "C" fn spice_reader_open(filename: *const c_char) -> *mut CSpiceReader {
    if filename.is_null() {
        return ptr::null_mut();
    }

    let filename_str = match CStr::from_ptr(filename).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    let mut reader = SpiceReader::new(filename_str);
    if !reader.open() {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(CSpiceReader::new(reader)))
}

/// Free a reader handle.
#[no_mangle]
pub unsafe extern "C" fn spice_reader_free(handle: *mut CSpiceReader) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn spice_reader_set_chunk_rows(handle: *mut CSpiceReader, rows: c_int) {
    if handle.is_null() || rows <= 0 {
        return;
    }
    (*handle).reader.set_chunk_rows(rows as usize);
}

/// Progress callback: percentage of the requested rows, plus `user_data`
pub type SpiceProgressCallback = extern "C" fn(percent: c_double, user_data: *mut c_void);

/// Install (or with a null callback, remove) a progress callback.
#[no_mangle]
pub unsafe extern "C" fn spice_reader_set_progress(
    handle: *mut CSpiceReader,
    callback: Option<SpiceProgressCallback>,
    user_data: *mut c_void,
) {
    if handle.is_null() {
        return;
    }
    let reader = &mut (*handle).reader;
    match callback {
        Some(cb) => {
            let user_data = user_data as usize;
            reader.set_progress(move |pct| cb(pct, user_data as *mut c_void));
        }
        None => reader.clear_progress(),
    }
}

// ============================================================================
// Metadata Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn spice_reader_is_valid(handle: *mut CSpiceReader) -> c_int {
    if handle.is_null() {
        return 0;
    }
    flag((*handle).reader.is_valid())
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_point_count(handle: *mut CSpiceReader) -> c_int {
    if handle.is_null() {
        return 0;
    }
    count((*handle).reader.point_count())
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_channel_count(handle: *const CSpiceReader) -> c_int {
    if handle.is_null() {
        return 0;
    }
    count((*handle).channel_names.len())
}

/// Number of output columns a read needs: one per channel, two when complex
#[no_mangle]
pub unsafe extern "C" fn spice_reader_column_count(handle: *const CSpiceReader) -> c_int {
    if handle.is_null() {
        return 0;
    }
    count((*handle).column_names.len())
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_is_complex(handle: *mut CSpiceReader) -> c_int {
    if handle.is_null() {
        return -1;
    }
    flag((*handle).reader.is_complex())
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_is_binary(handle: *mut CSpiceReader) -> c_int {
    if handle.is_null() {
        return -1;
    }
    flag((*handle).reader.is_binary())
}

fn cached(names: &[CString], index: c_int) -> *const c_char {
    if index < 0 {
        return ptr::null();
    }
    match names.get(index as usize) {
        Some(name) => name.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_channel_name(
    handle: *const CSpiceReader,
    index: c_int,
) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }
    cached(&(*handle).channel_names, index)
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_channel_type(
    handle: *const CSpiceReader,
    index: c_int,
) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }
    cached(&(*handle).channel_types, index)
}

#[no_mangle]
pub unsafe extern "C" fn spice_reader_column_name(
    handle: *const CSpiceReader,
    index: c_int,
) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }
    cached(&(*handle).column_names, index)
}

/// Message of the most recent failure, or null. Valid until the next call.
#[no_mangle]
pub unsafe extern "C" fn spice_reader_last_error(handle: *mut CSpiceReader) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }
    let h = &mut *handle;
    h.last_error = h
        .reader
        .last_error()
        .and_then(|e| CString::new(e.to_string()).ok());
    match &h.last_error {
        Some(s) => s.as_ptr(),
        None => ptr::null(),
    }
}

// ============================================================================
// Data Access
// ============================================================================

/// Decode rows into caller-owned columns.
///
/// `columns` points at `column_count` arrays of `row_capacity` doubles.
/// A negative `max_count` reads everything. Returns the rows written, or
/// -1 on invalid arguments.
#[no_mangle]
pub unsafe extern "C" fn spice_reader_read(
    handle: *mut CSpiceReader,
    columns: *const *mut c_double,
    column_count: c_int,
    row_capacity: c_int,
    skip: c_int,
    max_count: c_int,
) -> c_int {
    if handle.is_null() || columns.is_null() {
        return -1;
    }
    if column_count < 0 || row_capacity < 0 || skip < 0 {
        return -1;
    }

    let pointers = std::slice::from_raw_parts(columns, column_count as usize);
    if pointers.iter().any(|p| p.is_null()) {
        return -1;
    }
    let mut sink = RawColumns {
        columns: pointers.to_vec(),
        rows: row_capacity as usize,
    };
    let max_count = if max_count < 0 {
        None
    } else {
        Some(max_count as usize)
    };

    count((*handle).reader.read_data(&mut sink, skip as usize, max_count))
}
