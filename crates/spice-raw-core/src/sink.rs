//! Output side of the readers: pre-sized numeric columns and progress callbacks

/// Caller-owned column storage the readers decode into.
///
/// The reader never grows a sink. It writes only to `(column, row)` slots
/// below `column_count()` and `row_capacity()`.
pub trait ColumnSink {
    fn column_count(&self) -> usize;

    fn row_capacity(&self) -> usize;

    fn write(&mut self, column: usize, row: usize, value: f64);
}

/// Progress notification, called with the percentage of expected rows produced
pub type ProgressFn = Box<dyn FnMut(f64)>;

impl<S: ColumnSink + ?Sized> ColumnSink for &mut S {
    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn row_capacity(&self) -> usize {
        (**self).row_capacity()
    }

    fn write(&mut self, column: usize, row: usize, value: f64) {
        (**self).write(column, row, value)
    }
}

impl ColumnSink for Vec<Vec<f64>> {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn row_capacity(&self) -> usize {
        self.iter().map(Vec::len).min().unwrap_or(0)
    }

    #[inline]
    fn write(&mut self, column: usize, row: usize, value: f64) {
        self[column][row] = value;
    }
}

/// Fixed-size column storage, NaN until written
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBuffer {
    columns: Vec<Vec<f64>>,
    rows: usize,
}

impl ColumnBuffer {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns: vec![vec![f64::NAN; rows]; columns],
            rows,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Values of one row across all columns
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index]).collect())
    }

    /// Drop rows past `rows`, typically down to the count a read returned
    pub fn truncate(&mut self, rows: usize) {
        if rows < self.rows {
            for column in &mut self.columns {
                column.truncate(rows);
            }
            self.rows = rows;
        }
    }

    pub fn into_columns(self) -> Vec<Vec<f64>> {
        self.columns
    }
}

impl ColumnSink for ColumnBuffer {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn row_capacity(&self) -> usize {
        self.rows
    }

    #[inline]
    fn write(&mut self, column: usize, row: usize, value: f64) {
        self.columns[column][row] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_buffer_rows() {
        let mut buffer = ColumnBuffer::new(2, 3);
        buffer.write(0, 1, 1.5);
        buffer.write(1, 1, -2.0);

        assert_eq!(buffer.row(1), Some(vec![1.5, -2.0]));
        assert!(buffer.column(0).unwrap()[0].is_nan());
        assert_eq!(buffer.row(3), None);

        buffer.truncate(2);
        assert_eq!(buffer.rows(), 2);
        assert_eq!(buffer.column(1).unwrap().len(), 2);
    }

    #[test]
    fn test_vec_sink_capacity_is_shortest_column() {
        let sink: Vec<Vec<f64>> = vec![vec![0.0; 4], vec![0.0; 2]];
        assert_eq!(sink.column_count(), 2);
        assert_eq!(sink.row_capacity(), 2);
    }
}
