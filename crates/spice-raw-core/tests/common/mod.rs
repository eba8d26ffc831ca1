//! Synthetic raw file builders shared by the integration tests
#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub struct RawBuilder {
    lt: bool,
    flags: String,
    plot: String,
    names: Vec<(String, String)>,
    points: Option<usize>,
}

impl RawBuilder {
    pub fn ngspice(flags: &str) -> Self {
        Self {
            lt: false,
            flags: flags.into(),
            plot: "Transient Analysis".into(),
            names: Vec::new(),
            points: None,
        }
    }

    pub fn ltspice(flags: &str) -> Self {
        Self {
            lt: true,
            ..Self::ngspice(flags)
        }
    }

    pub fn plot(mut self, name: &str) -> Self {
        self.plot = name.into();
        self
    }

    pub fn var(mut self, name: &str, kind: &str) -> Self {
        self.names.push((name.into(), kind.into()));
        self
    }

    /// Override the declared point count
    pub fn points(mut self, points: usize) -> Self {
        self.points = Some(points);
        self
    }

    fn header(&self, rows: usize, marker: &str) -> Vec<u8> {
        let mut text = String::new();
        text.push_str("Title: * synthetic circuit\n");
        text.push_str("Date: Thu Jan  1 00:00:00 2026\n");
        text.push_str(&format!("Plotname: {}\n", self.plot));
        text.push_str(&format!("Flags: {}\n", self.flags));
        text.push_str(&format!("No. Variables: {}\n", self.names.len()));
        text.push_str(&format!("No. Points: {}\n", self.points.unwrap_or(rows)));
        if self.lt {
            text.push_str("Offset:   0.0000000000000000e+000\n");
            text.push_str("Command: Linear Technology Corporation LTspice XVII\n");
        }
        text.push_str("Variables:\n");
        for (i, (name, kind)) in self.names.iter().enumerate() {
            text.push_str(&format!("\t{}\t{}\t{}\n", i, name, kind));
        }
        text.push_str(marker);
        text.push('\n');
        self.encode(&text)
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        if self.lt {
            text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
        } else {
            text.as_bytes().to_vec()
        }
    }

    fn complex(&self) -> bool {
        self.flags.contains("complex")
    }

    fn value_width(&self) -> usize {
        if !self.lt || self.flags.contains("double") || self.complex() {
            8
        } else {
            4
        }
    }

    /// Binary file; each row holds one value per output column
    pub fn binary(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        let mut data = self.header(rows.len(), "Binary:");
        let parts = if self.complex() { 2 } else { 1 };
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                if col / parts == 0 || self.value_width() == 8 {
                    data.extend_from_slice(&value.to_le_bytes());
                } else {
                    data.extend_from_slice(&(*value as f32).to_le_bytes());
                }
            }
        }
        data
    }

    /// ASCII file from pre-formatted value strings, one per channel
    pub fn ascii(&self, rows: &[Vec<&str>]) -> Vec<u8> {
        let mut data = self.header(rows.len(), "Values:");
        let mut text = String::new();
        for (i, row) in rows.iter().enumerate() {
            for (ch, value) in row.iter().enumerate() {
                if ch == 0 {
                    text.push_str(&format!("{}\t{}\n", i, value));
                } else {
                    text.push_str(&format!("\t{}\n", value));
                }
            }
            text.push('\n');
        }
        data.extend(self.encode(&text));
        data
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Two-channel transient rows: time = i * 1e-3, v = i * 0.5
pub fn ramp(rows: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| vec![i as f64 * 1e-3, i as f64 * 0.5])
        .collect()
}
