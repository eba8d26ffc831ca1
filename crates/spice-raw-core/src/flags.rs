//! Decoder for the header's `Flags:` line

/// Bit-set decoded from the flags line.
///
/// `real` is only set by the `real` keyword, so a line that names neither
/// `real` nor `complex` decodes as complex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub real: bool,
    /// Informational
    pub forward: bool,
    /// Dependent channels stored as doubles (LtSpice `double`)
    pub high_precision: bool,
    /// Informational
    pub log: bool,
}

impl Flags {
    /// Decode a whitespace separated token line. Unknown tokens are ignored.
    pub fn parse(line: &str) -> Self {
        let mut flags = Flags::default();
        let mut complex = false;

        for token in line.split_whitespace() {
            match token {
                "real" => flags.real = true,
                "complex" => complex = true,
                "forward" => flags.forward = true,
                "log" => flags.log = true,
                "double" => flags.high_precision = true,
                _ => {}
            }
        }

        if complex {
            flags.real = false;
        }
        flags
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        !self.real
    }
}
