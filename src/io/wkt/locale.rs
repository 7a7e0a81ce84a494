use crate::error::{Result, SpatialDbError};

/// Numeric conventions used when reading and writing WKT.
///
/// Parsing and formatting never consult the process locale, so results do not depend on the
/// host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    decimal_separator: u8,
}

impl Locale {
    /// The "C" locale: `.` as decimal separator.
    pub const C: Locale = Locale {
        decimal_separator: b'.',
    };

    /// A locale with a custom decimal separator.
    ///
    /// The separator must be ASCII punctuation that is not otherwise meaningful in WKT.
    pub fn with_decimal_separator(separator: char) -> Result<Self> {
        let reserved = matches!(separator, '(' | ')' | ',' | '"' | '+' | '-');
        if !separator.is_ascii_punctuation() || reserved {
            return Err(SpatialDbError::Domain(format!(
                "Invalid decimal separator {separator:?}"
            )));
        }
        Ok(Self {
            decimal_separator: separator as u8,
        })
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator as char
    }

    /// Whether `c` can be part of a number literal.
    pub(crate) fn is_number_char(&self, c: char) -> bool {
        c.is_ascii_digit() || matches!(c, '+' | '-' | 'e' | 'E') || c == self.decimal_separator()
    }

    /// Parse a complete number literal.
    pub fn parse_f64(&self, literal: &str) -> Option<f64> {
        let value = if self.decimal_separator == b'.' {
            lexical_core::parse::<f64>(literal.as_bytes())
        } else {
            let bytes: Vec<u8> = literal
                .bytes()
                .map(|b| if b == self.decimal_separator { b'.' } else { b })
                .collect();
            lexical_core::parse::<f64>(&bytes)
        };
        value.ok()
    }

    /// Append the shortest representation of `value` that reads back exactly. Integral values
    /// are written without a fractional part.
    pub fn write_f64(&self, value: f64, out: &mut String) {
        let mut buffer = [0u8; lexical_core::BUFFER_SIZE];
        let digits = lexical_core::write(value, &mut buffer);
        let digits = std::str::from_utf8(digits).unwrap_or_default();
        let digits = digits.strip_suffix(".0").unwrap_or(digits);
        if self.decimal_separator == b'.' {
            out.push_str(digits);
        } else {
            out.extend(digits.chars().map(|c| {
                if c == '.' {
                    self.decimal_separator()
                } else {
                    c
                }
            }));
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::C
    }
}
