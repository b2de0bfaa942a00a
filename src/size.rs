//! Human-readable byte size parsing.
//!
//! Accepts a number (digits, an optional fraction, `,` thousands separators) followed
//! by an optional unit. Units are case-insensitive: `b`, SI units (`k`, `kb`, `m`,
//! `mb`, ... up to `e`/`eb`, powers of 1000) and IEC units (`ki`, `kib`, `mi`, `mib`,
//! ... up to `ei`/`eib`, powers of 1024). Whitespace between number and unit is allowed.
//!
//! # Examples
//!
//! ```rust
//! use tako_zstd::size::parse_bytes;
//!
//! assert_eq!(parse_bytes("128KiB").unwrap(), 131_072);
//! assert_eq!(parse_bytes("128KB").unwrap(), 128_000);
//! assert_eq!(parse_bytes("1.5 MiB").unwrap(), 1_572_864);
//! ```

use std::fmt;

const KB: u64 = 1000;
const KIB: u64 = 1024;

/// Error returned by [`parse_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSizeError {
    /// The numeric prefix is empty or not a valid number.
    InvalidNumber(String),
    /// The unit suffix is not a known size name.
    UnknownUnit(String),
    /// The value does not fit in 64 bits.
    TooLarge(String),
}

impl fmt::Display for ParseSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSizeError::InvalidNumber(num) => write!(f, "invalid number {num:?}"),
            ParseSizeError::UnknownUnit(unit) => write!(f, "unhandled size name: {unit}"),
            ParseSizeError::TooLarge(input) => write!(f, "too large: {input}"),
        }
    }
}

impl std::error::Error for ParseSizeError {}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let m = match unit {
        "" | "b" => 1,
        "k" | "kb" => KB,
        "m" | "mb" => KB.pow(2),
        "g" | "gb" => KB.pow(3),
        "t" | "tb" => KB.pow(4),
        "p" | "pb" => KB.pow(5),
        "e" | "eb" => KB.pow(6),
        "ki" | "kib" => KIB,
        "mi" | "mib" => KIB.pow(2),
        "gi" | "gib" => KIB.pow(3),
        "ti" | "tib" => KIB.pow(4),
        "pi" | "pib" => KIB.pow(5),
        "ei" | "eib" => KIB.pow(6),
        _ => return None,
    };
    Some(m)
}

/// Parses a human-readable byte size such as `"128KB"` or `"1MiB"` into a byte count.
///
/// Fractional results are truncated toward zero.
pub fn parse_bytes(input: &str) -> Result<u64, ParseSizeError> {
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let number = number.replace(',', "");
    let value: f64 = number
        .parse()
        .map_err(|_| ParseSizeError::InvalidNumber(number.clone()))?;

    let unit = unit.trim().to_ascii_lowercase();
    let multiplier = unit_multiplier(&unit).ok_or(ParseSizeError::UnknownUnit(unit))?;

    let bytes = value * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        return Err(ParseSizeError::TooLarge(input.to_string()));
    }
    Ok(bytes as u64)
}
