//! Kubernetes resource quantities such as `2Gi` or `500M`.

use std::str::FromStr;

/// A quantity, in base units.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(pub u64);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid integer: {0}")]
    NotAnInteger(#[from] std::num::ParseIntError),

    #[error("quantity does not fit in 64 bits")]
    Overflow,
}

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

// Kubernetes spells kilo with a lower-case `k`; the upper-case form is accepted too.
const DECIMAL_SUFFIXES: [(&str, u32); 7] = [
    ("k", 1),
    ("K", 1),
    ("M", 2),
    ("G", 3),
    ("T", 4),
    ("P", 5),
    ("E", 6),
];

const UNITS: [&str; 7] = ["B", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Scaled values at or above this move up to the next unit when formatting.
const UNIT_THRESHOLD: f64 = 800.0;

impl FromStr for Quantity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = if let Some((digits, exp)) = strip_suffix(s, &BINARY_SUFFIXES) {
            (digits, 1024u64.checked_pow(exp))
        } else if let Some((digits, exp)) = strip_suffix(s, &DECIMAL_SUFFIXES) {
            (digits, 1000u64.checked_pow(exp))
        } else {
            (s, Some(1))
        };
        let value = digits.parse::<u64>()?;
        multiplier
            .and_then(|m| value.checked_mul(m))
            .map(Quantity)
            .ok_or(ParseError::Overflow)
    }
}

fn strip_suffix<'s>(s: &'s str, suffixes: &[(&str, u32)]) -> Option<(&'s str, u32)> {
    suffixes
        .iter()
        .find_map(|(suffix, exp)| s.strip_suffix(suffix).map(|digits| (digits, *exp)))
}

/// Parses a quantity into base units, returning 0 for anything that isn't an integer with an
/// optional SI or binary suffix.
pub fn quantity_to_scalar(s: &str) -> u64 {
    s.parse::<Quantity>().map(|Quantity(v)| v).unwrap_or(0)
}

/// Formats a number of base units using the smallest binary unit that keeps the value below 800,
/// with at most two decimals.
pub fn scalar_to_quantity(value: u64) -> String {
    let mut scaled = value as f64;
    let mut unit = 0;
    while scaled >= UNIT_THRESHOLD && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{scaled:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{}", UNITS[unit])
}
