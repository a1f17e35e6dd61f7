//! Quantities with SI magnitude prefixes (`200mV`, `1.5kHz`, `2.0ns`).
//!
//! Decoding divides by exact powers of ten for the sub-unit prefixes so that
//! `100mV` becomes exactly the `f64` nearest to `0.1`, which keeps encode and
//! decode inverse to each other for any value written with a few digits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScpiError};

/// The physical unit a float parameter is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Volts (`V`).
    Volt,
    /// Seconds (`s`).
    Second,
    /// Hertz (`Hz`).
    Hertz,
    /// Percent (`%`), never prefixed.
    Percent,
}

impl UnitClass {
    /// Unit symbol written after the magnitude prefix.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnitClass::Volt => "V",
            UnitClass::Second => "s",
            UnitClass::Hertz => "Hz",
            UnitClass::Percent => "%",
        }
    }

    fn allows_prefix(&self) -> bool {
        !matches!(self, UnitClass::Percent)
    }
}

impl fmt::Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitClass::Volt => write!(f, "volts"),
            UnitClass::Second => write!(f, "seconds"),
            UnitClass::Hertz => write!(f, "hertz"),
            UnitClass::Percent => write!(f, "percent"),
        }
    }
}

/// SI magnitude prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// `n`, 1e-9
    Nano,
    /// `u` (or `µ`), 1e-6
    Micro,
    /// `m`, 1e-3
    Milli,
    /// No prefix.
    Unit,
    /// `k`, 1e3
    Kilo,
    /// `M`, 1e6
    Mega,
}

/// Prefixes tried when formatting, largest first.
const FORMAT_ORDER: [Prefix; 6] = [
    Prefix::Mega,
    Prefix::Kilo,
    Prefix::Unit,
    Prefix::Milli,
    Prefix::Micro,
    Prefix::Nano,
];

impl Prefix {
    fn from_char(c: char) -> Option<Prefix> {
        match c {
            'n' => Some(Prefix::Nano),
            'u' | 'µ' => Some(Prefix::Micro),
            'm' => Some(Prefix::Milli),
            'k' | 'K' => Some(Prefix::Kilo),
            'M' => Some(Prefix::Mega),
            _ => None,
        }
    }

    /// The prefix letter as written on the wire.
    pub fn symbol(&self) -> &'static str {
        match self {
            Prefix::Nano => "n",
            Prefix::Micro => "u",
            Prefix::Milli => "m",
            Prefix::Unit => "",
            Prefix::Kilo => "k",
            Prefix::Mega => "M",
        }
    }

    /// Scale a mantissa written with this prefix to base units.
    pub fn to_base(&self, mantissa: f64) -> f64 {
        match self {
            Prefix::Nano => mantissa / 1e9,
            Prefix::Micro => mantissa / 1e6,
            Prefix::Milli => mantissa / 1e3,
            Prefix::Unit => mantissa,
            Prefix::Kilo => mantissa * 1e3,
            Prefix::Mega => mantissa * 1e6,
        }
    }

    /// Scale a base-unit value to a mantissa for this prefix.
    pub fn from_base(&self, value: f64) -> f64 {
        match self {
            Prefix::Nano => value * 1e9,
            Prefix::Micro => value * 1e6,
            Prefix::Milli => value * 1e3,
            Prefix::Unit => value,
            Prefix::Kilo => value / 1e3,
            Prefix::Mega => value / 1e6,
        }
    }

    fn factor(&self) -> f64 {
        self.to_base(1.0)
    }
}

/// Split leading decimal number text from its suffix.
///
/// Accepts an optional sign, digits with an optional decimal point, and an
/// optional exponent (`1e-3`). Returns `None` when no digits are present.
pub fn split_number(text: &str) -> Option<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if !bytes[digits_start..end].iter().any(u8::is_ascii_digit) {
        return None;
    }
    // Exponent only when followed by digits, so `2e` style suffixes stay suffixes.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    let value = text[..end].parse::<f64>().ok()?;
    Some((value, &text[end..]))
}

/// Split a unit suffix into a magnitude prefix and the bare unit.
///
/// A leading prefix letter is only taken as a prefix when something follows
/// it, so `m` alone stays a unit while `ms` is milli-seconds.
pub fn split_prefix(suffix: &str) -> (Prefix, &str) {
    let mut chars = suffix.chars();
    if let Some(first) = chars.next() {
        let rest = chars.as_str();
        if !rest.is_empty() {
            if let Some(prefix) = Prefix::from_char(first) {
                return (prefix, rest);
            }
        }
    }
    (Prefix::Unit, suffix)
}

/// Parse any `number[prefix]unit` text into a base-unit value and its unit.
///
/// Used to compare discrete tags numerically (`0.1V` equals `100mV`).
pub fn parse_quantity(text: &str) -> Option<(f64, String)> {
    let (mantissa, suffix) = split_number(text.trim())?;
    let (prefix, unit) = split_prefix(suffix.trim());
    Some((prefix.to_base(mantissa), unit.to_ascii_uppercase()))
}

/// Parse text expected to carry the given unit class; returns base units.
///
/// A bare number is taken as already being in base units.
pub fn parse_with_unit(text: &str, class: UnitClass) -> Result<f64> {
    let err = || ScpiError::UnitParse {
        text: text.to_string(),
        expected: class,
    };
    let (mantissa, suffix) = split_number(text.trim()).ok_or_else(err)?;
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Ok(mantissa);
    }
    if suffix.eq_ignore_ascii_case(class.symbol()) {
        return Ok(mantissa);
    }
    if !class.allows_prefix() {
        return Err(err());
    }
    let (prefix, unit) = split_prefix(suffix);
    if prefix == Prefix::Unit || !unit.eq_ignore_ascii_case(class.symbol()) {
        return Err(err());
    }
    Ok(prefix.to_base(mantissa))
}

/// Format a base-unit value with the prefix that keeps the mantissa in
/// `[1, 1000)`.
///
/// The text always decodes back to exactly `value`: binary noise from the
/// prefix scaling (`100.00000000000001`) is dropped only when the shorter
/// mantissa still denotes the same value.
pub fn format_with_unit(value: f64, class: UnitClass) -> String {
    if !class.allows_prefix() || value == 0.0 || !value.is_finite() {
        return format!("{}{}", format_mantissa(value, Prefix::Unit, value), class.symbol());
    }
    let magnitude = value.abs();
    let prefix = FORMAT_ORDER
        .iter()
        .copied()
        .find(|p| magnitude >= p.factor() * (1.0 - 1e-12))
        .unwrap_or(Prefix::Nano);
    let mantissa = format_mantissa(prefix.from_base(value), prefix, value);
    if decodes_to(&mantissa, prefix, value) {
        return format!("{}{}{}", mantissa, prefix.symbol(), class.symbol());
    }
    format!("{}{}", value, class.symbol())
}

/// Significant digits kept when trimming binary noise off a mantissa.
const MANTISSA_DIGITS: i32 = 12;

/// Print a mantissa in the shortest form that still decodes to `target`.
fn format_mantissa(mantissa: f64, prefix: Prefix, target: f64) -> String {
    if mantissa == 0.0 {
        // Avoid printing `-0`.
        return "0".to_string();
    }
    if !mantissa.is_finite() {
        return format!("{}", mantissa);
    }
    let exponent = mantissa.abs().log10().floor() as i32;
    let decimals = (MANTISSA_DIGITS - 1 - exponent).clamp(0, 17) as usize;
    let fixed = format!("{:.*}", decimals, mantissa);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    if decodes_to(trimmed, prefix, target) {
        return trimmed.to_string();
    }
    format!("{}", mantissa)
}

fn decodes_to(mantissa: &str, prefix: Prefix, target: f64) -> bool {
    mantissa
        .parse::<f64>()
        .is_ok_and(|m| prefix.to_base(m) == target)
}
