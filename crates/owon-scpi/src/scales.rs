//! Instrument value tables: probe attenuation, vertical scales, time bases.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScpiError};
use crate::units;

/// Vertical scale tags in ascending order, as reported by the instrument.
///
/// The tags are user-facing values, i.e. already multiplied by the probe
/// attenuation. Each attenuation level exposes a window of ten of them.
pub const VERTICAL_SCALES: [&str; 22] = [
    "10.0mV", "20.0mV", "50.0mV", // 1X starts here
    "100mV", "200mV", "500mV", // 10X
    "1.0V", "2.0V", "5.0V", // 100X
    "10V", "20V", "50V", // 1000X
    "100V", "200V", "500V", // 10000X
    "1.00kV", "2.00kV", "5.00kV", "10.0kV", "20.0kV", "50.0kV", "100kV",
];

/// Number of vertical scale values available at every attenuation level.
pub const SCALES_PER_ATTENUATION: usize = 10;

/// Horizontal (time per division) scale tags in ascending order.
pub const TIMEBASE_SCALES: [&str; 36] = [
    "2.0ns", "5.0ns", "10ns", "20ns", "50ns", "100ns", "200ns", "500ns", "1.0us", "2.0us",
    "5.0us", "10us", "20us", "50us", "100us", "200us", "500us", "1.0ms", "2.0ms", "5.0ms",
    "10ms", "20ms", "50ms", "100ms", "200ms", "500ms", "1.0s", "2.0s", "5.0s", "10s", "20s",
    "50s", "100s", "200s", "500s", "1000s",
];

/// Channel input coupling tags.
pub const COUPLINGS: [&str; 3] = ["AC", "DC", "GND"];

/// Probe attenuation factor configured on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProbeAttenuation {
    /// 1X
    X1,
    /// 10X
    X10,
    /// 100X
    X100,
    /// 1000X
    X1000,
    /// 10000X
    X10000,
}

impl ProbeAttenuation {
    /// All levels in ascending order.
    pub const ALL: [ProbeAttenuation; 5] = [
        ProbeAttenuation::X1,
        ProbeAttenuation::X10,
        ProbeAttenuation::X100,
        ProbeAttenuation::X1000,
        ProbeAttenuation::X10000,
    ];

    /// Position of this level in [`ProbeAttenuation::ALL`].
    pub fn order(&self) -> usize {
        match self {
            ProbeAttenuation::X1 => 0,
            ProbeAttenuation::X10 => 1,
            ProbeAttenuation::X100 => 2,
            ProbeAttenuation::X1000 => 3,
            ProbeAttenuation::X10000 => 4,
        }
    }

    /// Numeric multiplication factor.
    pub fn factor(&self) -> u32 {
        10u32.pow(self.order() as u32)
    }

    /// Wire tag (`10X`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeAttenuation::X1 => "1X",
            ProbeAttenuation::X10 => "10X",
            ProbeAttenuation::X100 => "100X",
            ProbeAttenuation::X1000 => "1000X",
            ProbeAttenuation::X10000 => "10000X",
        }
    }

    /// Look up the level for a numeric factor.
    pub fn from_factor(factor: u32) -> Option<ProbeAttenuation> {
        ProbeAttenuation::ALL.into_iter().find(|p| p.factor() == factor)
    }

    /// Parse a probe tag such as `10X`, `10x` or `10`.
    pub fn parse(text: &str) -> Result<ProbeAttenuation> {
        let factor = parse_probe_multiplier(text)?;
        if factor.fract() == 0.0 && factor >= 1.0 && factor <= u32::MAX as f64 {
            if let Some(level) = ProbeAttenuation::from_factor(factor as u32) {
                return Ok(level);
            }
        }
        Err(ScpiError::InvalidDiscreteValue {
            value: text.trim().to_string(),
            allowed: ProbeAttenuation::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        })
    }

    /// The vertical scale tags valid while this attenuation is active.
    pub fn vertical_scales(&self) -> &'static [&'static str] {
        let start = self.order() * 3;
        &VERTICAL_SCALES[start..start + SCALES_PER_ATTENUATION]
    }
}

impl fmt::Display for ProbeAttenuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the numeric factor out of a probe field (`10X` → 10.0).
pub fn parse_probe_multiplier(text: &str) -> Result<f64> {
    let invalid = || ScpiError::decode(format!("invalid probe multiplier '{}'", text.trim()));
    let (value, suffix) = units::split_number(text.trim()).ok_or_else(invalid)?;
    let suffix = suffix.trim();
    if !(suffix.is_empty() || suffix.eq_ignore_ascii_case("X")) || value <= 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

/// Real-time horizontal offset: divisions multiplied by seconds per division.
pub fn horizontal_offset_seconds(timebase_tag: &str, offset_divisions: f64) -> Result<f64> {
    let seconds_per_div = units::parse_with_unit(timebase_tag, units::UnitClass::Second)?;
    Ok(offset_divisions * seconds_per_div)
}
