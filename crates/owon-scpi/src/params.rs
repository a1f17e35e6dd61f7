//! Parameter codec: typed values to and from wire text.
//!
//! Everything here is pure. Validation that depends on another live setting
//! (vertical scale against probe attenuation) takes that setting explicitly
//! through a [`CodecContext`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScpiError};
use crate::scales::{ProbeAttenuation, VERTICAL_SCALES};
use crate::units::{self, UnitClass};

/// Live settings that parameterize an allowed set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecContext {
    /// Probe attenuation of the channel the command addresses.
    pub probe: Option<ProbeAttenuation>,
}

impl CodecContext {
    /// A context with a known probe attenuation.
    pub fn with_probe(probe: ProbeAttenuation) -> Self {
        CodecContext { probe: Some(probe) }
    }
}

/// An allowed set of discrete tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteSet {
    /// Keywords matched case-insensitively (`AC`, `DC`, `GND`).
    Tags(&'static [&'static str]),
    /// Quantities matched by value, so `0.1V` selects `100mV`.
    Quantities(&'static [&'static str]),
    /// Vertical scale window selected by the channel's probe attenuation.
    ///
    /// Without a probe in the context the whole table is allowed.
    VerticalScale,
}

const PROBE_TAGS: [&str; 5] = ["1X", "10X", "100X", "1000X", "10000X"];

impl DiscreteSet {
    /// Probe attenuation tags.
    pub const PROBE: DiscreteSet = DiscreteSet::Quantities(&PROBE_TAGS);

    /// The tags allowed under the given context.
    pub fn allowed(&self, context: &CodecContext) -> &'static [&'static str] {
        match self {
            DiscreteSet::Tags(tags) | DiscreteSet::Quantities(tags) => tags,
            DiscreteSet::VerticalScale => match context.probe {
                Some(probe) => probe.vertical_scales(),
                None => &VERTICAL_SCALES,
            },
        }
    }

    /// Whether the allowed set changes with the probe attenuation.
    pub fn depends_on_probe(&self) -> bool {
        matches!(self, DiscreteSet::VerticalScale)
    }

    /// Find the canonical tag for `text`, or fail with the active allowed set.
    pub fn canonical(&self, text: &str, context: &CodecContext) -> Result<&'static str> {
        let text = text.trim();
        let allowed = self.allowed(context);
        if let Some(tag) = allowed.iter().find(|t| t.eq_ignore_ascii_case(text)) {
            return Ok(tag);
        }
        if !matches!(self, DiscreteSet::Tags(_)) {
            if let Some((value, unit)) = units::parse_quantity(text) {
                let found = allowed.iter().find(|tag| {
                    units::parse_quantity(tag).is_some_and(|(tag_value, tag_unit)| {
                        (unit.is_empty() || unit == tag_unit) && same_quantity(value, tag_value)
                    })
                });
                if let Some(tag) = found {
                    return Ok(tag);
                }
            }
        }
        Err(ScpiError::InvalidDiscreteValue {
            value: text.to_string(),
            allowed: allowed.iter().map(|t| t.to_string()).collect(),
        })
    }
}

fn same_quantity(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// The parameter a command takes (and its query replies with).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterType {
    /// No parameter: an action, or a query-only command.
    None,
    /// `ON`/`OFF`; `numeric` additionally accepts `1`/`0`.
    Bool {
        /// Whether `1`/`0` are accepted for this command.
        numeric: bool,
    },
    /// One tag out of an allowed set.
    Discrete(DiscreteSet),
    /// A signed decimal within an inclusive range.
    Integer {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// A float with an SI prefix and unit.
    FloatWithUnit(UnitClass),
}

impl ParameterType {
    /// Human readable description, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            ParameterType::None => "no parameter".to_string(),
            ParameterType::Bool { numeric: true } => "ON/OFF/1/0".to_string(),
            ParameterType::Bool { numeric: false } => "ON/OFF".to_string(),
            ParameterType::Discrete(DiscreteSet::VerticalScale) => {
                "a vertical scale".to_string()
            }
            ParameterType::Discrete(set) => {
                format!("one of {}", set.allowed(&CodecContext::default()).join("/"))
            }
            ParameterType::Integer { min, max } => format!("an integer in [{}, {}]", min, max),
            ParameterType::FloatWithUnit(unit) => format!("a value in {}", unit),
        }
    }

    /// Validate a value against this type and return its canonical form.
    pub fn validate(&self, value: &ParameterValue, context: &CodecContext) -> Result<ParameterValue> {
        match (self, value) {
            (ParameterType::Bool { .. }, ParameterValue::Bool(b)) => Ok(ParameterValue::Bool(*b)),
            (ParameterType::Discrete(set), ParameterValue::Discrete(tag)) => {
                Ok(ParameterValue::Discrete(set.canonical(tag, context)?.to_string()))
            }
            (ParameterType::Integer { min, max }, ParameterValue::Integer(v)) => {
                check_range(*v, *min, *max)?;
                Ok(ParameterValue::Integer(*v))
            }
            (
                ParameterType::FloatWithUnit(expected),
                ParameterValue::FloatWithUnit { value: v, unit },
            ) if expected == unit && v.is_finite() => Ok(value.clone()),
            _ => Err(ScpiError::ParameterMismatch {
                expected: self.describe(),
                found: value.describe(),
            }),
        }
    }

    /// Validate and encode a value to wire text.
    pub fn encode(&self, value: &ParameterValue, context: &CodecContext) -> Result<String> {
        Ok(encode(&self.validate(value, context)?))
    }
}

fn check_range(value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(ScpiError::OutOfRangeInteger { value, min, max });
    }
    Ok(())
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// `ON`/`OFF`.
    Bool(bool),
    /// A tag from an allowed set.
    Discrete(String),
    /// A signed integer.
    Integer(i64),
    /// A float in base SI units together with its unit class.
    FloatWithUnit {
        /// Value in base units (volts, seconds, hertz, percent).
        value: f64,
        /// The unit class the value is expressed in.
        unit: UnitClass,
    },
}

impl ParameterValue {
    /// A voltage in volts.
    pub fn volts(value: f64) -> Self {
        ParameterValue::FloatWithUnit {
            value,
            unit: UnitClass::Volt,
        }
    }

    /// A duration in seconds.
    pub fn seconds(value: f64) -> Self {
        ParameterValue::FloatWithUnit {
            value,
            unit: UnitClass::Second,
        }
    }

    /// A frequency in hertz.
    pub fn hertz(value: f64) -> Self {
        ParameterValue::FloatWithUnit {
            value,
            unit: UnitClass::Hertz,
        }
    }

    /// A ratio in percent.
    pub fn percent(value: f64) -> Self {
        ParameterValue::FloatWithUnit {
            value,
            unit: UnitClass::Percent,
        }
    }

    /// A discrete tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        ParameterValue::Discrete(tag.into())
    }

    /// Get the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the tag, if this is a discrete value.
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            ParameterValue::Discrete(tag) => Some(tag),
            _ => None,
        }
    }

    /// Get the integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the base-unit float, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::FloatWithUnit { value, .. } => Some(*value),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            ParameterValue::Bool(b) => format!("bool {}", b),
            ParameterValue::Discrete(tag) => format!("tag '{}'", tag),
            ParameterValue::Integer(v) => format!("integer {}", v),
            ParameterValue::FloatWithUnit { value, unit } => format!("{} {}", value, unit),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

impl From<bool> for ParameterValue {
    fn from(b: bool) -> Self {
        ParameterValue::Bool(b)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<ProbeAttenuation> for ParameterValue {
    fn from(p: ProbeAttenuation) -> Self {
        ParameterValue::Discrete(p.as_str().to_string())
    }
}

/// Encode a value to wire text.
pub fn encode(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Bool(true) => "ON".to_string(),
        ParameterValue::Bool(false) => "OFF".to_string(),
        ParameterValue::Discrete(tag) => tag.clone(),
        ParameterValue::Integer(v) => v.to_string(),
        ParameterValue::FloatWithUnit { value, unit } => units::format_with_unit(*value, *unit),
    }
}

/// Decode wire text into a value of the given type.
pub fn decode(ty: &ParameterType, context: &CodecContext, text: &str) -> Result<ParameterValue> {
    let text = text.trim();
    match ty {
        ParameterType::None => Err(ScpiError::ParameterMismatch {
            expected: ty.describe(),
            found: format!("'{}'", text),
        }),
        ParameterType::Bool { numeric } => decode_bool(text, *numeric),
        ParameterType::Discrete(set) => Ok(ParameterValue::Discrete(
            set.canonical(text, context)?.to_string(),
        )),
        ParameterType::Integer { min, max } => {
            let digits = text.strip_prefix('+').unwrap_or(text);
            let value = digits
                .parse::<i64>()
                .map_err(|_| ScpiError::InvalidInteger(text.to_string()))?;
            check_range(value, *min, *max)?;
            Ok(ParameterValue::Integer(value))
        }
        ParameterType::FloatWithUnit(unit) => Ok(ParameterValue::FloatWithUnit {
            value: units::parse_with_unit(text, *unit)?,
            unit: *unit,
        }),
    }
}

fn decode_bool(text: &str, numeric: bool) -> Result<ParameterValue> {
    if text.eq_ignore_ascii_case("ON") {
        return Ok(ParameterValue::Bool(true));
    }
    if text.eq_ignore_ascii_case("OFF") {
        return Ok(ParameterValue::Bool(false));
    }
    if numeric {
        match text {
            "1" => return Ok(ParameterValue::Bool(true)),
            "0" => return Ok(ParameterValue::Bool(false)),
            _ => {}
        }
    }
    let mut allowed = vec!["ON".to_string(), "OFF".to_string()];
    if numeric {
        allowed.extend(["1".to_string(), "0".to_string()]);
    }
    Err(ScpiError::InvalidDiscreteValue {
        value: text.to_string(),
        allowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scales::TIMEBASE_SCALES;

    const SCALE: ParameterType = ParameterType::Discrete(DiscreteSet::VerticalScale);
    const OFFSET: ParameterType = ParameterType::Integer { min: -200, max: 200 };

    #[test]
    fn test_bool_numeric_is_per_command() {
        let plain = ParameterType::Bool { numeric: false };
        let numeric = ParameterType::Bool { numeric: true };
        let ctx = CodecContext::default();

        assert_eq!(decode(&plain, &ctx, "on").unwrap(), ParameterValue::Bool(true));
        assert_eq!(decode(&plain, &ctx, "OFF").unwrap(), ParameterValue::Bool(false));
        assert!(matches!(
            decode(&plain, &ctx, "1"),
            Err(ScpiError::InvalidDiscreteValue { .. })
        ));
        assert_eq!(decode(&numeric, &ctx, "1").unwrap(), ParameterValue::Bool(true));
        assert_eq!(decode(&numeric, &ctx, "0").unwrap(), ParameterValue::Bool(false));
        assert_eq!(encode(&ParameterValue::Bool(true)), "ON");
    }

    #[test]
    fn test_vertical_scale_depends_on_probe() {
        let x1000 = CodecContext::with_probe(ProbeAttenuation::X1000);
        let x10 = CodecContext::with_probe(ProbeAttenuation::X10);
        let value = ParameterValue::tag("100mV");

        assert!(matches!(
            SCALE.encode(&value, &x1000),
            Err(ScpiError::InvalidDiscreteValue { .. })
        ));
        assert_eq!(SCALE.encode(&value, &x10).unwrap(), "100mV");
        assert!(matches!(
            decode(&SCALE, &x1000, "100mV"),
            Err(ScpiError::InvalidDiscreteValue { .. })
        ));
    }

    #[test]
    fn test_discrete_canonicalizes_numerically() {
        let x1 = CodecContext::with_probe(ProbeAttenuation::X1);
        assert_eq!(
            decode(&SCALE, &x1, "10mV").unwrap(),
            ParameterValue::tag("10.0mV")
        );
        assert_eq!(decode(&SCALE, &x1, "0.1V").unwrap(), ParameterValue::tag("100mV"));

        let timebase = ParameterType::Discrete(DiscreteSet::Quantities(&TIMEBASE_SCALES));
        let ctx = CodecContext::default();
        assert_eq!(
            decode(&timebase, &ctx, "1ms").unwrap(),
            ParameterValue::tag("1.0ms")
        );
        assert!(decode(&timebase, &ctx, "3ms").is_err());

        assert_eq!(
            decode(&ParameterType::Discrete(DiscreteSet::PROBE), &ctx, "10").unwrap(),
            ParameterValue::tag("10X")
        );
    }

    #[test]
    fn test_tags_do_not_match_numerically() {
        let coupling = ParameterType::Discrete(DiscreteSet::Tags(&["AC", "DC", "GND"]));
        let ctx = CodecContext::default();
        assert_eq!(decode(&coupling, &ctx, "gnd").unwrap(), ParameterValue::tag("GND"));
        let err = decode(&coupling, &ctx, "AC1").unwrap_err();
        match err {
            ScpiError::InvalidDiscreteValue { allowed, .. } => {
                assert_eq!(allowed, vec!["AC", "DC", "GND"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_integer_range() {
        let ctx = CodecContext::default();
        assert_eq!(decode(&OFFSET, &ctx, "-82").unwrap(), ParameterValue::Integer(-82));
        assert_eq!(decode(&OFFSET, &ctx, "+200").unwrap(), ParameterValue::Integer(200));
        assert!(matches!(
            decode(&OFFSET, &ctx, "201"),
            Err(ScpiError::OutOfRangeInteger { value: 201, .. })
        ));
        assert!(matches!(
            OFFSET.encode(&ParameterValue::Integer(-201), &ctx),
            Err(ScpiError::OutOfRangeInteger { .. })
        ));
        assert!(matches!(
            decode(&OFFSET, &ctx, "12.5"),
            Err(ScpiError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_float_with_unit() {
        let volts = ParameterType::FloatWithUnit(UnitClass::Volt);
        let ctx = CodecContext::default();
        assert_eq!(decode(&volts, &ctx, "200mV").unwrap(), ParameterValue::volts(0.2));
        assert!(matches!(
            decode(&volts, &ctx, "2ms"),
            Err(ScpiError::UnitParse { .. })
        ));
        assert_eq!(volts.encode(&ParameterValue::volts(1.5), &ctx).unwrap(), "1.5V");
        let precise = ParameterValue::volts(1.2345678);
        let text = volts.encode(&precise, &ctx).unwrap();
        assert_eq!(text, "1.2345678V");
        assert_eq!(decode(&volts, &ctx, &text).unwrap(), precise);
        assert!(matches!(
            volts.encode(&ParameterValue::seconds(1.5), &ctx),
            Err(ScpiError::ParameterMismatch { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let ctx = CodecContext::default();
        let err = OFFSET.encode(&ParameterValue::Bool(true), &ctx).unwrap_err();
        assert!(matches!(err, ScpiError::ParameterMismatch { .. }));
        assert!(err.to_string().contains("[-200, 200]"));
    }

    #[test]
    fn test_decode_of_encode_is_identity() {
        let ctx = CodecContext::with_probe(ProbeAttenuation::X10);
        let cases = [
            (ParameterType::Bool { numeric: false }, ParameterValue::Bool(false)),
            (SCALE, ParameterValue::tag("200mV")),
            (OFFSET, ParameterValue::Integer(-150)),
            (ParameterType::FloatWithUnit(UnitClass::Second), ParameterValue::seconds(0.0005)),
            (ParameterType::FloatWithUnit(UnitClass::Hertz), ParameterValue::hertz(2_500.0)),
            (ParameterType::FloatWithUnit(UnitClass::Percent), ParameterValue::percent(12.5)),
            (ParameterType::FloatWithUnit(UnitClass::Volt), ParameterValue::volts(1.2345678)),
            (ParameterType::FloatWithUnit(UnitClass::Volt), ParameterValue::volts(-0.000123456789)),
        ];
        for (ty, value) in cases {
            let text = ty.encode(&value, &ctx).unwrap();
            assert_eq!(decode(&ty, &ctx, &text).unwrap(), value, "{text}");
        }
    }

    #[test]
    fn test_encode_of_decode_modulo_prefix() {
        let ctx = CodecContext::with_probe(ProbeAttenuation::X10);
        let cases = [
            (ParameterType::Bool { numeric: false }, "ON", "ON"),
            (SCALE, "500mV", "500mV"),
            (OFFSET, "-3", "-3"),
            (ParameterType::FloatWithUnit(UnitClass::Volt), "0.25V", "250mV"),
            (ParameterType::FloatWithUnit(UnitClass::Hertz), "1000Hz", "1kHz"),
            (ParameterType::FloatWithUnit(UnitClass::Second), "20us", "20us"),
        ];
        for (ty, input, expected) in cases {
            let value = decode(&ty, &ctx, input).unwrap();
            assert_eq!(encode(&value), expected);
        }
    }
}
