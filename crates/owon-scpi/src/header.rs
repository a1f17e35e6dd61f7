//! Capture header model.
//!
//! `:DATA:WAVE:SCREEN:HEAD?` returns a JSON document describing the settings
//! that were active when the screen was captured. Keys are matched without
//! regard to case, unknown keys are ignored, and a missing required field is
//! reported with its path (`CHANNEL[1].OFFSET`).
//!
//! ```json
//! {
//!   "TIMEBASE": {"SCALE": "1.0ms", "HOFFSET": 0},
//!   "SAMPLE": {"FULLSCREEN": 600, "DATALEN": 600, "SAMPLERATE": "(100MS/s)",
//!              "TYPE": "SAMPle", "DEPMEM": "4K"},
//!   "CHANNEL": [
//!     {"NAME": "CH1", "DISPLAY": "ON", "COUPLING": "DC", "PROBE": "10X",
//!      "SCALE": "200mV", "OFFSET": 50, "FREQUENCE": 1000.0}
//!   ],
//!   "DATATYPE": "SCREEN", "RUNSTATUS": "TRIG", "IDN": "OWON,HDS272S,...",
//!   "TRIG": {"Mode": "SINGle", "Type": "EDGE", "Items": {"Channel": "CH1"}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::commands::Channel;
use crate::error::{Result, ScpiError};
use crate::scales::{self, parse_probe_multiplier};
use crate::units::{self, UnitClass};

/// Raw offset units per vertical division.
pub const OFFSET_UNITS_PER_DIVISION: f64 = 25.0;

/// Time base at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timebase {
    /// Seconds per division tag (`1.0ms`).
    pub scale: String,
    /// Horizontal offset in divisions.
    pub horizontal_offset: f64,
}

impl Timebase {
    /// Seconds per division.
    pub fn scale_seconds(&self) -> Result<f64> {
        units::parse_with_unit(&self.scale, UnitClass::Second)
    }

    /// Horizontal offset in seconds.
    pub fn horizontal_offset_seconds(&self) -> Result<f64> {
        scales::horizontal_offset_seconds(&self.scale, self.horizontal_offset)
    }
}

/// Acquisition settings at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInfo {
    /// Samples across the full screen.
    pub full_screen: u64,
    /// Samples in the returned data.
    pub data_len: u64,
    /// Sample rate as reported (`(100MS/s)`).
    pub sample_rate: String,
    /// Acquisition type (`SAMPle`, `PEAK`).
    pub acquisition_type: String,
    /// Memory depth (`4K`).
    pub memory_depth: String,
}

/// One channel's settings at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelHeader {
    /// Channel name (`CH1`).
    pub name: String,
    /// Whether the trace is shown.
    pub display: bool,
    /// Input coupling (`DC`).
    pub coupling: String,
    /// Probe field as reported (`10X`).
    pub probe: String,
    /// Scale tag as stored in the header, before probe attenuation (`200mV`).
    pub scale: String,
    /// Vertical offset in raw sample units.
    pub offset: i64,
    /// Measured signal frequency, when the instrument reports one.
    pub frequency: Option<f64>,
}

impl ChannelHeader {
    /// Probe multiplication factor (`10X` -> 10.0).
    pub fn probe_multiplier(&self) -> Result<f64> {
        parse_probe_multiplier(&self.probe)
    }

    /// Header scale in volts per division, without probe attenuation.
    pub fn scale_volts(&self) -> Result<f64> {
        units::parse_with_unit(&self.scale, UnitClass::Volt)
            .map_err(|_| ScpiError::decode(format!("invalid channel scale '{}'", self.scale)))
    }

    /// User-facing scale: header scale multiplied by probe attenuation.
    ///
    /// This is what `:CHn:SCALE?` reports; it differs from [`scale_volts`]
    /// for every probe other than 1X.
    ///
    /// [`scale_volts`]: ChannelHeader::scale_volts
    pub fn display_scale_volts(&self) -> Result<f64> {
        Ok(self.scale_volts()? * self.probe_multiplier()?)
    }

    /// Vertical offset in divisions.
    pub fn offset_divisions(&self) -> f64 {
        self.offset as f64 / OFFSET_UNITS_PER_DIVISION
    }

    /// User-facing vertical offset in volts.
    pub fn offset_volts(&self) -> Result<f64> {
        Ok(self.offset_divisions() * self.display_scale_volts()?)
    }

    /// Whether this entry describes the given channel.
    pub fn is_channel(&self, channel: Channel) -> bool {
        self.name.eq_ignore_ascii_case(channel.keyword())
    }
}

/// Trigger settings at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Trigger mode (`SINGle`), if reported.
    pub mode: Option<String>,
    /// Trigger type (`EDGE`), if reported.
    pub kind: Option<String>,
    /// The whole trigger object, kept as reported.
    pub raw: Value,
}

/// Snapshot of capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformHeader {
    /// Time base.
    pub timebase: Timebase,
    /// Acquisition settings.
    pub sample: SampleInfo,
    /// Per-channel settings, in the order reported.
    pub channels: Vec<ChannelHeader>,
    /// Data type (`SCREEN`).
    pub data_type: String,
    /// Run status (`TRIG`, `STOP`).
    pub run_status: String,
    /// Identification of the capturing instrument.
    pub model_id: String,
    /// Trigger settings.
    pub trigger: TriggerSettings,
}

impl WaveformHeader {
    /// Parse a header JSON document.
    pub fn parse(json: &[u8]) -> Result<WaveformHeader> {
        let root: Value = serde_json::from_slice(json)
            .map_err(|e| ScpiError::header("$", format!("invalid JSON: {}", e)))?;
        let root = Node::root(&root);

        let timebase = root.field("TIMEBASE")?;
        let sample = root.field("SAMPLE")?;
        let channels = root
            .field("CHANNEL")?
            .array()?
            .into_iter()
            .map(|node| parse_channel(&node))
            .collect::<Result<Vec<_>>>()?;
        let trigger = root.field("TRIG")?;
        trigger.object()?;

        Ok(WaveformHeader {
            timebase: Timebase {
                scale: timebase.field("SCALE")?.string()?,
                horizontal_offset: timebase.field("HOFFSET")?.number()?,
            },
            sample: SampleInfo {
                full_screen: sample.field("FULLSCREEN")?.unsigned()?,
                data_len: sample.field("DATALEN")?.unsigned()?,
                sample_rate: sample.field("SAMPLERATE")?.string()?,
                acquisition_type: sample.field("TYPE")?.string()?,
                memory_depth: sample.field("DEPMEM")?.string()?,
            },
            channels,
            data_type: root.field("DATATYPE")?.string()?,
            run_status: root.field("RUNSTATUS")?.string()?,
            model_id: root.field_any(&["IDN", "MODEL"])?.string()?,
            trigger: TriggerSettings {
                mode: trigger.optional("MODE").map(|n| n.string()).transpose()?,
                kind: trigger.optional("TYPE").map(|n| n.string()).transpose()?,
                raw: trigger.value.clone(),
            },
        })
    }

    /// Metadata for one channel; missing metadata is a decode error.
    pub fn channel(&self, channel: Channel) -> Result<&ChannelHeader> {
        self.channels
            .iter()
            .find(|c| c.is_channel(channel))
            .ok_or_else(|| {
                ScpiError::decode(format!("header has no metadata for {}", channel))
            })
    }
}

fn parse_channel(node: &Node<'_>) -> Result<ChannelHeader> {
    let display = node.field("DISPLAY")?;
    let display = match display.value {
        Value::Bool(b) => *b,
        Value::String(s) if s.eq_ignore_ascii_case("ON") => true,
        Value::String(s) if s.eq_ignore_ascii_case("OFF") => false,
        _ => return Err(display.invalid("expected ON or OFF")),
    };

    let frequency = node.field_any(&["FREQUENCE", "FREQUENCY"])?;
    let frequency = match frequency.value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => units::parse_with_unit(s, UnitClass::Hertz).ok(),
        Value::Null => None,
        _ => return Err(frequency.invalid("expected a frequency")),
    };

    Ok(ChannelHeader {
        name: node.field("NAME")?.string()?,
        display,
        coupling: node.field("COUPLING")?.string()?,
        probe: node.field("PROBE")?.string()?,
        scale: node.field("SCALE")?.string()?,
        offset: node.field("OFFSET")?.integer()?,
        frequency,
    })
}

/// A JSON value together with its path from the root.
struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    fn root(value: &'a Value) -> Self {
        Node {
            value,
            path: String::new(),
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn invalid(&self, reason: &str) -> ScpiError {
        ScpiError::header(self.path.clone(), reason)
    }

    fn object(&self) -> Result<&'a Map<String, Value>> {
        self.value
            .as_object()
            .ok_or_else(|| self.invalid("expected an object"))
    }

    fn optional(&self, key: &str) -> Option<Node<'a>> {
        let map = self.value.as_object()?;
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, value)| Node {
                value,
                path: self.child_path(key),
            })
    }

    fn field(&self, key: &str) -> Result<Node<'a>> {
        self.object()?;
        self.optional(key)
            .ok_or_else(|| ScpiError::header(self.child_path(key), "missing field"))
    }

    /// First present key out of several spellings.
    fn field_any(&self, keys: &[&str]) -> Result<Node<'a>> {
        self.object()?;
        keys.iter()
            .find_map(|key| self.optional(key))
            .ok_or_else(|| ScpiError::header(self.child_path(keys[0]), "missing field"))
    }

    fn array(&self) -> Result<Vec<Node<'a>>> {
        let items = self
            .value
            .as_array()
            .ok_or_else(|| self.invalid("expected an array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{}]", self.path, i),
            })
            .collect())
    }

    fn string(&self) -> Result<String> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid("expected a string")),
        }
    }

    fn number(&self) -> Result<f64> {
        match self.value {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.invalid("expected a number")),
            Value::String(s) => s.trim().parse().map_err(|_| self.invalid("expected a number")),
            _ => Err(self.invalid("expected a number")),
        }
    }

    fn integer(&self) -> Result<i64> {
        match self.value {
            Value::Number(n) => n.as_i64().ok_or_else(|| self.invalid("expected an integer")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid("expected an integer")),
            _ => Err(self.invalid("expected an integer")),
        }
    }

    fn unsigned(&self) -> Result<u64> {
        let value = self.integer()?;
        u64::try_from(value).map_err(|_| self.invalid("expected a non-negative integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EXAMPLE: &str = r#"{
        "TIMEBASE": {"SCALE": "1.0ms", "HOFFSET": 2},
        "SAMPLE": {"FULLSCREEN": 600, "SLOWMOVE": -1, "DATALEN": 600,
                   "SAMPLERATE": "(100MS/s)", "TYPE": "SAMPle", "DEPMEM": "4K"},
        "CHANNEL": [
            {"NAME": "CH1", "DISPLAY": "ON", "Current_Ratio": 1.0, "COUPLING": "DC",
             "PROBE": "10X", "SCALE": "200mV", "OFFSET": 50, "FREQUENCE": 1000.0},
            {"NAME": "CH2", "DISPLAY": "OFF", "COUPLING": "AC",
             "PROBE": "1X", "SCALE": "1.0V", "OFFSET": -82, "FREQUENCE": "?"}
        ],
        "DATATYPE": "SCREEN",
        "RUNSTATUS": "TRIG",
        "IDN": "OWON,HDS272S,2220112,V1.4.0",
        "Trig": {"Mode": "SINGle", "Type": "EDGE",
                 "Items": {"Channel": "CH1", "Level": "0.00mV", "Edge": "RISE"}}
    }"#;

    fn without(path: &[&str]) -> Vec<u8> {
        let mut value: Value = serde_json::from_str(EXAMPLE).unwrap();
        let (last, parents) = path.split_last().unwrap();
        let mut node = &mut value;
        for key in parents {
            node = match key.parse::<usize>() {
                Ok(i) => &mut node[i],
                Err(_) => &mut node[*key],
            };
        }
        node.as_object_mut().unwrap().remove(*last);
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_parse_example_header() {
        let header = WaveformHeader::parse(EXAMPLE.as_bytes()).expect("should parse header");

        let ch1 = header.channel(Channel::Ch1).unwrap();
        assert_eq!(ch1.scale, "200mV");
        assert_eq!(ch1.probe, "10X");
        assert_eq!(ch1.offset, 50);
        assert!(ch1.display);
        assert_eq!(ch1.frequency, Some(1000.0));

        let ch2 = header.channel(Channel::Ch2).unwrap();
        assert_eq!(ch2.offset, -82);
        assert!(!ch2.display);
        assert_eq!(ch2.frequency, None);

        assert_eq!(header.timebase.scale, "1.0ms");
        assert_eq!(header.sample.data_len, 600);
        assert_eq!(header.sample.memory_depth, "4K");
        assert_eq!(header.run_status, "TRIG");
        assert_eq!(header.model_id, "OWON,HDS272S,2220112,V1.4.0");
        assert_eq!(header.trigger.mode.as_deref(), Some("SINGle"));
        assert_eq!(header.trigger.kind.as_deref(), Some("EDGE"));
    }

    #[test]
    fn test_user_facing_scale_is_not_head_scale() {
        let header = WaveformHeader::parse(EXAMPLE.as_bytes()).unwrap();
        let ch1 = header.channel(Channel::Ch1).unwrap();
        assert_eq!(ch1.scale_volts().unwrap(), 0.2);
        assert_relative_eq!(ch1.display_scale_volts().unwrap(), 2.0);
        assert_relative_eq!(ch1.offset_volts().unwrap(), 4.0);

        let ch2 = header.channel(Channel::Ch2).unwrap();
        assert_eq!(ch2.display_scale_volts().unwrap(), ch2.scale_volts().unwrap());
    }

    #[test]
    fn test_horizontal_offset_seconds() {
        let header = WaveformHeader::parse(EXAMPLE.as_bytes()).unwrap();
        assert_relative_eq!(header.timebase.horizontal_offset_seconds().unwrap(), 0.002);
    }

    #[test]
    fn test_missing_field_names_path() {
        let err = WaveformHeader::parse(&without(&["CHANNEL", "1", "OFFSET"])).unwrap_err();
        match err {
            ScpiError::MalformedHeaderJson { path, .. } => assert_eq!(path, "CHANNEL[1].OFFSET"),
            other => panic!("unexpected {other:?}"),
        }

        let err = WaveformHeader::parse(&without(&["TIMEBASE", "SCALE"])).unwrap_err();
        match err {
            ScpiError::MalformedHeaderJson { path, .. } => assert_eq!(path, "TIMEBASE.SCALE"),
            other => panic!("unexpected {other:?}"),
        }

        let err = WaveformHeader::parse(&without(&["RUNSTATUS"])).unwrap_err();
        assert!(err.to_string().contains("RUNSTATUS"));
    }

    #[test]
    fn test_wrong_types_and_bad_json() {
        let bad = EXAMPLE.replace("\"OFFSET\": 50", "\"OFFSET\": \"fifty\"");
        let err = WaveformHeader::parse(bad.as_bytes()).unwrap_err();
        match err {
            ScpiError::MalformedHeaderJson { path, .. } => assert_eq!(path, "CHANNEL[0].OFFSET"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            WaveformHeader::parse(b"{not json"),
            Err(ScpiError::MalformedHeaderJson { .. })
        ));
        assert!(matches!(
            WaveformHeader::parse(b"[]"),
            Err(ScpiError::MalformedHeaderJson { .. })
        ));
    }

    #[test]
    fn test_missing_channel_is_decode_error() {
        let mut value: Value = serde_json::from_str(EXAMPLE).unwrap();
        value["CHANNEL"].as_array_mut().unwrap().truncate(1);
        let header = WaveformHeader::parse(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(matches!(header.channel(Channel::Ch2), Err(ScpiError::Decode(_))));
    }
}
