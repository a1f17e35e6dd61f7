//! Raw samples to calibrated voltages.
//!
//! ```text
//! voltage[i] = ((raw[i] - offset) / 100.0) * 4.0 * probe * scale
//! ```
//!
//! `offset` and `scale` are the header values of the channel (not the
//! user-facing ones), `probe` is the numeric probe factor.
//!
//! How the sample bytes map to raw values is not settled for every firmware,
//! so the mapping is a [`SampleUnpacker`] strategy that can be swapped without
//! touching the conversion.

use serde::{Deserialize, Serialize};

use crate::commands::Channel;
use crate::error::{Result, ScpiError};
use crate::header::{ChannelHeader, WaveformHeader};

/// Turns payload bytes into raw sample values.
pub trait SampleUnpacker {
    /// Unpack the payload into raw values.
    fn unpack(&self, bytes: &[u8]) -> Result<Vec<f64>>;
}

/// One signed 8-bit value per byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedBytes;

impl SampleUnpacker for SignedBytes {
    fn unpack(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        Ok(bytes.iter().map(|&b| b as i8 as f64).collect())
    }
}

/// Signed 8-bit values averaged in consecutive pairs.
///
/// A trailing unpaired byte is kept as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairAveraged;

impl SampleUnpacker for PairAveraged {
    fn unpack(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        Ok(bytes
            .chunks(2)
            .map(|pair| {
                let sum: f64 = pair.iter().map(|&b| b as i8 as f64).sum();
                sum / pair.len() as f64
            })
            .collect())
    }
}

/// Signed 16-bit little-endian values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LittleEndian16;

impl SampleUnpacker for LittleEndian16 {
    fn unpack(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        if bytes.len() % 2 != 0 {
            return Err(ScpiError::decode(format!(
                "odd payload length {} for 16-bit samples",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f64)
            .collect())
    }
}

/// Selects an unpacking strategy by name, e.g. from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// [`SignedBytes`]
    #[default]
    SignedBytes,
    /// [`PairAveraged`]
    PairAveraged,
    /// [`LittleEndian16`]
    LittleEndian16,
}

impl SampleUnpacker for SampleFormat {
    fn unpack(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        match self {
            SampleFormat::SignedBytes => SignedBytes.unpack(bytes),
            SampleFormat::PairAveraged => PairAveraged.unpack(bytes),
            SampleFormat::LittleEndian16 => LittleEndian16.unpack(bytes),
        }
    }
}

/// Calibration inputs taken from one channel's header entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Vertical offset in raw units.
    pub offset: f64,
    /// Probe factor.
    pub probe: f64,
    /// Header scale in volts per division.
    pub scale: f64,
}

impl Calibration {
    /// Extract calibration from a channel header.
    pub fn from_header(channel: &ChannelHeader) -> Result<Calibration> {
        Ok(Calibration {
            offset: channel.offset as f64,
            probe: channel.probe_multiplier()?,
            scale: channel.scale_volts()?,
        })
    }

    /// Convert one raw value.
    pub fn voltage(&self, raw: f64) -> f64 {
        ((raw - self.offset) / 100.0) * 4.0 * self.probe * self.scale
    }
}

/// Converts payload bytes to voltages with a given unpacking strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveformDecoder<U = SignedBytes> {
    unpacker: U,
}

impl WaveformDecoder<SignedBytes> {
    /// Decoder for signed 8-bit samples.
    pub fn new() -> Self {
        WaveformDecoder {
            unpacker: SignedBytes,
        }
    }
}

impl<U: SampleUnpacker> WaveformDecoder<U> {
    /// Decoder with a custom unpacking strategy.
    pub fn with_unpacker(unpacker: U) -> Self {
        WaveformDecoder { unpacker }
    }

    /// The unpacking strategy in use.
    pub fn unpacker(&self) -> &U {
        &self.unpacker
    }

    /// Convert payload bytes to voltages using one channel's metadata.
    pub fn decode(&self, raw: &[u8], channel: &ChannelHeader) -> Result<Vec<f64>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let calibration = Calibration::from_header(channel)?;
        Ok(self
            .unpacker
            .unpack(raw)?
            .into_iter()
            .map(|value| calibration.voltage(value))
            .collect())
    }

    /// Convert a captured frame using the header fetched with it.
    pub fn decode_frame(&self, frame: &WaveformFrame, header: &WaveformHeader) -> Result<Vec<f64>> {
        self.decode(&frame.raw, header.channel(frame.channel)?)
    }
}

/// Convert signed 8-bit samples to voltages.
pub fn decode_voltages(raw: &[u8], channel: &ChannelHeader) -> Result<Vec<f64>> {
    WaveformDecoder::new().decode(raw, channel)
}

/// Raw sample bytes of one channel.
///
/// Voltages are derived on demand from a header, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformFrame {
    /// Channel the samples belong to.
    pub channel: Channel,
    /// Payload bytes as received.
    pub raw: Vec<u8>,
}

impl WaveformFrame {
    /// Create a frame.
    pub fn new(channel: Channel, raw: Vec<u8>) -> Self {
        WaveformFrame { channel, raw }
    }

    /// Samples as signed 8-bit values.
    pub fn samples(&self) -> impl Iterator<Item = i8> + '_ {
        self.raw.iter().map(|&b| b as i8)
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the frame has no samples.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Voltages, using this frame's channel entry in `header`.
    pub fn voltages(&self, header: &WaveformHeader) -> Result<Vec<f64>> {
        WaveformDecoder::new().decode_frame(self, header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn channel(probe: &str, scale: &str, offset: i64) -> ChannelHeader {
        ChannelHeader {
            name: "CH1".into(),
            display: true,
            coupling: "DC".into(),
            probe: probe.into(),
            scale: scale.into(),
            offset,
            frequency: None,
        }
    }

    #[test]
    fn test_voltage_is_exact() {
        let ch = channel("10X", "200mV", 50);
        let volts = decode_voltages(&[90], &ch).unwrap();
        assert_eq!(volts, vec![3.2]);
    }

    #[test]
    fn test_signed_interpretation() {
        let ch = channel("1X", "1.0V", 0);
        let volts = decode_voltages(&[0x00, 0x19, 0xE7, 0x80, 0x7F], &ch).unwrap();
        assert_relative_eq!(volts[0], 0.0);
        assert_relative_eq!(volts[1], 1.0);
        assert_relative_eq!(volts[2], -1.0);
        assert_relative_eq!(volts[3], -5.12);
        assert_relative_eq!(volts[4], 5.08);
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let ch = channel("10X", "200mV", 50);
        assert!(decode_voltages(&[], &ch).unwrap().is_empty());
        // Empty input never looks at the metadata.
        let broken = channel("??", "nope", 0);
        assert!(decode_voltages(&[], &broken).unwrap().is_empty());
    }

    #[test]
    fn test_bad_metadata_is_decode_error() {
        let ch = channel("10V", "200mV", 0);
        assert!(matches!(decode_voltages(&[1], &ch), Err(ScpiError::Decode(_))));
        let ch = channel("10X", "200ms", 0);
        assert!(matches!(decode_voltages(&[1], &ch), Err(ScpiError::Decode(_))));
    }

    #[test]
    fn test_unpacker_strategies() {
        let bytes = [10u8, 20, 0xFF, 0xFF, 7];
        assert_eq!(SignedBytes.unpack(&bytes).unwrap(), vec![10.0, 20.0, -1.0, -1.0, 7.0]);
        assert_eq!(PairAveraged.unpack(&bytes).unwrap(), vec![15.0, -1.0, 7.0]);
        assert!(matches!(
            LittleEndian16.unpack(&bytes),
            Err(ScpiError::Decode(_))
        ));
        assert_eq!(
            LittleEndian16.unpack(&[0x10, 0x00, 0xFE, 0xFF]).unwrap(),
            vec![16.0, -2.0]
        );
        assert_eq!(
            SampleFormat::PairAveraged.unpack(&bytes).unwrap(),
            PairAveraged.unpack(&bytes).unwrap()
        );
    }

    #[test]
    fn test_decoder_with_custom_unpacker() {
        let ch = channel("1X", "1.0V", 0);
        let decoder = WaveformDecoder::with_unpacker(PairAveraged);
        let volts = decoder.decode(&[25, 75], &ch).unwrap();
        assert_eq!(volts.len(), 1);
        assert_relative_eq!(volts[0], 2.0);
    }

    #[test]
    fn test_frame_voltages_use_its_channel() {
        let json = br#"{
            "TIMEBASE": {"SCALE": "1.0ms", "HOFFSET": 0},
            "SAMPLE": {"FULLSCREEN": 600, "DATALEN": 2, "SAMPLERATE": "(1MS/s)",
                       "TYPE": "SAMPle", "DEPMEM": "4K"},
            "CHANNEL": [
                {"NAME": "CH1", "DISPLAY": "ON", "COUPLING": "DC", "PROBE": "1X",
                 "SCALE": "1.0V", "OFFSET": 0, "FREQUENCE": 0},
                {"NAME": "CH2", "DISPLAY": "ON", "COUPLING": "DC", "PROBE": "10X",
                 "SCALE": "200mV", "OFFSET": 50, "FREQUENCE": 0}
            ],
            "DATATYPE": "SCREEN", "RUNSTATUS": "STOP", "IDN": "OWON,HDS272S,1,V1",
            "TRIG": {}
        }"#;
        let header = WaveformHeader::parse(json).unwrap();
        let frame = WaveformFrame::new(Channel::Ch2, vec![90, 50]);
        assert_eq!(frame.voltages(&header).unwrap(), vec![3.2, 0.0]);
        assert_eq!(frame.samples().collect::<Vec<_>>(), vec![90, 50]);
    }
}
