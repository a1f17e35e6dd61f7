//! Screen captures of both channels.

use owon_scpi::{Channel, WaveformFrame, WaveformHeader};
use serde::Serialize;

use crate::error::{HdsError, Result};

/// One channel of a capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelCapture {
    /// Channel the data belongs to.
    pub channel: Channel,
    /// Whether the trace was shown when captured.
    pub displayed: bool,
    /// Raw screen samples.
    pub raw: Vec<i8>,
    /// Calibrated samples in volts.
    pub voltages: Vec<f64>,
}

impl ChannelCapture {
    pub(crate) fn from_frame(frame: &WaveformFrame, header: &WaveformHeader) -> Result<Self> {
        let displayed = header.channel(frame.channel)?.display;
        Ok(ChannelCapture {
            channel: frame.channel,
            displayed,
            raw: frame.samples().collect(),
            voltages: frame.voltages(header)?,
        })
    }
}

/// A header and the sample data of both channels, fetched together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capture {
    /// Settings in effect for this capture.
    pub header: WaveformHeader,
    /// Per-channel data, `CH1` first.
    pub channels: Vec<ChannelCapture>,
}

impl Capture {
    /// Data for one channel.
    pub fn channel(&self, channel: Channel) -> Result<&ChannelCapture> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .ok_or_else(|| HdsError::NoData(channel.to_string()))
    }

    /// Channels whose trace was shown.
    pub fn displayed(&self) -> impl Iterator<Item = &ChannelCapture> {
        self.channels.iter().filter(|c| c.displayed)
    }
}
