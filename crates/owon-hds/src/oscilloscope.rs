//! Oscilloscope interface for the HDS200 series.
//!
//! Every getter queries the instrument; nothing is cached between calls, so a
//! setting changed on the front panel is always seen.

use owon_scpi::{
    Channel, CodecContext, DeviceIdentification, DeviceSession, ParameterValue, ProbeAttenuation,
    SessionConfig, Transport, WaveformHeader, WaveformFrame,
};
use tracing::{debug, trace, warn};

use crate::capture::{Capture, ChannelCapture};
use crate::error::{HdsError, Result};

/// Typed access to the oscilloscope functions of an HDS200 instrument.
pub struct Oscilloscope<T: Transport> {
    session: DeviceSession<T>,
    model: String,
}

impl<T: Transport> Oscilloscope<T> {
    /// Wrap a session without identifying the instrument.
    pub fn new(session: DeviceSession<T>) -> Self {
        Oscilloscope {
            session,
            model: "unidentified".to_string(),
        }
    }

    /// Identify the instrument on `transport` and refuse anything that is not
    /// an HDS200 series oscilloscope.
    pub fn open(transport: T, config: SessionConfig) -> Result<Self> {
        let mut scope = Oscilloscope::new(DeviceSession::with_config(transport, config));
        let idn = scope.identify()?;
        if !idn.is_hds200() {
            warn!("Oscilloscope[{}]: not an HDS200 series instrument", idn.model);
            return Err(HdsError::Unsupported(idn.to_string()));
        }
        Ok(scope)
    }

    /// Model name from the last identification.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Borrow the underlying session.
    pub fn session(&self) -> &DeviceSession<T> {
        &self.session
    }

    /// Mutably borrow the underlying session, e.g. for commands without a
    /// typed wrapper.
    pub fn session_mut(&mut self) -> &mut DeviceSession<T> {
        &mut self.session
    }

    /// Release the session.
    pub fn into_inner(self) -> DeviceSession<T> {
        self.session
    }

    /// Query the instrument identity.
    pub fn identify(&mut self) -> Result<DeviceIdentification> {
        let idn = self.session.identify()?;
        debug!("Oscilloscope[{}]: identified as {}", idn.model, idn);
        self.model = idn.model.clone();
        Ok(idn)
    }

    // ========================================================================
    // Horizontal
    // ========================================================================

    /// Horizontal scale tag (time per division, e.g. `1.0ms`).
    pub fn horizontal_scale(&mut self) -> Result<String> {
        self.query_tag(":HORIZONTAL:SCALE", "horizontal scale")
    }

    /// Set the horizontal scale; `tag` must be one of the time base values.
    pub fn set_horizontal_scale(&mut self, tag: &str) -> Result<()> {
        self.set(":HORIZONTAL:SCALE", ParameterValue::tag(tag))
    }

    /// Horizontal offset in divisions.
    ///
    /// The instrument may answer with a fractional value, so the reply is read
    /// as a float rather than through the integer setting type.
    pub fn horizontal_offset(&mut self) -> Result<f64> {
        let text = self.query_text(":HORIZONTAL:OFFSET", "horizontal offset")?;
        text.parse::<f64>()
            .map_err(|_| HdsError::unexpected("horizontal offset", text))
    }

    /// Set the horizontal offset in divisions.
    pub fn set_horizontal_offset(&mut self, divisions: i64) -> Result<()> {
        self.set(":HORIZONTAL:OFFSET", ParameterValue::Integer(divisions))
    }

    /// Horizontal offset converted to seconds with the current scale.
    pub fn horizontal_offset_seconds(&mut self) -> Result<f64> {
        let scale = self.horizontal_scale()?;
        let offset = self.horizontal_offset()?;
        Ok(owon_scpi::horizontal_offset_seconds(&scale, offset)?)
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Input coupling (`AC`, `DC` or `GND`).
    pub fn coupling(&mut self, channel: Channel) -> Result<String> {
        self.query_tag(&channel_path(channel, "COUPLING"), "coupling")
    }

    /// Set the input coupling.
    pub fn set_coupling(&mut self, channel: Channel, coupling: &str) -> Result<()> {
        self.set(&channel_path(channel, "COUPLING"), ParameterValue::tag(coupling))
    }

    /// Probe attenuation.
    pub fn probe_attenuation(&mut self, channel: Channel) -> Result<ProbeAttenuation> {
        let text = self.query_text(&channel_path(channel, "PROBE"), "probe attenuation")?;
        Ok(ProbeAttenuation::parse(&text)?)
    }

    /// Set the probe attenuation.
    ///
    /// This changes which vertical scales the channel accepts.
    pub fn set_probe_attenuation(&mut self, channel: Channel, probe: ProbeAttenuation) -> Result<()> {
        self.set(&channel_path(channel, "PROBE"), ParameterValue::from(probe))
    }

    /// Vertical scale tag, including probe attenuation (e.g. `2.0V` for a
    /// 10X probe at 200mV).
    pub fn vertical_scale(&mut self, channel: Channel) -> Result<String> {
        self.query_text(&channel_path(channel, "SCALE"), "vertical scale")
    }

    /// Set the vertical scale.
    ///
    /// The probe attenuation is read from the instrument first and the tag is
    /// checked against the scales valid for it.
    pub fn set_vertical_scale(&mut self, channel: Channel, tag: &str) -> Result<()> {
        self.set(&channel_path(channel, "SCALE"), ParameterValue::tag(tag))
    }

    /// Vertical scales valid for the channel's current probe.
    pub fn vertical_scales(&mut self, channel: Channel) -> Result<&'static [&'static str]> {
        Ok(self.probe_attenuation(channel)?.vertical_scales())
    }

    /// Vertical offset in raw units.
    pub fn vertical_offset(&mut self, channel: Channel) -> Result<i64> {
        let path = channel_path(channel, "OFFSET");
        let value = self.session.query_value(&path, &CodecContext::default())?;
        value
            .as_i64()
            .ok_or_else(|| HdsError::unexpected("vertical offset", value.to_string()))
    }

    /// Set the vertical offset in raw units.
    pub fn set_vertical_offset(&mut self, channel: Channel, offset: i64) -> Result<()> {
        self.set(&channel_path(channel, "OFFSET"), ParameterValue::Integer(offset))
    }

    /// Whether the channel trace is shown.
    pub fn display(&mut self, channel: Channel) -> Result<bool> {
        let path = channel_path(channel, "DISPLAY");
        let value = self.session.query_value(&path, &CodecContext::default())?;
        value
            .as_bool()
            .ok_or_else(|| HdsError::unexpected("display", value.to_string()))
    }

    /// Show or hide the channel trace.
    pub fn set_display(&mut self, channel: Channel, on: bool) -> Result<()> {
        self.set(&channel_path(channel, "DISPLAY"), ParameterValue::Bool(on))
    }

    // ========================================================================
    // Screen data
    // ========================================================================

    /// Header describing the current screen data.
    pub fn screen_header(&mut self) -> Result<WaveformHeader> {
        let header = self.session.fetch_header()?;
        trace!(
            "Oscilloscope[{}]: header {} samples, run status {}",
            self.model,
            header.sample.data_len,
            header.run_status
        );
        Ok(header)
    }

    /// Raw screen samples of one channel, in screen units.
    ///
    /// The HDS200 series returns 600 signed 8-bit values per channel.
    pub fn screen_values(&mut self, channel: Channel) -> Result<Vec<i8>> {
        let frame = self.screen_frame(channel)?;
        Ok(frame.samples().collect())
    }

    /// Screen samples of one channel in volts.
    ///
    /// The header is fetched with the data, never reused from an earlier call.
    pub fn voltages(&mut self, channel: Channel) -> Result<Vec<f64>> {
        let header = self.screen_header()?;
        let frame = self.screen_frame(channel)?;
        Ok(frame.voltages(&header)?)
    }

    /// Header and data of both channels.
    pub fn capture(&mut self) -> Result<Capture> {
        let header = self.screen_header()?;
        let mut channels = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            let frame = self.screen_frame(channel)?;
            channels.push(ChannelCapture::from_frame(&frame, &header)?);
        }
        debug!(
            "Oscilloscope[{}]: captured {} channels",
            self.model,
            channels.len()
        );
        Ok(Capture { header, channels })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn screen_frame(&mut self, channel: Channel) -> Result<WaveformFrame> {
        let frame = self.session.fetch_frame(channel)?;
        if frame.is_empty() {
            return Err(HdsError::NoData(format!("{} screen data", channel)));
        }
        Ok(frame)
    }

    fn query_text(&mut self, path: &str, what: &str) -> Result<String> {
        let text = self.session.issue_query(path)?;
        trace!("Oscilloscope[{}]: {} = {}", self.model, what, text);
        if text.is_empty() {
            return Err(HdsError::NoData(what.to_string()));
        }
        Ok(text)
    }

    fn query_tag(&mut self, path: &str, what: &str) -> Result<String> {
        let value = self.session.query_value(path, &CodecContext::default())?;
        match value.as_tag() {
            Some(tag) => Ok(tag.to_string()),
            None => Err(HdsError::unexpected(what, value.to_string())),
        }
    }

    fn set(&mut self, path: &str, value: ParameterValue) -> Result<()> {
        debug!("Oscilloscope[{}]: {} {}", self.model, path, value);
        self.session.issue_command(path, Some(&value))?;
        Ok(())
    }
}

fn channel_path(channel: Channel, tail: &str) -> String {
    format!(":{}:{}", channel.keyword(), tail)
}
