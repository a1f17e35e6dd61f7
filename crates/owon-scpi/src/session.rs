//! Device session: one transport, one exchange at a time.
//!
//! The protocol is half-duplex and replies carry no request identifier, so
//! every public operation runs a complete exchange (write, then read the whole
//! reply) before returning. A session never caches instrument settings;
//! anything that depends on live state is queried when it is needed.

use bytes::Bytes;
use log::{debug, trace, warn};

use crate::commands::{Channel, CommandDescriptor, CommandRegistry, ReplyKind};
use crate::config::SessionConfig;
use crate::error::{Result, ScpiError};
use crate::frame::ExchangeState;
use crate::header::WaveformHeader;
use crate::identity::DeviceIdentification;
use crate::params::{self, CodecContext, ParameterValue};
use crate::response::ReplyReader;
use crate::scales::ProbeAttenuation;
use crate::transport::Transport;
use crate::waveform::{SampleUnpacker, WaveformDecoder, WaveformFrame};

/// Path of the capture header query.
pub const HEADER_QUERY: &str = ":DATA:WAVE:SCREEN:HEAD";

/// A command/response session over one transport.
pub struct DeviceSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    registry: &'static CommandRegistry,
    state: ExchangeState,
}

impl<T: Transport> DeviceSession<T> {
    /// Create a session with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with the given configuration.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        DeviceSession {
            transport,
            config,
            registry: CommandRegistry::standard(),
            state: ExchangeState::Idle,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The command table used for resolution.
    pub fn registry(&self) -> &'static CommandRegistry {
        self.registry
    }

    /// Current exchange state; `Idle` between operations.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Send a setting or action.
    ///
    /// When the allowed values depend on the channel's probe attenuation, the
    /// probe is queried first. Use [`issue_command_with`] to supply it.
    ///
    /// [`issue_command_with`]: DeviceSession::issue_command_with
    pub fn issue_command(&mut self, path: &str, value: Option<&ParameterValue>) -> Result<()> {
        let registry = self.registry;
        let descriptor = registry.resolve(path)?;
        // Everything that can be checked without the instrument is checked
        // before the probe lookup sends anything.
        let mut line = descriptor.setting_line(value, &CodecContext::default())?;
        if descriptor.depends_on_probe() {
            let channel = descriptor
                .channel
                .ok_or_else(|| ScpiError::NotSettable(descriptor.wire_path()))?;
            let probe = self.probe_attenuation(channel)?;
            line = descriptor.setting_line(value, &CodecContext::with_probe(probe))?;
        }
        self.send_setting(&line)
    }

    /// Send a setting or action, validating against an explicit context.
    pub fn issue_command_with(
        &mut self,
        path: &str,
        value: Option<&ParameterValue>,
        context: &CodecContext,
    ) -> Result<()> {
        let descriptor = self.registry.resolve(path)?;
        let line = descriptor.setting_line(value, context)?;
        self.send_setting(&line)
    }

    /// Send a query and return its text reply, trailing whitespace trimmed.
    pub fn issue_query(&mut self, path: &str) -> Result<String> {
        let descriptor = self.registry.resolve(path)?;
        let line = descriptor.query_line()?;
        expect_reply(descriptor, ReplyKind::Text)?;
        self.exchange(&line, |reader| reader.read_text())
    }

    /// Send a query and decode its reply with the command's parameter type.
    pub fn query_value(&mut self, path: &str, context: &CodecContext) -> Result<ParameterValue> {
        let registry = self.registry;
        let descriptor = registry.resolve(path)?;
        let text = self.issue_query(path)?;
        params::decode(&descriptor.parameter, context, &text)
    }

    /// Send a query whose reply is a length-prefixed frame; returns the payload.
    pub fn issue_binary_query(&mut self, path: &str) -> Result<Bytes> {
        let descriptor = self.registry.resolve(path)?;
        let line = descriptor.query_line()?;
        if !descriptor.reply.is_framed() {
            return Err(ScpiError::ReplyKindMismatch {
                path: descriptor.wire_path(),
                requested: ReplyKind::Binary.name(),
                actual: descriptor.reply.name(),
            });
        }
        self.exchange(&line, |reader| reader.read_frame())
    }

    /// Fetch and parse the capture header.
    pub fn fetch_header(&mut self) -> Result<WaveformHeader> {
        let payload = self.issue_binary_query(HEADER_QUERY)?;
        WaveformHeader::parse(&payload)
    }

    /// Fetch one channel's raw screen samples.
    pub fn fetch_frame(&mut self, channel: Channel) -> Result<WaveformFrame> {
        let payload = self.issue_binary_query(&format!(":DATA:WAVE:SCREEN:{}", channel))?;
        Ok(WaveformFrame::new(channel, payload.to_vec()))
    }

    /// Fetch the header and one channel's samples, and convert to voltages.
    pub fn fetch_waveform(&mut self, channel: Channel) -> Result<Vec<f64>> {
        self.fetch_waveform_with(channel, &WaveformDecoder::new())
    }

    /// Like [`fetch_waveform`] with a custom sample unpacking strategy.
    ///
    /// [`fetch_waveform`]: DeviceSession::fetch_waveform
    pub fn fetch_waveform_with<U: SampleUnpacker>(
        &mut self,
        channel: Channel,
        decoder: &WaveformDecoder<U>,
    ) -> Result<Vec<f64>> {
        let header = self.fetch_header()?;
        let frame = self.fetch_frame(channel)?;
        decoder.decode_frame(&frame, &header)
    }

    /// Query `*IDN?`.
    pub fn identify(&mut self) -> Result<DeviceIdentification> {
        let text = self.issue_query("*IDN")?;
        DeviceIdentification::parse(&text)
    }

    /// Read and discard until the transport is quiet.
    ///
    /// Recovers a session after an abandoned exchange left reply bytes in
    /// flight. Returns the number of bytes discarded.
    pub fn drain(&mut self) -> Result<usize> {
        let mut state = ExchangeState::Idle;
        let discarded = ReplyReader::new(&mut self.transport, &self.config, &mut state).drain()?;
        if discarded > 0 {
            debug!("drained {} stale bytes", discarded);
        }
        Ok(discarded)
    }

    // ========================================================================
    // Exchange plumbing
    // ========================================================================

    fn probe_attenuation(&mut self, channel: Channel) -> Result<ProbeAttenuation> {
        let text = self.issue_query(&format!(":{}:PROBE", channel))?;
        ProbeAttenuation::parse(&text)
    }

    fn send_setting(&mut self, line: &str) -> Result<()> {
        self.exchange(line, |_| Ok(()))
    }

    fn exchange<R>(
        &mut self,
        line: &str,
        read: impl FnOnce(&mut ReplyReader<'_, T>) -> Result<R>,
    ) -> Result<R> {
        debug!("-> {}", line.trim_end());
        let result = self.run_exchange(line, read);
        if let Err(err) = &result {
            if self.state != ExchangeState::Idle {
                warn!(
                    "exchange '{}' aborted in state {}: {}",
                    line.trim_end(),
                    self.state,
                    err
                );
            }
        }
        self.set_state(ExchangeState::Idle);
        result
    }

    fn run_exchange<R>(
        &mut self,
        line: &str,
        read: impl FnOnce(&mut ReplyReader<'_, T>) -> Result<R>,
    ) -> Result<R> {
        self.transport.write(line.as_bytes())?;
        self.set_state(ExchangeState::CommandSent);
        let mut reader = ReplyReader::new(&mut self.transport, &self.config, &mut self.state);
        let reply = read(&mut reader)?;
        debug!("<- reply complete for {}", line.trim_end());
        Ok(reply)
    }

    fn set_state(&mut self, next: ExchangeState) {
        if self.state != next {
            trace!("exchange {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

fn expect_reply(descriptor: &CommandDescriptor, requested: ReplyKind) -> Result<()> {
    if descriptor.reply != requested {
        return Err(ScpiError::ReplyKindMismatch {
            path: descriptor.wire_path(),
            requested: requested.name(),
            actual: descriptor.reply.name(),
        });
    }
    Ok(())
}
