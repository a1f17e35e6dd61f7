//! Reply assembly over a chunked transport.
//!
//! Text replies have no terminator: they are complete once the transport stays
//! silent for the quiescence window. Binary replies are length-prefixed and
//! complete once exactly the declared number of payload bytes has arrived.

use bytes::Bytes;
use log::trace;

use crate::config::SessionConfig;
use crate::error::{Result, ScpiError};
use crate::frame::{ExchangeState, FrameAssembler, FrameProgress, LENGTH_PREFIX_SIZE};
use crate::transport::{is_no_data, Transport};

/// Reads one reply from a transport, recording state transitions.
pub struct ReplyReader<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    config: &'a SessionConfig,
    state: &'a mut ExchangeState,
    buf: Vec<u8>,
}

impl<'a, T: Transport + ?Sized> ReplyReader<'a, T> {
    /// Create a reader over a transport whose command has already been sent.
    pub fn new(
        transport: &'a mut T,
        config: &'a SessionConfig,
        state: &'a mut ExchangeState,
    ) -> Self {
        ReplyReader {
            transport,
            config,
            state,
            buf: vec![0; config.read_size()],
        }
    }

    fn transition(&mut self, next: ExchangeState) {
        if *self.state != next {
            trace!("exchange {} -> {}", self.state, next);
            *self.state = next;
        }
    }

    /// One transport read of at most `limit` bytes. Zero means no data arrived.
    fn read_chunk(&mut self, limit: usize, timeout: std::time::Duration) -> Result<usize> {
        let limit = limit.min(self.buf.len());
        match self.transport.read(&mut self.buf[..limit], timeout) {
            Ok(n) => {
                if n > 0 {
                    trace!("read {} bytes", n);
                }
                Ok(n)
            }
            Err(err) if is_no_data(&err) => Ok(0),
            Err(err) => Err(ScpiError::Transport(err)),
        }
    }

    /// Assemble a text reply and trim trailing whitespace.
    pub fn read_text(&mut self) -> Result<String> {
        self.transition(ExchangeState::AwaitingResponse);
        let mut text = Vec::new();

        let n = self.read_chunk(usize::MAX, self.config.read_timeout())?;
        if n == 0 {
            return Err(ScpiError::Timeout(self.config.read_timeout()));
        }
        text.extend_from_slice(&self.buf[..n]);

        loop {
            let n = self.read_chunk(usize::MAX, self.config.quiescence())?;
            if n == 0 {
                break;
            }
            text.extend_from_slice(&self.buf[..n]);
            if text.len() > self.config.max_text_len {
                return Err(ScpiError::malformed(format!(
                    "text reply exceeds {} bytes",
                    self.config.max_text_len
                )));
            }
        }

        let text = String::from_utf8(text)
            .map_err(|_| ScpiError::malformed("text reply is not valid UTF-8"))?;
        self.transition(ExchangeState::TextComplete);
        Ok(text.trim_end().to_string())
    }

    /// Assemble a length-prefixed binary reply and return its payload.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        self.transition(ExchangeState::AwaitingResponse);
        let mut assembler = FrameAssembler::new(self.config.max_payload_len);
        let mut prefix_bytes = 0;

        loop {
            let wanted = assembler.wanted();
            let n = self.read_chunk(wanted, self.config.read_timeout())?;
            if n == 0 {
                return Err(match assembler.progress() {
                    FrameProgress::NeedHeader if prefix_bytes == 0 => {
                        ScpiError::Timeout(self.config.read_timeout())
                    }
                    FrameProgress::NeedHeader => ScpiError::malformed(format!(
                        "reply ended after {} of {} length prefix bytes",
                        prefix_bytes, LENGTH_PREFIX_SIZE
                    )),
                    FrameProgress::NeedPayload {
                        declared,
                        remaining,
                    } => ScpiError::TruncatedFrame {
                        expected: declared,
                        received: declared - remaining,
                    },
                    // Unreachable: a complete frame leaves the loop below.
                    FrameProgress::Complete => ScpiError::malformed("frame already complete"),
                });
            }

            let chunk = &self.buf[..n];
            let had_header = assembler.declared_len().is_some();
            if !had_header {
                prefix_bytes += n.min(LENGTH_PREFIX_SIZE - prefix_bytes);
            }
            match assembler.push(chunk)? {
                FrameProgress::NeedHeader => {}
                FrameProgress::NeedPayload { declared, remaining } => {
                    if !had_header {
                        trace!("frame declares {} payload bytes", declared);
                        self.transition(ExchangeState::BinaryHeaderReceived);
                    }
                    if remaining < declared {
                        self.transition(ExchangeState::AccumulatingPayload);
                    }
                }
                FrameProgress::Complete => break,
            }
        }

        if self.config.reject_trailing_bytes {
            let extra = self.read_chunk(usize::MAX, self.config.quiescence())?;
            if extra > 0 {
                return Err(ScpiError::malformed(format!(
                    "{} bytes past the declared payload length",
                    extra
                )));
            }
        }

        let payload = assembler
            .take()
            .ok_or_else(|| ScpiError::malformed("frame incomplete"))?;
        self.transition(ExchangeState::FrameComplete);
        Ok(payload)
    }

    /// Read and discard until the transport is quiet; returns the byte count.
    pub fn drain(&mut self) -> Result<usize> {
        let mut discarded = 0;
        loop {
            let n = self.read_chunk(usize::MAX, self.config.quiescence())?;
            if n == 0 {
                return Ok(discarded);
            }
            discarded += n;
        }
    }
}
