//! Binary reply framing.
//!
//! Binary replies carry a 4-byte unsigned little-endian payload length
//! followed by exactly that many payload bytes, with no trailer:
//!
//! ```text
//! +------+------+------+------+-------------------+
//! | len0 | len1 | len2 | len3 | payload[0..len]   |
//! +------+------+------+------+-------------------+
//! ```
//!
//! The transport delivers the stream in arbitrary chunks, so the assembler
//! accepts bytes in any split and reports when the frame is complete.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, ScpiError};

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Where an exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    /// No exchange in flight.
    Idle,
    /// The command line has been written.
    CommandSent,
    /// Waiting for the first reply byte.
    AwaitingResponse,
    /// A text reply has been assembled.
    TextComplete,
    /// The 4-byte length prefix has been read.
    BinaryHeaderReceived,
    /// Some but not all payload bytes have been read.
    AccumulatingPayload,
    /// The binary payload is complete.
    FrameComplete,
}

impl ExchangeState {
    /// Whether this state ends an exchange successfully.
    pub fn is_complete(&self) -> bool {
        matches!(self, ExchangeState::TextComplete | ExchangeState::FrameComplete)
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress reported after feeding bytes to a [`FrameAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameProgress {
    /// The length prefix is not complete yet.
    NeedHeader,
    /// The prefix is known; `remaining` payload bytes are still missing.
    NeedPayload {
        /// Declared payload length.
        declared: usize,
        /// Payload bytes still missing.
        remaining: usize,
    },
    /// The payload is complete.
    Complete,
}

/// Accumulates one length-prefixed frame across transport reads.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    declared: Option<usize>,
    max_payload_len: usize,
}

impl FrameAssembler {
    /// Create an assembler that rejects declared lengths above `max_payload_len`.
    pub fn new(max_payload_len: usize) -> Self {
        FrameAssembler {
            buffer: BytesMut::with_capacity(LENGTH_PREFIX_SIZE),
            declared: None,
            max_payload_len,
        }
    }

    /// Declared payload length, once the prefix has arrived.
    pub fn declared_len(&self) -> Option<usize> {
        self.declared
    }

    /// Payload bytes collected so far.
    pub fn received_len(&self) -> usize {
        match self.declared {
            Some(_) => self.buffer.len(),
            None => 0,
        }
    }

    /// Number of bytes the assembler can take before the frame is complete.
    ///
    /// Used to size reads so that no byte past the frame end is consumed.
    pub fn wanted(&self) -> usize {
        match self.declared {
            None => LENGTH_PREFIX_SIZE - self.buffer.len(),
            Some(declared) => declared - self.buffer.len(),
        }
    }

    /// Add received bytes.
    ///
    /// Bytes beyond the declared payload length are a framing error: the
    /// declared length must match the payload exactly.
    pub fn push(&mut self, mut data: &[u8]) -> Result<FrameProgress> {
        if self.declared.is_none() {
            let take = (LENGTH_PREFIX_SIZE - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() < LENGTH_PREFIX_SIZE {
                return Ok(FrameProgress::NeedHeader);
            }
            let declared = self.buffer.get_u32_le() as usize;
            if declared == 0 {
                return Err(ScpiError::malformed("declared payload length is zero"));
            }
            if declared > self.max_payload_len {
                return Err(ScpiError::malformed(format!(
                    "declared payload length {} exceeds limit {}",
                    declared, self.max_payload_len
                )));
            }
            self.buffer = BytesMut::with_capacity(declared);
            self.declared = Some(declared);
        }

        let remaining = self.wanted();
        if data.len() > remaining {
            return Err(ScpiError::malformed(format!(
                "{} bytes past the declared payload length",
                data.len() - remaining
            )));
        }
        self.buffer.extend_from_slice(data);
        Ok(self.progress())
    }

    /// Current progress without adding bytes.
    pub fn progress(&self) -> FrameProgress {
        match self.declared {
            None => FrameProgress::NeedHeader,
            Some(declared) if self.buffer.len() == declared => FrameProgress::Complete,
            Some(declared) => FrameProgress::NeedPayload {
                declared,
                remaining: declared - self.buffer.len(),
            },
        }
    }

    /// Take the completed payload, resetting the assembler.
    ///
    /// Returns `None` while the frame is incomplete.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.progress() != FrameProgress::Complete {
            return None;
        }
        self.declared = None;
        Some(std::mem::take(&mut self.buffer).freeze())
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.declared = None;
    }

    /// Encode a payload as a frame, as the instrument sends it.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        buf.put_u32_le(payload.len() as u32);
        buf.extend_from_slice(payload);
        buf
    }
}
