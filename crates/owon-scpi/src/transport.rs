//! Byte-stream transport seam.
//!
//! The physical link (USB bulk endpoint, serial port) is supplied by the
//! caller through the [`Transport`] trait. The engine only needs to write a
//! command line and read whatever bytes the instrument produces, waiting at
//! most a given time for them.
//!
//! [`MockTransport`] replays scripted replies so that sessions can be driven
//! without hardware.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Blocking byte-level transport to an instrument.
pub trait Transport {
    /// Write all bytes of a command line.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout` for the first.
    ///
    /// Returns the number of bytes read. A short read is normal. No data
    /// within `timeout` is reported as `Ok(0)` or as an error of kind
    /// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]; all three
    /// mean the same thing to the engine.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }
}

/// Whether a read error only means that nothing arrived in time.
pub(crate) fn is_no_data(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// One scripted step of a reply.
#[derive(Debug, Clone)]
pub enum ReplyStep {
    /// Bytes handed out over as many reads as the chunk size requires.
    Data(Vec<u8>),
    /// One read that sees no data.
    Silence,
    /// One read that fails with this error kind.
    Fail(io::ErrorKind),
}

/// A pre-loaded request and the reply it triggers.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be written.
    request: Vec<u8>,
    /// Steps queued for reading once the request is written.
    reply: Vec<ReplyStep>,
}

/// A scripted [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. A write is recorded and matched
/// against the next expectation; its reply steps are then queued behind any
/// bytes still unread from earlier replies. Reads hand out at most
/// `chunk_size` bytes at a time, which exercises reassembly of replies split
/// across many transport reads.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    pending: VecDeque<ReplyStep>,
    chunk_size: usize,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending: VecDeque::new(),
            chunk_size: usize::MAX,
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Limit every read to at most `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Expect `request` to be written, then reply with `reply`.
    ///
    /// An empty reply scripts a command the instrument does not answer.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        let steps = if reply.is_empty() {
            Vec::new()
        } else {
            vec![ReplyStep::Data(reply.to_vec())]
        };
        self.expect_steps(request, steps);
    }

    /// Expect `request` to be written, then play back the given steps.
    pub fn expect_steps(&mut self, request: &[u8], reply: Vec<ReplyStep>) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            reply,
        });
    }

    /// Expect `query` (newline appended) and reply with text.
    pub fn expect_text(&mut self, query: &str, reply: &str) {
        self.expect(format!("{}\n", query).as_bytes(), reply.as_bytes());
    }

    /// Expect `query` (newline appended) and reply with a length-prefixed frame.
    pub fn expect_frame(&mut self, query: &str, payload: &[u8]) {
        let mut frame = Vec::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        self.expect(format!("{}\n", query).as_bytes(), &frame);
    }

    /// Queue bytes that arrive without being asked for.
    pub fn push_unsolicited(&mut self, data: &[u8]) {
        self.pending.push_back(ReplyStep::Data(data.to_vec()));
    }

    /// Return all data written through this transport, one entry per write.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Written data as text lines, without the trailing newline.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent_log
            .iter()
            .map(|data| String::from_utf8_lossy(data).trim_end().to_string())
            .collect()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Bytes queued for reading and not read yet.
    pub fn pending_bytes(&self) -> usize {
        self.pending
            .iter()
            .map(|step| match step {
                ReplyStep::Data(data) => data.len(),
                _ => 0,
            })
            .sum()
    }

    /// Set the connected state.
    ///
    /// While disconnected every call fails with [`io::ErrorKind::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn check_connected(&self) -> io::Result<()> {
        if !self.connected {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "mock transport is disconnected",
            ));
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.check_connected()?;
        self.sent_log.push(data.to_vec());

        let expectation = self.expectations.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "no more expectations in mock transport")
        })?;
        if data != expectation.request.as_slice() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "unexpected write: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                ),
            ));
        }
        self.pending.extend(expectation.reply);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        self.check_connected()?;
        match self.pending.pop_front() {
            None | Some(ReplyStep::Silence) => Ok(0),
            Some(ReplyStep::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(ReplyStep::Data(mut data)) => {
                let n = data.len().min(buf.len()).min(self.chunk_size);
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    data.drain(..n);
                    self.pending.push_front(ReplyStep::Data(data));
                }
                Ok(n)
            }
        }
    }
}
