//! Error types for the oscilloscope interface.

use owon_scpi::ScpiError;
use thiserror::Error;

/// Errors that can occur while driving the oscilloscope.
#[derive(Debug, Error)]
pub enum HdsError {
    /// The command engine failed (encoding, framing, transport).
    #[error(transparent)]
    Scpi(#[from] ScpiError),

    /// The instrument answered, but with nothing usable.
    #[error("no data received for {0}")]
    NoData(String),

    /// A reply could not be interpreted.
    #[error("unexpected reply for {what}: '{reply}'")]
    UnexpectedReply {
        /// What was queried.
        what: String,
        /// The reply as received.
        reply: String,
    },

    /// The connected instrument is not one this interface drives.
    #[error("unsupported instrument: {0}")]
    Unsupported(String),
}

impl HdsError {
    pub(crate) fn unexpected(what: impl Into<String>, reply: impl Into<String>) -> Self {
        HdsError::UnexpectedReply {
            what: what.into(),
            reply: reply.into(),
        }
    }
}

/// Result type for oscilloscope operations.
pub type Result<T> = std::result::Result<T, HdsError>;
