//! Error types for the SCPI engine.

use std::time::Duration;

use thiserror::Error;

use crate::units::UnitClass;

/// Errors that can occur while building commands or exchanging replies.
///
/// Encode-time variants (`UnknownMnemonic` through `ReplyKindMismatch`) are
/// raised before any byte reaches the transport. Exchange-time variants
/// (`Timeout`, `TruncatedFrame`, `MalformedFrame`, `Transport`) abort the
/// current exchange only; the session is back in `Idle` when they surface.
#[derive(Debug, Error)]
pub enum ScpiError {
    /// A command path segment did not match any registered keyword.
    #[error("unknown mnemonic '{segment}' in '{path}'")]
    UnknownMnemonic {
        /// The full path as typed by the caller.
        path: String,
        /// The first segment that failed to match.
        segment: String,
    },

    /// A discrete value is not in the currently allowed set.
    #[error("invalid value '{value}', allowed: {}", .allowed.join(", "))]
    InvalidDiscreteValue {
        /// The rejected value.
        value: String,
        /// The allowed set active for this command and context.
        allowed: Vec<String>,
    },

    /// An integer is outside the command's range.
    #[error("integer {value} is out of range [{min}, {max}]")]
    OutOfRangeInteger {
        /// The rejected value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// Integer text could not be parsed as a signed decimal.
    #[error("invalid integer '{0}'")]
    InvalidInteger(String),

    /// A quantity could not be parsed, or carried the wrong unit.
    #[error("cannot parse '{text}' as {expected}")]
    UnitParse {
        /// The text that failed to parse.
        text: String,
        /// The unit class the command expects.
        expected: UnitClass,
    },

    /// The supplied value does not fit the command's parameter type.
    #[error("expected {expected}, got {found}")]
    ParameterMismatch {
        /// Description of the expected parameter.
        expected: String,
        /// Description of what was supplied.
        found: String,
    },

    /// Channel index outside 1..=2.
    #[error("invalid channel {0}, expected 1 or 2")]
    InvalidChannel(u8),

    /// The command has no query form.
    #[error("{0} is not queryable")]
    NotQueryable(String),

    /// The command cannot be issued as a setting or action.
    #[error("{0} is not settable")]
    NotSettable(String),

    /// A text query was issued for a binary command, or the reverse.
    #[error("{path} replies with {actual}, not {requested}")]
    ReplyKindMismatch {
        /// Canonical command path.
        path: String,
        /// The reply kind the caller asked for.
        requested: &'static str,
        /// The reply kind the command produces.
        actual: &'static str,
    },

    /// The binary payload stopped arriving before the declared length.
    #[error("truncated frame: expected {expected} payload bytes, received {received}")]
    TruncatedFrame {
        /// Declared payload length.
        expected: usize,
        /// Payload bytes received before the read budget ran out.
        received: usize,
    },

    /// The reply violated the framing rules.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The capture header JSON is malformed or missing a required field.
    #[error("malformed header JSON at '{path}': {reason}")]
    MalformedHeaderJson {
        /// Dotted path of the offending field (`CHANNEL[1].SCALE`).
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Sample bytes could not be converted to voltages.
    #[error("decode error: {0}")]
    Decode(String),

    /// The `*IDN?` reply did not have the expected shape.
    #[error("invalid identification string '{0}'")]
    InvalidIdentification(String),

    /// No reply byte arrived within the read timeout.
    #[error("timeout after {0:?} waiting for a reply")]
    Timeout(Duration),

    /// Transport failure, passed through untouched.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl ScpiError {
    /// Create a header error for the given field path.
    pub fn header(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ScpiError::MalformedHeaderJson {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        ScpiError::MalformedFrame(message.into())
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        ScpiError::Decode(message.into())
    }

    /// Whether this error was raised before anything was written to the transport.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            ScpiError::UnknownMnemonic { .. }
                | ScpiError::InvalidDiscreteValue { .. }
                | ScpiError::OutOfRangeInteger { .. }
                | ScpiError::InvalidInteger(_)
                | ScpiError::UnitParse { .. }
                | ScpiError::ParameterMismatch { .. }
                | ScpiError::InvalidChannel(_)
                | ScpiError::NotQueryable(_)
                | ScpiError::NotSettable(_)
                | ScpiError::ReplyKindMismatch { .. }
        )
    }
}

/// Result type for SCPI operations.
pub type Result<T> = std::result::Result<T, ScpiError>;
