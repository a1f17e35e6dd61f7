//! SCPI command/response engine for OWON HDS200 series handheld oscilloscopes.
//!
//! This crate turns typed settings into SCPI command lines, resolves
//! abbreviated command paths, assembles text and length-prefixed binary
//! replies from a chunked byte stream, and converts raw screen samples into
//! calibrated voltages.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → instrument): ASCII lines rooted at `:`, any case,
//!   full or abbreviated keywords, terminated by a newline. Queries end in `?`.
//! - **Text replies**: no terminator; complete once the link goes quiet.
//! - **Binary replies**: a 4-byte little-endian length followed by exactly
//!   that many bytes (screen samples, or the JSON capture header).
//!
//! The physical link is supplied through the [`Transport`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use owon_scpi::{Channel, DeviceSession, ParameterValue};
//!
//! let mut session = DeviceSession::new(transport);
//! session.issue_command(":HOR:SCAL", Some(&ParameterValue::tag("1.0ms")))?;
//! let volts = session.fetch_waveform(Channel::Ch1)?;
//! ```

mod commands;
mod config;
mod error;
mod frame;
mod header;
mod identity;
mod mnemonic;
mod params;
mod response;
mod scales;
mod session;
mod transport;
mod units;
mod waveform;

pub use commands::*;
pub use config::*;
pub use error::*;
pub use frame::*;
pub use header::*;
pub use identity::*;
pub use mnemonic::*;
pub use params::*;
pub use response::*;
pub use scales::*;
pub use session::*;
pub use transport::*;
pub use units::*;
pub use waveform::*;
