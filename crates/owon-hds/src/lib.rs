//! Typed interface for OWON HDS200 series oscilloscopes.
//!
//! [`Oscilloscope`] wraps an `owon_scpi::DeviceSession` and exposes the
//! instrument's settings and screen data as typed values: time base,
//! per-channel coupling, probe, scale, offset and display, and calibrated
//! captures of both channels.
//!
//! ```rust,ignore
//! use owon_hds::Oscilloscope;
//! use owon_scpi::{Channel, SessionConfig};
//!
//! let mut scope = Oscilloscope::open(transport, SessionConfig::default())?;
//! scope.set_horizontal_scale("1.0ms")?;
//! let capture = scope.capture()?;
//! for channel in capture.displayed() {
//!     println!("{}: {} samples", channel.channel, channel.voltages.len());
//! }
//! ```

mod capture;
mod error;
mod oscilloscope;

pub use capture::*;
pub use error::*;
pub use oscilloscope::*;
