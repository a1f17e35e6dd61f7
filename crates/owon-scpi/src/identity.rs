//! `*IDN?` reply parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScpiError};

/// Instrument identity: `manufacturer,model,serial,firmware`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentification {
    /// Manufacturer (`OWON`).
    pub manufacturer: String,
    /// Model (`HDS272S`).
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Firmware version.
    pub firmware_version: String,
}

impl DeviceIdentification {
    /// Parse an identification reply; exactly four comma-separated fields.
    pub fn parse(text: &str) -> Result<DeviceIdentification> {
        let text = text.trim();
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [manufacturer, model, serial, firmware] if !manufacturer.is_empty() => {
                Ok(DeviceIdentification {
                    manufacturer: manufacturer.to_string(),
                    model: model.to_string(),
                    serial_number: serial.to_string(),
                    firmware_version: firmware.to_string(),
                })
            }
            _ => Err(ScpiError::InvalidIdentification(text.to_string())),
        }
    }

    /// HDS200 series handheld (HDS25, HDS242, HDS272S, HDS2202S, ...).
    pub fn is_hds200(&self) -> bool {
        self.manufacturer == "OWON" && self.model.starts_with("HDS2")
    }

    /// HDS300 series handheld (HDS307S, HDS310S, HDS320S).
    pub fn is_hds300(&self) -> bool {
        self.manufacturer == "OWON" && self.model.starts_with("HDS3")
    }

    /// Whether the built-in function generator is present.
    ///
    /// Generator models carry an `S` suffix in both series.
    pub fn wavegen_supported(&self) -> bool {
        (self.is_hds200() || self.is_hds300()) && self.model.ends_with('S')
    }
}

impl FromStr for DeviceIdentification {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self> {
        DeviceIdentification::parse(s)
    }
}

impl fmt::Display for DeviceIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (serial {}, firmware {})",
            self.manufacturer, self.model, self.serial_number, self.firmware_version
        )
    }
}
