//! Common types, enums, and error definitions for the Huami protocol

use std::fmt;
use thiserror::Error;

/// Result type alias for Huami operations
pub type Result<T> = std::result::Result<T, HuamiError>;

/// Error types for Huami communication
///
/// The variants follow the error taxonomy of the driver: only `Fatal` ends a session,
/// everything else is logged by the caller and the in-progress operation is abandoned.
#[derive(Error, Debug)]
pub enum HuamiError {
    /// Authentication/handshake failure, the session stays uninitialized
    #[error("Fatal session error: {0}")]
    Fatal(String),

    /// A queued read/write could not be executed by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// A required input is missing, no write was attempted
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// Inbound payload had an unexpected length or shape
    #[error("Malformed payload: {0}")]
    DecodeMalformed(String),

    /// The connected firmware/hardware has no support for this feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl HuamiError {
    /// Whether this error must abort the whole session
    pub fn is_fatal(&self) -> bool {
        matches!(self, HuamiError::Fatal(_))
    }
}

/// Battery charge state reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Normal,
    Charging,
    Unknown,
}

impl BatteryState {
    /// Convert the raw state byte of a battery reply
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => BatteryState::Normal,
            1 => BatteryState::Charging,
            _ => BatteryState::Unknown,
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryState::Normal => write!(f, "BATTERY_NORMAL"),
            BatteryState::Charging => write!(f, "BATTERY_CHARGING"),
            BatteryState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Format bytes as hex for log output
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_state_conversion() {
        assert_eq!(BatteryState::from_u8(0), BatteryState::Normal);
        assert_eq!(BatteryState::from_u8(1), BatteryState::Charging);
        assert_eq!(BatteryState::from_u8(7), BatteryState::Unknown);
    }

    #[test]
    fn test_only_fatal_is_fatal() {
        assert!(HuamiError::Fatal("auth".into()).is_fatal());
        assert!(!HuamiError::Transport("write".into()).is_fatal());
        assert!(!HuamiError::PreconditionNotMet("alias".into()).is_fatal());
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x00, 0x1F, 0xAB]), "00 1F AB");
        assert_eq!(hex_dump(&[]), "");
    }
}
