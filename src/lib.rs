//! Huami BLE Protocol Core
//!
//! This library provides a Rust implementation of the device-side protocol used by Huami
//! wearables (Mi Band 2, Amazfit Bip, Amazfit Cor, Mi Band 3): the wire codecs, the chunked
//! transfer framing, notification delivery, the authenticated initialization sequence and the
//! handling of inbound device events. The BLE transport itself is provided by the platform
//! through [`BleSupport`].
//!
//! # Modules
//!
//! - `chunked`: framing of large payloads over the chunked transfer characteristic
//! - `time`, `user`, `alarm`, `battery`, `weather`, `music`, `settings`: wire codecs
//! - `notification`: vibration and text notification strategies
//! - `init`: three phase initialization and authentication
//! - `events`, `button`: device event decoding and multi-press button actions
//! - `realtime`: realtime heart rate and step samples
//! - `support`: the per-connection session facade
//! - `types`: Common types, errors and helpers used throughout the library

pub mod alarm;
pub mod battery;
pub mod button;
pub mod calendar;
pub mod capability;
pub mod chunked;
pub mod config;
pub mod events;
pub mod init;
pub mod music;
pub mod notification;
pub mod realtime;
pub mod service;
pub mod settings;
pub mod support;
pub mod time;
pub mod transport;
pub mod types;
pub mod user;
pub mod weather;

pub use alarm::Alarm;
pub use battery::BatteryInfo;
pub use calendar::{CalendarEvent, CalendarSource};
pub use capability::{DeviceCapability, DeviceFamily, Version};
pub use config::{ConfigKey, DeviceSettings};
pub use events::{DeviceEvent, DeviceEventCallback};
pub use init::{AuthCipher, AuthParams, SessionState};
pub use music::{MusicSpec, MusicStateSpec};
pub use notification::{CallCommand, CallSpec, NotificationSpec, NotificationType};
pub use realtime::{ActivitySample, SampleStore};
pub use service::Characteristic;
pub use support::{FirmwareInstaller, HuamiSupport};
pub use transport::{BleSupport, CharacteristicHandle, Transaction, TransportOp};
pub use types::{HuamiError, Result};
pub use weather::WeatherSpec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        // Smoke test to ensure all modules can be imported
        let _ = Characteristic::Configuration.uuid();
        let _ = DeviceSettings::default();
        assert!(DeviceCapability::new(DeviceFamily::AmazfitBip, "0.1.1.14", "").is_ok());
    }
}
