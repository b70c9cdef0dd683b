//! Device events
//!
//! [`decode_band_event`] turns the raw device event characteristic value into a [`BandEvent`];
//! the session reacts to some of those itself (button presses, music app lifecycle) and forwards
//! the rest to the application as [`DeviceEvent`]s through a [`DeviceEventCallback`].

use crate::battery::BatteryInfo;
use crate::realtime::ActivitySample;
use crate::types::{hex_dump, HuamiError, Result};
use std::fmt;

// Device event characteristic codes
pub const FELL_ASLEEP: u8 = 0x01;
pub const WOKE_UP: u8 = 0x02;
pub const STEPSGOAL_REACHED: u8 = 0x03;
pub const BUTTON_PRESSED: u8 = 0x04;
pub const START_NONWEAR: u8 = 0x06;
pub const CALL_REJECT: u8 = 0x07;
pub const FIND_PHONE_START: u8 = 0x08;
pub const CALL_IGNORE: u8 = 0x09;
pub const ALARM_TOGGLED: u8 = 0x0a;
pub const BUTTON_PRESSED_LONG: u8 = 0x0b;
pub const TICK_30MIN: u8 = 0x0e;
pub const FIND_PHONE_STOP: u8 = 0x0f;
pub const MUSIC_CONTROL: u8 = 0xfe;

const MUSIC_APP_STARTED: u8 = 0xe0;
const MUSIC_APP_TERMINATED: u8 = 0xe1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallControl {
    Reject,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindPhone {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicControl {
    Play,
    Pause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
}

impl MusicControl {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MusicControl::Play),
            1 => Some(MusicControl::Pause),
            3 => Some(MusicControl::Next),
            4 => Some(MusicControl::Previous),
            5 => Some(MusicControl::VolumeUp),
            6 => Some(MusicControl::VolumeDown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sleep {
    FellAsleep,
    WokeUp,
}

/// Decoded value of the device event characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandEvent {
    Sleep(Sleep),
    StepsGoalReached,
    ButtonPressed,
    ButtonLongPressed,
    NonWearStart,
    CallControl(CallControl),
    FindPhone(FindPhone),
    AlarmToggled,
    Tick,
    MusicControl(MusicControl),
    MusicAppStarted,
    MusicAppTerminated,
}

pub fn decode_band_event(value: &[u8]) -> Result<BandEvent> {
    let first = *value
        .first()
        .ok_or_else(|| HuamiError::DecodeMalformed("empty device event".to_string()))?;

    let event = match first {
        FELL_ASLEEP => BandEvent::Sleep(Sleep::FellAsleep),
        WOKE_UP => BandEvent::Sleep(Sleep::WokeUp),
        STEPSGOAL_REACHED => BandEvent::StepsGoalReached,
        BUTTON_PRESSED => BandEvent::ButtonPressed,
        BUTTON_PRESSED_LONG => BandEvent::ButtonLongPressed,
        START_NONWEAR => BandEvent::NonWearStart,
        CALL_REJECT => BandEvent::CallControl(CallControl::Reject),
        CALL_IGNORE => BandEvent::CallControl(CallControl::Ignore),
        FIND_PHONE_START => BandEvent::FindPhone(FindPhone::Start),
        FIND_PHONE_STOP => BandEvent::FindPhone(FindPhone::Stop),
        ALARM_TOGGLED => BandEvent::AlarmToggled,
        TICK_30MIN => BandEvent::Tick,
        MUSIC_CONTROL => {
            let command = *value.get(1).ok_or_else(|| {
                HuamiError::DecodeMalformed("music control without command".to_string())
            })?;
            match command {
                MUSIC_APP_STARTED => BandEvent::MusicAppStarted,
                MUSIC_APP_TERMINATED => BandEvent::MusicAppTerminated,
                _ => BandEvent::MusicControl(MusicControl::from_u8(command).ok_or_else(|| {
                    HuamiError::DecodeMalformed(format!(
                        "unknown music control 0x{:02X}",
                        command
                    ))
                })?),
            }
        }
        _ => {
            return Err(HuamiError::DecodeMalformed(format!(
                "unknown device event {}",
                hex_dump(value)
            )))
        }
    };
    Ok(event)
}

/// Events delivered to the application
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    VersionInfo {
        firmware: String,
        hardware: String,
    },
    BatteryInfo(BatteryInfo),
    CallControl(CallControl),
    FindPhone(FindPhone),
    MusicControl(MusicControl),
    /// Configured multi-press sequence completed
    ButtonAction {
        broadcast: String,
        action_id: u32,
    },
    Sleep(Sleep),
    NonWearStart,
    AlarmToggled,
    StepsGoalReached,
    Tick,
    ButtonLongPressed,
    RealtimeSample(ActivitySample),
    Initialized,
    InitializationFailed(String),
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::VersionInfo { firmware, hardware } => {
                write!(f, "version info (fw {}, hw {})", firmware, hardware)
            }
            DeviceEvent::BatteryInfo(info) => {
                write!(f, "battery {}% {}", info.level, info.state)
            }
            DeviceEvent::ButtonAction {
                broadcast,
                action_id,
            } => write!(f, "button action {} #{}", broadcast, action_id),
            DeviceEvent::InitializationFailed(reason) => {
                write!(f, "initialization failed: {}", reason)
            }
            other => write!(f, "{:?}", other),
        }
    }
}

/// Receiver of [`DeviceEvent`]s
pub trait DeviceEventCallback: Send + Sync {
    fn on_event(&self, event: DeviceEvent) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for later inspection
    #[derive(Default)]
    pub struct RecordingCallback {
        events: Mutex<Vec<DeviceEvent>>,
    }

    impl RecordingCallback {
        pub fn events(&self) -> Vec<DeviceEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DeviceEventCallback for RecordingCallback {
        fn on_event(&self, event: DeviceEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_events() {
        assert_eq!(
            decode_band_event(&[0x01]).unwrap(),
            BandEvent::Sleep(Sleep::FellAsleep)
        );
        assert_eq!(decode_band_event(&[0x04]).unwrap(), BandEvent::ButtonPressed);
        assert_eq!(
            decode_band_event(&[0x07, 0x00]).unwrap(),
            BandEvent::CallControl(CallControl::Reject)
        );
        assert_eq!(
            decode_band_event(&[0x0f]).unwrap(),
            BandEvent::FindPhone(FindPhone::Stop)
        );
        assert_eq!(decode_band_event(&[0x0e]).unwrap(), BandEvent::Tick);
    }

    #[test]
    fn test_decode_music_control() {
        assert_eq!(
            decode_band_event(&[0xfe, 0x03]).unwrap(),
            BandEvent::MusicControl(MusicControl::Next)
        );
        assert_eq!(
            decode_band_event(&[0xfe, 0xe0]).unwrap(),
            BandEvent::MusicAppStarted
        );
        assert_eq!(
            decode_band_event(&[0xfe, 0xe1]).unwrap(),
            BandEvent::MusicAppTerminated
        );
    }

    #[test]
    fn test_decode_rejects_unknown() {
        assert!(decode_band_event(&[]).is_err());
        assert!(decode_band_event(&[0x05]).is_err());
        assert!(decode_band_event(&[0xfe]).is_err());
        assert!(matches!(
            decode_band_event(&[0xfe, 0x02]),
            Err(HuamiError::DecodeMalformed(_))
        ));
    }
}
