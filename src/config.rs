//! Device preferences
//!
//! Read-only view of the user's per-device settings. The application owns storage; this crate
//! only needs something it can deserialize and query while building commands.

use crate::notification::NotificationOrigin;
use crate::types::Result;
use crate::user::UserProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_VIBRATION_COUNT: u16 = 3;
pub const DEFAULT_VIBRATION_PROFILE: &str = "staccato";
pub const DEFAULT_BUTTON_BROADCAST: &str = "nodomain.freeyourgadget.gadgetbridge.ButtonPressed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceUnit::Metric => write!(f, "METRIC"),
            DistanceUnit::Imperial => write!(f, "IMPERIAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeDisplay {
    Time,
    #[default]
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WearLocation {
    #[default]
    LeftWrist,
    RightWrist,
}

/// Off/on switch that can also follow a daily schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledSwitch {
    On,
    #[default]
    Off,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoNotDisturb {
    #[default]
    Off,
    Automatic,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayItem {
    Steps,
    Distance,
    Calories,
    HeartRate,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            start: TimeOfDay::new(1, 0),
            end: TimeOfDay::new(6, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InactivityWarnings {
    pub enabled: bool,
    /// Minutes without movement before the band vibrates
    pub threshold_minutes: u8,
    pub interval: Schedule,
    /// Quiet period carved out of `interval`
    pub dnd: Option<Schedule>,
}

impl Default for InactivityWarnings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_minutes: 60,
            interval: Schedule {
                start: TimeOfDay::new(6, 0),
                end: TimeOfDay::new(22, 0),
            },
            dnd: None,
        }
    }
}

/// Vibration preferences of one notification origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPrefs {
    pub vibration_count: u16,
    pub vibration_profile: String,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            vibration_count: DEFAULT_VIBRATION_COUNT,
            vibration_profile: DEFAULT_VIBRATION_PROFILE.to_string(),
        }
    }
}

/// Multi-press button action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    pub enabled: bool,
    /// Presses needed to trigger the action, 0 disables it
    pub required_press_count: u32,
    /// Longest gap between presses of one sequence
    pub max_press_delay_ms: u64,
    /// Wait after the last press before firing, so a longer sequence can supersede it
    pub action_delay_ms: u64,
    pub broadcast: String,
    pub vibrate: bool,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            required_press_count: 0,
            max_press_delay_ms: 2000,
            action_delay_ms: 0,
            broadcast: DEFAULT_BUTTON_BROADCAST.to_string(),
            vibrate: false,
        }
    }
}

/// Setting groups, each written by one configuration command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    DateDisplay,
    DateFormat,
    TimeFormat,
    UserInfo,
    DistanceUnit,
    WearLocation,
    FitnessGoal,
    DisplayItems,
    DoNotDisturb,
    RotateWrist,
    DisplayOnLift,
    DisplayCaller,
    GoalNotification,
    InactivityWarnings,
    HeartRateSleepSupport,
    DisconnectNotification,
    ExposeHeartRate,
    HeartRateInterval,
    Language,
    BandScreenUnlock,
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", name)
    }
}

/// All per-device preferences used by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub user: UserProfile,
    pub notifications: HashMap<NotificationOrigin, NotificationPrefs>,
    pub enable_text_notifications: bool,
    pub distance_unit: DistanceUnit,
    pub wear_location: WearLocation,
    pub steps_goal: u16,
    pub display_items: Vec<DisplayItem>,
    pub date_display: DateTimeDisplay,
    /// One of `MM/dd/yyyy`, `dd.MM.yyyy`, `dd/MM/yyyy`
    pub date_format: String,
    pub use_24_hour_time: bool,
    pub do_not_disturb: DoNotDisturb,
    pub do_not_disturb_schedule: Schedule,
    pub rotate_wrist_to_switch_info: bool,
    pub display_on_lift: ScheduledSwitch,
    pub display_on_lift_schedule: Schedule,
    pub goal_notification: bool,
    pub inactivity_warnings: InactivityWarnings,
    pub heart_rate_sleep_support: bool,
    /// Periodic measurement interval, 0 disables it
    pub heart_rate_interval_secs: u32,
    pub disconnect_notification: ScheduledSwitch,
    pub disconnect_notification_schedule: Schedule,
    pub expose_heart_rate_third_party: bool,
    /// Locale such as `en_US`, `None` falls back to `system_locale`
    pub language: Option<String>,
    pub system_locale: String,
    pub band_screen_unlock: bool,
    pub button: ButtonSettings,
    /// Alarm slots mirrored from upcoming calendar events
    pub reserved_calendar_slots: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            user: UserProfile::default(),
            notifications: HashMap::new(),
            enable_text_notifications: true,
            distance_unit: DistanceUnit::Metric,
            wear_location: WearLocation::LeftWrist,
            steps_goal: 8000,
            display_items: vec![
                DisplayItem::Steps,
                DisplayItem::Distance,
                DisplayItem::Calories,
                DisplayItem::HeartRate,
                DisplayItem::Battery,
            ],
            date_display: DateTimeDisplay::DateTime,
            date_format: "MM/dd/yyyy".to_string(),
            use_24_hour_time: true,
            do_not_disturb: DoNotDisturb::Off,
            do_not_disturb_schedule: Schedule::default(),
            rotate_wrist_to_switch_info: false,
            display_on_lift: ScheduledSwitch::On,
            display_on_lift_schedule: Schedule::default(),
            goal_notification: false,
            inactivity_warnings: InactivityWarnings::default(),
            heart_rate_sleep_support: false,
            heart_rate_interval_secs: 0,
            disconnect_notification: ScheduledSwitch::Off,
            disconnect_notification_schedule: Schedule::default(),
            expose_heart_rate_third_party: false,
            language: None,
            system_locale: "en_US".to_string(),
            band_screen_unlock: false,
            button: ButtonSettings::default(),
            reserved_calendar_slots: 0,
        }
    }
}

impl DeviceSettings {
    /// Load settings from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Preferences for `origin`, or the defaults when the user never changed them
    pub fn notification_prefs(&self, origin: NotificationOrigin) -> NotificationPrefs {
        self.notifications.get(&origin).cloned().unwrap_or_default()
    }

    /// Effective locale string, e.g. `de_DE`
    pub fn locale(&self) -> &str {
        match self.language.as_deref() {
            Some(language) if !language.is_empty() && language != "auto" => language,
            _ => &self.system_locale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let settings = DeviceSettings::from_json("{}").unwrap();
        assert_eq!(settings, DeviceSettings::default());
        assert!(settings.enable_text_notifications);
        assert_eq!(settings.button.max_press_delay_ms, 2000);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "distance_unit": "imperial",
            "user": { "alias": "mi1", "birth_year": 1985, "height_cm": 180, "weight_kg": 75 },
            "notifications": { "incoming_call": { "vibration_count": 20, "vibration_profile": "ring" } },
            "button": { "enabled": true, "required_press_count": 3 },
            "language": "auto"
        }"#;
        let settings = DeviceSettings::from_json(json).unwrap();

        assert_eq!(settings.distance_unit, DistanceUnit::Imperial);
        assert_eq!(settings.user.alias.as_deref(), Some("mi1"));
        assert_eq!(
            settings.notification_prefs(NotificationOrigin::IncomingCall).vibration_count,
            20
        );
        assert_eq!(
            settings.notification_prefs(NotificationOrigin::Email),
            NotificationPrefs::default()
        );
        assert_eq!(settings.button.required_press_count, 3);
        assert_eq!(settings.button.action_delay_ms, 0);
        assert_eq!(settings.locale(), "en_US");
    }

    #[test]
    fn test_invalid_json() {
        assert!(DeviceSettings::from_json("{ \"steps_goal\": \"many\" }").is_err());
    }

    #[test]
    fn test_config_key_display() {
        assert_eq!(ConfigKey::DisplayOnLift.to_string(), "display_on_lift");
        assert_eq!(TimeOfDay::new(7, 5).to_string(), "07:05");
    }
}
