//! Configuration commands
//!
//! One builder per setting group, plus [`append_setting`] which resolves the target
//! characteristic and appends the write to a transaction.

use crate::capability::DeviceCapability;
use crate::config::{
    ConfigKey, DateTimeDisplay, DeviceSettings, DisplayItem, DistanceUnit, DoNotDisturb,
    InactivityWarnings, Schedule, ScheduledSwitch, WearLocation,
};
use crate::service::*;
use crate::transport::{lookup, BleSupport, Transaction};
use crate::types::{HuamiError, Result};
use crate::user::encode_user_info;
use log::info;

/// Settings pushed during initialization, in this order
pub const INITIAL_SETTINGS: [ConfigKey; 17] = [
    ConfigKey::DateDisplay,
    ConfigKey::TimeFormat,
    ConfigKey::UserInfo,
    ConfigKey::DistanceUnit,
    ConfigKey::WearLocation,
    ConfigKey::FitnessGoal,
    ConfigKey::DisplayItems,
    ConfigKey::DoNotDisturb,
    ConfigKey::RotateWrist,
    ConfigKey::DisplayOnLift,
    ConfigKey::DisplayCaller,
    ConfigKey::GoalNotification,
    ConfigKey::InactivityWarnings,
    ConfigKey::HeartRateSleepSupport,
    ConfigKey::DisconnectNotification,
    ConfigKey::ExposeHeartRate,
    ConfigKey::HeartRateInterval,
];

const SUPPORTED_DATE_FORMATS: [&str; 3] = ["MM/dd/yyyy", "dd.MM.yyyy", "dd/MM/yyyy"];
const MAX_HR_INTERVAL_MINUTES: u32 = 120;
const LOCALE_OFFSET: usize = 3;

pub fn date_display(display: DateTimeDisplay) -> Vec<u8> {
    match display {
        DateTimeDisplay::Time => DATEFORMAT_TIME.to_vec(),
        DateTimeDisplay::DateTime => DATEFORMAT_DATE_TIME.to_vec(),
    }
}

pub fn date_format(format: &str) -> Result<Vec<u8>> {
    if !SUPPORTED_DATE_FORMATS.contains(&format) {
        return Err(HuamiError::InvalidArgument(format!(
            "unsupported date format {}",
            format
        )));
    }
    let mut command = DATEFORMAT_DATE_MM_DD_YYYY;
    command[3..].copy_from_slice(format.as_bytes());
    Ok(command.to_vec())
}

pub fn time_format(use_24_hours: bool) -> Vec<u8> {
    if use_24_hours {
        DATEFORMAT_TIME_24_HOURS.to_vec()
    } else {
        DATEFORMAT_TIME_12_HOURS.to_vec()
    }
}

pub fn distance_unit(unit: DistanceUnit) -> Vec<u8> {
    match unit {
        DistanceUnit::Metric => COMMAND_DISTANCE_UNIT_METRIC.to_vec(),
        DistanceUnit::Imperial => COMMAND_DISTANCE_UNIT_IMPERIAL.to_vec(),
    }
}

pub fn wear_location(location: WearLocation) -> Vec<u8> {
    match location {
        WearLocation::LeftWrist => WEAR_LOCATION_LEFT_WRIST.to_vec(),
        WearLocation::RightWrist => WEAR_LOCATION_RIGHT_WRIST.to_vec(),
    }
}

pub fn fitness_goal(steps: u16) -> Vec<u8> {
    let mut command = COMMAND_SET_FITNESS_GOAL_START.to_vec();
    command.extend_from_slice(&steps.to_le_bytes());
    command.extend_from_slice(&COMMAND_SET_FITNESS_GOAL_END);
    command
}

pub fn display_items(items: &[DisplayItem]) -> Vec<u8> {
    let mut command = COMMAND_CHANGE_SCREENS;
    for item in items {
        command[SCREEN_CHANGE_BYTE] |= match item {
            DisplayItem::Steps => DISPLAY_ITEM_BIT_STEPS,
            DisplayItem::Distance => DISPLAY_ITEM_BIT_DISTANCE,
            DisplayItem::Calories => DISPLAY_ITEM_BIT_CALORIES,
            DisplayItem::HeartRate => DISPLAY_ITEM_BIT_HEART_RATE,
            DisplayItem::Battery => DISPLAY_ITEM_BIT_BATTERY,
        };
    }
    command.to_vec()
}

pub fn do_not_disturb(mode: DoNotDisturb, schedule: &Schedule) -> Vec<u8> {
    match mode {
        DoNotDisturb::Off => COMMAND_DO_NOT_DISTURB_OFF.to_vec(),
        DoNotDisturb::Automatic => COMMAND_DO_NOT_DISTURB_AUTOMATIC.to_vec(),
        DoNotDisturb::Scheduled => {
            let mut command = COMMAND_DO_NOT_DISTURB_SCHEDULED;
            command[DND_BYTE_START_HOURS] = schedule.start.hour;
            command[DND_BYTE_START_MINUTES] = schedule.start.minute;
            command[DND_BYTE_END_HOURS] = schedule.end.hour;
            command[DND_BYTE_END_MINUTES] = schedule.end.minute;
            command.to_vec()
        }
    }
}

pub fn rotate_wrist(enable: bool) -> Vec<u8> {
    if enable {
        COMMAND_ENABLE_ROTATE_WRIST_TO_SWITCH_INFO.to_vec()
    } else {
        COMMAND_DISABLE_ROTATE_WRIST_TO_SWITCH_INFO.to_vec()
    }
}

// schedule bytes are at 4..8 for both lift wrist and disconnect commands
fn with_schedule(mut command: [u8; 8], schedule: &Schedule) -> Vec<u8> {
    command[4] = schedule.start.hour;
    command[5] = schedule.start.minute;
    command[6] = schedule.end.hour;
    command[7] = schedule.end.minute;
    command.to_vec()
}

pub fn display_on_lift(mode: ScheduledSwitch, schedule: &Schedule) -> Vec<u8> {
    match mode {
        ScheduledSwitch::On => COMMAND_ENABLE_DISPLAY_ON_LIFT_WRIST.to_vec(),
        ScheduledSwitch::Off => COMMAND_DISABLE_DISPLAY_ON_LIFT_WRIST.to_vec(),
        ScheduledSwitch::Scheduled => with_schedule(COMMAND_SCHEDULE_DISPLAY_ON_LIFT_WRIST, schedule),
    }
}

pub fn display_caller() -> Vec<u8> {
    COMMAND_ENABLE_DISPLAY_CALLER.to_vec()
}

pub fn goal_notification(enable: bool) -> Vec<u8> {
    if enable {
        COMMAND_ENABLE_GOAL_NOTIFICATION.to_vec()
    } else {
        COMMAND_DISABLE_GOAL_NOTIFICATION.to_vec()
    }
}

/// With a DND period the warning window is split in two around it
pub fn inactivity_warnings(warnings: &InactivityWarnings) -> Vec<u8> {
    if !warnings.enabled {
        return COMMAND_DISABLE_INACTIVITY_WARNINGS.to_vec();
    }

    let mut command = COMMAND_ENABLE_INACTIVITY_WARNINGS;
    command[INACTIVITY_WARNINGS_THRESHOLD] = warnings.threshold_minutes;
    command[INACTIVITY_WARNINGS_INTERVAL_1_START_HOURS] = warnings.interval.start.hour;
    command[INACTIVITY_WARNINGS_INTERVAL_1_START_MINUTES] = warnings.interval.start.minute;

    match warnings.dnd {
        Some(dnd) => {
            command[INACTIVITY_WARNINGS_INTERVAL_1_END_HOURS] = dnd.start.hour;
            command[INACTIVITY_WARNINGS_INTERVAL_1_END_MINUTES] = dnd.start.minute;
            command[INACTIVITY_WARNINGS_INTERVAL_2_START_HOURS] = dnd.end.hour;
            command[INACTIVITY_WARNINGS_INTERVAL_2_START_MINUTES] = dnd.end.minute;
            command[INACTIVITY_WARNINGS_INTERVAL_2_END_HOURS] = warnings.interval.end.hour;
            command[INACTIVITY_WARNINGS_INTERVAL_2_END_MINUTES] = warnings.interval.end.minute;
        }
        None => {
            command[INACTIVITY_WARNINGS_INTERVAL_1_END_HOURS] = warnings.interval.end.hour;
            command[INACTIVITY_WARNINGS_INTERVAL_1_END_MINUTES] = warnings.interval.end.minute;
        }
    }
    command.to_vec()
}

pub fn heart_rate_sleep_support(enable: bool) -> Vec<u8> {
    if enable {
        COMMAND_ENABLE_HR_SLEEP_MEASUREMENT.to_vec()
    } else {
        COMMAND_DISABLE_HR_SLEEP_MEASUREMENT.to_vec()
    }
}

/// Whole minutes between periodic measurements, at most two hours
pub fn heart_rate_interval_minutes(seconds: u32) -> u8 {
    (seconds / 60).min(MAX_HR_INTERVAL_MINUTES) as u8
}

pub fn heart_rate_interval(seconds: u32) -> Vec<u8> {
    vec![
        COMMAND_SET_PERIODIC_HR_MEASUREMENT_INTERVAL,
        heart_rate_interval_minutes(seconds),
    ]
}

pub fn disconnect_notification(mode: ScheduledSwitch, schedule: &Schedule) -> Vec<u8> {
    match mode {
        ScheduledSwitch::On => COMMAND_ENABLE_DISCONNECT_NOTIFICATION.to_vec(),
        ScheduledSwitch::Off => COMMAND_DISABLE_DISCONNECT_NOTIFICATION.to_vec(),
        ScheduledSwitch::Scheduled => with_schedule(COMMAND_ENABLE_DISCONNECT_NOTIFICATION, schedule),
    }
}

pub fn expose_heart_rate(enable: bool) -> Vec<u8> {
    if enable {
        COMMAND_ENABLE_HR_CONNECTION.to_vec()
    } else {
        COMMAND_DISABLE_HR_CONNECTION.to_vec()
    }
}

/// Locale command; firmware predating the locale template only knows a few languages
pub fn language(locale: &str, capability: &DeviceCapability) -> Vec<u8> {
    if capability.uses_legacy_language_command {
        let command = match locale.get(..2) {
            Some("es") => COMMAND_SET_LANGUAGE_SPANISH,
            Some("zh") if locale == "zh_CN" => COMMAND_SET_LANGUAGE_SIMPLIFIED_CHINESE,
            Some("zh") => COMMAND_SET_LANGUAGE_TRADITIONAL_CHINESE,
            _ => COMMAND_SET_LANGUAGE_ENGLISH,
        };
        return command.to_vec();
    }

    let mut command = COMMAND_SET_LANGUAGE_NEW_TEMPLATE;
    let bytes = locale.as_bytes();
    let len = bytes.len().min(command.len() - LOCALE_OFFSET);
    command[LOCALE_OFFSET..LOCALE_OFFSET + len].copy_from_slice(&bytes[..len]);
    command.to_vec()
}

pub fn band_screen_unlock(enable: bool) -> Vec<u8> {
    if enable {
        COMMAND_ENABLE_BAND_SCREEN_UNLOCK.to_vec()
    } else {
        COMMAND_DISABLE_BAND_SCREEN_UNLOCK.to_vec()
    }
}

pub fn factory_reset() -> Vec<u8> {
    COMMAND_FACTORY_RESET.to_vec()
}

pub fn reboot() -> Vec<u8> {
    vec![COMMAND_FIRMWARE_REBOOT]
}

/// Characteristic and payload of one setting group
fn resolve(
    key: ConfigKey,
    settings: &DeviceSettings,
    capability: &DeviceCapability,
) -> Result<(Characteristic, Vec<u8>)> {
    let target = match key {
        ConfigKey::UserInfo | ConfigKey::WearLocation | ConfigKey::FitnessGoal => {
            Characteristic::UserSettings
        }
        ConfigKey::HeartRateSleepSupport | ConfigKey::HeartRateInterval => {
            Characteristic::HeartRateControlPoint
        }
        _ => Characteristic::Configuration,
    };

    let payload = match key {
        ConfigKey::DateDisplay => date_display(settings.date_display),
        ConfigKey::DateFormat => date_format(&settings.date_format)?,
        ConfigKey::TimeFormat => time_format(settings.use_24_hour_time),
        ConfigKey::UserInfo => encode_user_info(&settings.user)?,
        ConfigKey::DistanceUnit => distance_unit(settings.distance_unit),
        ConfigKey::WearLocation => wear_location(settings.wear_location),
        ConfigKey::FitnessGoal => fitness_goal(settings.steps_goal),
        ConfigKey::DisplayItems => display_items(&settings.display_items),
        ConfigKey::DoNotDisturb => {
            do_not_disturb(settings.do_not_disturb, &settings.do_not_disturb_schedule)
        }
        ConfigKey::RotateWrist => rotate_wrist(settings.rotate_wrist_to_switch_info),
        ConfigKey::DisplayOnLift => {
            display_on_lift(settings.display_on_lift, &settings.display_on_lift_schedule)
        }
        ConfigKey::DisplayCaller => display_caller(),
        ConfigKey::GoalNotification => goal_notification(settings.goal_notification),
        ConfigKey::InactivityWarnings => inactivity_warnings(&settings.inactivity_warnings),
        ConfigKey::HeartRateSleepSupport => {
            heart_rate_sleep_support(settings.heart_rate_sleep_support)
        }
        ConfigKey::DisconnectNotification => disconnect_notification(
            settings.disconnect_notification,
            &settings.disconnect_notification_schedule,
        ),
        ConfigKey::ExposeHeartRate => expose_heart_rate(settings.expose_heart_rate_third_party),
        ConfigKey::HeartRateInterval => heart_rate_interval(settings.heart_rate_interval_secs),
        ConfigKey::Language => language(settings.locale(), capability),
        ConfigKey::BandScreenUnlock => band_screen_unlock(settings.band_screen_unlock),
    };
    Ok((target, payload))
}

/// Append the write for `key` to `transaction`
///
/// Returns `Unsupported` when the device lacks the target characteristic and
/// `PreconditionNotMet`/`InvalidArgument` when the setting cannot be encoded; in both cases
/// nothing is appended.
pub fn append_setting(
    transaction: &mut Transaction,
    ble: &dyn BleSupport,
    settings: &DeviceSettings,
    capability: &DeviceCapability,
    key: ConfigKey,
) -> Result<()> {
    let (target, payload) = resolve(key, settings, capability)?;
    let handle = lookup(ble, target)
        .ok_or_else(|| HuamiError::Unsupported(format!("{:?} characteristic missing", target)))?;

    info!("Setting {}", key);
    // these characteristics only accept writes while notifications are on
    let wrap_notify = matches!(
        key,
        ConfigKey::WearLocation | ConfigKey::HeartRateSleepSupport | ConfigKey::HeartRateInterval
    );
    if wrap_notify {
        transaction.notify(&handle, true);
    }
    transaction.write(&handle, &payload);
    if wrap_notify {
        transaction.notify(&handle, false);
    }
    Ok(())
}
