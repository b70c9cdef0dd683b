//! Alarm slots
//!
//! Alarms live in numbered slots on the band. A set of upcoming calendar events can be mirrored
//! into reserved slots as disabled single-shot alarms so they show up in the band's alarm list.

use crate::capability::DeviceCapability;
use crate::service::COMMAND_ALARM;
use crate::types::{HuamiError, Result};
use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

const ENABLED_BASE: u8 = 128;
const SINGLE_SHOT_MASK: u8 = 128;
const MAX_CALENDAR_SLOTS: usize = 3;

/// Weekday repeat bits, Monday is bit 0
pub const MONDAY: u8 = 0x01;
pub const TUESDAY: u8 = 0x02;
pub const WEDNESDAY: u8 = 0x04;
pub const THURSDAY: u8 = 0x08;
pub const FRIDAY: u8 = 0x10;
pub const SATURDAY: u8 = 0x20;
pub const SUNDAY: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub slot: u8,
    pub enabled: bool,
    pub hour: u8,
    pub minute: u8,
    /// Weekday bits, 0 for a single-shot alarm
    pub repetition: u8,
}

impl Alarm {
    pub fn is_repetitive(&self) -> bool {
        self.repetition != 0
    }

    pub fn single_shot<Tz: TimeZone>(slot: u8, enabled: bool, at: &DateTime<Tz>) -> Self {
        Self {
            slot,
            enabled,
            hour: at.hour() as u8,
            minute: at.minute() as u8,
            repetition: 0,
        }
    }
}

/// Encode one alarm, failing when the slot does not exist on this device
pub fn encode_alarm(alarm: &Alarm, capability: &DeviceCapability) -> Result<Vec<u8>> {
    if alarm.slot >= capability.alarm_slot_count {
        return Err(HuamiError::PreconditionNotMet(format!(
            "Only {} alarms are currently supported",
            capability.alarm_slot_count
        )));
    }
    if alarm.hour > 23 || alarm.minute > 59 {
        return Err(HuamiError::InvalidArgument(format!(
            "alarm time {}:{} out of range",
            alarm.hour, alarm.minute
        )));
    }

    let base = if alarm.enabled { ENABLED_BASE } else { 0 };
    let mask = if alarm.is_repetitive() {
        alarm.repetition
    } else {
        SINGLE_SHOT_MASK
    };
    Ok(vec![
        COMMAND_ALARM,
        base + alarm.slot,
        alarm.hour,
        alarm.minute,
        mask,
    ])
}

/// Disabled single-shot alarms for the first upcoming events, filling slots 2, 1, 0
pub fn calendar_alarms<Tz: TimeZone>(events: &[DateTime<Tz>], reserved_slots: usize) -> Vec<Alarm> {
    events
        .iter()
        .take(reserved_slots.min(MAX_CALENDAR_SLOTS))
        .enumerate()
        .map(|(i, begin)| Alarm::single_shot((MAX_CALENDAR_SLOTS - 1 - i) as u8, false, begin))
        .collect()
}
