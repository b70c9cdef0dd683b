//! Notification strategies
//!
//! Older firmware can only vibrate: the legacy strategy toggles the alert level characteristic
//! following a vibration profile. Newer firmware renders text written to the New Alert
//! characteristic. Which one is used depends on the firmware version and a user preference.
//!
//! Calls, alarm clocks and find-device repeat until cancelled. The repeats carry an abort
//! checkpoint that the transport evaluates before each iteration.

use crate::capability::DeviceCapability;
use crate::service::{Characteristic, NO_ALERT};
use crate::transport::{lookup, AbortPredicate, BleSupport, Transaction};
use crate::types::{HuamiError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Longest single vibration the band accepts
const MAX_VIBRATION_ON_MS: u32 = 500;
/// Shortest gap between two vibrations
const MIN_VIBRATION_OFF_MS: u32 = 25;
const MAX_TEXT_LENGTH: usize = 230;
const MAX_SUBJECT_CHARS: usize = 40;
const MAX_BODY_CHARS: usize = 40;

/// Value written to the alert level characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    None,
    Message,
    PhoneCall,
    VibrateOnly,
}

impl AlertLevel {
    pub fn to_u8(&self) -> u8 {
        match self {
            AlertLevel::None => 0,
            AlertLevel::Message => 1,
            AlertLevel::PhoneCall => 2,
            AlertLevel::VibrateOnly => 3,
        }
    }
}

/// Bluetooth SIG alert categories used on New Alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    Simple,
    Email,
    News,
    IncomingCall,
    MissedCall,
    Sms,
    VoiceMail,
    Schedule,
    HighPriorityAlert,
    InstantMessage,
}

impl AlertCategory {
    pub fn to_u8(&self) -> u8 {
        match self {
            AlertCategory::Simple => 0,
            AlertCategory::Email => 1,
            AlertCategory::News => 2,
            AlertCategory::IncomingCall => 3,
            AlertCategory::MissedCall => 4,
            AlertCategory::Sms => 5,
            AlertCategory::VoiceMail => 6,
            AlertCategory::Schedule => 7,
            AlertCategory::HighPriorityAlert => 8,
            AlertCategory::InstantMessage => 9,
        }
    }
}

/// Source of a notification, keys the per-origin vibration preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOrigin {
    Generic,
    Sms,
    Email,
    Chat,
    Social,
    Navigation,
    IncomingCall,
    AlarmClock,
}

impl fmt::Display for NotificationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationOrigin::Generic => write!(f, "generic"),
            NotificationOrigin::Sms => write!(f, "generic_sms"),
            NotificationOrigin::Email => write!(f, "generic_email"),
            NotificationOrigin::Chat => write!(f, "generic_chat"),
            NotificationOrigin::Social => write!(f, "generic_social"),
            NotificationOrigin::Navigation => write!(f, "generic_navigation"),
            NotificationOrigin::IncomingCall => write!(f, "incoming_call"),
            NotificationOrigin::AlarmClock => write!(f, "alarm_clock"),
        }
    }
}

/// Type of an application notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Unknown,
    Generic,
    Sms,
    Email,
    Chat,
    Social,
    Navigation,
    AlarmClock,
}

impl NotificationType {
    pub fn origin(&self) -> NotificationOrigin {
        match self {
            NotificationType::Unknown | NotificationType::Generic => NotificationOrigin::Generic,
            NotificationType::Sms => NotificationOrigin::Sms,
            NotificationType::Email => NotificationOrigin::Email,
            NotificationType::Chat => NotificationOrigin::Chat,
            NotificationType::Social => NotificationOrigin::Social,
            NotificationType::Navigation => NotificationOrigin::Navigation,
            NotificationType::AlarmClock => NotificationOrigin::AlarmClock,
        }
    }

    pub fn alert_category(&self) -> AlertCategory {
        match self {
            NotificationType::Sms => AlertCategory::Sms,
            NotificationType::Email => AlertCategory::Email,
            NotificationType::Chat => AlertCategory::InstantMessage,
            NotificationType::Social => AlertCategory::News,
            NotificationType::AlarmClock => AlertCategory::HighPriorityAlert,
            _ => AlertCategory::Simple,
        }
    }

    pub fn alert_level(&self) -> AlertLevel {
        match self {
            NotificationType::Unknown | NotificationType::AlarmClock => AlertLevel::VibrateOnly,
            _ => AlertLevel::Message,
        }
    }
}

/// Application notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub id: i32,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        shortened.push('…');
        shortened
    }
}

impl NotificationSpec {
    /// Subject line and body, each shortened for the small display
    pub fn preferred_text(&self) -> String {
        let subject = self
            .sender
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.title.as_deref())
            .unwrap_or("");
        let body = self.body.as_deref().unwrap_or("");

        [ellipsize(subject.trim(), MAX_SUBJECT_CHARS), ellipsize(body.trim(), MAX_BODY_CHARS)]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Message text plus category, as rendered by the band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleNotification {
    pub message: String,
    pub category: AlertCategory,
}

impl SimpleNotification {
    pub fn new(message: impl Into<String>, category: AlertCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallCommand {
    Incoming,
    Outgoing,
    Accept,
    Reject,
    Start,
    End,
}

/// Phone call state change reported by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
    pub command: CallCommand,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

impl CallSpec {
    pub fn new(command: CallCommand) -> Self {
        Self {
            command,
            name: None,
            number: None,
        }
    }

    /// Caller name, or the number for unknown callers
    pub fn preferred_text(&self) -> String {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.number.as_deref())
            .unwrap_or("")
            .to_string()
    }
}

/// How the band vibrates for one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibrationProfile {
    pub id: String,
    /// Pairs of (vibrate ms, pause ms)
    pub on_off: Vec<(u32, u32)>,
    pub repeat: u16,
    pub alert_level: AlertLevel,
}

impl VibrationProfile {
    pub const STACCATO: &'static str = "staccato";
    pub const SHORT: &'static str = "short";
    pub const MEDIUM: &'static str = "medium";
    pub const LONG: &'static str = "long";
    pub const WATERDROP: &'static str = "waterdrop";
    pub const RING: &'static str = "ring";
    pub const ALARM_CLOCK: &'static str = "alarm_clock";

    /// Named profile, unknown names fall back to `medium`
    pub fn by_name(id: &str, repeat: u16) -> Self {
        let (id, on_off) = match id {
            Self::STACCATO => (Self::STACCATO, vec![(100, 0)]),
            Self::SHORT => (Self::SHORT, vec![(200, 200)]),
            Self::LONG => (Self::LONG, vec![(500, 1000)]),
            Self::WATERDROP => (Self::WATERDROP, vec![(100, 1500)]),
            Self::RING => (Self::RING, vec![(300, 200), (600, 2000)]),
            Self::ALARM_CLOCK => (
                Self::ALARM_CLOCK,
                vec![(30, 35), (30, 35), (30, 35), (30, 800)],
            ),
            _ => (Self::MEDIUM, vec![(300, 600)]),
        };
        Self {
            id: id.to_string(),
            on_off,
            repeat: repeat.min(i16::MAX as u16),
            alert_level: AlertLevel::Message,
        }
    }

    pub fn with_alert_level(mut self, alert_level: AlertLevel) -> Self {
        self.alert_level = alert_level;
        self
    }
}

/// Cancellation of a repeating notification
#[derive(Clone)]
pub struct AbortCondition {
    pub should_abort: AbortPredicate,
    /// Silence the band when aborting
    pub stop_alert: bool,
}

impl AbortCondition {
    /// Abort as soon as `flag` is cleared
    pub fn when_cleared(flag: Arc<AtomicBool>, stop_alert: bool) -> Self {
        Self {
            should_abort: Arc::new(move || !flag.load(Ordering::SeqCst)),
            stop_alert,
        }
    }
}

impl fmt::Debug for AbortCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortCondition")
            .field("aborted", &(self.should_abort)())
            .field("stop_alert", &self.stop_alert)
            .finish()
    }
}

/// A text alert on its way to the band
pub struct PendingAlert {
    pub characteristic: Characteristic,
    pub payload: Vec<u8>,
    pub abort: Option<AbortCondition>,
}

impl PendingAlert {
    pub fn text(notification: &SimpleNotification, abort: Option<AbortCondition>) -> Self {
        // only SMS and incoming calls render text on the band
        let category = match notification.category {
            AlertCategory::IncomingCall => AlertCategory::IncomingCall,
            _ => AlertCategory::Sms,
        };
        let mut payload = vec![category.to_u8(), 1];
        payload.extend_from_slice(truncate_utf8(&notification.message, MAX_TEXT_LENGTH).as_bytes());
        Self {
            characteristic: Characteristic::NewAlert,
            payload,
            abort,
        }
    }

    fn append_to(&self, transaction: &mut Transaction, ble: &dyn BleSupport) -> Result<()> {
        let handle = lookup(ble, self.characteristic).ok_or_else(|| {
            HuamiError::Unsupported(format!("{:?} characteristic missing", self.characteristic))
        })?;
        add_abort_check(transaction, ble, self.abort.as_ref());
        transaction.write(&handle, &self.payload);
        Ok(())
    }
}

fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn add_abort_check(transaction: &mut Transaction, ble: &dyn BleSupport, abort: Option<&AbortCondition>) {
    if let Some(abort) = abort {
        let on_abort = if abort.stop_alert {
            lookup(ble, Characteristic::AlertLevel).map(|handle| (handle, vec![NO_ALERT]))
        } else {
            None
        };
        transaction.abort_if(abort.should_abort.clone(), on_abort);
    }
}

/// Wire encoding used for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStrategy {
    /// Vibration only, via the alert level characteristic
    Legacy,
    /// Text via New Alert
    Text,
}

impl NotificationStrategy {
    /// Firmware below the family minimum always gets the legacy strategy
    pub fn select(capability: &DeviceCapability, text_enabled: bool) -> Self {
        if capability.supports_text_notifications && text_enabled {
            NotificationStrategy::Text
        } else {
            NotificationStrategy::Legacy
        }
    }

    /// Append the notification to `transaction`
    pub fn send(
        &self,
        transaction: &mut Transaction,
        ble: &dyn BleSupport,
        profile: &VibrationProfile,
        notification: Option<&SimpleNotification>,
        abort: Option<AbortCondition>,
    ) -> Result<()> {
        if *self == NotificationStrategy::Text && profile.alert_level != AlertLevel::VibrateOnly {
            if let Some(notification) = notification {
                let is_call = notification.category == AlertCategory::IncomingCall;
                if is_call || !notification.message.is_empty() {
                    match PendingAlert::text(notification, abort.clone()).append_to(transaction, ble) {
                        Err(HuamiError::Unsupported(reason)) => {
                            debug!("Text alert not possible ({}), vibrating instead", reason);
                        }
                        other => return other,
                    }
                }
            }
        }
        send_vibration(transaction, ble, profile, abort.as_ref())
    }

    /// Silence whatever the band is currently alerting
    pub fn stop_current(&self, transaction: &mut Transaction, ble: &dyn BleSupport) -> Result<()> {
        let alert = lookup(ble, Characteristic::AlertLevel).ok_or_else(|| {
            HuamiError::Unsupported("alert level characteristic missing".to_string())
        })?;
        transaction.write(&alert, &[NO_ALERT]);
        Ok(())
    }
}

fn send_vibration(
    transaction: &mut Transaction,
    ble: &dyn BleSupport,
    profile: &VibrationProfile,
    abort: Option<&AbortCondition>,
) -> Result<()> {
    let alert = lookup(ble, Characteristic::AlertLevel).ok_or_else(|| {
        HuamiError::Unsupported("alert level characteristic missing".to_string())
    })?;

    info!(
        "Vibrating with profile {} ({} times)",
        profile.id, profile.repeat
    );
    for _ in 0..profile.repeat {
        add_abort_check(transaction, ble, abort);
        for &(on, off) in &profile.on_off {
            transaction.write(&alert, &[profile.alert_level.to_u8()]);
            transaction.wait(Duration::from_millis(on.min(MAX_VIBRATION_ON_MS) as u64));
            transaction.write(&alert, &[NO_ALERT]);
            transaction.wait(Duration::from_millis(off.max(MIN_VIBRATION_OFF_MS) as u64));
        }
    }
    Ok(())
}
