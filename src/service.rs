//! Characteristic UUIDs and fixed command byte sequences of the Huami service
//!
//! Command templates that get patched before sending (schedules, thresholds) are exposed as
//! arrays so callers copy them and fill in the variable bytes.

/// Base UUID format for Huami proprietary characteristics
pub const HUAMI_BASE_UUID_FORMAT: &str = "0000%04X-0000-3512-2118-0009af100700";

/// Base UUID format for Bluetooth SIG assigned characteristics
pub const SIG_BASE_UUID_FORMAT: &str = "0000%04X-0000-1000-8000-00805f9b34fb";

pub fn huami_uuid(short: u16) -> String {
    HUAMI_BASE_UUID_FORMAT.replace("%04X", &format!("{:04x}", short))
}

pub fn sig_uuid(short: u16) -> String {
    SIG_BASE_UUID_FORMAT.replace("%04X", &format!("{:04x}", short))
}

/// Characteristics the driver talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Configuration,
    BatteryInfo,
    RealtimeSteps,
    UserSettings,
    Auth,
    DeviceEvent,
    Audio,
    AudioData,
    ChunkedTransfer,
    Weather,
    Firmware,
    Notification,
    CurrentTime,
    AlertLevel,
    NewAlert,
    HeartRateMeasurement,
    HeartRateControlPoint,
    HardwareRevision,
    FirmwareRevision,
    SoftwareRevision,
}

impl Characteristic {
    pub fn uuid(self) -> String {
        match self {
            Characteristic::Configuration => huami_uuid(0x0003),
            Characteristic::BatteryInfo => huami_uuid(0x0006),
            Characteristic::RealtimeSteps => huami_uuid(0x0007),
            Characteristic::UserSettings => huami_uuid(0x0008),
            Characteristic::Auth => huami_uuid(0x0009),
            Characteristic::DeviceEvent => huami_uuid(0x0010),
            Characteristic::Audio => huami_uuid(0x0012),
            Characteristic::AudioData => huami_uuid(0x0013),
            Characteristic::ChunkedTransfer => huami_uuid(0x0020),
            Characteristic::Weather => huami_uuid(0x000e),
            Characteristic::Firmware => huami_uuid(0x1531),
            Characteristic::Notification => sig_uuid(0xff03),
            Characteristic::CurrentTime => sig_uuid(0x2a2b),
            Characteristic::AlertLevel => sig_uuid(0x2a06),
            Characteristic::NewAlert => sig_uuid(0x2a46),
            Characteristic::HeartRateMeasurement => sig_uuid(0x2a37),
            Characteristic::HeartRateControlPoint => sig_uuid(0x2a39),
            Characteristic::HardwareRevision => sig_uuid(0x2a27),
            Characteristic::FirmwareRevision => sig_uuid(0x2a26),
            Characteristic::SoftwareRevision => sig_uuid(0x2a28),
        }
    }

    /// Reverse lookup used to route inbound payloads
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        const ALL: [Characteristic; 20] = [
            Characteristic::Configuration,
            Characteristic::BatteryInfo,
            Characteristic::RealtimeSteps,
            Characteristic::UserSettings,
            Characteristic::Auth,
            Characteristic::DeviceEvent,
            Characteristic::Audio,
            Characteristic::AudioData,
            Characteristic::ChunkedTransfer,
            Characteristic::Weather,
            Characteristic::Firmware,
            Characteristic::Notification,
            Characteristic::CurrentTime,
            Characteristic::AlertLevel,
            Characteristic::NewAlert,
            Characteristic::HeartRateMeasurement,
            Characteristic::HeartRateControlPoint,
            Characteristic::HardwareRevision,
            Characteristic::FirmwareRevision,
            Characteristic::SoftwareRevision,
        ];
        ALL.iter()
            .copied()
            .find(|c| c.uuid().eq_ignore_ascii_case(uuid))
    }
}

// Auth
pub const AUTH_SEND_KEY: u8 = 0x01;
pub const AUTH_REQUEST_RANDOM_AUTH_NUMBER: u8 = 0x02;
pub const AUTH_SEND_ENCRYPTED_AUTH_NUMBER: u8 = 0x03;
pub const AUTH_RESPONSE: u8 = 0x10;
pub const AUTH_SUCCESS: u8 = 0x01;
pub const AUTH_BYTE: u8 = 0x00;

// Alert levels written to the alert level characteristic
pub const NO_ALERT: u8 = 0x00;
pub const MILD_ALERT: u8 = 0x01;

// Heart rate control point
pub const COMMAND_SET_HR_CONTINUOUS: u8 = 0x01;
pub const COMMAND_SET_HR_MANUAL: u8 = 0x02;
pub const START_HR_MEASUREMENT_MANUAL: [u8; 3] = [0x15, COMMAND_SET_HR_MANUAL, 1];
pub const STOP_HR_MEASUREMENT_MANUAL: [u8; 3] = [0x15, COMMAND_SET_HR_MANUAL, 0];
pub const START_HR_MEASUREMENT_CONTINUOUS: [u8; 3] = [0x15, COMMAND_SET_HR_CONTINUOUS, 1];
pub const STOP_HR_MEASUREMENT_CONTINUOUS: [u8; 3] = [0x15, COMMAND_SET_HR_CONTINUOUS, 0];
pub const COMMAND_ENABLE_HR_SLEEP_MEASUREMENT: [u8; 3] = [0x15, 0x00, 0x01];
pub const COMMAND_DISABLE_HR_SLEEP_MEASUREMENT: [u8; 3] = [0x15, 0x00, 0x00];
pub const COMMAND_SET_PERIODIC_HR_MEASUREMENT_INTERVAL: u8 = 0x14;

// User settings characteristic
pub const COMMAND_SET_USERINFO: u8 = 0x4f;
pub const COMMAND_SET_FITNESS_GOAL_START: [u8; 3] = [0x10, 0x00, 0x00];
pub const COMMAND_SET_FITNESS_GOAL_END: [u8; 2] = [0x00, 0x00];
pub const WEAR_LOCATION_LEFT_WRIST: [u8; 4] = [0x20, 0x00, 0x00, 0x02];
pub const WEAR_LOCATION_RIGHT_WRIST: [u8; 4] = [0x20, 0x00, 0x00, 0x82];

// Configuration characteristic
pub const ENDPOINT_DISPLAY: u8 = 0x06;
pub const ENDPOINT_DISPLAY_ITEMS: u8 = 0x0a;
pub const COMMAND_ALARM: u8 = 0x02;
pub const DATEFORMAT_TIME: [u8; 4] = [ENDPOINT_DISPLAY, 0x0a, 0x00, 0x00];
pub const DATEFORMAT_DATE_TIME: [u8; 4] = [ENDPOINT_DISPLAY, 0x0a, 0x00, 0x03];
pub const DATEFORMAT_DATE_MM_DD_YYYY: [u8; 13] = [
    ENDPOINT_DISPLAY,
    0x1e,
    0x00,
    b'M',
    b'M',
    b'/',
    b'd',
    b'd',
    b'/',
    b'y',
    b'y',
    b'y',
    b'y',
];
pub const DATEFORMAT_TIME_12_HOURS: [u8; 4] = [ENDPOINT_DISPLAY, 0x02, 0x00, 0x00];
pub const DATEFORMAT_TIME_24_HOURS: [u8; 4] = [ENDPOINT_DISPLAY, 0x02, 0x00, 0x01];
pub const COMMAND_ENABLE_HR_CONNECTION: [u8; 4] = [ENDPOINT_DISPLAY, 0x01, 0x00, 0x01];
pub const COMMAND_DISABLE_HR_CONNECTION: [u8; 4] = [ENDPOINT_DISPLAY, 0x01, 0x00, 0x00];
pub const COMMAND_DISTANCE_UNIT_METRIC: [u8; 4] = [ENDPOINT_DISPLAY, 0x03, 0x00, 0x00];
pub const COMMAND_DISTANCE_UNIT_IMPERIAL: [u8; 4] = [ENDPOINT_DISPLAY, 0x03, 0x00, 0x01];
pub const COMMAND_ENABLE_DISPLAY_ON_LIFT_WRIST: [u8; 4] = [ENDPOINT_DISPLAY, 0x05, 0x00, 0x01];
pub const COMMAND_DISABLE_DISPLAY_ON_LIFT_WRIST: [u8; 4] = [ENDPOINT_DISPLAY, 0x05, 0x00, 0x00];
pub const COMMAND_SCHEDULE_DISPLAY_ON_LIFT_WRIST: [u8; 8] =
    [ENDPOINT_DISPLAY, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
pub const COMMAND_ENABLE_GOAL_NOTIFICATION: [u8; 4] = [ENDPOINT_DISPLAY, 0x06, 0x00, 0x01];
pub const COMMAND_DISABLE_GOAL_NOTIFICATION: [u8; 4] = [ENDPOINT_DISPLAY, 0x06, 0x00, 0x00];
pub const COMMAND_FACTORY_RESET: [u8; 4] = [ENDPOINT_DISPLAY, 0x0b, 0x00, 0x01];
pub const COMMAND_ENABLE_DISCONNECT_NOTIFICATION: [u8; 8] =
    [ENDPOINT_DISPLAY, 0x0c, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
pub const COMMAND_DISABLE_DISCONNECT_NOTIFICATION: [u8; 8] =
    [ENDPOINT_DISPLAY, 0x0c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const COMMAND_ENABLE_ROTATE_WRIST_TO_SWITCH_INFO: [u8; 4] =
    [ENDPOINT_DISPLAY, 0x0d, 0x00, 0x01];
pub const COMMAND_DISABLE_ROTATE_WRIST_TO_SWITCH_INFO: [u8; 4] =
    [ENDPOINT_DISPLAY, 0x0d, 0x00, 0x00];
pub const COMMAND_ACK_FIND_PHONE_IN_PROGRESS: [u8; 4] = [ENDPOINT_DISPLAY, 0x14, 0x00, 0x00];
pub const COMMAND_ENABLE_DISPLAY_CALLER: [u8; 5] = [ENDPOINT_DISPLAY, 0x10, 0x00, 0x00, 0x01];
pub const COMMAND_ENABLE_BAND_SCREEN_UNLOCK: [u8; 4] = [ENDPOINT_DISPLAY, 0x16, 0x00, 0x01];
pub const COMMAND_DISABLE_BAND_SCREEN_UNLOCK: [u8; 4] = [ENDPOINT_DISPLAY, 0x16, 0x00, 0x00];
pub const COMMAND_SET_LANGUAGE_NEW_TEMPLATE: [u8; 8] =
    [ENDPOINT_DISPLAY, 0x3b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const COMMAND_SET_LANGUAGE_SIMPLIFIED_CHINESE: [u8; 4] = [ENDPOINT_DISPLAY, 0x13, 0x00, 0x00];
pub const COMMAND_SET_LANGUAGE_TRADITIONAL_CHINESE: [u8; 4] =
    [ENDPOINT_DISPLAY, 0x13, 0x00, 0x01];
pub const COMMAND_SET_LANGUAGE_ENGLISH: [u8; 4] = [ENDPOINT_DISPLAY, 0x13, 0x00, 0x02];
pub const COMMAND_SET_LANGUAGE_SPANISH: [u8; 4] = [ENDPOINT_DISPLAY, 0x13, 0x00, 0x03];

pub const COMMAND_DO_NOT_DISTURB_AUTOMATIC: [u8; 2] = [0x09, 0x83];
pub const COMMAND_DO_NOT_DISTURB_OFF: [u8; 2] = [0x09, 0x82];
pub const COMMAND_DO_NOT_DISTURB_SCHEDULED: [u8; 6] = [0x09, 0x81, 0x01, 0x00, 0x06, 0x00];
pub const DND_BYTE_START_HOURS: usize = 2;
pub const DND_BYTE_START_MINUTES: usize = 3;
pub const DND_BYTE_END_HOURS: usize = 4;
pub const DND_BYTE_END_MINUTES: usize = 5;

pub const COMMAND_ENABLE_INACTIVITY_WARNINGS: [u8; 12] =
    [0x08, 0x01, 0x3c, 0x00, 0x04, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const COMMAND_DISABLE_INACTIVITY_WARNINGS: [u8; 12] =
    [0x08, 0x00, 0x3c, 0x00, 0x04, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const INACTIVITY_WARNINGS_THRESHOLD: usize = 2;
pub const INACTIVITY_WARNINGS_INTERVAL_1_START_HOURS: usize = 4;
pub const INACTIVITY_WARNINGS_INTERVAL_1_START_MINUTES: usize = 5;
pub const INACTIVITY_WARNINGS_INTERVAL_1_END_HOURS: usize = 6;
pub const INACTIVITY_WARNINGS_INTERVAL_1_END_MINUTES: usize = 7;
pub const INACTIVITY_WARNINGS_INTERVAL_2_START_HOURS: usize = 8;
pub const INACTIVITY_WARNINGS_INTERVAL_2_START_MINUTES: usize = 9;
pub const INACTIVITY_WARNINGS_INTERVAL_2_END_HOURS: usize = 10;
pub const INACTIVITY_WARNINGS_INTERVAL_2_END_MINUTES: usize = 11;

pub const COMMAND_CHANGE_SCREENS: [u8; 10] =
    [ENDPOINT_DISPLAY_ITEMS, 0x01, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
pub const SCREEN_CHANGE_BYTE: usize = 1;
pub const DISPLAY_ITEM_BIT_STEPS: u8 = 0x02;
pub const DISPLAY_ITEM_BIT_DISTANCE: u8 = 0x04;
pub const DISPLAY_ITEM_BIT_CALORIES: u8 = 0x08;
pub const DISPLAY_ITEM_BIT_HEART_RATE: u8 = 0x10;
pub const DISPLAY_ITEM_BIT_BATTERY: u8 = 0x20;

// Firmware characteristic
pub const COMMAND_FIRMWARE_REBOOT: u8 = 0x05;
