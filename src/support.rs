//! Session facade
//!
//! [`HuamiSupport`] owns everything that lives for one connection: the initialization sequencer,
//! the capability snapshot, buffered music state, the cancellation flags of repeating alerts,
//! the realtime sample bridge and the button debouncer. Application intents are `async fn`s that
//! build one [`Transaction`] each and queue it on the transport; inbound characteristic values
//! are routed through [`HuamiSupport::on_characteristic_changed`] and
//! [`HuamiSupport::on_characteristic_read`].

use crate::alarm::{calendar_alarms, encode_alarm, Alarm};
use crate::battery::decode_battery_info;
use crate::button::{system_clock, ButtonDebouncer, Clock};
use crate::calendar::{upcoming_starts, CalendarSource};
use crate::capability::{DeviceCapability, DeviceFamily};
use crate::chunked::{write_chunked, TYPE_MUSIC, TYPE_WEATHER};
use crate::config::{ButtonSettings, ConfigKey, DeviceSettings};
use crate::events::{decode_band_event, BandEvent, DeviceEvent, DeviceEventCallback, FindPhone};
use crate::init::{AuthCipher, AuthParams, AuthProgress, InitializationSequencer, SessionState};
use crate::music::{encode_music_state, MusicSpec, MusicStateSpec};
use crate::notification::{
    AbortCondition, AlertCategory, AlertLevel, CallCommand, CallSpec, NotificationOrigin,
    NotificationSpec, NotificationStrategy, NotificationType, SimpleNotification,
    VibrationProfile,
};
use crate::realtime::{
    decode_heart_rate, decode_realtime_steps, RealtimeSampleBridge, SampleStore,
    DEFAULT_SAMPLE_INTERVAL,
};
use crate::service::*;
use crate::settings::{self, append_setting};
use crate::time::{encode_time, TimePrecision};
use crate::transport::{lookup, BleSupport, CharacteristicHandle, Transaction};
use crate::weather::{encode_weather, WeatherOptions, WeatherSpec};
use crate::types::{hex_dump, HuamiError, Result};
use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const FIND_DEVICE_REPEAT: u16 = 255;
const FIND_DEVICE_MESSAGE: &str = "You found it!";

/// Firmware update transfer, owned by the application
#[async_trait::async_trait]
pub trait FirmwareInstaller: Send + Sync {
    async fn install(&self, ble: &dyn BleSupport, path: &Path) -> Result<()>;
}

struct SupportState {
    capability: DeviceCapability,
    settings: DeviceSettings,
    music_spec: Option<MusicSpec>,
    music_state: Option<MusicStateSpec>,
    music_app_started: bool,
    heart_rate_notify_enabled: bool,
    hardware_revision: Option<String>,
    firmware_revision: Option<String>,
}

pub struct HuamiSupport {
    ble: Arc<dyn BleSupport>,
    family: DeviceFamily,
    callback: Arc<dyn DeviceEventCallback>,
    // only the initialization and auth paths lock this, across transport queueing
    sequencer: Mutex<InitializationSequencer>,
    state: Mutex<SupportState>,
    telephone_ringing: Arc<AtomicBool>,
    alarm_clock_ringing: Arc<AtomicBool>,
    locating_device: Arc<AtomicBool>,
    realtime: RealtimeSampleBridge,
    clock: Clock,
    button: Mutex<ButtonDebouncer>,
    calendar: Option<Arc<dyn CalendarSource>>,
    firmware: Option<Arc<dyn FirmwareInstaller>>,
}

impl HuamiSupport {
    pub fn new(
        ble: Arc<dyn BleSupport>,
        capability: DeviceCapability,
        settings: DeviceSettings,
        callback: Arc<dyn DeviceEventCallback>,
        store: Arc<dyn SampleStore>,
        cipher: Arc<dyn AuthCipher>,
    ) -> Self {
        let clock = system_clock();
        let button = ButtonDebouncer::new(
            settings.button.clone(),
            clock.clone(),
            callback.clone(),
            ble.clone(),
        );
        Self {
            family: capability.family,
            realtime: RealtimeSampleBridge::new(store, callback.clone(), DEFAULT_SAMPLE_INTERVAL),
            sequencer: Mutex::new(InitializationSequencer::new(cipher, AuthParams::default())),
            state: Mutex::new(SupportState {
                capability,
                settings,
                music_spec: None,
                music_state: None,
                music_app_started: false,
                heart_rate_notify_enabled: false,
                hardware_revision: None,
                firmware_revision: None,
            }),
            telephone_ringing: Arc::new(AtomicBool::new(false)),
            alarm_clock_ringing: Arc::new(AtomicBool::new(false)),
            locating_device: Arc::new(AtomicBool::new(false)),
            clock,
            button: Mutex::new(button),
            calendar: None,
            firmware: None,
            callback,
            ble,
        }
    }

    pub fn with_auth_params(mut self, cipher: Arc<dyn AuthCipher>, params: AuthParams) -> Self {
        *self.sequencer.get_mut() = InitializationSequencer::new(cipher, params);
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarSource>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_firmware_installer(mut self, installer: Arc<dyn FirmwareInstaller>) -> Self {
        self.firmware = Some(installer);
        self
    }

    /// Replace the clock used for button press timing
    pub fn with_clock(mut self, clock: Clock) -> Self {
        let button_settings = self.state.get_mut().settings.button.clone();
        self.clock = clock;
        let button = self.debouncer(button_settings);
        *self.button.get_mut() = button;
        self
    }

    fn debouncer(&self, button_settings: ButtonSettings) -> ButtonDebouncer {
        ButtonDebouncer::new(
            button_settings,
            self.clock.clone(),
            self.callback.clone(),
            self.ble.clone(),
        )
    }

    pub async fn capability(&self) -> DeviceCapability {
        self.state.lock().await.capability.clone()
    }

    pub async fn session_state(&self) -> SessionState {
        self.sequencer.lock().await.state()
    }

    /// Swap in new preferences; a changed button configuration drops any pending action
    pub async fn update_settings(&self, settings: DeviceSettings) {
        let button_changed = {
            let mut state = self.state.lock().await;
            let changed = state.settings.button != settings.button;
            let button_settings = settings.button.clone();
            state.settings = settings;
            changed.then_some(button_settings)
        };
        if let Some(button_settings) = button_changed {
            *self.button.lock().await = self.debouncer(button_settings);
        }
    }

    fn emit(&self, event: DeviceEvent) {
        debug!("Emitting {}", event);
        if let Err(e) = self.callback.on_event(event) {
            error!("Device event not delivered: {}", e);
        }
    }

    async fn queue(&self, transaction: Transaction) -> Result<()> {
        let name = transaction.name().to_string();
        if let Err(e) = self.ble.queue(transaction).await {
            error!("Unable to queue '{}': {}", name, e);
            return Err(e);
        }
        Ok(())
    }

    fn require(&self, characteristic: Characteristic) -> Result<CharacteristicHandle> {
        lookup(self.ble.as_ref(), characteristic).ok_or_else(|| {
            HuamiError::Unsupported(format!("{:?} characteristic missing", characteristic))
        })
    }

    /// Start phase 1; the remaining phases run once the band accepts authentication
    pub async fn initialize(&self) -> Result<()> {
        let result = self.sequencer.lock().await.begin(self.ble.as_ref()).await;
        if let Err(e) = &result {
            self.emit(DeviceEvent::InitializationFailed(e.to_string()));
        }
        result
    }

    /// Route a notification; `false` when the characteristic is not handled here
    pub async fn on_characteristic_changed(&self, uuid: &str, value: &[u8]) -> bool {
        let characteristic = match Characteristic::from_uuid(uuid) {
            Some(characteristic) => characteristic,
            None => return false,
        };
        match characteristic {
            Characteristic::BatteryInfo => self.handle_battery_info(value),
            Characteristic::RealtimeSteps => match decode_realtime_steps(value) {
                Ok(steps) => self.realtime.set_steps(steps).await,
                Err(e) => warn!("Dropping realtime steps: {}", e),
            },
            Characteristic::HeartRateMeasurement => self.handle_heart_rate(value).await,
            Characteristic::Auth => self.handle_auth(value).await,
            Characteristic::DeviceEvent => self.handle_device_event(value).await,
            _ => {
                debug!("Unhandled notification from {:?}: {}", characteristic, hex_dump(value));
                return false;
            }
        }
        true
    }

    /// Route the result of a queued read; `false` when the characteristic is not handled here
    pub async fn on_characteristic_read(&self, uuid: &str, value: &[u8]) -> bool {
        let characteristic = match Characteristic::from_uuid(uuid) {
            Some(characteristic) => characteristic,
            None => return false,
        };
        match characteristic {
            Characteristic::BatteryInfo => self.handle_battery_info(value),
            Characteristic::HeartRateMeasurement => {
                info!("Heart rate measurement read: {}", hex_dump(value))
            }
            Characteristic::RealtimeSteps => match decode_realtime_steps(value) {
                Ok(steps) => self.realtime.set_steps(steps).await,
                Err(e) => warn!("Dropping realtime steps: {}", e),
            },
            Characteristic::DeviceEvent => self.handle_device_event(value).await,
            Characteristic::HardwareRevision
            | Characteristic::FirmwareRevision
            | Characteristic::SoftwareRevision => self.handle_revision(characteristic, value).await,
            _ => {
                debug!("Unhandled read from {:?}: {}", characteristic, hex_dump(value));
                return false;
            }
        }
        true
    }

    fn handle_battery_info(&self, value: &[u8]) {
        match decode_battery_info(value) {
            Ok(info) => self.emit(DeviceEvent::BatteryInfo(info)),
            Err(e) => warn!("Dropping battery info: {}", e),
        }
    }

    async fn handle_heart_rate(&self, value: &[u8]) {
        let bpm = match decode_heart_rate(value) {
            Ok(bpm) => bpm,
            Err(e) => {
                warn!("Dropping heart rate: {}", e);
                return;
            }
        };
        self.realtime.set_heart_rate(bpm).await;
        if !self.realtime.is_streaming().await {
            if let Err(e) = self.realtime.trigger_sample(Utc::now()).await {
                warn!("Unable to record heart rate sample: {}", e);
            }
        }
    }

    async fn handle_auth(&self, value: &[u8]) {
        let mut sequencer = self.sequencer.lock().await;
        let progress = sequencer
            .on_auth_notification(self.ble.as_ref(), value)
            .await;
        let result = match progress {
            Ok(AuthProgress::Pending) => return,
            Ok(AuthProgress::Authenticated) => {
                let (settings, capability) = {
                    let state = self.state.lock().await;
                    (state.settings.clone(), state.capability.clone())
                };
                sequencer
                    .complete(self.ble.as_ref(), &settings, &capability)
                    .await
            }
            Err(e) => Err(e),
        };
        drop(sequencer);

        match result {
            Ok(()) => self.emit(DeviceEvent::Initialized),
            Err(HuamiError::PreconditionNotMet(reason)) => {
                warn!("Not completing initialization: {}", reason)
            }
            Err(e) => self.emit(DeviceEvent::InitializationFailed(e.to_string())),
        }
    }

    async fn handle_revision(&self, characteristic: Characteristic, value: &[u8]) {
        let text = String::from_utf8_lossy(value);
        let trimmed = text.trim_matches(char::from(0)).trim();
        let revision = trimmed.strip_prefix('V').unwrap_or(trimmed).to_string();
        info!("{:?}: {}", characteristic, revision);

        let mut state = self.state.lock().await;
        match characteristic {
            Characteristic::HardwareRevision => state.hardware_revision = Some(revision),
            Characteristic::FirmwareRevision => state.firmware_revision = Some(revision),
            // older firmware only reports a software revision
            _ if state.firmware_revision.is_none() => state.firmware_revision = Some(revision),
            _ => return,
        }

        let firmware = match state.firmware_revision.clone() {
            Some(firmware) => firmware,
            None => return,
        };
        let hardware = state.hardware_revision.clone().unwrap_or_default();
        match DeviceCapability::new(self.family, &firmware, &hardware) {
            Ok(capability) => state.capability = capability,
            Err(e) => warn!("Keeping previous capability: {}", e),
        }
        drop(state);
        self.emit(DeviceEvent::VersionInfo { firmware, hardware });
    }

    async fn handle_device_event(&self, value: &[u8]) {
        let event = match decode_band_event(value) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping device event: {}", e);
                return;
            }
        };
        info!("Device event: {:?}", event);

        let forwarded = match event {
            BandEvent::ButtonPressed => {
                self.button.lock().await.on_press().await;
                return;
            }
            BandEvent::FindPhone(FindPhone::Start) => {
                if let Err(e) = self.acknowledge_find_phone().await {
                    warn!("Find phone not acknowledged: {}", e);
                }
                DeviceEvent::FindPhone(FindPhone::Start)
            }
            BandEvent::MusicAppStarted => {
                self.state.lock().await.music_app_started = true;
                if let Err(e) = self.send_music().await {
                    warn!("Unable to resend music state: {}", e);
                }
                return;
            }
            BandEvent::MusicAppTerminated => {
                self.state.lock().await.music_app_started = false;
                return;
            }
            BandEvent::FindPhone(FindPhone::Stop) => DeviceEvent::FindPhone(FindPhone::Stop),
            BandEvent::Sleep(sleep) => DeviceEvent::Sleep(sleep),
            BandEvent::StepsGoalReached => DeviceEvent::StepsGoalReached,
            BandEvent::ButtonLongPressed => DeviceEvent::ButtonLongPressed,
            BandEvent::NonWearStart => DeviceEvent::NonWearStart,
            BandEvent::CallControl(control) => DeviceEvent::CallControl(control),
            BandEvent::AlarmToggled => DeviceEvent::AlarmToggled,
            BandEvent::Tick => DeviceEvent::Tick,
            BandEvent::MusicControl(control) => DeviceEvent::MusicControl(control),
        };
        self.emit(forwarded);
    }

    async fn acknowledge_find_phone(&self) -> Result<()> {
        let configuration = self.require(Characteristic::Configuration)?;
        let mut tx = Transaction::new("acknowledge find phone");
        tx.write(&configuration, &COMMAND_ACK_FIND_PHONE_IN_PROGRESS);
        self.queue(tx).await
    }

    /// Set the band clock and mirror upcoming calendar events into the reserved alarm slots
    pub async fn set_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<()> {
        let now: DateTime<FixedOffset> = now.with_timezone(&now.offset().fix());
        let current_time = self.require(Characteristic::CurrentTime)?;

        let mut tx = Transaction::new("set date and time");
        tx.write(&current_time, &encode_time(&now, TimePrecision::Seconds)?);
        self.append_calendar_alarms(&mut tx, &now).await;
        self.queue(tx).await
    }

    async fn append_calendar_alarms(&self, tx: &mut Transaction, now: &DateTime<FixedOffset>) {
        let (slots, capability) = {
            let state = self.state.lock().await;
            (state.settings.reserved_calendar_slots as usize, state.capability.clone())
        };
        let calendar = match &self.calendar {
            Some(calendar) if slots > 0 => calendar,
            _ => return,
        };
        let configuration = match lookup(self.ble.as_ref(), Characteristic::Configuration) {
            Some(handle) => handle,
            None => return,
        };

        let events = match calendar.upcoming_events(slots).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Calendar not available: {}", e);
                return;
            }
        };
        let starts: Vec<DateTime<FixedOffset>> = upcoming_starts(&events, now.timestamp())
            .into_iter()
            .filter_map(|start| now.timezone().timestamp_opt(start, 0).single())
            .collect();

        for alarm in calendar_alarms(&starts, slots) {
            match encode_alarm(&alarm, &capability) {
                Ok(payload) => {
                    tx.write(&configuration, &payload);
                }
                Err(e) => warn!("Skipping calendar alarm in slot {}: {}", alarm.slot, e),
            }
        }
    }

    pub async fn set_alarms(&self, alarms: &[Alarm]) -> Result<()> {
        let configuration = self.require(Characteristic::Configuration)?;
        let capability = self.capability().await;

        let mut tx = Transaction::new("set alarms");
        for alarm in alarms {
            match encode_alarm(alarm, &capability) {
                Ok(payload) => {
                    tx.write(&configuration, &payload);
                }
                Err(e) => warn!("Skipping alarm in slot {}: {}", alarm.slot, e),
            }
        }
        if tx.is_empty() {
            return Ok(());
        }
        self.queue(tx).await
    }

    async fn perform_preferred_notification(
        &self,
        task: &str,
        origin: NotificationOrigin,
        notification: Option<&SimpleNotification>,
        alert_level: AlertLevel,
        abort: Option<AbortCondition>,
    ) -> Result<()> {
        let (strategy, prefs) = {
            let state = self.state.lock().await;
            (
                NotificationStrategy::select(
                    &state.capability,
                    state.settings.enable_text_notifications,
                ),
                state.settings.notification_prefs(origin),
            )
        };
        let profile = VibrationProfile::by_name(&prefs.vibration_profile, prefs.vibration_count)
            .with_alert_level(alert_level);

        let mut tx = Transaction::new(task);
        strategy.send(&mut tx, self.ble.as_ref(), &profile, notification, abort)?;
        self.queue(tx).await
    }

    pub async fn send_notification(&self, spec: &NotificationSpec) -> Result<()> {
        let kind = spec.notification_type;
        let abort = if kind == NotificationType::AlarmClock {
            self.alarm_clock_ringing.store(true, Ordering::SeqCst);
            Some(AbortCondition::when_cleared(self.alarm_clock_ringing.clone(), true))
        } else {
            None
        };
        let message = SimpleNotification::new(spec.preferred_text(), kind.alert_category());
        self.perform_preferred_notification(
            &format!("{} notification", kind.origin()),
            kind.origin(),
            Some(&message),
            kind.alert_level(),
            abort,
        )
        .await
    }

    /// Stops a ringing alarm clock notification
    pub async fn delete_notification(&self, id: i32) {
        debug!("Deleting notification {}", id);
        self.alarm_clock_ringing.store(false, Ordering::SeqCst);
    }

    pub async fn set_call_state(&self, call: &CallSpec) -> Result<()> {
        match call.command {
            CallCommand::Incoming => {
                self.telephone_ringing.store(true, Ordering::SeqCst);
                let abort = AbortCondition::when_cleared(self.telephone_ringing.clone(), true);
                let message = SimpleNotification::new(call.preferred_text(), AlertCategory::IncomingCall);
                self.perform_preferred_notification(
                    "incoming call",
                    NotificationOrigin::IncomingCall,
                    Some(&message),
                    AlertLevel::PhoneCall,
                    Some(abort),
                )
                .await
            }
            CallCommand::Start | CallCommand::End => {
                self.telephone_ringing.store(false, Ordering::SeqCst);
                let strategy = {
                    let state = self.state.lock().await;
                    NotificationStrategy::select(
                        &state.capability,
                        state.settings.enable_text_notifications,
                    )
                };
                let mut tx = Transaction::new("stop call notification");
                strategy.stop_current(&mut tx, self.ble.as_ref())?;
                self.queue(tx).await
            }
            other => {
                debug!("Ignoring call state {:?}", other);
                Ok(())
            }
        }
    }

    pub async fn set_music_info(&self, music: MusicSpec) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.capability.supports_music_info {
                debug!("Music info not supported");
                return Ok(());
            }
            if state.music_spec.as_ref() == Some(&music) {
                return Ok(());
            }
            state.music_spec = Some(music);
            if !state.music_app_started {
                debug!("Music app not running, buffering track info");
                return Ok(());
            }
        }
        self.send_music().await
    }

    pub async fn set_music_state(&self, music_state: MusicStateSpec) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if !state.capability.supports_music_info {
                debug!("Music info not supported");
                return Ok(());
            }
            if state.music_state == Some(music_state) {
                return Ok(());
            }
            state.music_state = Some(music_state);
        }
        self.send_music().await
    }

    async fn send_music(&self) -> Result<()> {
        let payload = {
            let state = self.state.lock().await;
            encode_music_state(state.music_spec.as_ref(), state.music_state.as_ref())
        };
        let chunked = match lookup(self.ble.as_ref(), Characteristic::ChunkedTransfer) {
            Some(handle) => handle,
            None => {
                debug!("No chunked transfer characteristic, not sending music state");
                return Ok(());
            }
        };

        let mut tx = Transaction::new("send playback info");
        write_chunked(&mut tx, &chunked, TYPE_MUSIC, &payload)?;
        self.queue(tx).await
    }

    pub async fn enable_realtime_heart_rate(&self, enable: bool) -> Result<()> {
        let control = match lookup(self.ble.as_ref(), Characteristic::HeartRateControlPoint) {
            Some(handle) => handle,
            None => {
                info!("No heart rate control point, realtime heart rate not available");
                return Ok(());
            }
        };

        let mut tx = Transaction::new("enable realtime heart rate measurement");
        {
            let mut state = self.state.lock().await;
            if state.heart_rate_notify_enabled != enable {
                if let Some(measurement) =
                    lookup(self.ble.as_ref(), Characteristic::HeartRateMeasurement)
                {
                    tx.notify(&measurement, enable);
                }
                state.heart_rate_notify_enabled = enable;
            }
        }
        if enable {
            tx.write(&control, &STOP_HR_MEASUREMENT_MANUAL);
            tx.write(&control, &START_HR_MEASUREMENT_CONTINUOUS);
        } else {
            tx.write(&control, &STOP_HR_MEASUREMENT_CONTINUOUS);
        }
        self.queue(tx).await?;

        if enable {
            self.realtime.start().await;
        } else {
            self.realtime.stop().await;
        }
        Ok(())
    }

    /// Single manual heart rate measurement
    pub async fn heart_rate_test(&self) -> Result<()> {
        let control = self.require(Characteristic::HeartRateControlPoint)?;
        let mut tx = Transaction::new("heart rate test");
        if let Some(measurement) = lookup(self.ble.as_ref(), Characteristic::HeartRateMeasurement) {
            tx.notify(&measurement, true);
        }
        tx.write(&control, &STOP_HR_MEASUREMENT_CONTINUOUS);
        tx.write(&control, &STOP_HR_MEASUREMENT_MANUAL);
        tx.write(&control, &START_HR_MEASUREMENT_MANUAL);
        self.queue(tx).await
    }

    pub async fn enable_realtime_steps(&self, enable: bool) -> Result<()> {
        let steps = self.require(Characteristic::RealtimeSteps)?;
        let mut tx = Transaction::new(if enable {
            "enable realtime steps"
        } else {
            "disable realtime steps"
        });
        if enable {
            tx.read(&steps);
        }
        tx.notify(&steps, enable);
        self.queue(tx).await?;

        if enable {
            self.realtime.start().await;
        } else {
            self.realtime.stop().await;
        }
        Ok(())
    }

    pub async fn send_weather(&self, weather: &WeatherSpec) -> Result<()> {
        let (capability, unit) = {
            let state = self.state.lock().await;
            (state.capability.clone(), state.settings.distance_unit)
        };
        if !capability.supports_weather {
            info!("{} has no weather support", capability.family);
            return Ok(());
        }

        let utc_offset = Local
            .timestamp_opt(weather.timestamp as i64, 0)
            .single()
            .map(|at| at.offset().fix())
            .unwrap_or_else(|| Utc.fix());
        let options = WeatherOptions {
            unit,
            supports_condition_string: capability.supports_weather_condition_string,
            utc_offset,
        };

        let chunked = lookup(self.ble.as_ref(), Characteristic::ChunkedTransfer);
        let legacy = lookup(self.ble.as_ref(), Characteristic::Weather);
        for (description, payload) in encode_weather(weather, &options) {
            let mut tx = Transaction::new(description);
            match (&chunked, &legacy) {
                (Some(chunked), _) => write_chunked(&mut tx, chunked, TYPE_WEATHER, &payload)?,
                (None, Some(handle)) => {
                    tx.write(handle, &payload);
                }
                (None, None) => {
                    return Err(HuamiError::Unsupported(
                        "no weather characteristic".to_string(),
                    ))
                }
            }
            self.queue(tx).await?;
        }
        Ok(())
    }

    /// Re-send one setting group
    pub async fn send_configuration(&self, key: ConfigKey) -> Result<()> {
        let (settings, capability) = {
            let state = self.state.lock().await;
            (state.settings.clone(), state.capability.clone())
        };
        self.send_setting(&settings, &capability, key).await
    }

    async fn send_setting(
        &self,
        settings: &DeviceSettings,
        capability: &DeviceCapability,
        key: ConfigKey,
    ) -> Result<()> {
        let mut tx = Transaction::new(format!("sending configuration for option: {}", key));
        match append_setting(&mut tx, self.ble.as_ref(), settings, capability, key) {
            Ok(()) => self.queue(tx).await,
            Err(HuamiError::Unsupported(reason)) => {
                info!("Not sending {}: {}", key, reason);
                Ok(())
            }
            Err(e) => {
                warn!("Not sending {}: {}", key, e);
                Err(e)
            }
        }
    }

    pub async fn enable_heart_rate_sleep_support(&self, enable: bool) -> Result<()> {
        let (mut settings, capability) = {
            let state = self.state.lock().await;
            (state.settings.clone(), state.capability.clone())
        };
        settings.heart_rate_sleep_support = enable;
        self.send_setting(&settings, &capability, ConfigKey::HeartRateSleepSupport)
            .await
    }

    pub async fn set_heart_rate_measurement_interval(&self, seconds: u32) -> Result<()> {
        let (mut settings, capability) = {
            let state = self.state.lock().await;
            (state.settings.clone(), state.capability.clone())
        };
        settings.heart_rate_interval_secs = seconds;
        self.send_setting(&settings, &capability, ConfigKey::HeartRateInterval)
            .await
    }

    /// Vibrate until found, or stop vibrating
    pub async fn find_device(&self, start: bool) -> Result<()> {
        self.locating_device.store(start, Ordering::SeqCst);
        if !start {
            return Ok(());
        }

        let abort = AbortCondition::when_cleared(self.locating_device.clone(), false);
        let message = SimpleNotification::new(FIND_DEVICE_MESSAGE, AlertCategory::HighPriorityAlert);
        let profile = VibrationProfile::by_name(VibrationProfile::MEDIUM, FIND_DEVICE_REPEAT)
            .with_alert_level(AlertLevel::VibrateOnly);
        let strategy = {
            let state = self.state.lock().await;
            NotificationStrategy::select(&state.capability, state.settings.enable_text_notifications)
        };

        let mut tx = Transaction::new("locating device");
        strategy.send(&mut tx, self.ble.as_ref(), &profile, Some(&message), Some(abort))?;
        self.queue(tx).await
    }

    pub async fn install_firmware(&self, path: &Path) -> Result<()> {
        let installer = self.firmware.as_ref().ok_or_else(|| {
            HuamiError::Unsupported("no firmware installer configured".to_string())
        })?;
        info!("Installing firmware {}", path.display());
        installer.install(self.ble.as_ref(), path).await
    }

    /// Factory reset, or just a reboot
    pub async fn reset(&self, factory: bool) -> Result<()> {
        let (name, characteristic, command) = if factory {
            ("factory reset", Characteristic::Configuration, settings::factory_reset())
        } else {
            ("reboot", Characteristic::Firmware, settings::reboot())
        };
        let handle = self.require(characteristic)?;
        let mut tx = Transaction::new(name);
        tx.write(&handle, &command);
        self.queue(tx).await
    }

    /// Stop timers and repeating alerts of this session
    pub async fn dispose(&self) {
        self.telephone_ringing.store(false, Ordering::SeqCst);
        self.alarm_clock_ringing.store(false, Ordering::SeqCst);
        self.locating_device.store(false, Ordering::SeqCst);
        self.button.lock().await.dispose().await;
        self.realtime.stop().await;
    }
}
