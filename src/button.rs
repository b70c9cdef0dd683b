//! Multi-press button actions
//!
//! The band reports every button press separately. A configured number of presses in quick
//! succession triggers an application action. With an action delay the action waits so that
//! any further press cancels it.

use crate::config::{ButtonSettings, DEFAULT_VIBRATION_COUNT, DEFAULT_VIBRATION_PROFILE};
use crate::events::{DeviceEvent, DeviceEventCallback};
use crate::notification::{AlertLevel, NotificationStrategy, VibrationProfile};
use crate::transport::{BleSupport, Transaction};
use crate::types::Result;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Milliseconds on the session clock
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

#[derive(Debug, Default)]
pub struct ButtonPressState {
    pub pending_action_id: u32,
    pub press_count: u32,
    pub last_press_at_millis: Option<i64>,
    pub timer_armed_at_millis: Option<i64>,
    timer: Option<JoinHandle<()>>,
}

struct ActionContext {
    settings: ButtonSettings,
    clock: Clock,
    callback: Arc<dyn DeviceEventCallback>,
    ble: Arc<dyn BleSupport>,
}

impl ActionContext {
    async fn fire(&self, state: &mut ButtonPressState) {
        info!("Running button action #{}", state.pending_action_id);
        let event = DeviceEvent::ButtonAction {
            broadcast: self.settings.broadcast.clone(),
            action_id: state.pending_action_id,
        };
        if let Err(e) = self.callback.on_event(event) {
            error!("Button action not delivered: {}", e);
        }

        if self.settings.vibrate {
            if let Err(e) = self.vibrate().await {
                error!("Button action vibration failed: {}", e);
            }
        }

        state.pending_action_id = 0;
        state.press_count = 0;
        state.last_press_at_millis = Some((self.clock)());
    }

    async fn vibrate(&self) -> Result<()> {
        let profile = VibrationProfile::by_name(DEFAULT_VIBRATION_PROFILE, DEFAULT_VIBRATION_COUNT)
            .with_alert_level(AlertLevel::VibrateOnly);
        let mut tx = Transaction::new("button action vibration");
        NotificationStrategy::Legacy.send(&mut tx, self.ble.as_ref(), &profile, None, None)?;
        self.ble.queue(tx).await
    }
}

pub struct ButtonDebouncer {
    state: Arc<Mutex<ButtonPressState>>,
    context: Arc<ActionContext>,
}

impl ButtonDebouncer {
    pub fn new(
        settings: ButtonSettings,
        clock: Clock,
        callback: Arc<dyn DeviceEventCallback>,
        ble: Arc<dyn BleSupport>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ButtonPressState::default())),
            context: Arc::new(ActionContext {
                settings,
                clock,
                callback,
                ble,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.context.settings.enabled && self.context.settings.required_press_count > 0
    }

    pub async fn on_press(&self) {
        if !self.is_enabled() {
            return;
        }

        let settings = &self.context.settings;
        let now = (self.context.clock)();
        let mut state = self.state.lock().await;

        let in_sequence = match state.last_press_at_millis {
            None => true,
            Some(last) => now - last < settings.max_press_delay_ms as i64,
        };
        if in_sequence {
            state.press_count += 1;
        } else {
            state.press_count = 1;
            state.pending_action_id = 0;
        }
        state.last_press_at_millis = Some(now);

        if state.press_count != settings.required_press_count {
            return;
        }

        state.pending_action_id += 1;
        state.timer_armed_at_millis = Some(now);
        state.press_count = 0;

        if settings.action_delay_ms == 0 {
            self.context.fire(&mut state).await;
            return;
        }

        info!("Arming button action timer");
        let delay = Duration::from_millis(settings.action_delay_ms);
        let shared = self.state.clone();
        let context = self.context.clone();
        let armed_at = Some(now);
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            let mut state = shared.lock().await;
            // a later press makes this timer stale
            if state.timer_armed_at_millis == armed_at && state.last_press_at_millis == armed_at {
                state.timer = None;
                context.fire(&mut state).await;
            }
        });
        if let Some(previous) = state.timer.replace(timer) {
            previous.abort();
        }
    }

    pub async fn state(&self) -> (u32, u32) {
        let state = self.state.lock().await;
        (state.pending_action_id, state.press_count)
    }

    /// Cancel a pending action
    pub async fn dispose(&self) {
        if let Some(timer) = self.state.lock().await.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ButtonDebouncer {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
        }
    }
}
