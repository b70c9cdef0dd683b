//! Realtime heart rate and step samples
//!
//! Heart rate measurements and realtime step counts are buffered per session. While streaming,
//! a background task turns the buffer into a sample every interval; single-shot heart rate
//! measurements trigger a sample immediately.

use crate::events::{DeviceEvent, DeviceEventCallback};
use crate::types::{hex_dump, HuamiError, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Raw kind under which manual samples show up next to regular activity
pub const RAW_KIND_ACTIVITY: i32 = 1;
pub const NOT_MEASURED: i32 = -1;

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

const REALTIME_STEPS_LENGTH: usize = 13;

/// One stored or published realtime sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySample {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub heart_rate: Option<u8>,
    pub steps: Option<u16>,
    pub raw_kind: i32,
    pub raw_intensity: i32,
}

/// Persistence for realtime samples, owned by the application
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    async fn add_sample(&self, sample: &ActivitySample) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealtimeSampleBuffer {
    pub heart_rate_bpm: Option<u8>,
    pub steps: Option<u16>,
    pub streaming: bool,
}

/// Heart rate measurement value, `[0, bpm]`
pub fn decode_heart_rate(value: &[u8]) -> Result<u8> {
    match value {
        [0, bpm] => Ok(*bpm),
        _ => Err(HuamiError::DecodeMalformed(format!(
            "heart rate measurement {}",
            hex_dump(value)
        ))),
    }
}

/// Step count of the realtime steps characteristic
pub fn decode_realtime_steps(value: &[u8]) -> Result<u16> {
    if value.len() != REALTIME_STEPS_LENGTH {
        return Err(HuamiError::DecodeMalformed(format!(
            "realtime steps {}",
            hex_dump(value)
        )));
    }
    Ok(u16::from_le_bytes([value[1], value[2]]))
}

pub struct RealtimeSampleBridge {
    buffer: Arc<Mutex<RealtimeSampleBuffer>>,
    store: Arc<dyn SampleStore>,
    callback: Arc<dyn DeviceEventCallback>,
    interval: Duration,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeSampleBridge {
    pub fn new(
        store: Arc<dyn SampleStore>,
        callback: Arc<dyn DeviceEventCallback>,
        interval: Duration,
    ) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(RealtimeSampleBuffer::default())),
            store,
            callback,
            interval,
            task: std::sync::Mutex::new(None),
        }
    }

    pub async fn set_heart_rate(&self, bpm: u8) {
        debug!("heart rate: {}", bpm);
        self.buffer.lock().await.heart_rate_bpm = Some(bpm);
    }

    pub async fn set_steps(&self, steps: u16) {
        debug!("realtime steps: {}", steps);
        self.buffer.lock().await.steps = Some(steps);
    }

    pub async fn is_streaming(&self) -> bool {
        self.buffer.lock().await.streaming
    }

    pub async fn snapshot(&self) -> RealtimeSampleBuffer {
        *self.buffer.lock().await
    }

    /// Start producing a sample every interval
    pub async fn start(&self) {
        {
            let mut buffer = self.buffer.lock().await;
            if buffer.streaming {
                return;
            }
            buffer.streaming = true;
        }

        let buffer = self.buffer.clone();
        let store = self.store.clone();
        let callback = self.callback.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            loop {
                sleep(interval).await;
                if let Err(e) = sample(&buffer, store.as_ref(), callback.as_ref(), Utc::now()).await
                {
                    warn!("Unable to record realtime sample: {}", e);
                }
            }
        });

        if let Ok(mut task) = self.task.lock() {
            if let Some(previous) = task.replace(handle) {
                previous.abort();
            }
        }
    }

    pub async fn stop(&self) {
        self.buffer.lock().await.streaming = false;
        self.abort_task();
    }

    fn abort_task(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    /// Persist the current values and publish them
    pub async fn trigger_sample(&self, now: DateTime<Utc>) -> Result<ActivitySample> {
        sample(&self.buffer, self.store.as_ref(), self.callback.as_ref(), now).await
    }
}

impl Drop for RealtimeSampleBridge {
    fn drop(&mut self) {
        self.abort_task();
    }
}

async fn sample(
    buffer: &Mutex<RealtimeSampleBuffer>,
    store: &dyn SampleStore,
    callback: &dyn DeviceEventCallback,
    now: DateTime<Utc>,
) -> Result<ActivitySample> {
    let current = *buffer.lock().await;

    // realtime steps are also part of the regular activity data, store them only once
    let stored = ActivitySample {
        timestamp: now.timestamp(),
        heart_rate: current.heart_rate_bpm,
        steps: None,
        raw_kind: RAW_KIND_ACTIVITY,
        raw_intensity: NOT_MEASURED,
    };
    store.add_sample(&stored).await?;

    let published = ActivitySample {
        steps: current.steps,
        ..stored
    };
    debug!("realtime sample: {:?}", published);
    callback.on_event(DeviceEvent::RealtimeSample(published.clone()))?;
    Ok(published)
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use crate::events::testing::RecordingCallback;
    use chrono::TimeZone;

    fn bridge() -> (RealtimeSampleBridge, Arc<MemoryStore>, Arc<RecordingCallback>) {
        let store = Arc::new(MemoryStore::default());
        let callback = Arc::new(RecordingCallback::default());
        let bridge = RealtimeSampleBridge::new(store.clone(), callback.clone(), DEFAULT_SAMPLE_INTERVAL);
        (bridge, store, callback)
    }

    #[test]
    fn test_decoders() {
        assert_eq!(decode_heart_rate(&[0, 72]).unwrap(), 72);
        assert!(decode_heart_rate(&[1, 72]).is_err());
        assert!(decode_heart_rate(&[0, 72, 1]).is_err());

        let mut steps = vec![0x0c, 0x39, 0x30];
        steps.extend_from_slice(&[0; 10]);
        assert_eq!(decode_realtime_steps(&steps).unwrap(), 12345);
        assert!(decode_realtime_steps(&steps[..12]).is_err());
    }

    #[tokio::test]
    async fn test_steps_stored_once_published_resolved() {
        let (bridge, store, callback) = bridge();
        bridge.set_heart_rate(64).await;
        bridge.set_steps(1200).await;

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let published = bridge.trigger_sample(now).await.unwrap();

        let stored = store.samples();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].steps, None);
        assert_eq!(stored[0].heart_rate, Some(64));
        assert_eq!(stored[0].raw_kind, RAW_KIND_ACTIVITY);
        assert_eq!(stored[0].raw_intensity, NOT_MEASURED);

        assert_eq!(published.steps, Some(1200));
        assert_eq!(published.timestamp, now.timestamp());
        assert_eq!(
            callback.events(),
            vec![DeviceEvent::RealtimeSample(published)]
        );
    }

    #[tokio::test]
    async fn test_streaming_samples_periodically() {
        tokio::time::pause();
        let (bridge, store, _callback) = bridge();
        bridge.set_heart_rate(80).await;
        bridge.start().await;
        assert!(bridge.is_streaming().await);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(store.samples().len(), 3);

        bridge.stop().await;
        assert!(!bridge.is_streaming().await);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(store.samples().len(), 3);
    }
}
