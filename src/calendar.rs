//! Calendar events mirrored into reserved alarm slots

use crate::types::Result;
use serde::{Deserialize, Serialize};

/// Appointment that may occupy one of the reserved calendar alarm slots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,

    /// Not sent to the device; alarms carry only a time
    pub title: String,

    /// Unix seconds; becomes the alarm time
    pub start_timestamp: i64,

    pub end_timestamp: i64,

    pub all_day: bool,
}

impl CalendarEvent {
    pub fn duration_seconds(&self) -> i64 {
        self.end_timestamp - self.start_timestamp
    }

    /// Still worth an alarm at `now` (Unix seconds)
    pub fn starts_after(&self, now: i64) -> bool {
        self.start_timestamp > now
    }
}

/// Calendar backend owned by the application
#[async_trait::async_trait]
pub trait CalendarSource: Send + Sync {
    /// Upcoming events ordered by start time, at most `limit`
    async fn upcoming_events(&self, limit: usize) -> Result<Vec<CalendarEvent>>;
}

/// Start times of the next events after `now`, in order
pub fn upcoming_starts(events: &[CalendarEvent], now: i64) -> Vec<i64> {
    let mut starts: Vec<i64> = events
        .iter()
        .filter(|event| event.starts_after(now))
        .map(|event| event.start_timestamp)
        .collect();
    starts.sort_unstable();
    starts
}
