pub mod google_calendar;
pub mod ics;
pub mod line;
pub mod schedule;
pub mod sync;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{CalendarEntry, LiveEvent};

/// Snapshot window for a calendar fetch.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
}

/// Remote calendar operations. Create and update must persist the
/// reconciliation metadata (video id, actor, schedule, actual times) so that
/// `list_entries` can round-trip it on later passes.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn list_entries(&self, window: TimeWindow) -> AppResult<Vec<CalendarEntry>>;

    async fn create_entry(&self, event: &LiveEvent) -> AppResult<CalendarEntry>;

    /// Idempotent full overwrite of an existing entry.
    async fn update_entry(&self, entry_id: &str, event: &LiveEvent) -> AppResult<CalendarEntry>;

    async fn delete_entry(&self, entry_id: &str) -> AppResult<()>;
}

/// Fire-and-forget broadcast of a human-readable notification to all
/// subscribers.
#[async_trait]
pub trait BroadcastGateway: Send + Sync {
    async fn broadcast(&self, text: &str) -> AppResult<()>;
}

/// Produces a durable, time-limited public link to a calendar-file
/// representation of an event.
#[async_trait]
pub trait LinkPublisher: Send + Sync {
    async fn publish(&self, event: &LiveEvent) -> AppResult<String>;
}
