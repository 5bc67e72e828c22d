use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default stream length assumed until an actual end time is observed.
const DEFAULT_DURATION_HOURS: i64 = 1;

// ============================================================================
// Live events (source of truth, read-only per pass)
// ============================================================================

/// An observed or announced streaming session, as delivered by the schedule
/// feed. Immutable for the duration of a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Stable stream identifier (YouTube video id).
    pub id: String,
    pub channel_id: String,
    pub channel_title: String,
    /// Canonical member name of the broadcaster, used for duplicate matching.
    pub actor: String,
    /// Raw stream title.
    pub title: String,
    /// Collaborator names; empty for a solo stream.
    #[serde(default)]
    pub collaborate: Vec<String>,
    /// Originally announced start. Always present.
    pub scheduled_start_time: DateTime<Utc>,
    /// Set once the stream has actually gone live.
    pub actual_start_time: Option<DateTime<Utc>>,
    /// Set once the stream has ended. Implies `actual_start_time`.
    pub actual_end_time: Option<DateTime<Utc>>,
}

impl LiveEvent {
    /// Display title persisted to the calendar and shown in notifications.
    /// Collaborations get a bracketed prefix listing the collaborators.
    pub fn canonical_title(&self) -> String {
        if self.collaborate.is_empty() {
            format!("{}: {}", self.channel_title, self.title)
        } else {
            format!(
                "[{} コラボ] {}: {}",
                self.collaborate.join(", "),
                self.channel_title,
                self.title
            )
        }
    }

    /// The (start, end) instants persisted to the calendar: actual times when
    /// observed, otherwise the announced schedule with a one-hour default
    /// duration.
    pub fn canonical_interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.actual_start_time.unwrap_or(self.scheduled_start_time);
        let end = self
            .actual_end_time
            .unwrap_or(start + Duration::hours(DEFAULT_DURATION_HOURS));
        (start, end)
    }

    /// Whether the persisted end time is derived rather than observed.
    pub fn end_is_provisional(&self) -> bool {
        self.actual_end_time.is_none()
    }

    pub fn is_solo(&self) -> bool {
        self.collaborate.is_empty()
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

// ============================================================================
// Calendar entries (persisted state, fetched fresh each pass)
// ============================================================================

/// The persisted representation of a live event in the remote calendar,
/// reconstructed from the entry body plus its private metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    /// Calendar-service-assigned id. Distinct from `video_id`.
    pub id: String,
    /// Foreign key back to `LiveEvent::id`.
    pub video_id: String,
    /// Last persisted canonical title.
    pub title: String,
    /// Last persisted canonical interval.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Present when the corresponding transition was already recorded; used
    /// to suppress duplicate notifications across passes.
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    /// Last persisted original schedule, kept for duplicate detection.
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> LiveEvent {
        LiveEvent {
            id: "abc123".to_string(),
            channel_id: "UC0001".to_string(),
            channel_title: "Alice Ch".to_string(),
            actor: "Alice".to_string(),
            title: "Gaming".to_string(),
            collaborate: vec![],
            scheduled_start_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            actual_start_time: None,
            actual_end_time: None,
        }
    }

    #[test]
    fn canonical_title_solo() {
        assert_eq!(event().canonical_title(), "Alice Ch: Gaming");
    }

    #[test]
    fn canonical_title_single_collaborator() {
        let mut ev = event();
        ev.collaborate = vec!["Bob".to_string()];
        assert_eq!(ev.canonical_title(), "[Bob コラボ] Alice Ch: Gaming");
    }

    #[test]
    fn canonical_title_joins_collaborators() {
        let mut ev = event();
        ev.collaborate = vec!["Bob".to_string(), "Carol".to_string()];
        assert_eq!(ev.canonical_title(), "[Bob, Carol コラボ] Alice Ch: Gaming");
    }

    #[test]
    fn interval_from_schedule_only() {
        let ev = event();
        let (start, end) = ev.canonical_interval();
        assert_eq!(start, ev.scheduled_start_time);
        assert_eq!(end, ev.scheduled_start_time + Duration::hours(1));
        assert!(ev.end_is_provisional());
    }

    #[test]
    fn interval_prefers_actual_start() {
        let mut ev = event();
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 7, 30).unwrap();
        ev.actual_start_time = Some(started);
        let (start, end) = ev.canonical_interval();
        assert_eq!(start, started);
        assert_eq!(end, started + Duration::hours(1));
        assert!(ev.end_is_provisional());
    }

    #[test]
    fn interval_with_actual_end() {
        let mut ev = event();
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 7, 30).unwrap();
        let ended = Utc.with_ymd_and_hms(2024, 5, 1, 14, 2, 0).unwrap();
        ev.actual_start_time = Some(started);
        ev.actual_end_time = Some(ended);
        let (start, end) = ev.canonical_interval();
        assert_eq!(start, started);
        assert_eq!(end, ended);
        assert!(!ev.end_is_provisional());
    }

    #[test]
    fn watch_url_embeds_id() {
        assert_eq!(event().watch_url(), "https://www.youtube.com/watch?v=abc123");
    }
}
