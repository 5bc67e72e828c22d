use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::CalendarConfig;
use crate::error::{AppError, AppResult};
use crate::models::{CalendarEntry, LiveEvent};
use crate::services::{CalendarGateway, TimeWindow};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const MAX_RESULTS: u32 = 250;
const EVENT_TIME_ZONE: &str = "Asia/Tokyo";

/// Google Calendar v3 adapter. The reconciliation metadata is round-tripped
/// through `extendedProperties.private`; calendar items without it (manually
/// created entries) are skipped on list.
#[derive(Debug, Clone)]
pub struct GoogleCalendarService {
    client: Client,
    calendar_id: String,
    access_token: String,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    summary: String,
    description: String,
    start: EventDateTime,
    end: EventDateTime,
    extended_properties: ExtendedProperties,
}

#[derive(Debug, Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<EventResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResource {
    id: String,
    #[serde(default)]
    summary: String,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    extended_properties: Option<ExtendedProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExtendedProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    private: Option<PrivateMetadata>,
}

/// The durable record future passes compare against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrivateMetadata {
    #[serde(default)]
    video_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    actor: String,
    #[serde(default)]
    scheduled_start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collaborate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actual_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actual_end_time: Option<String>,
}

impl GoogleCalendarService {
    pub fn new(config: &CalendarConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Calendar(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            calendar_id: config.calendar_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            CALENDAR_API_URL,
            urlencoding::encode(&self.calendar_id)
        )
    }
}

fn to_rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 datetime string into a UTC instant.
///
/// Returns None if parsing fails.
fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => None,
    }
}

/// Build the full event body for a create or update call.
fn event_payload(event: &LiveEvent) -> EventPayload {
    let (start, end) = event.canonical_interval();
    EventPayload {
        summary: event.canonical_title(),
        description: format!(
            "チャンネル: {}\nタイトル: {}\n\n配信URL: {}",
            event.channel_title,
            event.title,
            event.watch_url()
        ),
        start: EventDateTime {
            date_time: Some(to_rfc3339(start)),
            time_zone: Some(EVENT_TIME_ZONE.to_string()),
        },
        end: EventDateTime {
            date_time: Some(to_rfc3339(end)),
            time_zone: Some(EVENT_TIME_ZONE.to_string()),
        },
        extended_properties: ExtendedProperties {
            private: Some(PrivateMetadata {
                video_id: event.id.clone(),
                title: event.title.clone(),
                channel_id: event.channel_id.clone(),
                actor: event.actor.clone(),
                scheduled_start_time: to_rfc3339(event.scheduled_start_time),
                collaborate: if event.collaborate.is_empty() {
                    None
                } else {
                    Some(event.collaborate.join(","))
                },
                actual_start_time: event.actual_start_time.map(to_rfc3339),
                actual_end_time: event.actual_end_time.map(to_rfc3339),
            }),
        },
    }
}

/// Reconstruct a `CalendarEntry` from a fetched item. Returns None for items
/// this service did not write (no metadata) or with unusable timestamps.
fn entry_from_resource(resource: EventResource) -> Option<CalendarEntry> {
    let private = resource.extended_properties?.private?;
    if private.video_id.is_empty() {
        return None;
    }
    let start_time = parse_rfc3339(resource.start?.date_time.as_deref()?)?;
    let end_time = parse_rfc3339(resource.end?.date_time.as_deref()?)?;

    Some(CalendarEntry {
        id: resource.id,
        video_id: private.video_id,
        title: resource.summary,
        start_time,
        end_time,
        actual_start_time: private.actual_start_time.as_deref().and_then(parse_rfc3339),
        actual_end_time: private.actual_end_time.as_deref().and_then(parse_rfc3339),
        scheduled_start_time: if private.scheduled_start_time.is_empty() {
            None
        } else {
            parse_rfc3339(&private.scheduled_start_time)
        },
    })
}

#[async_trait::async_trait]
impl CalendarGateway for GoogleCalendarService {
    async fn list_entries(&self, window: TimeWindow) -> AppResult<Vec<CalendarEntry>> {
        let response = self
            .client
            .get(self.events_url())
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", to_rfc3339(window.min)),
                ("timeMax", to_rfc3339(window.max)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", MAX_RESULTS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to list events: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Calendar API error ({}): {}",
                status, error_text
            )));
        }

        let body: EventsListResponse = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to parse event list: {}", e)))?;

        let mut entries = Vec::new();
        for item in body.items {
            let item_id = item.id.clone();
            match entry_from_resource(item) {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::debug!("Skipping calendar item {} without sync metadata", item_id)
                }
            }
        }
        Ok(entries)
    }

    async fn create_entry(&self, event: &LiveEvent) -> AppResult<CalendarEntry> {
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .json(&event_payload(event))
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to create event: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Calendar API error ({}): {}",
                status, error_text
            )));
        }

        let created: EventResource = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to parse created event: {}", e)))?;
        entry_from_resource(created)
            .ok_or_else(|| AppError::Calendar("Created event is missing sync metadata".to_string()))
    }

    async fn update_entry(&self, entry_id: &str, event: &LiveEvent) -> AppResult<CalendarEntry> {
        let url = format!("{}/{}", self.events_url(), urlencoding::encode(entry_id));
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&event_payload(event))
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to update event: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Calendar API error ({}): {}",
                status, error_text
            )));
        }

        let updated: EventResource = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to parse updated event: {}", e)))?;
        entry_from_resource(updated)
            .ok_or_else(|| AppError::Calendar("Updated event is missing sync metadata".to_string()))
    }

    async fn delete_entry(&self, entry_id: &str) -> AppResult<()> {
        let url = format!("{}/{}", self.events_url(), urlencoding::encode(entry_id));
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to delete event: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!(
                "Calendar API error ({}): {}",
                status, error_text
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> LiveEvent {
        LiveEvent {
            id: "vid1".to_string(),
            channel_id: "UC0001".to_string(),
            channel_title: "Alice Ch".to_string(),
            actor: "Alice".to_string(),
            title: "Gaming".to_string(),
            collaborate: vec![],
            scheduled_start_time: Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap(),
            actual_start_time: None,
            actual_end_time: None,
        }
    }

    #[test]
    fn payload_carries_required_metadata() {
        let payload = event_payload(&event());
        let private = payload.extended_properties.private.unwrap();
        assert_eq!(private.video_id, "vid1");
        assert_eq!(private.title, "Gaming");
        assert_eq!(private.channel_id, "UC0001");
        assert_eq!(private.actor, "Alice");
        assert_eq!(private.scheduled_start_time, "2024-05-01T03:00:00Z");
        assert!(private.collaborate.is_none());
        assert!(private.actual_start_time.is_none());
        assert!(private.actual_end_time.is_none());
    }

    #[test]
    fn payload_includes_optional_metadata_when_set() {
        let mut ev = event();
        ev.collaborate = vec!["Bob".to_string(), "Carol".to_string()];
        ev.actual_start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 5, 0).unwrap());
        ev.actual_end_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap());

        let payload = event_payload(&ev);
        let private = payload.extended_properties.private.unwrap();
        assert_eq!(private.collaborate.as_deref(), Some("Bob,Carol"));
        assert_eq!(
            private.actual_start_time.as_deref(),
            Some("2024-05-01T03:05:00Z")
        );
        assert_eq!(
            private.actual_end_time.as_deref(),
            Some("2024-05-01T04:00:00Z")
        );
        assert_eq!(payload.summary, "[Bob, Carol コラボ] Alice Ch: Gaming");
        // Start/end reflect the observed actual times.
        assert_eq!(payload.start.date_time.as_deref(), Some("2024-05-01T03:05:00Z"));
        assert_eq!(payload.end.date_time.as_deref(), Some("2024-05-01T04:00:00Z"));
    }

    #[test]
    fn optional_metadata_is_omitted_from_the_wire() {
        let body = serde_json::to_value(event_payload(&event())).unwrap();
        let private = &body["extendedProperties"]["private"];
        assert!(private.get("collaborate").is_none());
        assert!(private.get("actual_start_time").is_none());
        assert_eq!(private["video_id"], "vid1");
        assert_eq!(body["start"]["timeZone"], "Asia/Tokyo");
    }

    #[test]
    fn resource_round_trips_into_an_entry() {
        let resource: EventResource = serde_json::from_value(serde_json::json!({
            "id": "cal1",
            "summary": "Alice Ch: Gaming",
            "start": { "dateTime": "2024-05-01T12:00:00+09:00" },
            "end": { "dateTime": "2024-05-01T13:00:00+09:00" },
            "extendedProperties": {
                "private": {
                    "video_id": "vid1",
                    "title": "Gaming",
                    "channel_id": "UC0001",
                    "actor": "Alice",
                    "scheduled_start_time": "2024-05-01T03:00:00Z",
                    "actual_start_time": "2024-05-01T03:02:00Z"
                }
            }
        }))
        .unwrap();

        let entry = entry_from_resource(resource).unwrap();
        assert_eq!(entry.id, "cal1");
        assert_eq!(entry.video_id, "vid1");
        assert_eq!(entry.title, "Alice Ch: Gaming");
        // +09:00 offsets normalize to UTC instants.
        assert_eq!(
            entry.start_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap()
        );
        assert_eq!(
            entry.actual_start_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 2, 0).unwrap())
        );
        assert!(entry.actual_end_time.is_none());
        assert_eq!(
            entry.scheduled_start_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap())
        );
    }

    #[test]
    fn foreign_items_without_metadata_are_skipped() {
        let resource: EventResource = serde_json::from_value(serde_json::json!({
            "id": "cal2",
            "summary": "Dentist",
            "start": { "dateTime": "2024-05-01T12:00:00+09:00" },
            "end": { "dateTime": "2024-05-01T13:00:00+09:00" }
        }))
        .unwrap();
        assert!(entry_from_resource(resource).is_none());
    }
}
