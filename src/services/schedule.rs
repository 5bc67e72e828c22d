use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};
use crate::models::LiveEvent;

/// Fetches the parsed live-stream schedule document and maps it into domain
/// events. Items with malformed timestamps are skipped with a warning rather
/// than failing the whole fetch.
#[derive(Debug, Clone)]
pub struct ScheduleFeedService {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct FeedDocument {
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    id: String,
    channel_id: String,
    channel_title: String,
    actor: String,
    title: String,
    #[serde(default)]
    collaborate: Vec<String>,
    scheduled_start_time: String,
    #[serde(default)]
    actual_start_time: Option<String>,
    #[serde(default)]
    actual_end_time: Option<String>,
}

impl ScheduleFeedService {
    pub fn new(config: &FeedConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Feed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub async fn fetch_events(&self) -> AppResult<Vec<LiveEvent>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::Feed(format!("Failed to fetch schedule feed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Feed(format!(
                "Schedule feed error ({}): {}",
                status, error_text
            )));
        }

        let document: FeedDocument = response
            .json()
            .await
            .map_err(|e| AppError::Feed(format!("Failed to parse schedule feed: {}", e)))?;

        Ok(document
            .items
            .into_iter()
            .filter_map(into_live_event)
            .collect())
    }
}

fn into_live_event(item: FeedItem) -> Option<LiveEvent> {
    let scheduled_start_time = match parse_timestamp(&item.scheduled_start_time) {
        Some(t) => t,
        None => {
            warn!(
                "Skipping feed item {}: bad scheduled_start_time {:?}",
                item.id, item.scheduled_start_time
            );
            return None;
        }
    };
    let actual_start_time = parse_optional(&item, item.actual_start_time.as_deref(), "actual_start_time")?;
    let actual_end_time = parse_optional(&item, item.actual_end_time.as_deref(), "actual_end_time")?;

    Some(LiveEvent {
        id: item.id,
        channel_id: item.channel_id,
        channel_title: item.channel_title,
        actor: item.actor,
        title: item.title,
        collaborate: item.collaborate,
        scheduled_start_time,
        actual_start_time,
        actual_end_time,
    })
}

/// `None` means the item should be dropped; `Some(None)` means the field was
/// simply absent.
fn parse_optional(
    item: &FeedItem,
    raw: Option<&str>,
    field: &str,
) -> Option<Option<DateTime<Utc>>> {
    match raw {
        None => Some(None),
        Some(s) => match parse_timestamp(s) {
            Some(t) => Some(Some(t)),
            None => {
                warn!("Skipping feed item {}: bad {} {:?}", item.id, field, s);
                None
            }
        },
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
