use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub calendar: CalendarConfig,
    pub line: LineConfig,
    pub storage: StorageConfig,
    pub feed: FeedConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Target Google Calendar id (e.g. `xxxx@group.calendar.google.com`).
    pub calendar_id: String,
    /// OAuth access token with calendar scope. Token refresh is handled
    /// outside this service; a fresh token is expected in the environment.
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    pub channel_access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// S3-compatible bucket holding published calendar files.
    pub bucket: String,
    pub region: String,
    /// Endpoint host, e.g. `s3.amazonaws.com` or a compatible service.
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Lifetime of published download links, in seconds.
    pub link_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// URL of the parsed live-event schedule document.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How far back the calendar snapshot window reaches.
    pub past_days: i64,
    /// How far ahead the snapshot window reaches; also the creation cutoff
    /// for distant-future events.
    pub future_days: i64,
    /// Width of the "starting soon" alert window.
    pub imminent_window_seconds: i64,
    /// Member names whose solo streams supersede collaboration entries.
    pub members: Vec<String>,
    /// Seconds between reconciliation passes.
    pub interval_seconds: u64,
    /// Run a single pass and exit (for cron-style drivers).
    pub run_once: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            calendar: CalendarConfig {
                calendar_id: env::var("CALENDAR_ID")
                    .map_err(|_| ConfigError::MissingEnv("CALENDAR_ID".to_string()))?,
                access_token: env::var("CALENDAR_ACCESS_TOKEN")
                    .map_err(|_| ConfigError::MissingEnv("CALENDAR_ACCESS_TOKEN".to_string()))?,
            },
            line: LineConfig {
                channel_access_token: env::var("LINE_CHANNEL_ACCESS_TOKEN").map_err(|_| {
                    ConfigError::MissingEnv("LINE_CHANNEL_ACCESS_TOKEN".to_string())
                })?,
            },
            storage: StorageConfig {
                bucket: env::var("STORAGE_BUCKET")
                    .map_err(|_| ConfigError::MissingEnv("STORAGE_BUCKET".to_string()))?,
                region: env::var("STORAGE_REGION")
                    .unwrap_or_else(|_| "ap-northeast-1".to_string()),
                endpoint: env::var("STORAGE_ENDPOINT")
                    .unwrap_or_else(|_| "s3.amazonaws.com".to_string()),
                access_key_id: env::var("STORAGE_ACCESS_KEY_ID")
                    .map_err(|_| ConfigError::MissingEnv("STORAGE_ACCESS_KEY_ID".to_string()))?,
                secret_access_key: env::var("STORAGE_SECRET_ACCESS_KEY").map_err(|_| {
                    ConfigError::MissingEnv("STORAGE_SECRET_ACCESS_KEY".to_string())
                })?,
                link_ttl_seconds: env::var("STORAGE_LINK_TTL_SECONDS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86400),
            },
            feed: FeedConfig {
                url: env::var("SCHEDULE_FEED_URL")
                    .map_err(|_| ConfigError::MissingEnv("SCHEDULE_FEED_URL".to_string()))?,
            },
            sync: SyncConfig {
                past_days: env::var("SYNC_PAST_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .unwrap_or(7),
                future_days: env::var("SYNC_FUTURE_DAYS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .unwrap_or(120),
                imminent_window_seconds: env::var("SYNC_IMMINENT_WINDOW_SECONDS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .unwrap_or(900),
                members: parse_members(&env::var("SYNC_MEMBERS").unwrap_or_default()),
                interval_seconds: env::var("SYNC_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("SYNC_INTERVAL_SECONDS".to_string()))?,
                run_once: match env::var("SYNC_RUN_ONCE") {
                    Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
                    Err(_) => false,
                },
            },
        })
    }
}

/// Parse a comma-separated member list, trimming whitespace and dropping
/// empty segments.
fn parse_members(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_members_splits_and_trims() {
        assert_eq!(
            parse_members("ころね, おかゆ,フブキ"),
            vec!["ころね", "おかゆ", "フブキ"]
        );
        assert_eq!(parse_members(""), Vec::<String>::new());
        assert_eq!(parse_members(" , ,"), Vec::<String>::new());
    }
}
