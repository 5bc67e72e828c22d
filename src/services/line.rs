use reqwest::Client;
use serde::Serialize;

use crate::config::LineConfig;
use crate::error::{AppError, AppResult};
use crate::services::BroadcastGateway;

const LINE_API_URL: &str = "https://api.line.me/v2/bot";

/// LINE Messaging API adapter: broadcasts a text message to every subscriber
/// of the channel. Fire-and-forget; delivery state is not consumed.
#[derive(Debug, Clone)]
pub struct LineService {
    client: Client,
    channel_access_token: String,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest {
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: String,
}

impl LineService {
    pub fn new(config: &LineConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Broadcast(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            channel_access_token: config.channel_access_token.clone(),
        })
    }
}

#[async_trait::async_trait]
impl BroadcastGateway for LineService {
    async fn broadcast(&self, text: &str) -> AppResult<()> {
        let body = BroadcastRequest {
            messages: vec![TextMessage {
                message_type: "text",
                text: text.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/message/broadcast", LINE_API_URL))
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Broadcast(format!("Failed to send broadcast: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Broadcast(format!(
                "LINE API error ({}): {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_body_wraps_text_message() {
        let body = BroadcastRequest {
            messages: vec![TextMessage {
                message_type: "text",
                text: "hello".to_string(),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hello");
    }
}
