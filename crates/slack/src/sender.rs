use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("slack message post failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api rejected message: {0}")]
    Api(String),
}

/// Outbound reply seam. The production implementation posts to the Slack Web
/// API; tests substitute a recording fake.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), SendError>;
}

pub struct HttpMessageSender {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

impl HttpMessageSender {
    pub fn new(base_url: &str, bot_token: SecretString) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            bot_token,
        }
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), SendError> {
        let url = format!("{}/chat.postMessage", self.base_url);
        let body = serde_json::json!({ "channel": channel_id, "text": text });

        let response = self
            .http
            .post(url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed = response.json::<PostMessageResponse>().await?;
        if !parsed.ok {
            return Err(SendError::Api(parsed.error.unwrap_or_else(|| "unknown error".to_owned())));
        }

        Ok(())
    }
}
