use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use askwolf_core::config::{UnitSystem, WolframConfig};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("knowledge api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("knowledge api could not answer: {0}")]
    NoAnswer(String),
    #[error("knowledge api returned status {status}")]
    Status { status: u16 },
}

/// Sends a query string to the computational knowledge API and returns the
/// spoken-form answer text.
#[async_trait]
pub trait AnswerClient: Send + Sync {
    async fn spoken_answer(&self, query: &str) -> Result<String, AnswerError>;
}

/// Wolfram Alpha `/v1/spoken` client.
pub struct SpokenAnswerClient {
    http: reqwest::Client,
    base_url: String,
    app_id: SecretString,
    units: UnitSystem,
    spoken_timeout: u32,
}

impl SpokenAnswerClient {
    pub fn from_config(config: &WolframConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            app_id: config.app_id.clone(),
            units: config.units,
            spoken_timeout: config.spoken_timeout,
        }
    }
}

#[async_trait]
impl AnswerClient for SpokenAnswerClient {
    async fn spoken_answer(&self, query: &str) -> Result<String, AnswerError> {
        let url = format!("{}/v1/spoken", self.base_url);
        let timeout = self.spoken_timeout.to_string();
        let response = self
            .http
            .get(url)
            .query(&[
                ("appid", self.app_id.expose_secret()),
                ("i", query),
                ("units", self.units.as_query_value()),
                ("timeout", timeout.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        // The spoken endpoint answers 501 with an explanatory body when the
        // input cannot be interpreted.
        if status.as_u16() == 501 {
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::NoAnswer(body));
        }
        if !status.is_success() {
            return Err(AnswerError::Status { status: status.as_u16() });
        }

        Ok(response.text().await?)
    }
}
