use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use askwolf_core::config::WitConfig;

#[derive(Debug, Error)]
pub enum NluError {
    #[error("nlu request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("nlu service returned status {status}")]
    Status { status: u16 },
}

/// Sends free text to the NLU service and returns the parsed intent/entity
/// document. The document is deliberately loosely typed: the only path the
/// bot cares about is resolved by the extractor.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn parse_message(&self, text: &str) -> Result<serde_json::Value, NluError>;
}

/// Wit.ai `/message` client.
pub struct WitClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    api_version: String,
}

impl WitClient {
    pub fn from_config(config: &WitConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
            api_version: config.api_version.clone(),
        }
    }
}

#[async_trait]
impl NluClient for WitClient {
    async fn parse_message(&self, text: &str) -> Result<serde_json::Value, NluError> {
        let url = format!("{}/message", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .query(&[("v", self.api_version.as_str()), ("q", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NluError::Status { status: status.as_u16() });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}
