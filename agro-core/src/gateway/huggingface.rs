use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::GatewayConfig,
    error::{GatewayConfigError, GatewayError},
};

use super::{GatewayRequest, ModelGateway};

/// Hugging Face hosted inference: text-generation for completions, the
/// OpenAI-compatible router for chat.
#[derive(Clone)]
pub struct HuggingFaceGateway {
    api_key: String,
    completion_url: String,
    chat_url: String,
    timeout: Duration,
    retries: u8,
    backoff: Duration,
    http: Client,
}

impl HuggingFaceGateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayConfigError> {
        let api_key = config.api_key().ok_or(GatewayConfigError::MissingApiKey)?.to_owned();
        let completion_url = checked_url(&config.completion_url)?;
        let chat_url = checked_url(&config.chat_url)?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayConfigError::Client(e.to_string()))?;

        Ok(Self {
            api_key,
            completion_url,
            chat_url,
            timeout: config.timeout(),
            retries: config.retries(),
            backoff: config.retry_backoff(),
            http,
        })
    }

    fn endpoint(&self, request: &GatewayRequest) -> &str {
        if request.is_chat() { &self.chat_url } else { &self.completion_url }
    }

    async fn send_once(&self, request: &GatewayRequest) -> Result<Value, GatewayError> {
        let url = self.endpoint(request);

        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "model gateway returned a non-JSON body");
                Ok(Value::String(body))
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Transport(format!(
                "model gateway request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            GatewayError::Transport(format!("model gateway request failed: {err}"))
        }
    }
}

impl std::fmt::Debug for HuggingFaceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceGateway")
            .field("completion_url", &self.completion_url)
            .field("chat_url", &self.chat_url)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelGateway for HuggingFaceGateway {
    async fn generate(&self, request: &GatewayRequest) -> Result<Value, GatewayError> {
        let mut attempt: u8 = 0;

        loop {
            debug!(attempt, chat = request.is_chat(), "calling model gateway");

            match self.send_once(request).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = self.backoff * u32::from(attempt);
                    warn!(
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "model gateway call failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn checked_url(url: &str) -> Result<String, GatewayConfigError> {
    Url::parse(url).map(|_| url.to_string()).map_err(|e| GatewayConfigError::InvalidEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
