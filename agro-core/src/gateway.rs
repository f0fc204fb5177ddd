use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

use crate::{
    config::GatewayConfig,
    error::{GatewayConfigError, GatewayError},
    model::ChatMessage,
    prompt::Prompt,
};

pub mod huggingface;

pub use huggingface::HuggingFaceGateway;

/// Model id and sampling knobs sent with every call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GatewayConfig::default().generation()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub return_full_text: bool,
}

/// Request body for the upstream model, chat-style or completion-style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GatewayRequest {
    Chat {
        model: String,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
        top_p: f32,
    },
    Completion {
        model: String,
        inputs: String,
        parameters: GenerationParameters,
    },
}

impl GatewayRequest {
    pub fn from_prompt(prompt: Prompt, settings: &GenerationSettings) -> Self {
        match prompt {
            Prompt::Chat(messages) => GatewayRequest::Chat {
                model: settings.model.clone(),
                messages,
                max_tokens: settings.max_new_tokens,
                temperature: settings.temperature,
                top_p: settings.top_p,
            },
            Prompt::Completion(inputs) => GatewayRequest::Completion {
                model: settings.model.clone(),
                inputs,
                parameters: GenerationParameters {
                    max_new_tokens: settings.max_new_tokens,
                    temperature: settings.temperature,
                    top_p: settings.top_p,
                    return_full_text: false,
                },
            },
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, GatewayRequest::Chat { .. })
    }
}

/// The outbound language-model call.
///
/// Implementations return the raw JSON reply; interpreting its shape is the
/// caller's job.
#[async_trait]
pub trait ModelGateway: Send + Sync + Debug {
    async fn generate(&self, request: &GatewayRequest) -> Result<serde_json::Value, GatewayError>;
}

/// Construct the configured gateway. Fails when no credential is set.
pub fn gateway_from_config(config: &GatewayConfig) -> Result<Arc<dyn ModelGateway>, GatewayConfigError> {
    let gateway = HuggingFaceGateway::from_config(config)?;
    Ok(Arc::new(gateway))
}
