//! Normalizes the model's reply into an [`AnalysisResponse`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{AnalysisRequest, AnalysisResponse, LocationEcho};

pub const NO_ANALYSIS: &str = "No analysis generated";

/// The two reply shapes the gateway is known to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// `{"choices": [{"message": {"content": "..."}}]}`
    ChatCompletion(ChatCompletion),
    /// `[{"generated_text": "..."}]`, or a single bare generation object.
    Generations(Vec<Generation>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub generated_text: Option<String>,
}

impl ModelReply {
    /// Objects are tried as chat completions, then as one generation when they
    /// carry `generated_text`. Arrays are generation lists. Anything else is
    /// unrecognized.
    pub fn decode(raw: &Value) -> Option<Self> {
        match raw {
            Value::Object(fields) => ChatCompletion::deserialize(raw)
                .ok()
                .map(ModelReply::ChatCompletion)
                .or_else(|| {
                    if !fields.contains_key("generated_text") {
                        return None;
                    }
                    Generation::deserialize(raw).ok().map(|g| ModelReply::Generations(vec![g]))
                }),
            Value::Array(_) => Vec::<Generation>::deserialize(raw).ok().map(ModelReply::Generations),
            _ => None,
        }
    }

    /// Text of the first choice / first generation, if non-blank.
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            ModelReply::ChatCompletion(c) => c.choices.first()?.message.content.as_deref(),
            ModelReply::Generations(g) => g.first()?.generated_text.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// Plain-text answer from a raw reply. Never fails.
pub fn extract_text(raw: &Value) -> String {
    ModelReply::decode(raw)
        .as_ref()
        .and_then(ModelReply::text)
        .unwrap_or(NO_ANALYSIS)
        .to_string()
}

pub fn build_response(request: &AnalysisRequest, raw: &Value, now: DateTime<Utc>) -> AnalysisResponse {
    AnalysisResponse {
        location: LocationEcho {
            name: request.location.name.clone(),
            coordinates: request.location.coordinates(),
            kind: request.location.kind.clone(),
        },
        weather_summary: request.weather.clone(),
        analysis: extract_text(raw),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
