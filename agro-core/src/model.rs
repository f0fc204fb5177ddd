use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A geographic point under analysis, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl LocationDescriptor {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, name: None, kind: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// `"<lat>, <lon>"`, keeping the shortest exact rendering of each number.
    pub fn coordinates(&self) -> String {
        format!("{}, {}", self.lat, self.lon)
    }
}

/// Scalar statistics over a historical daily weather window.
///
/// Every field is optional; renderers substitute "N/A" for absent values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSummary {
    #[serde(default)]
    pub avg_temp: Option<f64>,
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub total_precip: Option<f64>,
    #[serde(default)]
    pub avg_humidity: Option<f64>,
    #[serde(default)]
    pub avg_wind_speed: Option<f64>,
    #[serde(default)]
    pub avg_solar: Option<f64>,
    #[serde(default)]
    pub avg_pressure: Option<f64>,
}

impl WeatherSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Which template and reply shape an analysis uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Full,
    Summarize,
    Chat,
}

impl AnalysisMode {
    /// Collapse the two wire flags into one mode. `chat` wins over `summarize`.
    pub fn from_flags(summarize: bool, chat: bool) -> Self {
        match (chat, summarize) {
            (true, _) => AnalysisMode::Chat,
            (false, true) => AnalysisMode::Summarize,
            (false, false) => AnalysisMode::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Full => "full",
            AnalysisMode::Summarize => "summarize",
            AnalysisMode::Chat => "chat",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location as it arrives on the wire, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationPayload {
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Request body accepted by the analysis endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    #[serde(default)]
    pub location: Option<LocationPayload>,
    #[serde(default)]
    pub weather_data: Option<WeatherSummary>,
    #[serde(default)]
    pub summarize: Option<bool>,
    #[serde(default)]
    pub chat_mode: Option<bool>,
    #[serde(default)]
    pub analysis_context: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
}

impl AnalysisPayload {
    pub fn mode(&self) -> AnalysisMode {
        AnalysisMode::from_flags(
            self.summarize.unwrap_or(false),
            self.chat_mode.unwrap_or(false),
        )
    }

    /// Validate the location and fix the mode. Returns `None` when `lat` or `lon` is missing.
    pub fn into_request(self) -> Option<AnalysisRequest> {
        let mode = self.mode();
        let location = self.location?;
        let (lat, lon) = (location.lat?, location.lon?);

        Some(AnalysisRequest {
            location: LocationDescriptor { lat, lon, name: location.name, kind: location.kind },
            weather: self.weather_data,
            mode,
            analysis_context: self.analysis_context,
            messages: self.messages.unwrap_or_default(),
        })
    }
}

/// A validated analysis request; lives for a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub location: LocationDescriptor,
    pub weather: Option<WeatherSummary>,
    pub mode: AnalysisMode,
    pub analysis_context: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl AnalysisRequest {
    pub fn new(location: LocationDescriptor, weather: Option<WeatherSummary>, mode: AnalysisMode) -> Self {
        Self { location, weather, mode, analysis_context: None, messages: Vec::new() }
    }

    pub fn chat(
        location: LocationDescriptor,
        weather: Option<WeatherSummary>,
        analysis_context: Option<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self { location, weather, mode: AnalysisMode::Chat, analysis_context, messages }
    }
}

/// Location echoed back in a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEcho {
    #[serde(default)]
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub location: LocationEcho,
    pub weather_summary: Option<WeatherSummary>,
    pub analysis: String,
    /// ISO-8601, millisecond precision, UTC.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// One ranked hit from the free-text location search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHit {
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl From<LocationHit> for LocationDescriptor {
    fn from(hit: LocationHit) -> Self {
        Self { lat: hit.lat, lon: hit.lon, name: Some(hit.display_name), kind: hit.kind }
    }
}

/// Geocoders hand coordinates back as strings, browsers as numbers; accept both.
/// Anything unparseable counts as missing.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(coordinate))
}

/// A JSON number or numeric string; anything else, or a non-finite value, is absent.
fn coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// `location.lat`/`location.lon` of an undecoded request body.
///
/// Only those two fields are inspected, so a body whose other fields are
/// malformed still answers whether the location is usable.
pub fn location_coordinates(body: &Value) -> Option<(f64, f64)> {
    let location = body.get("location")?;
    Some((coordinate(location.get("lat")?)?, coordinate(location.get("lon")?)?))
}
