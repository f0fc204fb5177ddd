use thiserror::Error;

use crate::model::ErrorEnvelope;

/// The gateway cannot be constructed from the given configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayConfigError {
    #[error("no API key configured for the model gateway")]
    MissingApiKey,
    #[error("invalid gateway endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// A single outbound model call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Upstream answered with a non-success status.
    #[error("Status {status}: {body}")]
    Status { status: u16, body: String },
    /// Connection, TLS, timeout or body-read failure.
    #[error("{0}")]
    Transport(String),
}

impl GatewayError {
    /// 5xx answers and transport failures are worth one more attempt; 4xx are not.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Status { status, .. } => *status >= 500,
            GatewayError::Transport(_) => true,
        }
    }
}

/// Everything an analysis invocation can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Location data is required")]
    MissingLocation,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("API configuration error: {0}")]
    GatewayConfig(String),
    #[error("upstream model call failed with status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream model call failed: {0}")]
    Transport(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisError::MissingLocation | AnalysisError::InvalidRequest(_) => 400,
            AnalysisError::GatewayConfig(_)
            | AnalysisError::Upstream { .. }
            | AnalysisError::Transport(_)
            | AnalysisError::Internal(_) => 500,
        }
    }

    /// Caller-facing body. Configuration detail stays in the logs.
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            AnalysisError::MissingLocation => ErrorEnvelope::new("Location data is required"),
            AnalysisError::InvalidRequest(details) => {
                ErrorEnvelope::new("Invalid request").with_details(details.clone())
            }
            AnalysisError::GatewayConfig(_) => ErrorEnvelope::new("API configuration error"),
            AnalysisError::Upstream { status, body } => ErrorEnvelope::new("AI analysis failed")
                .with_details(format!("Status {status}: {body}")),
            AnalysisError::Transport(message) => {
                ErrorEnvelope::new("AI analysis failed").with_details(message.clone())
            }
            AnalysisError::Internal(details) => {
                ErrorEnvelope::new("Internal server error").with_details(details.clone())
            }
        }
    }
}

impl From<GatewayConfigError> for AnalysisError {
    fn from(err: GatewayConfigError) -> Self {
        AnalysisError::GatewayConfig(err.to_string())
    }
}

impl From<GatewayError> for AnalysisError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Status { status, body } => AnalysisError::Upstream { status, body },
            GatewayError::Transport(message) => AnalysisError::Transport(message),
        }
    }
}
