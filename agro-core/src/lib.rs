//! Core library for the `agro` crop analysis service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather statistics aggregation over daily climate series
//! - Prompt rendering, the model gateway and reply normalization
//! - The analysis pipeline and its HTTP endpoint
//! - Clients for the geocoding and historical-weather collaborators
//!
//! It is used by `agro-cli`, but can also be embedded by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod server;

pub use aggregate::{ClimateParameter, ParameterStats, ParameterTable, Series};
pub use config::{Config, GatewayConfig, ServerConfig, WeatherConfig};
pub use error::{AnalysisError, GatewayConfigError, GatewayError};
pub use gateway::{GatewayRequest, GenerationSettings, ModelGateway};
pub use model::{
    AnalysisMode, AnalysisPayload, AnalysisRequest, AnalysisResponse, ChatMessage, ErrorEnvelope,
    LocationDescriptor, LocationHit, Role, WeatherSummary,
};
pub use pipeline::AnalysisService;
pub use provider::{LocationSearch, WeatherHistory};
