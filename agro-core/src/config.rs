use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::gateway::GenerationSettings;

/// Env var that supplies the model gateway credential.
pub const API_KEY_ENV: &str = "HUGGING_FACE_ACCESS_TOKEN";
/// Env var that overrides the HTTP bind address.
pub const BIND_ENV: &str = "AGRO_BIND";

/// Upper bound on retries of a single model call.
pub const MAX_RETRIES: u8 = 1;

/// Settings for the outbound language-model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub api_key: Option<String>,

    /// Text-generation endpoint used by `full` and `summarize`.
    pub completion_url: String,

    /// OpenAI-compatible chat-completions endpoint used by `chat`.
    pub chat_url: String,

    pub model: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,

    pub timeout_secs: u64,

    /// Extra attempts on 5xx/network failures. Clamped to [`MAX_RETRIES`].
    pub retries: u8,
    pub retry_backoff_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_url:
                "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2"
                    .to_string(),
            chat_url: "https://router.huggingface.co/v1/chat/completions".to_string(),
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            max_new_tokens: 2000,
            temperature: 0.7,
            top_p: 0.9,
            timeout_secs: 60,
            retries: MAX_RETRIES,
            retry_backoff_ms: 500,
        }
    }
}

impl GatewayConfig {
    /// The API key, if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retries(&self) -> u8 {
        self.retries.min(MAX_RETRIES)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.model.clone(),
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind: String,
    /// Route of the analysis endpoint.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8787".to_string(), path: "/analyze-crop-data".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Length of the historical window summarized before an analysis.
    pub history_days: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { history_days: 30 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [gateway]
/// api_key = "hf_..."
/// timeout_secs = 45
///
/// [server]
/// bind = "0.0.0.0:8787"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from disk, then apply process environment overrides once.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Overlay values found through `lookup`. Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_blank(API_KEY_ENV) {
            self.gateway.api_key = Some(key);
        }
        if let Some(bind) = non_blank(BIND_ENV) {
            self.server.bind = bind;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "agro", "agro-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.gateway.api_key = Some(api_key);
    }

    pub fn is_gateway_configured(&self) -> bool {
        self.gateway.api_key().is_some()
    }
}
