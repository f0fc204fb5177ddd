use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::aggregate::ParameterTable;

use super::{HistoryRequest, WeatherHistory, truncate_body};

pub const POWER_DAILY_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

/// Marker the archive uses for days without data.
pub const FILL_VALUE: f64 = -999.0;

/// NASA POWER daily point archive, agroclimatology community.
#[derive(Debug, Clone)]
pub struct PowerClient {
    base_url: String,
    http: Client,
}

impl PowerClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(POWER_DAILY_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build weather HTTP client")?;

        Ok(Self { base_url: base_url.into(), http })
    }
}

#[derive(Debug, Deserialize)]
struct PwProperties {
    parameter: ParameterTable,
}

#[derive(Debug, Deserialize)]
struct PwResponse {
    properties: PwProperties,
}

/// Drop fill-value days; a parameter left with no days is dropped entirely.
fn strip_fill_values(table: ParameterTable) -> ParameterTable {
    let mut cleaned = ParameterTable::new();
    for (code, mut series) in table {
        series.retain(|_, v| (*v - FILL_VALUE).abs() > f64::EPSILON);
        if !series.is_empty() {
            cleaned.insert(code, series);
        }
    }
    cleaned
}

#[async_trait]
impl WeatherHistory for PowerClient {
    async fn daily(&self, request: &HistoryRequest) -> Result<ParameterTable> {
        if request.parameters.is_empty() {
            return Ok(ParameterTable::new());
        }

        let parameters =
            request.parameters.iter().map(|p| p.code()).collect::<Vec<_>>().join(",");
        let latitude = request.lat.to_string();
        let longitude = request.lon.to_string();
        let start = request.start.format("%Y%m%d").to_string();
        let end = request.end.format("%Y%m%d").to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("parameters", parameters.as_str()),
                ("community", "AG"),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("format", "JSON"),
            ])
            .send()
            .await
            .context("Failed to send request to NASA POWER")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read NASA POWER response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "NASA POWER request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: PwResponse =
            serde_json::from_str(&body).context("Failed to parse NASA POWER JSON")?;

        Ok(strip_fill_values(parsed.properties.parameter))
    }
}
