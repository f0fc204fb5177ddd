use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::LocationHit;

use super::{LocationSearch, truncate_body};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// OpenStreetMap Nominatim geocoder.
#[derive(Debug, Clone)]
pub struct NominatimSearch {
    base_url: String,
    http: Client,
}

impl NominatimSearch {
    pub fn new() -> Result<Self> {
        Self::with_base_url(NOMINATIM_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        // Nominatim's usage policy requires an identifying User-Agent.
        let http = Client::builder()
            .user_agent(concat!("agro/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build geocoding HTTP client")?;

        Ok(Self { base_url: base_url.into(), http })
    }
}

#[derive(Debug, Deserialize)]
struct NmPlace {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

fn into_hits(places: Vec<NmPlace>) -> Result<Vec<LocationHit>> {
    places
        .into_iter()
        .map(|p| {
            let lat = p
                .lat
                .parse::<f64>()
                .with_context(|| format!("Invalid latitude '{}' for {}", p.lat, p.display_name))?;
            let lon = p
                .lon
                .parse::<f64>()
                .with_context(|| format!("Invalid longitude '{}' for {}", p.lon, p.display_name))?;

            Ok(LocationHit { display_name: p.display_name, lat, lon, kind: p.kind })
        })
        .collect()
}

#[async_trait]
impl LocationSearch for NominatimSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LocationHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit.max(1).to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[("format", "json"), ("q", query), ("limit", limit.as_str())])
            .send()
            .await
            .context("Failed to send request to Nominatim")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Nominatim response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Nominatim search failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let places: Vec<NmPlace> =
            serde_json::from_str(&body).context("Failed to parse Nominatim JSON")?;

        into_hits(places)
    }
}
