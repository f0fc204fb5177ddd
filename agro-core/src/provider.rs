use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::fmt::Debug;

use crate::{
    aggregate::{ClimateParameter, ParameterTable},
    model::LocationHit,
};

pub mod nominatim;
pub mod power;

pub use nominatim::NominatimSearch;
pub use power::PowerClient;

/// Days the daily point archive trails behind today.
pub const ARCHIVE_LAG_DAYS: i64 = 3;

/// Free-text place lookup.
#[async_trait]
pub trait LocationSearch: Send + Sync + Debug {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<LocationHit>>;
}

/// Daily historical series for a point.
#[async_trait]
pub trait WeatherHistory: Send + Sync + Debug {
    async fn daily(&self, request: &HistoryRequest) -> anyhow::Result<ParameterTable>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub lat: f64,
    pub lon: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub parameters: Vec<ClimateParameter>,
}

impl HistoryRequest {
    /// The most recent `days` of archived data for every known parameter.
    pub fn recent(lat: f64, lon: f64, today: NaiveDate, days: u32) -> Self {
        let (start, end) = history_window(today, days);
        Self { lat, lon, start, end, parameters: ClimateParameter::all().to_vec() }
    }
}

/// Inclusive `[start, end]` window of `days` days ending at the archive's edge.
pub fn history_window(today: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    let end = today - Duration::days(ARCHIVE_LAG_DAYS);
    let start = end - Duration::days(i64::from(days.max(1)) - 1);
    (start, end)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
