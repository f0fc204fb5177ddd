//! Reduction of daily climate series into scalar statistics.
//!
//! All functions here are total: an absent or empty series yields `None`,
//! never zero and never NaN.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::WeatherSummary;

/// Daily values for one parameter, keyed by date string (`YYYYMMDD`).
pub type Series = BTreeMap<String, f64>;

/// Series for several parameters, keyed by parameter code.
pub type ParameterTable = BTreeMap<String, Series>;

pub fn average(series: Option<&Series>) -> Option<f64> {
    let series = series.filter(|s| !s.is_empty())?;
    Some(series.values().sum::<f64>() / series.len() as f64)
}

pub fn sum(series: Option<&Series>) -> Option<f64> {
    let series = series.filter(|s| !s.is_empty())?;
    Some(series.values().sum())
}

pub fn minimum(series: Option<&Series>) -> Option<f64> {
    series?.values().copied().reduce(f64::min)
}

pub fn maximum(series: Option<&Series>) -> Option<f64> {
    series?.values().copied().reduce(f64::max)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParameterStats {
    pub avg: Option<f64>,
    pub sum: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ParameterStats {
    pub fn of(series: Option<&Series>) -> Self {
        Self {
            avg: average(series),
            sum: sum(series),
            min: minimum(series),
            max: maximum(series),
        }
    }
}

/// Daily point parameters requested from the historical-weather service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClimateParameter {
    Temperature,
    TemperatureMin,
    TemperatureMax,
    DewPoint,
    Precipitation,
    Humidity,
    WindSpeed,
    SolarRadiation,
    SurfacePressure,
    SurfaceSoilMoisture,
    RootZoneSoilMoisture,
}

impl ClimateParameter {
    pub fn code(&self) -> &'static str {
        match self {
            ClimateParameter::Temperature => "T2M",
            ClimateParameter::TemperatureMin => "T2M_MIN",
            ClimateParameter::TemperatureMax => "T2M_MAX",
            ClimateParameter::DewPoint => "T2MDEW",
            ClimateParameter::Precipitation => "PRECTOTCORR",
            ClimateParameter::Humidity => "RH2M",
            ClimateParameter::WindSpeed => "WS10M",
            ClimateParameter::SolarRadiation => "ALLSKY_SFC_SW_DWN",
            ClimateParameter::SurfacePressure => "PS",
            ClimateParameter::SurfaceSoilMoisture => "GWETTOP",
            ClimateParameter::RootZoneSoilMoisture => "GWETROOT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClimateParameter::Temperature => "Temperature",
            ClimateParameter::TemperatureMin => "Min Temperature",
            ClimateParameter::TemperatureMax => "Max Temperature",
            ClimateParameter::DewPoint => "Dew Point Temperature",
            ClimateParameter::Precipitation => "Precipitation",
            ClimateParameter::Humidity => "Relative Humidity",
            ClimateParameter::WindSpeed => "Wind Speed",
            ClimateParameter::SolarRadiation => "Solar Radiation",
            ClimateParameter::SurfacePressure => "Surface Pressure",
            ClimateParameter::SurfaceSoilMoisture => "Surface Soil Moisture",
            ClimateParameter::RootZoneSoilMoisture => "Root Zone Soil Moisture",
        }
    }

    /// Unit of the daily values as served by the `AG` community.
    pub fn unit(&self) -> &'static str {
        match self {
            ClimateParameter::Temperature
            | ClimateParameter::TemperatureMin
            | ClimateParameter::TemperatureMax
            | ClimateParameter::DewPoint => "°C",
            ClimateParameter::Precipitation => "mm/day",
            ClimateParameter::Humidity => "%",
            ClimateParameter::WindSpeed => "m/s",
            ClimateParameter::SolarRadiation => "MJ/m²/day",
            ClimateParameter::SurfacePressure => "kPa",
            ClimateParameter::SurfaceSoilMoisture | ClimateParameter::RootZoneSoilMoisture => {
                "fraction"
            }
        }
    }

    pub const fn all() -> &'static [ClimateParameter] {
        &[
            ClimateParameter::Temperature,
            ClimateParameter::TemperatureMin,
            ClimateParameter::TemperatureMax,
            ClimateParameter::DewPoint,
            ClimateParameter::Precipitation,
            ClimateParameter::Humidity,
            ClimateParameter::WindSpeed,
            ClimateParameter::SolarRadiation,
            ClimateParameter::SurfacePressure,
            ClimateParameter::SurfaceSoilMoisture,
            ClimateParameter::RootZoneSoilMoisture,
        ]
    }

    pub fn stats(&self, table: &ParameterTable) -> ParameterStats {
        ParameterStats::of(table.get(self.code()))
    }
}

impl std::fmt::Display for ClimateParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for ClimateParameter {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let upper = value.to_uppercase();

        ClimateParameter::all()
            .iter()
            .copied()
            .find(|p| p.code() == upper)
            .ok_or_else(|| anyhow::anyhow!("Unknown climate parameter '{value}'."))
    }
}

/// Derive the summary sent along with an analysis request.
///
/// Min/max temperature prefer the dedicated daily extremes and fall back to
/// the extremes of the daily mean.
pub fn summarize_parameters(table: &ParameterTable) -> WeatherSummary {
    use ClimateParameter as P;

    let series = |p: P| table.get(p.code());

    WeatherSummary {
        avg_temp: average(series(P::Temperature)).map(round2),
        min_temp: minimum(series(P::TemperatureMin))
            .or_else(|| minimum(series(P::Temperature)))
            .map(round2),
        max_temp: maximum(series(P::TemperatureMax))
            .or_else(|| maximum(series(P::Temperature)))
            .map(round2),
        total_precip: sum(series(P::Precipitation)).map(round2),
        avg_humidity: average(series(P::Humidity)).map(round2),
        avg_wind_speed: average(series(P::WindSpeed)).map(round2),
        avg_solar: average(series(P::SolarRadiation)).map(round2),
        avg_pressure: average(series(P::SurfacePressure)).map(round2),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Series {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("202401{:02}", i + 1), *v))
            .collect()
    }

    #[test]
    fn constant_series_statistics_agree() {
        let s = series(&[2.5; 4]);
        let stats = ParameterStats::of(Some(&s));

        assert_eq!(stats.avg, Some(2.5));
        assert_eq!(stats.min, Some(2.5));
        assert_eq!(stats.max, Some(2.5));
        assert_eq!(stats.sum, Some(10.0));
    }

    #[test]
    fn absent_parameter_yields_all_null() {
        assert_eq!(ParameterStats::of(None), ParameterStats::default());
    }

    #[test]
    fn empty_series_yields_null_not_zero() {
        let s = Series::new();
        let stats = ParameterStats::of(Some(&s));

        assert_eq!(stats.avg, None);
        assert_eq!(stats.sum, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
    }

    #[test]
    fn mixed_series_statistics() {
        let s = series(&[-3.0, 1.0, 4.0, 10.0]);

        assert_eq!(average(Some(&s)), Some(3.0));
        assert_eq!(sum(Some(&s)), Some(12.0));
        assert_eq!(minimum(Some(&s)), Some(-3.0));
        assert_eq!(maximum(Some(&s)), Some(10.0));
    }

    #[test]
    fn summary_uses_dedicated_extremes_when_present() {
        let mut table = ParameterTable::new();
        table.insert("T2M".into(), series(&[10.0, 20.0]));
        table.insert("T2M_MIN".into(), series(&[4.0, 8.0]));
        table.insert("T2M_MAX".into(), series(&[25.0, 27.5]));
        table.insert("PRECTOTCORR".into(), series(&[1.25, 0.0, 3.5]));

        let summary = summarize_parameters(&table);

        assert_eq!(summary.avg_temp, Some(15.0));
        assert_eq!(summary.min_temp, Some(4.0));
        assert_eq!(summary.max_temp, Some(27.5));
        assert_eq!(summary.total_precip, Some(4.75));
        assert_eq!(summary.avg_humidity, None);
    }

    #[test]
    fn summary_falls_back_to_mean_temperature_extremes() {
        let mut table = ParameterTable::new();
        table.insert("T2M".into(), series(&[10.0, 20.0, 12.0]));

        let summary = summarize_parameters(&table);

        assert_eq!(summary.min_temp, Some(10.0));
        assert_eq!(summary.max_temp, Some(20.0));
    }

    #[test]
    fn summary_rounds_to_two_decimals() {
        let mut table = ParameterTable::new();
        table.insert("RH2M".into(), series(&[70.0, 71.0, 71.0]));

        assert_eq!(summarize_parameters(&table).avg_humidity, Some(70.67));
    }

    #[test]
    fn empty_table_gives_empty_summary() {
        assert!(summarize_parameters(&ParameterTable::new()).is_empty());
    }

    #[test]
    fn parameter_code_roundtrip() {
        for p in ClimateParameter::all() {
            let parsed = ClimateParameter::try_from(p.code()).expect("roundtrip should succeed");
            assert_eq!(*p, parsed);
        }
        assert!(ClimateParameter::try_from("nope").is_err());
    }
}
