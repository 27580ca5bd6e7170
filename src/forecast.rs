use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ForecastConfig;
use crate::weather::{CLOUDY, RAINY, SUNNY};

pub const MAX_DAYS: u8 = 7;

static CLIENT: Lazy<Result<Client, String>> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("shore-squad/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| err.to_string())
});

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub tag: &'static str,
    pub weather_code: u8,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub precipitation_chance: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: DailyDoc,
}

#[derive(Debug, Deserialize)]
struct DailyDoc {
    time: Vec<NaiveDate>,
    weather_code: Vec<Option<u8>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<u8>>,
}

pub struct ForecastClient {
    endpoint: String,
    latitude: f64,
    longitude: f64,
}

impl ForecastClient {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
        }
    }

    /// Daily outlook for the next `days` days, clamped to `1..=MAX_DAYS`.
    pub fn fetch(&self, days: u8) -> Result<Vec<DailyForecast>, ForecastError> {
        let days = days.clamp(1, MAX_DAYS);
        let client = (*CLIENT).as_ref().map_err(|err| ForecastError::Http(err.clone()))?;

        tracing::debug!(endpoint = %self.endpoint, days, "fetching forecast");
        let response = client
            .get(&self.endpoint)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                (
                    "daily",
                    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max"
                        .to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("forecast_days", days.to_string()),
            ])
            .send()
            .map_err(|err| ForecastError::Http(err.to_string()))?
            .error_for_status()
            .map_err(|err| ForecastError::Http(err.to_string()))?;
        let body = response
            .text()
            .map_err(|err| ForecastError::Http(err.to_string()))?;

        parse_forecast(&body)
    }
}

pub fn parse_forecast(body: &str) -> Result<Vec<DailyForecast>, ForecastError> {
    let doc: ForecastResponse =
        serde_json::from_str(body).map_err(|err| ForecastError::Parse(err.to_string()))?;
    let daily = doc.daily;

    let days = daily
        .time
        .iter()
        .enumerate()
        .filter_map(|(idx, date)| {
            let code = daily.weather_code.get(idx).copied().flatten()?;
            Some(DailyForecast {
                date: *date,
                tag: tag_for_code(code),
                weather_code: code,
                temp_max_c: daily.temperature_2m_max.get(idx).copied().flatten(),
                temp_min_c: daily.temperature_2m_min.get(idx).copied().flatten(),
                precipitation_chance: daily
                    .precipitation_probability_max
                    .get(idx)
                    .copied()
                    .flatten(),
            })
        })
        .collect();
    Ok(days)
}

/// Maps a WMO weather interpretation code onto the board's weather tags.
pub fn tag_for_code(code: u8) -> &'static str {
    match code {
        0 | 1 => SUNNY,
        2..=48 => CLOUDY,
        _ => RAINY,
    }
}
