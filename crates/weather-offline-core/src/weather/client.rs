//! Client for the OpenWeatherMap current-weather endpoint.
//!
//! Requests go through a `Fetcher`, so a page-side client can route them
//! through the offline worker and get the last known answer when offline.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use url::Url;

use super::{LocationQuery, WeatherError, WeatherRecord};
use crate::http::{Fetcher, Request, RequestMode};

/// Base URL for the weather-data provider
const API_BASE_URL: &str = "https://api.openweathermap.org/";

/// Current-weather endpoint, relative to the base URL
const WEATHER_PATH: &str = "data/2.5/weather";

/// Unit system requested from the provider (Celsius, m/s).
const UNITS: &str = "metric";

#[derive(Clone)]
pub struct WeatherClient {
    fetcher: Arc<dyn Fetcher>,
    base_url: Url,
    api_key: String,
}

impl WeatherClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_base_url(fetcher, api_key, Url::parse(API_BASE_URL)?))
    }

    pub fn with_base_url(fetcher: Arc<dyn Fetcher>, api_key: impl Into<String>, base_url: Url) -> Self {
        Self {
            fetcher,
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn weather_url(&self, query: &LocationQuery) -> Result<Url, WeatherError> {
        let mut url = self
            .base_url
            .join(WEATHER_PATH)
            .map_err(|e| WeatherError::Generic(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            match query {
                LocationQuery::City(city) => {
                    pairs.append_pair("q", city);
                }
                LocationQuery::Coordinates { lat, lon } => {
                    pairs.append_pair("lat", &lat.to_string());
                    pairs.append_pair("lon", &lon.to_string());
                }
            }
            pairs.append_pair("units", UNITS);
            pairs.append_pair("appid", &self.api_key);
        }
        Ok(url)
    }

    /// Look up current weather for `query`.
    pub async fn fetch_weather(&self, query: &LocationQuery) -> Result<WeatherRecord, WeatherError> {
        let request = Request::get(self.weather_url(query)?)
            .with_mode(RequestMode::Cors)
            .with_header("accept", "application/json");

        let response = self.fetcher.fetch(&request).await?;
        if !response.is_ok() {
            let err = WeatherError::from_status(response.status, &response.text());
            warn!(status = response.status, error = %err, "Weather lookup failed");
            return Err(err);
        }

        let body = response.body.unwrap_or_default();
        let record: WeatherRecord = serde_json::from_slice(&body)
            .map_err(|e| WeatherError::Generic(format!("Failed to parse weather response: {}", e)))?;
        debug!(location = %record.name, "Weather received");
        Ok(record)
    }

    pub async fn fetch_weather_by_city(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        self.fetch_weather(&LocationQuery::parse_city(city)?).await
    }

    pub async fn fetch_weather_by_coords(&self, lat: f64, lon: f64) -> Result<WeatherRecord, WeatherError> {
        self.fetch_weather(&LocationQuery::coordinates(lat, lon)?).await
    }
}
