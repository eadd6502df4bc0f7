// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solax automation.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz


//! Meteosource hourly forecast, scored as weather quality.
//!
//! Quality is the weather severity level minus the cloud cover fraction, so
//! lower is sunnier.

use crate::config::MeteosourceConfig;
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use solax_core::WeatherProvider;
use solax_types::{HourlySample, WeatherType};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FORECAST_PATH: &str = "v1/free/point";
const SECTIONS: &str = "current,hourly";

/// `cloud_cover` is either a bare percentage or an object with a `total`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CloudCover {
    Total(f64),
    Detailed { total: f64 },
}

impl CloudCover {
    pub fn total(self) -> f64 {
        match self {
            Self::Total(total) | Self::Detailed { total } => total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyForecast {
    pub date: NaiveDateTime,
    #[serde(default = "not_available")]
    pub weather: WeatherType,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cloud_cover: Option<CloudCover>,
}

fn not_available() -> WeatherType {
    WeatherType::NotAvailable
}

impl HourlyForecast {
    pub fn quality(&self) -> f64 {
        let cloud = self.cloud_cover.map_or(0.0, CloudCover::total);
        self.weather.level() - cloud / 100.0
    }

    pub fn sample(&self) -> HourlySample {
        HourlySample::new(self.date, self.quality())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DataWrapper<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherForecast {
    #[serde(default)]
    pub timezone: Option<String>,
    hourly: Option<DataWrapper<Vec<HourlyForecast>>>,
}

impl WeatherForecast {
    pub fn hourly(&self) -> AdapterResult<&[HourlyForecast]> {
        self.hourly
            .as_ref()
            .map(|wrapper| wrapper.data.as_slice())
            .ok_or_else(|| AdapterError::InvalidResponse("missing hourly section".to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct MeteosourceClient {
    base_url: String,
    api_key: String,
    place_id: String,
    client: Client,
}

impl MeteosourceClient {
    pub fn new(config: &MeteosourceConfig) -> AdapterResult<Self> {
        info!("Initializing MeteoSource service with API url: {}", config.base_url);

        if config.api_key.is_empty() {
            warn!("⚠️ Meteosource API key is empty; forecasts will be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AdapterError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            place_id: config.place_id.clone(),
            client,
        })
    }

    /// Returns `Ok(None)` when the service has no data for the place
    pub async fn fetch(&self) -> AdapterResult<Option<WeatherForecast>> {
        debug!("Request to get current weather");

        let url = format!("{}/{FORECAST_PATH}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("place_id", self.place_id.as_str()), ("sections", SECTIONS)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<WeatherForecast>().await?)),
            StatusCode::NO_CONTENT => Ok(None),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(AdapterError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for MeteosourceClient {
    async fn current_forecast(&self) -> Option<Vec<HourlySample>> {
        let forecast = match self.fetch().await {
            Ok(Some(forecast)) => forecast,
            Ok(None) => {
                warn!(
                    "⚠️ No weather data available for the given place ID: {}",
                    self.place_id
                );
                return None;
            }
            Err(e) => {
                error!("❌ Error fetching weather forecast: {e}");
                return None;
            }
        };

        match forecast.hourly() {
            Ok(hours) => Some(hours.iter().map(HourlyForecast::sample).collect()),
            Err(e) => {
                error!("❌ {e}");
                None
            }
        }
    }
}
