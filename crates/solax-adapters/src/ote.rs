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


//! Czech day-ahead spot prices (OTE) from spotovaelektrina.cz.
//!
//! The API publishes CZK/MWh; everything leaving this module is CZK/kWh.

use crate::config::OteConfig;
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use solax_core::{Clock, PriceProvider};
use solax_types::HourlySample;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ACTUAL_PRICE_PATH: &str = "v1/price/get-actual-price-json";
const PRICES_PATH: &str = "v1/price/get-prices-json";

const MWH_TO_KWH: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourPrice {
    pub hour: u32,
    #[serde(rename = "priceCZK")]
    pub price_czk: f64,
    #[serde(default)]
    pub price_eur: f64,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub level_num: i32,
}

impl HourPrice {
    pub fn czk_per_kwh(&self) -> f64 {
        self.price_czk / MWH_TO_KWH
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPrices {
    #[serde(default)]
    pub hours_today: Vec<HourPrice>,
    #[serde(default)]
    pub hours_tomorrow: Vec<HourPrice>,
}

impl DayPrices {
    /// Flatten into dated samples; today is the local date at fetch time
    pub fn samples(&self, today: NaiveDate) -> Vec<HourlySample> {
        let tomorrow = today.checked_add_days(Days::new(1));
        let mut samples = Vec::with_capacity(self.hours_today.len() + self.hours_tomorrow.len());

        let days = [(Some(today), &self.hours_today), (tomorrow, &self.hours_tomorrow)];
        for (date, hours) in days {
            let Some(date) = date else { continue };
            for price in hours {
                match date.and_hms_opt(price.hour, 0, 0) {
                    Some(timestamp) => {
                        samples.push(HourlySample::new(timestamp, price.czk_per_kwh()));
                    }
                    None => warn!("⚠️ Skipping price for invalid hour {} on {date}", price.hour),
                }
            }
        }
        samples
    }
}

/// OTE spot price client
#[derive(Clone)]
pub struct OtePriceClient {
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for OtePriceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtePriceClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OtePriceClient {
    pub fn new(config: &OteConfig, clock: Arc<dyn Clock>) -> AdapterResult<Self> {
        info!("Initializing OTE service with API url: {}", config.base_url);

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AdapterError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client,
            clock,
        })
    }

    pub async fn current_price(&self) -> AdapterResult<HourPrice> {
        debug!("Requesting to get current hour prices");
        self.get_json(ACTUAL_PRICE_PATH).await
    }

    pub async fn prices(&self) -> AdapterResult<DayPrices> {
        debug!("Requesting to get today and tomorrow prices");
        self.get_json(PRICES_PATH).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AdapterResult<T> {
        let url = format!("{}/{path}", self.base_url);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<T>().await?),
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
impl PriceProvider for OtePriceClient {
    async fn current_hour_price(&self) -> Option<f64> {
        match self.current_price().await {
            Ok(price) => Some(price.czk_per_kwh()),
            Err(e) => {
                error!("❌ Error fetching actual price: {e}");
                None
            }
        }
    }

    async fn forecast(&self) -> Option<Vec<HourlySample>> {
        match self.prices().await {
            Ok(prices) => Some(prices.samples(self.clock.now().date())),
            Err(e) => {
                error!("❌ Error fetching today and tomorrow prices: {e}");
                None
            }
        }
    }
}
