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

//! Call-counting stand-ins for scheduler tests

use crate::traits::{ConnectionSensor, InverterControl, PriceProvider, WeatherProvider};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use solax_types::{ExportLimitError, GridConnection, HourlySample, InverterMode, ManualSubMode};
use tokio::sync::broadcast;

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    // Wednesday
    NaiveDate::from_ymd_opt(2025, 6, 11)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn samples(values: &[(u32, f64)]) -> Vec<HourlySample> {
    values
        .iter()
        .map(|(hour, value)| HourlySample::new(at(*hour, 0), *value))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Mode(InverterMode),
    SubMode(ManualSubMode),
    ExportLimit(u32),
}

/// Inverter with fixed readings that records every write.
///
/// Reads never change as a result of writes, so each fire of a
/// callback is visible as its own entry in `writes()`.
#[derive(Debug, Default)]
pub struct RecordingInverter {
    pub mode: Mutex<Option<InverterMode>>,
    pub battery: Mutex<Option<u8>>,
    pub export_limit: Mutex<Option<u32>>,
    pub fail_writes: Mutex<bool>,
    pub dc_power: Mutex<Option<[u32; 2]>>,
    writes: Mutex<Vec<Write>>,
    reads: Mutex<usize>,
    dc_reads: Mutex<usize>,
}

impl RecordingInverter {
    pub fn new(mode: InverterMode, battery: u8) -> Self {
        let inverter = Self::default();
        *inverter.mode.lock() = Some(mode);
        *inverter.battery.lock() = Some(battery);
        inverter
    }

    pub fn with_export_limit(self, watts: u32) -> Self {
        *self.export_limit.lock() = Some(watts);
        self
    }

    pub fn set_mode(&self, mode: Option<InverterMode>) {
        *self.mode.lock() = mode;
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn read_count(&self) -> usize {
        *self.reads.lock()
    }

    pub fn dc_read_count(&self) -> usize {
        *self.dc_reads.lock()
    }

    fn record(&self, write: Write) -> bool {
        self.writes.lock().push(write);
        !*self.fail_writes.lock()
    }
}

#[async_trait]
impl InverterControl for RecordingInverter {
    async fn read_mode(&self) -> Option<InverterMode> {
        *self.reads.lock() += 1;
        *self.mode.lock()
    }

    async fn write_mode(&self, mode: InverterMode) -> bool {
        self.record(Write::Mode(mode))
    }

    async fn write_manual_sub_mode(&self, sub_mode: ManualSubMode) -> bool {
        self.record(Write::SubMode(sub_mode))
    }

    async fn read_battery_percent(&self) -> Option<u8> {
        *self.reads.lock() += 1;
        *self.battery.lock()
    }

    async fn read_export_limit_watts(&self) -> Option<u32> {
        *self.reads.lock() += 1;
        *self.export_limit.lock()
    }

    async fn write_export_limit_watts(&self, watts: i64) -> Result<bool, ExportLimitError> {
        let watts = ExportLimitError::check(watts)?;
        Ok(self.record(Write::ExportLimit(watts)))
    }

    async fn read_dc_power(&self) -> Option<[u32; 2]> {
        *self.dc_reads.lock() += 1;
        *self.dc_power.lock()
    }
}

#[derive(Debug, Default)]
pub struct StaticPrices {
    pub current: Mutex<Option<f64>>,
    pub forecast: Mutex<Option<Vec<HourlySample>>>,
}

impl StaticPrices {
    pub fn current(price: f64) -> Self {
        let prices = Self::default();
        *prices.current.lock() = Some(price);
        prices
    }

    pub fn forecast(samples: Vec<HourlySample>) -> Self {
        let prices = Self::default();
        *prices.forecast.lock() = Some(samples);
        prices
    }
}

#[async_trait]
impl PriceProvider for StaticPrices {
    async fn current_hour_price(&self) -> Option<f64> {
        *self.current.lock()
    }

    async fn forecast(&self) -> Option<Vec<HourlySample>> {
        self.forecast.lock().clone()
    }
}

#[derive(Debug, Default)]
pub struct StaticWeather {
    pub forecast: Mutex<Option<Vec<HourlySample>>>,
}

impl StaticWeather {
    pub fn new(samples: Vec<HourlySample>) -> Self {
        Self {
            forecast: Mutex::new(Some(samples)),
        }
    }

    pub fn set(&self, samples: Vec<HourlySample>) {
        *self.forecast.lock() = Some(samples);
    }
}

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current_forecast(&self) -> Option<Vec<HourlySample>> {
        self.forecast.lock().clone()
    }
}

#[derive(Debug)]
pub struct FixedSensor {
    pub state: Mutex<GridConnection>,
    sender: broadcast::Sender<GridConnection>,
}

impl FixedSensor {
    pub fn new(state: GridConnection) -> Self {
        let (sender, _) = broadcast::channel(8);
        Self {
            state: Mutex::new(state),
            sender,
        }
    }

    pub fn set(&self, state: GridConnection) {
        *self.state.lock() = state;
        let _ = self.sender.send(state);
    }
}

impl ConnectionSensor for FixedSensor {
    fn state(&self) -> GridConnection {
        *self.state.lock()
    }

    fn subscribe(&self) -> broadcast::Receiver<GridConnection> {
        self.sender.subscribe()
    }
}
