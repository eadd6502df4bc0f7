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

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One hour of forecast data (price in CZK/kWh or a weather quality score)
///
/// Timestamps are local wall-clock time at the start of the hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl HourlySample {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }

    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Timestamp truncated to the start of its hour
    pub fn hour_start(&self) -> NaiveDateTime {
        self.timestamp
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.timestamp)
    }
}

/// Arithmetic mean of the sample values, `None` for an empty slice
pub fn average(samples: &[HourlySample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    #[expect(clippy::cast_precision_loss, reason = "forecast windows are tiny")]
    let count = samples.len() as f64;
    Some(samples.iter().map(|s| s.value).sum::<f64>() / count)
}
