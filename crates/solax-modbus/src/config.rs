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

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection to the inverter's Modbus TCP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Written to the unlock register when the inverter reports itself locked
    #[serde(default = "default_password")]
    pub password: i32,

    /// Minimum pause between two requests on the wire
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Link is dropped after this long without traffic
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_watchdog_tick_ms")]
    pub watchdog_tick_ms: u64,

    /// Per-request transport timeout
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

fn default_host() -> String {
    "192.168.1.100".to_owned()
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_password() -> i32 {
    2014
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_watchdog_tick_ms() -> u64 {
    1000
}

fn default_io_timeout_secs() -> u64 {
    5
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            unit_id: default_unit_id(),
            password: default_password(),
            request_delay_ms: default_request_delay_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            watchdog_tick_ms: default_watchdog_tick_ms(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

impl InverterConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn watchdog_tick(&self) -> Duration {
        Duration::from_millis(self.watchdog_tick_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Limits enforced by the safety governor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_max_writes_per_window")]
    pub max_writes_per_window: usize,

    #[serde(default = "default_write_window_hours")]
    pub write_window_hours: u64,

    /// Time allowed for a graceful stop before the process is force-exited
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_max_writes_per_window() -> usize {
    10
}

fn default_write_window_hours() -> u64 {
    12
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
            max_writes_per_window: default_max_writes_per_window(),
            write_window_hours: default_write_window_hours(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl SafetyConfig {
    pub fn write_window(&self) -> Duration {
        Duration::from_secs(self.write_window_hours * 60 * 60)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let inverter: InverterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(inverter.port, 502);
        assert_eq!(inverter.unit_id, 1);
        assert_eq!(inverter.password, 2014);
        assert_eq!(inverter.request_delay(), Duration::from_secs(1));
        assert_eq!(inverter.idle_timeout(), Duration::from_secs(60));

        let safety: SafetyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(safety.max_consecutive_failures, 5);
        assert_eq!(safety.max_writes_per_window, 10);
        assert_eq!(safety.write_window(), Duration::from_secs(12 * 3600));
    }
}
