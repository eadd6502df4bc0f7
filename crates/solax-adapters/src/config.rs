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
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OteConfig {
    #[serde(default = "default_ote_base_url")]
    pub base_url: String,
}

fn default_ote_base_url() -> String {
    "https://spotovaelektrina.cz/api/".to_owned()
}

impl Default for OteConfig {
    fn default() -> Self {
        Self {
            base_url: default_ote_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteosourceConfig {
    #[serde(default = "default_meteosource_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub place_id: String,
}

fn default_meteosource_base_url() -> String {
    "https://www.meteosource.com/api/".to_owned()
}

impl Default for MeteosourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_meteosource_base_url(),
            api_key: String::new(),
            place_id: String::new(),
        }
    }
}

/// Grid connection sense line on a sysfs GPIO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// BCM pin number
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,

    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// A level must hold this long before it is reported
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_gpio_pin() -> u32 {
    17
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_poll_ms() -> u64 {
    50
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            gpio_pin: default_gpio_pin(),
            sysfs_root: default_sysfs_root(),
            debounce_ms: default_debounce_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl SensorConfig {
    pub fn value_path(&self) -> PathBuf {
        self.sysfs_root
            .join(format!("gpio{}", self.gpio_pin))
            .join("value")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_path() {
        let config = SensorConfig::default();
        assert_eq!(
            config.value_path(),
            PathBuf::from("/sys/class/gpio/gpio17/value")
        );
    }

    #[test]
    fn test_meteosource_defaults_from_empty_json() {
        let config: MeteosourceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "https://www.meteosource.com/api/");
        assert!(config.api_key.is_empty());
    }
}
