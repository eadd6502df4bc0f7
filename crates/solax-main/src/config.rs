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


use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use solax_adapters::{MeteosourceConfig, OteConfig, SensorConfig};
use solax_core::{
    BatteryGuardConfig, DischargeConfig, ExportConfig, ForecastCheck, HourWindow, WeatherConfig,
};
use solax_modbus::{InverterConfig, SafetyConfig};
use std::path::Path;
use tracing::{info, warn};

/// Highest export limit the inverter accepts
const MAX_EXPORT_WATTS: u32 = 10_000;

/// The inverter stores the export limit in 10 W steps
const EXPORT_STEP_WATTS: u32 = 10;

/// Shortest allowed pause between two Modbus requests
const MIN_REQUEST_DELAY_MS: u64 = 100;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub inverter: InverterConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub battery: BatteryGuardConfig,

    /// Price-driven forced discharge
    #[serde(default)]
    pub discharge: DischargeConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub ote: OteConfig,

    #[serde(default)]
    pub meteosource: MeteosourceConfig,

    /// Grid connection sense line
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// IANA timezone all schedules run in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timezone() -> String {
    "Europe/Prague".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first source that exists
    ///
    /// `$SOLAX_CONFIG`, then the addon options, then `config.toml` and
    /// `config.json` in the working directory, then defaults with
    /// environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("SOLAX_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        for path in ["/data/options.json", "config.toml", "config.json"] {
            let path = Path::new(path);
            if path.exists() {
                return Self::load_from(path);
            }
        }

        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML or JSON file (by extension) and validate it
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config: AppConfig = if is_toml {
            toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };

        info!("✅ Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides (development/testing)
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("SOLAX_HOST") {
            config.inverter.host = host;
        }
        if let Ok(port) = std::env::var("SOLAX_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.inverter.port = port;
        }
        if let Ok(key) = std::env::var("METEOSOURCE_API_KEY") {
            config.meteosource.api_key = key;
        }
        if let Ok(place) = std::env::var("METEOSOURCE_PLACE_ID") {
            config.meteosource.place_id = place;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.system.log_level = level;
        }

        config
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.system
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{}': {e}", self.system.timezone))
    }

    pub fn validate(&self) -> Result<()> {
        if self.inverter.host.is_empty() {
            bail!("inverter.host must not be empty");
        }
        if self.inverter.request_delay_ms < MIN_REQUEST_DELAY_MS {
            bail!(
                "inverter.request_delay_ms must be at least {MIN_REQUEST_DELAY_MS} (got {})",
                self.inverter.request_delay_ms
            );
        }
        if self.inverter.io_timeout_secs == 0
            || self.inverter.idle_timeout_secs == 0
            || self.inverter.watchdog_tick_ms == 0
        {
            bail!("inverter timeouts and watchdog tick must be positive");
        }

        if self.safety.max_consecutive_failures == 0 {
            bail!("safety.max_consecutive_failures must be positive");
        }
        if self.safety.max_writes_per_window == 0 || self.safety.write_window_hours == 0 {
            bail!("safety write budget must be positive");
        }

        for threshold in &self.battery.thresholds {
            check_hour("battery.thresholds.hour", threshold.hour)?;
            check_percent("battery.thresholds.min_percent", threshold.min_percent)?;
        }

        let discharge = &self.discharge;
        check_window("discharge.window", discharge.window)?;
        check_hour("discharge.arm_hour", discharge.arm_hour)?;
        if discharge.arm_minute > 59 {
            bail!("discharge.arm_minute must be 0..=59 (got {})", discharge.arm_minute);
        }
        check_hour("discharge.guard_start_hour", discharge.guard_start_hour)?;
        check_hour("discharge.guard_end_hour", discharge.guard_end_hour)?;
        if discharge.guard_start_hour > discharge.guard_end_hour {
            bail!("discharge.guard_start_hour must not be after guard_end_hour");
        }
        check_percent("discharge.min_battery", discharge.min_battery)?;
        if discharge.early_start_minutes < 0 || discharge.price_continuity_delta < 0.0 {
            bail!("discharge.early_start_minutes and price_continuity_delta must not be negative");
        }

        let weather = &self.weather;
        if weather.cloudy <= 0.0 || weather.thunderstorm <= 0.0 {
            bail!("weather thresholds must be positive");
        }
        if weather.cloudy >= weather.thunderstorm {
            bail!(
                "weather.cloudy ({}) must be below weather.thunderstorm ({})",
                weather.cloudy,
                weather.thunderstorm
            );
        }
        if weather.thunderstorm_hour_window == 0 || weather.backup_exit_buffer < 0.0 {
            bail!("weather outage window must be positive and exit buffer non-negative");
        }
        check_forecast("weather.morning", &weather.morning)?;
        check_forecast("weather.noon", &weather.noon)?;
        if weather.morning.hour == weather.noon.hour {
            bail!("weather.morning and weather.noon must run at different hours");
        }

        let export = &self.export;
        let power = export.power;
        if !(power.min <= power.reduced && power.reduced <= power.max && power.max <= MAX_EXPORT_WATTS)
        {
            bail!(
                "export.power must satisfy min <= reduced <= max <= {MAX_EXPORT_WATTS} (got {}/{}/{})",
                power.min,
                power.reduced,
                power.max
            );
        }
        for (field, watts) in [
            ("export.power.min", power.min),
            ("export.power.reduced", power.reduced),
            ("export.power.max", power.max),
        ] {
            if watts % EXPORT_STEP_WATTS != 0 {
                bail!("{field} must be a multiple of {EXPORT_STEP_WATTS} W (got {watts})");
            }
        }
        check_window("export.reduced_window", export.reduced_window)?;
        check_hour("export.active_start_hour", export.active_start_hour)?;
        check_hour("export.active_end_hour", export.active_end_hour)?;
        if export.active_start_hour > export.active_end_hour {
            bail!("export.active_start_hour must not be after active_end_hour");
        }
        if export.reduced_quality_threshold <= 0.0 {
            bail!("export.reduced_quality_threshold must be positive");
        }

        if self.sensor.poll_ms == 0 {
            bail!("sensor.poll_ms must be positive");
        }

        self.timezone()?;
        Ok(())
    }
}

fn check_hour(field: &str, hour: u32) -> Result<()> {
    if hour > 23 {
        bail!("{field} must be 0..=23 (got {hour})");
    }
    Ok(())
}

fn check_percent(field: &str, percent: u8) -> Result<()> {
    if percent > 100 {
        bail!("{field} must be 0..=100 (got {percent})");
    }
    Ok(())
}

fn check_window(field: &str, window: HourWindow) -> Result<()> {
    if window.end_hour > 24 || window.start_hour >= window.end_hour {
        bail!(
            "{field} must satisfy start < end <= 24 (got {}-{})",
            window.start_hour,
            window.end_hour
        );
    }
    Ok(())
}

fn check_forecast(field: &str, check: &ForecastCheck) -> Result<()> {
    check_hour(field, check.hour)?;
    check_window(field, check.window)?;
    check_percent(field, check.min_battery)
}
