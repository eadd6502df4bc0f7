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

use serde::{Deserialize, Deserializer, Serialize};

/// Forecast weather category with its severity level
///
/// Higher levels mean less solar yield. Quality score of an hour is
/// `level - cloud_cover_percent / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    NotAvailable,
    Sunny,
    MostlySunny,
    PartlySunny,
    MostlyCloudy,
    Cloudy,
    Overcast,
    OvercastWithLowClouds,
    Fog,
    PossibleRain,
    LightRain,
    Rain,
    RainShower,
    Thunderstorm,
    LocalThunderstorms,
    PossibleSnow,
    LightSnow,
    Snow,
    SnowShower,
    RainAndSnow,
    PossibleRainAndSnow,
    FreezingRain,
    PossibleFreezingRain,
    Hail,
    Clear,
    MostlyClear,
    PartlyClear,
}

impl WeatherType {
    const ALL: [Self; 27] = [
        Self::NotAvailable,
        Self::Sunny,
        Self::MostlySunny,
        Self::PartlySunny,
        Self::MostlyCloudy,
        Self::Cloudy,
        Self::Overcast,
        Self::OvercastWithLowClouds,
        Self::Fog,
        Self::PossibleRain,
        Self::LightRain,
        Self::Rain,
        Self::RainShower,
        Self::Thunderstorm,
        Self::LocalThunderstorms,
        Self::PossibleSnow,
        Self::LightSnow,
        Self::Snow,
        Self::SnowShower,
        Self::RainAndSnow,
        Self::PossibleRainAndSnow,
        Self::FreezingRain,
        Self::PossibleFreezingRain,
        Self::Hail,
        Self::Clear,
        Self::MostlyClear,
        Self::PartlyClear,
    ];

    pub fn level(self) -> f64 {
        match self {
            Self::Clear | Self::MostlyClear | Self::PartlyClear => 0.0,
            Self::NotAvailable | Self::Sunny => 1.0,
            Self::MostlySunny => 2.0,
            Self::PartlySunny => 2.5,
            Self::MostlyCloudy => 3.0,
            Self::Cloudy => 4.0,
            Self::Overcast | Self::OvercastWithLowClouds => 5.0,
            Self::Fog | Self::PossibleRain | Self::PossibleSnow => 6.0,
            Self::LightRain | Self::Rain | Self::LightSnow | Self::Snow | Self::SnowShower => 7.0,
            Self::RainShower => 8.0,
            Self::Thunderstorm
            | Self::RainAndSnow
            | Self::PossibleRainAndSnow
            | Self::FreezingRain
            | Self::PossibleFreezingRain => 10.0,
            Self::LocalThunderstorms => 12.0,
            Self::Hail => 15.0,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::NotAvailable => "not_available",
            Self::Sunny => "sunny",
            Self::MostlySunny => "mostly_sunny",
            Self::PartlySunny => "partly_sunny",
            Self::MostlyCloudy => "mostly_cloudy",
            Self::Cloudy => "cloudy",
            Self::Overcast => "overcast",
            Self::OvercastWithLowClouds => "overcast_with_low_clouds",
            Self::Fog => "fog",
            Self::PossibleRain => "possible_rain",
            Self::LightRain => "light_rain",
            Self::Rain => "rain",
            Self::RainShower => "rain_shower",
            Self::Thunderstorm => "thunderstorm",
            Self::LocalThunderstorms => "local_thunderstorms",
            Self::PossibleSnow => "possible_snow",
            Self::LightSnow => "light_snow",
            Self::Snow => "snow",
            Self::SnowShower => "snow_shower",
            Self::RainAndSnow => "rain_and_snow",
            Self::PossibleRainAndSnow => "possible_rain_and_snow",
            Self::FreezingRain => "freezing_rain",
            Self::PossibleFreezingRain => "possible_freezing_rain",
            Self::Hail => "hail",
            Self::Clear => "clear",
            Self::MostlyClear => "mostly_clear",
            Self::PartlyClear => "partly_clear",
        }
    }

    /// Case-insensitive lookup; unknown names map to `NotAvailable`
    pub fn parse_lenient(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.key() == normalized)
            .unwrap_or(Self::NotAvailable)
    }
}

impl<'de> Deserialize<'de> for WeatherType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(Self::NotAvailable, |name| Self::parse_lenient(&name)))
    }
}
