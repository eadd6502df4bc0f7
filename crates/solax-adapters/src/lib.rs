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


//! Collaborators feeding the schedulers: OTE spot prices, Meteosource
//! weather quality and the grid connection sense line.

pub mod config;
pub mod error;
pub mod gpio;
pub mod meteosource;
pub mod ote;

pub use config::{MeteosourceConfig, OteConfig, SensorConfig};
pub use error::{AdapterError, AdapterResult};
pub use gpio::{Debouncer, SysfsConnectionSensor};
pub use meteosource::MeteosourceClient;
pub use ote::OtePriceClient;
