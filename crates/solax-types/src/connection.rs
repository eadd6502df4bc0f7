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
use std::fmt;

/// State of the grid-connection sense line (HIGH = connected)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridConnection {
    Connected,
    Disconnected,
}

impl GridConnection {
    pub fn from_level(high: bool) -> Self {
        if high {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for GridConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("HIGH (connected)"),
            Self::Disconnected => f.write_str("LOW (disconnected)"),
        }
    }
}

/// Last observed sensor state, used to drop repeated identical events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSignal {
    previous: Option<GridConnection>,
}

impl ConnectionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<GridConnection> {
        self.previous
    }

    /// Record `state`; returns `true` when it differs from the previous observation.
    pub fn observe(&mut self, state: GridConnection) -> bool {
        if self.previous == Some(state) {
            return false;
        }
        self.previous = Some(state);
        true
    }
}
