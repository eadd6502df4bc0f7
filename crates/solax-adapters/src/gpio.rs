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


//! Grid connection sense line read from a sysfs GPIO value file.
//!
//! A background task polls the pin, debounces it and broadcasts every
//! stable level change. Without a readable pin (development machines) the
//! sensor reports a permanent HIGH.

use crate::config::SensorConfig;
use parking_lot::Mutex;
use solax_core::ConnectionSensor;
use solax_types::GridConnection;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 16;

/// Reports a new level only after it held for the whole debounce period
#[derive(Debug, Clone)]
pub struct Debouncer {
    stable: GridConnection,
    candidate: Option<(GridConnection, Instant)>,
    hold: Duration,
}

impl Debouncer {
    pub fn new(initial: GridConnection, hold: Duration) -> Self {
        Self {
            stable: initial,
            candidate: None,
            hold,
        }
    }

    pub fn stable(&self) -> GridConnection {
        self.stable
    }

    /// Feed a raw reading taken at `now`; returns the new stable level on change
    pub fn update(&mut self, raw: GridConnection, now: Instant) -> Option<GridConnection> {
        if raw == self.stable {
            self.candidate = None;
            return None;
        }

        let since = match self.candidate {
            Some((level, since)) if level == raw => since,
            Some(_) | None => {
                self.candidate = Some((raw, now));
                now
            }
        };

        if now.duration_since(since) < self.hold {
            return None;
        }

        self.stable = raw;
        self.candidate = None;
        Some(raw)
    }
}

fn read_level(path: &Path) -> io::Result<GridConnection> {
    let raw = std::fs::read_to_string(path)?;
    match raw.trim() {
        "1" => Ok(GridConnection::Connected),
        "0" => Ok(GridConnection::Disconnected),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected GPIO value '{other}'"),
        )),
    }
}

#[derive(Debug)]
pub struct SysfsConnectionSensor {
    state: Arc<Mutex<GridConnection>>,
    events: broadcast::Sender<GridConnection>,
    poller: Option<JoinHandle<()>>,
}

impl SysfsConnectionSensor {
    /// Read the pin once and start polling it. Must run inside a Tokio runtime.
    pub fn start(config: &SensorConfig) -> Self {
        let path = config.value_path();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!("Initializing connection switch on {}", path.display());

        let initial = match read_level(&path) {
            Ok(level) => level,
            Err(e) => {
                warn!(
                    "⚠️ GPIO {} is not readable ({e}); reporting the grid as connected",
                    path.display()
                );
                return Self {
                    state: Arc::new(Mutex::new(GridConnection::Connected)),
                    events,
                    poller: None,
                };
            }
        };
        info!("- Connection switch initial state: {initial}");

        let state = Arc::new(Mutex::new(initial));
        let poller = tokio::spawn(poll(
            path,
            Debouncer::new(initial, config.debounce()),
            config.poll_interval(),
            state.clone(),
            events.clone(),
        ));

        Self {
            state,
            events,
            poller: Some(poller),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.poller.is_none()
    }
}

impl Drop for SysfsConnectionSensor {
    fn drop(&mut self) {
        if let Some(poller) = &self.poller {
            poller.abort();
        }
    }
}

impl ConnectionSensor for SysfsConnectionSensor {
    fn state(&self) -> GridConnection {
        *self.state.lock()
    }

    fn subscribe(&self) -> broadcast::Receiver<GridConnection> {
        self.events.subscribe()
    }
}

async fn poll(
    path: PathBuf,
    mut debouncer: Debouncer,
    every: Duration,
    state: Arc<Mutex<GridConnection>>,
    events: broadcast::Sender<GridConnection>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut read_failing = false;

    loop {
        let now = ticker.tick().await;

        let raw = match read_level(&path) {
            Ok(raw) => {
                read_failing = false;
                raw
            }
            Err(e) => {
                if !read_failing {
                    warn!("⚠️ Failed to read {}: {e}", path.display());
                }
                read_failing = true;
                continue;
            }
        };

        if let Some(level) = debouncer.update(raw, now) {
            *state.lock() = level;
            info!("🔌 Connection switch changed to {level}");
            if events.send(level).is_err() {
                debug!("No listeners for connection change");
            }
        }
    }
}
