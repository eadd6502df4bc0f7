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

//! Process-wide guards against runaway device access
//!
//! Two independent trips share one fatal path:
//! - consecutive transport failures reaching the configured maximum
//! - more accepted writes inside the rolling window than allowed
//!
//! A trip is final. Every later operation is refused and the shutdown
//! handle is invoked exactly once.

use crate::config::SafetyConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernorError {
    #[error("{failures} consecutive Modbus failures")]
    BreakerTripped { failures: u32 },

    #[error("{writes} writes within {window:?} exceeds the limit of {limit}")]
    RateLimitExceeded {
        writes: usize,
        limit: usize,
        window: Duration,
    },
}

/// Fatal stop requested by the governor
pub trait FatalShutdown: Send + Sync + fmt::Debug {
    fn trigger(&self, reason: &GovernorError);
}

/// Wakes the main loop for a graceful stop and force-exits the process
/// if it is still alive after the grace period.
#[derive(Debug, Clone)]
pub struct ProcessShutdown {
    notify: Arc<Notify>,
    grace: Duration,
}

impl ProcessShutdown {
    pub fn new(notify: Arc<Notify>, grace: Duration) -> Self {
        Self { notify, grace }
    }
}

impl FatalShutdown for ProcessShutdown {
    fn trigger(&self, reason: &GovernorError) {
        error!("❌ Safety governor tripped: {reason}. Shutting down.");
        self.notify.notify_one();

        let grace = self.grace;
        std::thread::spawn(move || {
            std::thread::sleep(grace);
            error!("❌ Graceful shutdown did not finish within {grace:?}; forcing exit");
            std::process::exit(1);
        });
    }
}

#[derive(Debug)]
pub struct SafetyGovernor {
    max_failures: u32,
    max_writes: usize,
    window: Duration,
    failures: Mutex<u32>,
    writes: Mutex<VecDeque<Instant>>,
    /// Set once, under its lock, by the first trip
    reason: Mutex<Option<GovernorError>>,
    shutdown: Arc<dyn FatalShutdown>,
}

impl SafetyGovernor {
    pub fn new(config: &SafetyConfig, shutdown: Arc<dyn FatalShutdown>) -> Self {
        Self {
            max_failures: config.max_consecutive_failures,
            max_writes: config.max_writes_per_window,
            window: config.write_window(),
            failures: Mutex::new(0),
            writes: Mutex::new(VecDeque::new()),
            reason: Mutex::new(None),
            shutdown,
        }
    }

    /// `Err` once either guard has tripped
    pub fn check(&self) -> Result<(), GovernorError> {
        match self.reason.lock().clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        *self.failures.lock()
    }

    pub fn record_success(&self) {
        *self.failures.lock() = 0;
    }

    pub fn record_failure(&self) -> Result<(), GovernorError> {
        let failures = {
            let mut failures = self.failures.lock();
            *failures = failures.saturating_add(1);
            *failures
        };
        warn!("⚠️ Modbus failure {failures}/{}", self.max_failures);

        if failures >= self.max_failures {
            return self.trip(GovernorError::BreakerTripped { failures });
        }
        self.check()
    }

    /// Count a write about to be sent. `Err` means the write must not be sent.
    pub fn record_write(&self) -> Result<(), GovernorError> {
        self.record_write_at(Instant::now())
    }

    pub fn record_write_at(&self, now: Instant) -> Result<(), GovernorError> {
        self.check()?;

        let writes = {
            let mut writes = self.writes.lock();
            while writes
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                writes.pop_front();
            }
            writes.push_back(now);
            writes.len()
        };
        debug!("Write budget: {writes}/{} in {:?}", self.max_writes, self.window);

        if writes > self.max_writes {
            return self.trip(GovernorError::RateLimitExceeded {
                writes,
                limit: self.max_writes,
                window: self.window,
            });
        }
        Ok(())
    }

    fn trip(&self, reason: GovernorError) -> Result<(), GovernorError> {
        {
            let mut current = self.reason.lock();
            if let Some(first) = current.as_ref() {
                return Err(first.clone());
            }
            *current = Some(reason.clone());
        }
        self.shutdown.trigger(&reason);
        Err(reason)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct CountingShutdown {
        pub calls: AtomicUsize,
    }

    impl CountingShutdown {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FatalShutdown for CountingShutdown {
        fn trigger(&self, _reason: &GovernorError) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn governor() -> (SafetyGovernor, Arc<CountingShutdown>) {
        let shutdown = Arc::new(CountingShutdown::default());
        let governor = SafetyGovernor::new(&SafetyConfig::default(), shutdown.clone());
        (governor, shutdown)
    }

    #[test]
    fn test_breaker_fires_exactly_once() {
        let (governor, shutdown) = governor();

        for _ in 0..4 {
            assert!(governor.record_failure().is_ok());
        }
        assert_eq!(shutdown.calls(), 0);

        assert_eq!(
            governor.record_failure(),
            Err(GovernorError::BreakerTripped { failures: 5 })
        );
        assert_eq!(shutdown.calls(), 1);

        for _ in 0..10 {
            assert!(governor.record_failure().is_err());
        }
        assert_eq!(shutdown.calls(), 1);
        assert!(governor.check().is_err());
    }

    #[test]
    fn test_success_resets_failures() {
        let (governor, shutdown) = governor();

        for _ in 0..4 {
            governor.record_failure().unwrap();
        }
        governor.record_success();
        assert_eq!(governor.consecutive_failures(), 0);

        for _ in 0..4 {
            governor.record_failure().unwrap();
        }
        assert_eq!(shutdown.calls(), 0);
    }

    #[test]
    fn test_write_limit_trips_on_eleventh_write() {
        let (governor, shutdown) = governor();
        let start = Instant::now();

        for i in 0..10 {
            assert!(governor.record_write_at(start + Duration::from_secs(i)).is_ok());
        }
        assert_eq!(
            governor.record_write_at(start + Duration::from_secs(10)),
            Err(GovernorError::RateLimitExceeded {
                writes: 11,
                limit: 10,
                window: Duration::from_secs(12 * 3600),
            })
        );
        assert_eq!(shutdown.calls(), 1);

        // Tripped for good
        assert!(governor.record_write_at(start + Duration::from_secs(13 * 3600)).is_err());
        assert_eq!(shutdown.calls(), 1);
    }

    #[test]
    fn test_writes_spread_over_window_are_pruned() {
        let (governor, shutdown) = governor();
        let start = Instant::now();
        let hour = Duration::from_secs(3600);

        // 22 writes, one every 2 hours: never more than 6 inside any 12h window
        for i in 0..22 {
            assert!(governor.record_write_at(start + hour * (i * 2)).is_ok());
        }
        assert_eq!(shutdown.calls(), 0);
    }

    #[test]
    fn test_concurrent_writes_never_exceed_budget() {
        let (governor, shutdown) = governor();
        let start = Instant::now();
        let accepted = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        if governor.record_write_at(start).is_ok() {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(accepted.load(Ordering::SeqCst), 10);
        assert_eq!(shutdown.calls(), 1);
        assert!(matches!(
            governor.check(),
            Err(GovernorError::RateLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_first_trip_reason_is_kept() {
        let (governor, shutdown) = governor();
        let start = Instant::now();

        for _ in 0..11 {
            let _ = governor.record_write_at(start);
        }
        let first = governor.check();
        assert!(matches!(first, Err(GovernorError::RateLimitExceeded { .. })));

        for _ in 0..5 {
            assert_eq!(governor.record_failure(), first);
        }
        assert_eq!(governor.check(), first);
        assert_eq!(shutdown.calls(), 1);
    }
}
