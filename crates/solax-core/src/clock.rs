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

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Source of local wall-clock time for the schedulers
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Real time left until the local wall-clock `target`
    fn until(&self, target: NaiveDateTime) -> Duration {
        until(self.now(), target)
    }
}

/// Wall clock in the plant's configured timezone
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    tz: Tz,
}

impl LocalClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }

    fn until(&self, target: NaiveDateTime) -> Duration {
        zoned_until(self.tz, Utc::now(), target)
    }
}

/// Non-negative std duration between two local instants
pub fn until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Real time from `now` to the wall-clock `target` in `tz`.
///
/// An ambiguous target resolves to its first occurrence. A target inside a
/// spring-forward gap resolves to the same wall time one hour later.
pub fn zoned_until(tz: Tz, now: DateTime<Utc>, target: NaiveDateTime) -> Duration {
    let resolved = tz.from_local_datetime(&target).earliest().or_else(|| {
        tz.from_local_datetime(&(target + chrono::Duration::hours(1)))
            .earliest()
    });
    match resolved {
        Some(target) => (target.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => until(now.with_timezone(&tz).naive_local(), target),
    }
}
