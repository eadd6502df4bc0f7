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

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

/// Recurring wall-clock schedule for a scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every hour in `first_hour..=last_hour` at `minute:second`
    Hourly {
        minute: u32,
        second: u32,
        first_hour: u32,
        last_hour: u32,
    },
    /// Once a day at `hour:minute`
    Daily { hour: u32, minute: u32 },
    /// At the start of every minute in `first_hour..=last_hour`
    EveryMinute { first_hour: u32, last_hour: u32 },
}

impl Trigger {
    pub fn hourly_at(minute: u32) -> Self {
        Self::Hourly {
            minute,
            second: 0,
            first_hour: 0,
            last_hour: 23,
        }
    }

    /// First fire time strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Self::Hourly {
                minute,
                second,
                first_hour,
                last_hour,
            } => {
                let hour_start = truncate(now, 60 * 60);
                (0..=48)
                    .map(|h| {
                        hour_start
                            + Duration::hours(h)
                            + Duration::minutes(i64::from(minute))
                            + Duration::seconds(i64::from(second))
                    })
                    .find(|t| *t > now && (first_hour..=last_hour).contains(&t.hour()))
                    .unwrap_or(hour_start + Duration::hours(1))
            }
            Self::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
                let today = now.date().and_time(time);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            Self::EveryMinute {
                first_hour,
                last_hour,
            } => {
                let next = truncate(now, 60) + Duration::minutes(1);
                if (first_hour..=last_hour).contains(&next.hour()) {
                    return next;
                }
                let start = now
                    .date()
                    .and_time(NaiveTime::from_hms_opt(first_hour, 0, 0).unwrap_or(NaiveTime::MIN));
                if start > now {
                    start
                } else {
                    start + Duration::days(1)
                }
            }
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly {
                minute,
                second,
                first_hour,
                last_hour,
            } => write!(
                f,
                "hourly at :{minute:02}:{second:02} ({first_hour:02}-{last_hour:02}h)"
            ),
            Self::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
            Self::EveryMinute {
                first_hour,
                last_hour,
            } => write!(f, "every minute ({first_hour:02}-{last_hour:02}h)"),
        }
    }
}

fn truncate(t: NaiveDateTime, step_secs: u32) -> NaiveDateTime {
    let secs = t.num_seconds_from_midnight();
    let rem = secs.checked_rem(step_secs).unwrap_or(0);
    t.with_nanosecond(0).unwrap_or(t) - Duration::seconds(i64::from(rem))
}
