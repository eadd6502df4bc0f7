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

use crate::clock::Clock;
use crate::trigger::Trigger;
use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run `job` every time `trigger` fires, forever.
///
/// Ticks never overlap: the next fire time is computed after the previous
/// job has finished, so a slow tick delays rather than doubles up.
pub fn spawn_schedule<F, Fut>(
    name: &'static str,
    trigger: Trigger,
    clock: Arc<dyn Clock>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut(NaiveDateTime) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("⏰ {name} scheduled {trigger}");
    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let next = trigger.next_after(now);
            debug!("{name}: next run at {next}");

            tokio::time::sleep(clock.until(next)).await;
            job(next).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Clock that follows tokio's paused time from a fixed origin
    struct PausedClock {
        origin: NaiveDateTime,
        started: Instant,
    }

    impl Clock for PausedClock {
        fn now(&self) -> NaiveDateTime {
            let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or_default();
            self.origin + elapsed
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_at_each_trigger() {
        let clock = Arc::new(PausedClock {
            origin: at(10, 0),
            started: Instant::now(),
        });
        let runs = Arc::new(Mutex::new(Vec::new()));

        let recorded = runs.clone();
        let handle = spawn_schedule("test", Trigger::hourly_at(5), clock, move |now| {
            let recorded = recorded.clone();
            async move { recorded.lock().push(now) }
        });

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60 + 60)).await;
        handle.abort();

        assert_eq!(*runs.lock(), vec![at(10, 5), at(11, 5)]);
    }
}
