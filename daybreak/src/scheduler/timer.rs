/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The single armed timer.
//!
//! A timer is a tokio task racing a `sleep(delay)` against a
//! [`CancellationToken`].  When the sleep wins, the expiry closure is moved
//! onto the blocking pool so a slow alarm callback cannot stall the runtime.
//! Cancelling is idempotent and never waits for an expiry already running.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::alarm::AlarmId;

/// Read-only view of what the scheduler is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedAlarm {
    pub alarm: AlarmId,
    pub fires_at: DateTime<FixedOffset>,
}

/// Scheduler-side bookkeeping for the outstanding timer.
#[derive(Debug)]
pub(crate) struct ArmedTimer {
    pub alarm: AlarmId,
    pub fires_at: DateTime<FixedOffset>,

    /// Bumped on every arm.  An expiry whose generation no longer matches has
    /// been superseded and must not fire.
    pub generation: u64,

    cancel: CancellationToken,
}

impl ArmedTimer {
    pub fn new(
        alarm: AlarmId,
        fires_at: DateTime<FixedOffset>,
        generation: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            alarm,
            fires_at,
            generation,
            cancel,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn snapshot(&self) -> ArmedAlarm {
        ArmedAlarm {
            alarm: self.alarm,
            fires_at: self.fires_at,
        }
    }
}

/// Spawn a one-shot timer on `runtime` that runs `on_expiry` after `delay`
/// unless the returned token is cancelled first.
pub(crate) fn spawn_timer<F>(runtime: &Handle, delay: Duration, on_expiry: F) -> CancellationToken
where
    F: FnOnce() + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();

    runtime.spawn(async move {
        tokio::select! {
            biased;

            _ = cancelled.cancelled() => {
                debug!("timer cancelled before expiry");
            }
            _ = tokio::time::sleep(delay) => {
                if let Err(e) = tokio::task::spawn_blocking(on_expiry).await {
                    error!("timer expiry task failed: {e}");
                }
            }
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn expiry_runs_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _token = spawn_timer(&Handle::current(), Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = spawn_timer(&Handle::current(), Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        token.cancel(); // idempotent
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
