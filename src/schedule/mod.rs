//! Operating windows and the long-running schedule tasks.
//!
//! All waits take a [`CancellationToken`]; cancelling it ends the wait
//! immediately, so a switch to manual mode or a shutdown is observed without
//! polling.

pub mod coordinator;
pub mod sampling;
pub mod window;

pub use coordinator::{Phase, ScheduleCoordinator};
pub use sampling::SamplingLoop;
pub use window::{OperatingWindow, sensor_window};

use chrono::{Local, NaiveDateTime};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest single sleep when waiting for a wall-clock time. The clock is
/// re-read after each chunk so clock adjustments are picked up.
const MAX_WALL_SLEEP: Duration = Duration::from_secs(60);

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall clock that starts at a fixed time and advances with the tokio clock.
///
/// With a paused tokio runtime the wall clock moves exactly as far as the
/// runtime auto-advances, which keeps schedule tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    base: NaiveDateTime,
    started: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new(base: NaiveDateTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self.started.elapsed();
        chrono::TimeDelta::from_std(elapsed)
            .map(|delta| self.base + delta)
            .unwrap_or(self.base)
    }
}

/// Sleep for `duration` unless cancelled first. Returns false on cancel.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Sleep until the wall clock reaches `target`. Returns false on cancel.
pub async fn sleep_until(
    clock: &dyn Clock,
    token: &CancellationToken,
    target: NaiveDateTime,
) -> bool {
    loop {
        if token.is_cancelled() {
            return false;
        }
        let remaining = match (target - clock.now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            // Negative or zero: target reached
            _ => return true,
        };
        if !sleep_or_cancel(token, remaining.min(MAX_WALL_SLEEP)).await {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchored_clock_follows_tokio_time() {
        let clock = AnchoredClock::new(at(9, 0));
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), at(9, 1) + chrono::TimeDelta::seconds(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_reaches_target() {
        let clock = AnchoredClock::new(at(9, 0));
        let token = CancellationToken::new();
        assert!(sleep_until(&clock, &token, at(10, 30)).await);
        assert!(clock.now() >= at(10, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_past_target_returns_immediately() {
        let clock = AnchoredClock::new(at(9, 0));
        let token = CancellationToken::new();
        assert!(sleep_until(&clock, &token, at(8, 0)).await);
        assert_eq!(clock.now(), at(9, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            sleep_or_cancel(&child, Duration::from_secs(3600)).await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        assert!(!handle.await.unwrap());
    }
}
