//! Daily operating windows.

use crate::config::{LocationConfig, SENSOR_STOP_BUFFER_MINUTES, ScheduleSettings};
use crate::sun::{SunError, sunrise_sunset};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `[start, stop)` interval in which automatic evaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingWindow {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl OperatingWindow {
    /// Compute the window for `date`.
    ///
    /// Sun-relative bounds are sunrise + start offset and sunset - stop
    /// offset; fixed bounds combine `date` with the configured clock time.
    pub fn compute(
        schedule: &ScheduleSettings,
        location: &LocationConfig,
        date: NaiveDate,
    ) -> Result<Self, SunError> {
        let sun = if schedule.auto_start || schedule.auto_stop {
            Some(sunrise_sunset(
                location.latitude,
                location.longitude,
                location.utc_offset_hours,
                date,
            )?)
        } else {
            None
        };

        let start = match sun {
            Some(sun) if schedule.auto_start => sun.sunrise + schedule.sun_start_offset(),
            _ => date.and_time(schedule.start),
        };
        let stop = match sun {
            Some(sun) if schedule.auto_stop => sun.sunset - schedule.sun_stop_offset(),
            _ => date.and_time(schedule.stop),
        };
        Ok(Self { start, stop })
    }

    /// The first window (today or tomorrow) whose stop lies after `now`.
    pub fn next_after(
        schedule: &ScheduleSettings,
        location: &LocationConfig,
        now: NaiveDateTime,
    ) -> Result<Self, SunError> {
        let today = Self::compute(schedule, location, now.date())?;
        if today.stop > now {
            return Ok(today);
        }
        let tomorrow = now.date().succ_opt().ok_or(SunError::OutOfRange(now.date()))?;
        Self::compute(schedule, location, tomorrow)
    }

    /// Shift by whole days until the stop lies after `now`.
    pub fn rolled_past(&self, now: NaiveDateTime) -> Self {
        let mut window = *self;
        while window.stop <= now {
            window = window.shifted(TimeDelta::days(1));
        }
        window
    }

    pub fn shifted(&self, delta: TimeDelta) -> Self {
        Self {
            start: self.start + delta,
            stop: self.stop + delta,
        }
    }

    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.start <= now && now < self.stop
    }
}

impl fmt::Display for OperatingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%d %b %H:%M"),
            self.stop.format("%d %b %H:%M")
        )
    }
}

/// Window in which the light sensor samples.
///
/// Opens `lead` before the earliest shade start so the history is full when
/// that shade starts, and closes a fixed buffer after the latest stop.
pub fn sensor_window<'a>(
    shade_windows: impl IntoIterator<Item = &'a OperatingWindow>,
    lead: TimeDelta,
) -> Option<OperatingWindow> {
    let mut windows = shade_windows.into_iter();
    let first = *windows.next()?;
    let merged = windows.fold(first, |acc, w| OperatingWindow {
        start: acc.start.min(w.start),
        stop: acc.stop.max(w.stop),
    });
    Some(OperatingWindow {
        start: merged.start - lead,
        stop: merged.stop + TimeDelta::minutes(SENSOR_STOP_BUFFER_MINUTES),
    })
}
