use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SnapshotError};

/// The fixed set of periods automatic snapshots can run at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotInterval {
    OneSecond,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    ThreeHours,
    SixHours,
    TwelveHours,
    TwentyFourHours,
}

impl SnapshotInterval {
    pub const ALL: [SnapshotInterval; 10] = [
        SnapshotInterval::OneSecond,
        SnapshotInterval::OneMinute,
        SnapshotInterval::FiveMinutes,
        SnapshotInterval::FifteenMinutes,
        SnapshotInterval::ThirtyMinutes,
        SnapshotInterval::OneHour,
        SnapshotInterval::ThreeHours,
        SnapshotInterval::SixHours,
        SnapshotInterval::TwelveHours,
        SnapshotInterval::TwentyFourHours,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            SnapshotInterval::OneSecond => 1,
            SnapshotInterval::OneMinute => 60,
            SnapshotInterval::FiveMinutes => 5 * 60,
            SnapshotInterval::FifteenMinutes => 15 * 60,
            SnapshotInterval::ThirtyMinutes => 30 * 60,
            SnapshotInterval::OneHour => 60 * 60,
            SnapshotInterval::ThreeHours => 3 * 60 * 60,
            SnapshotInterval::SixHours => 6 * 60 * 60,
            SnapshotInterval::TwelveHours => 12 * 60 * 60,
            SnapshotInterval::TwentyFourHours => 24 * 60 * 60,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn label(self) -> &'static str {
        match self {
            SnapshotInterval::OneSecond => "1 second",
            SnapshotInterval::OneMinute => "1 minute",
            SnapshotInterval::FiveMinutes => "5 minutes",
            SnapshotInterval::FifteenMinutes => "15 minutes",
            SnapshotInterval::ThirtyMinutes => "30 minutes",
            SnapshotInterval::OneHour => "1 hour",
            SnapshotInterval::ThreeHours => "3 hours",
            SnapshotInterval::SixHours => "6 hours",
            SnapshotInterval::TwelveHours => "12 hours",
            SnapshotInterval::TwentyFourHours => "24 hours",
        }
    }

    pub fn from_secs(secs: u64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_secs() == secs)
            .ok_or_else(|| SnapshotError::InvalidInterval(secs.to_string()))
    }
}

impl fmt::Display for SnapshotInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SnapshotInterval {
    type Err = SnapshotError;

    /// Accepts seconds (`"300"`), labels (`"5 minutes"`) and short forms
    /// (`"5m"`, `"3h"`, `"1s"`).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(secs) = trimmed.parse::<u64>() {
            return Self::from_secs(secs);
        }
        if let Some(interval) = Self::ALL
            .into_iter()
            .find(|interval| interval.label().eq_ignore_ascii_case(trimmed))
        {
            return Ok(interval);
        }
        let invalid = || SnapshotError::InvalidInterval(s.to_string());
        let split = trimmed.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let (count, unit) = trimmed.split_at(split);
        let count: u64 = count.parse().map_err(|_| invalid())?;
        let scale = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            _ => return Err(invalid()),
        };
        let secs = count.checked_mul(scale).ok_or_else(invalid)?;
        Self::from_secs(secs).map_err(|_| invalid())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running(SnapshotInterval),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SnapshotInterval),
    AlreadyRunning(SnapshotInterval),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(SnapshotInterval),
    WasNotRunning,
}

/// State for periodic capture. Owns no timer: whoever drives the event loop
/// asks [`Scheduler::interval`] for the period and reports each firing.
#[derive(Debug, Default)]
pub struct Scheduler {
    state: SchedulerState,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running(_))
    }

    pub fn interval(&self) -> Option<SnapshotInterval> {
        match self.state {
            SchedulerState::Running(interval) => Some(interval),
            SchedulerState::Stopped => None,
        }
    }

    pub fn start(&mut self, interval: SnapshotInterval) -> Result<StartOutcome> {
        match self.state {
            SchedulerState::Stopped => {
                self.state = SchedulerState::Running(interval);
                Ok(StartOutcome::Started(interval))
            }
            SchedulerState::Running(current) if current == interval => {
                Ok(StartOutcome::AlreadyRunning(current))
            }
            SchedulerState::Running(current) => Err(SnapshotError::SchedulerBusy {
                current: current.label().to_string(),
            }),
        }
    }

    pub fn stop(&mut self) -> StopOutcome {
        match std::mem::take(&mut self.state) {
            SchedulerState::Running(interval) => StopOutcome::Stopped(interval),
            SchedulerState::Stopped => StopOutcome::WasNotRunning,
        }
    }
}
