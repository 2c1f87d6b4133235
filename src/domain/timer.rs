//! Start/stop timers on a task.
//!
//! A task is either Idle or Running. Running means `running_start` holds the
//! instant the timer was started; stopping turns that into an appended
//! [`Session`]. The live time of a running timer is never written back, it is
//! computed on read by [`Task::total_seconds`].

use super::enums::RunStatus;
use super::task::{format_stamp, parse_timestamp, Session, Task};
use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

impl Task {
    pub fn status(&self) -> RunStatus {
        match self.running_start.as_deref() {
            Some(start) if !start.trim().is_empty() => RunStatus::Running,
            _ => RunStatus::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    /// Idle -> Running
    pub fn start_timer(&mut self, now: DateTime<Utc>) -> TrackerResult<()> {
        if self.is_running() {
            return Err(TrackerError::AlreadyRunning(self.text.clone()));
        }
        self.running_start = Some(format_stamp(now));
        debug!(task = %self.id, "timer started");
        Ok(())
    }

    /// Running -> Idle, appending the finished session.
    ///
    /// A corrupted `running_start` still stops the timer: the session is
    /// recorded as zero seconds at `now`.
    pub fn stop_timer(&mut self, now: DateTime<Utc>) -> TrackerResult<&Session> {
        if !self.is_running() {
            return Err(TrackerError::NotRunning(self.text.clone()));
        }
        let raw = self.running_start.take().unwrap_or_default();

        let session = match parse_timestamp(&raw) {
            Ok(start) => Session::between(start, now),
            Err(e) => {
                warn!(task = %self.id, "{}; recording an empty session", e);
                Session::between(now, now)
            }
        };
        debug!(task = %self.id, seconds = session.seconds, "timer stopped");

        self.sessions.push(session);
        Ok(&self.sessions[self.sessions.len() - 1])
    }

    /// Drop all tracked time, including a running timer.
    pub fn reset_time(&mut self) {
        self.sessions.clear();
        self.running_start = None;
    }

    /// Seconds elapsed on the running timer, 0 when idle or unreadable.
    pub fn live_seconds(&self, now: DateTime<Utc>) -> u64 {
        let Some(raw) = self.running_start.as_deref() else {
            return 0;
        };
        if raw.trim().is_empty() {
            return 0;
        }
        match parse_timestamp(raw) {
            Ok(start) => now.signed_duration_since(start).num_seconds().max(0) as u64,
            Err(_) => 0,
        }
    }

    /// Seconds recorded in finished sessions only
    pub fn recorded_seconds(&self) -> u64 {
        self.sessions
            .iter()
            .fold(0u64, |total, s| total.saturating_add(s.seconds))
    }

    /// All tracked time, including the running timer up to `now`.
    pub fn total_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.recorded_seconds().saturating_add(self.live_seconds(now))
    }
}

/// Render a duration as "1h 5m", "4m 10s" or "42s".
pub fn format_seconds(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
