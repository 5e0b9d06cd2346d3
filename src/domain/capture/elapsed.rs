//! Elapsed recording time that excludes paused intervals

use std::time::Duration as StdDuration;

use tokio::time::Instant;

/// Wall-clock recording timer.
///
/// While running, elapsed time is `now - origin`. Pausing freezes the
/// accumulated value; resuming moves the origin backwards by that value so
/// the reading continues from where it stopped instead of from zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElapsedClock {
    origin: Option<Instant>,
    accumulated: StdDuration,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from zero
    pub fn start(&mut self, now: Instant) {
        self.accumulated = StdDuration::ZERO;
        self.origin = Some(now);
    }

    pub fn is_running(&self) -> bool {
        self.origin.is_some()
    }

    /// Freeze the reading. No-op when not running.
    pub fn pause(&mut self, now: Instant) {
        if let Some(origin) = self.origin.take() {
            self.accumulated = now.saturating_duration_since(origin);
        }
    }

    /// Continue from the frozen reading. No-op when already running.
    pub fn resume(&mut self, now: Instant) {
        if self.origin.is_none() {
            self.origin = Some(now.checked_sub(self.accumulated).unwrap_or(now));
        }
    }

    /// Origin that a ticker can measure against, when running
    pub fn origin(&self) -> Option<Instant> {
        self.origin
    }

    pub fn elapsed(&self, now: Instant) -> StdDuration {
        match self.origin {
            Some(origin) => now.saturating_duration_since(origin),
            None => self.accumulated,
        }
    }

    pub fn elapsed_secs(&self, now: Instant) -> u64 {
        self.elapsed(now).as_secs()
    }

    /// Stop and freeze the final reading
    pub fn stop(&mut self, now: Instant) {
        self.pause(now);
    }
}

/// Format whole seconds as `mm:ss`, or `h:mm:ss` past an hour
pub fn format_elapsed(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
