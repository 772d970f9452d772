//! Leveled console output and throttled progress updates.
//!
//! All diagnostics go to stderr, gated by a verbosity level: 0 = silent,
//! 1 = errors only, 2 = results and warnings, 3 = progress, 4+ = debug.
//! Progress lines are additionally rate-limited so a tight compression loop
//! refreshes the terminal at most six times per second; at level 4 and above
//! every update is printed and stderr is flushed.
//!
//! A [`Display`] value is owned by the caller and threaded through engine
//! calls, so library users can run several engines with independent
//! verbosity.

use std::cell::Cell;
use std::io::Write;
use std::time::{Duration, Instant};

/// Minimum interval between two progress refreshes (1/6 s).
const REFRESH_RATE: Duration = Duration::from_micros(1_000_000 / 6);

/// Progress-bar policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ProgressSetting {
    /// Progress on interactive runs, suppressed when it would interleave
    /// with piped output.
    #[default]
    Auto,
    /// Progress even when stderr is redirected.
    Always,
    /// Never print progress lines.
    Never,
}

/// Verbosity-gated stderr writer with a progress throttle.
pub struct Display {
    level: i32,
    progress: ProgressSetting,
    clock: Cell<Instant>,
}

impl Default for Display {
    fn default() -> Self {
        Display::new(2)
    }
}

impl Display {
    pub fn new(level: i32) -> Self {
        Display {
            level,
            progress: ProgressSetting::Auto,
            clock: Cell::new(Instant::now() - REFRESH_RATE),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub fn progress_setting(&self) -> ProgressSetting {
        self.progress
    }

    pub fn set_progress_setting(&mut self, setting: ProgressSetting) {
        self.progress = setting;
    }

    /// Writes `msg` to stderr when the verbosity level is at least `level`.
    /// Flushes at level 4+ so debug traces appear immediately.
    pub fn say(&self, level: i32, msg: &str) {
        if self.level >= level {
            eprint!("{}", msg);
            if self.level >= 4 {
                let _ = std::io::stderr().flush();
            }
        }
    }

    /// True when enough wall-clock time has passed for another progress
    /// refresh (and progress is not suppressed outright).
    pub fn ready_for_update(&self) -> bool {
        self.progress != ProgressSetting::Never && self.clock.get().elapsed() > REFRESH_RATE
    }

    /// Writes a throttled progress line when permitted by `level` and the
    /// refresh clock. Call sites format the line themselves.
    pub fn update(&self, level: i32, msg: &str) {
        if self.level < level || self.progress == ProgressSetting::Never {
            return;
        }
        if self.clock.get().elapsed() > REFRESH_RATE || self.level >= 4 {
            self.clock.set(Instant::now());
            eprint!("{}", msg);
            if self.level >= 4 {
                let _ = std::io::stderr().flush();
            }
        }
    }

    /// Restarts the refresh clock; the next `update` waits a full interval.
    pub fn delay_next_update(&self) {
        self.clock.set(Instant::now());
    }

    /// Clears the current terminal line at the given level.
    pub fn clear_line(&self, level: i32) {
        self.say(level, &format!("\r{:79}\r", ""));
    }
}

// ---------------------------------------------------------------------------
// Human-readable sizes
// ---------------------------------------------------------------------------

/// Formats a byte count with a binary-unit suffix, e.g. `1.37 MiB`.
/// Precision grows with magnitude so short numbers stay short.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_formatting() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.00 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn update_throttles_until_interval_elapses() {
        let d = Display::new(3);
        // A fresh Display is immediately ready (clock is back-dated).
        assert!(d.ready_for_update());
        d.delay_next_update();
        assert!(!d.ready_for_update());
    }

    #[test]
    fn never_setting_suppresses_updates() {
        let mut d = Display::new(3);
        d.set_progress_setting(ProgressSetting::Never);
        assert!(!d.ready_for_update());
    }
}
