//! Batch-relative progress from transcoder time markers.

use std::sync::LazyLock;
use regex::Regex;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

/// Elapsed seconds from a `time=HH:MM:SS.ff` marker anywhere in `line`
pub fn parse_time_marker(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Per-job progress counters.
///
/// Every method returns the new overall percentage only when it went up, so
/// callers can forward the value as-is and the published stream never
/// decreases.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_files: usize,
    file_index: usize,
    duration: f64,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            file_index: 0,
            duration: 0.0,
            last: 0,
        }
    }

    /// Last published percentage
    pub fn current(&self) -> u8 {
        self.last
    }

    /// Begin file `index` with its probed duration (0 when unknown)
    pub fn start_file(&mut self, index: usize, duration: f64) -> Option<u8> {
        self.file_index = index;
        self.duration = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };
        self.publish(0.0)
    }

    /// Feed an elapsed time from the current file's diagnostic stream.
    ///
    /// Suppressed entirely while the duration is unknown.
    pub fn update(&mut self, elapsed_secs: f64) -> Option<u8> {
        if self.duration <= 0.0 {
            return None;
        }
        self.publish(elapsed_secs / self.duration)
    }

    /// Mark the current file as done
    pub fn complete_file(&mut self) -> Option<u8> {
        self.publish(1.0)
    }

    /// Whole batch done
    pub fn finish(&mut self) -> Option<u8> {
        self.bump(100)
    }

    fn publish(&mut self, file_fraction: f64) -> Option<u8> {
        if self.total_files == 0 {
            return None;
        }
        let fraction = if file_fraction.is_finite() { file_fraction.clamp(0.0, 1.0) } else { 0.0 };
        let overall = (self.file_index as f64 + fraction) / self.total_files as f64 * 100.0;
        self.bump(overall.clamp(0.0, 100.0) as u8)
    }

    fn bump(&mut self, percent: u8) -> Option<u8> {
        if percent > self.last {
            self.last = percent;
            Some(percent)
        } else {
            None
        }
    }
}
