use std::time::Duration;

use tokio::time::Instant;

const MIB: f64 = 1024.0 * 1024.0;

/// Snapshot emitted each time a part conclusively succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub uploaded: u64,
    pub total: u64,
    pub elapsed: Duration,
    pub line: String,
}

/// Formats a human-readable status line.
///
/// Speed is `uploaded / elapsed`; ETA is `remaining / speed`. When no speed
/// can be derived yet the ETA is rendered as `--`.
pub fn format_status(elapsed: Duration, uploaded: u64, total: u64) -> String {
    let uploaded_mb = uploaded as f64 / MIB;
    let total_mb = total as f64 / MIB;
    let percent = if total == 0 {
        100.0
    } else {
        uploaded as f64 / total as f64 * 100.0
    };
    let secs = elapsed.as_secs_f64();

    let eta = if secs > 0.0 && uploaded > 0 {
        let speed = uploaded as f64 / secs;
        format!("{:.1}s", total.saturating_sub(uploaded) as f64 / speed)
    } else {
        "--".to_string()
    };

    format!(
        "Uploaded {uploaded_mb:.2}MB / {total_mb:.2}MB ({percent:.2}%) - Elapsed: {secs:.1}s - ETA: {eta}"
    )
}

/// Cumulative byte counter for one transfer.
///
/// Owned by a single reducer task; producers send byte counts over a
/// channel rather than sharing this value.
#[derive(Debug)]
pub struct ProgressReporter {
    total: u64,
    uploaded: u64,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        Self::with_start(total, Instant::now())
    }

    pub fn with_start(total: u64, started: Instant) -> Self {
        Self {
            total,
            uploaded: 0,
            started,
        }
    }

    /// Adds `bytes` to the running total and returns the new snapshot.
    ///
    /// The counter saturates at the file size.
    pub fn record(&mut self, bytes: u64) -> ProgressUpdate {
        self.uploaded = self.uploaded.saturating_add(bytes).min(self.total);
        let elapsed = self.started.elapsed();
        ProgressUpdate {
            uploaded: self.uploaded,
            total: self.total,
            elapsed,
            line: format_status(elapsed, self.uploaded, self.total),
        }
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Completed percentage in `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.uploaded as f64 / self.total as f64 * 100.0
    }
}
