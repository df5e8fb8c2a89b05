use std::time::Duration;

use rand::Rng;

/// Exponential backoff strategy shared by the control-plane client and the
/// part uploader.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for the exponential term.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Upper bound of the additive jitter, as a fraction of the delay.
    pub jitter_ratio: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::control_plane()
    }
}

impl Backoff {
    /// 1 s doubling up to 30 s.
    pub fn control_plane() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter_ratio: 0.25,
        }
    }

    /// 1 s doubling up to 16 s, for direct-to-storage part PUTs.
    pub fn part_upload() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(16),
            factor: 2.0,
            jitter_ratio: 0.25,
        }
    }

    /// Delay after failed attempt `attempt` (1-based), without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay after failed attempt `attempt` with random additive jitter.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let unit: f64 = rand::thread_rng().r#gen();
        self.jittered(attempt, unit)
    }

    /// Applies jitter for a given `unit` sample in `[0, 1)`.
    pub(crate) fn jittered(&self, attempt: u32, unit: f64) -> Duration {
        let base = self.delay(attempt);
        let extra = base.as_secs_f64() * self.jitter_ratio * unit.clamp(0.0, 1.0);
        base + Duration::from_secs_f64(extra)
    }
}
