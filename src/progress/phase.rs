//! Phase thresholds and the simulated progress curve

use rand::Rng;

use crate::config::SlowRange;

/// Fixed increment per tick once a finish has been forced
pub const SPRINT_STEP: f64 = 1.5;

/// Increment applied on each slow-crawl interval
pub const CRAWL_STEP: f64 = 0.028;

/// Slow-crawl interval
pub const CRAWL_INTERVAL_MS: f64 = 200.0;

/// Lowest value the slow-phase ceiling may take
const SLOW_FLOOR: f64 = 70.0;

/// Uniform draw in `[min, max]`, rounded to the nearest integer
pub fn random_between<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    (rng.gen::<f64>() * (max - min) + min).round()
}

/// Thresholds of one simulated run, drawn fresh on every start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    /// End of the fast phase
    pub fast_ceiling: f64,
    /// End of the slow phase
    pub slow_ceiling: f64,
    /// The crawl never passes this without a forced finish
    pub stop_at: f64,
    /// Milliseconds allotted to the fast phase
    pub fast_ms: f64,
    /// Milliseconds allotted to the slow phase
    pub slow_ms: f64,
}

impl PhaseThresholds {
    pub fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        slow_range: SlowRange,
        stop_at: f64,
        duration_ms: u64,
    ) -> Self {
        let min = slow_range.min.clamp(SLOW_FLOOR.min(stop_at), stop_at);
        let max = slow_range.max.clamp(min, stop_at);

        let fast_ceiling = random_between(rng, 5.0, 20.0);
        let slow_ceiling = random_between(rng, min, max).min(stop_at);
        let ratio = random_between(rng, 24.0, 30.0) / 10.0;

        let time = duration_ms as f64;
        let fast_ms = (fast_ceiling * ratio / 100.0 * time).floor();
        let slow_ms = time - fast_ms;

        Self {
            fast_ceiling,
            slow_ceiling,
            stop_at,
            fast_ms: fast_ms.max(1.0),
            slow_ms: slow_ms.max(1.0),
        }
    }

    /// Next value for one frame `delta_ms` long
    ///
    /// Fast and slow phases advance linearly towards their ceiling and
    /// never overshoot it. Past the slow ceiling only a forced finish moves
    /// the value, by a flat [`SPRINT_STEP`] per frame.
    pub fn advance(&self, value: f64, delta_ms: f64, ended: bool) -> f64 {
        if value < self.fast_ceiling {
            let rate = self.fast_ceiling / self.fast_ms;
            (value + rate * delta_ms).min(self.fast_ceiling)
        } else if value < self.slow_ceiling {
            let rate = self.slow_ceiling / self.slow_ms;
            (value + rate * delta_ms).min(self.slow_ceiling)
        } else if ended {
            value + SPRINT_STEP
        } else {
            value
        }
    }

    /// Next slow-crawl value, capped at `stop_at`
    pub fn crawl(&self, value: f64) -> f64 {
        (value + CRAWL_STEP).min(self.stop_at).max(value)
    }
}
