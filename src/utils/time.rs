use std::time::{Duration, Instant};

/// Wall-clock frame timer.
#[derive(Debug, Clone)]
pub struct Timer {
    start_time: Instant,
    last_update: Instant,
    /// Time between the last two ticks
    pub delta: Duration,
    /// Total elapsed time at the last tick
    pub elapsed: Duration,
    pub frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Marks the start of a frame and returns the delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Same as [`tick`](Self::tick) with an explicit timestamp. Timestamps
    /// earlier than the previous tick yield a zero delta.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        self.delta = now.saturating_duration_since(self.last_update);
        self.elapsed = now.saturating_duration_since(self.start_time);
        self.last_update = now.max(self.last_update);
        self.frame_count += 1;
        self.dt_seconds()
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_measures_between_ticks() {
        let mut timer = Timer::new();
        let start = timer.last_update;
        timer.tick_at(start + Duration::from_millis(16));
        let dt = timer.tick_at(start + Duration::from_millis(48));
        assert!((dt - 0.032).abs() < 1e-6);
        assert_eq!(timer.frame_count, 2);
        assert_eq!(timer.elapsed, Duration::from_millis(48));
    }

    #[test]
    fn going_backwards_is_a_zero_delta() {
        let mut timer = Timer::new();
        let start = timer.last_update;
        timer.tick_at(start + Duration::from_millis(10));
        assert_eq!(timer.tick_at(start), 0.0);
    }
}
