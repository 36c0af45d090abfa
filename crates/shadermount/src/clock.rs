/// Length of one frame at 120 Hz in milliseconds; seeds are counted in these.
pub const SEED_FRAME_MS: f64 = 1000.0 / 120.0;

/// Accumulated animation time driven by wall-clock deltas and a speed
/// multiplier. All timestamps are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationClock {
    accumulated_ms: f64,
    speed: f64,
    last_frame_ms: f64,
}

impl AnimationClock {
    pub fn new(speed: f64, seed: f64, now_ms: f64) -> Self {
        Self {
            accumulated_ms: seed * SEED_FRAME_MS,
            speed,
            last_frame_ms: now_ms,
        }
    }

    pub fn accumulated_ms(&self) -> f64 {
        self.accumulated_ms
    }

    /// Value written to `u_time`.
    pub fn seconds(&self) -> f32 {
        (self.accumulated_ms * 0.001) as f32
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn last_frame_ms(&self) -> f64 {
        self.last_frame_ms
    }

    pub fn is_running(&self) -> bool {
        self.speed != 0.0
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Restarts delta measurement from `now_ms` so a resumed clock does not
    /// jump over the time it spent paused.
    pub fn rebase(&mut self, now_ms: f64) {
        self.last_frame_ms = now_ms;
    }

    /// Positions the accumulator at `seed` frames of 120 Hz.
    pub fn seed(&mut self, seed: f64, now_ms: f64) {
        self.accumulated_ms = seed * SEED_FRAME_MS;
        self.last_frame_ms = now_ms;
    }

    /// Consumes the time elapsed since the previous frame. A host clock that
    /// steps backwards yields a zero delta.
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        let delta = (now_ms - self.last_frame_ms).max(0.0);
        self.last_frame_ms = now_ms;
        if self.speed != 0.0 {
            self.accumulated_ms += delta * self.speed;
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_scaled_delta() {
        let mut clock = AnimationClock::new(2.0, 0.0, 100.0);
        assert_eq!(clock.tick(150.0), 50.0);
        assert_eq!(clock.accumulated_ms(), 100.0);
        assert!((clock.seconds() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn zero_speed_freezes_accumulator() {
        let mut clock = AnimationClock::new(0.0, 0.0, 0.0);
        clock.tick(1_000.0);
        assert_eq!(clock.accumulated_ms(), 0.0);
        assert_eq!(clock.last_frame_ms(), 1_000.0);
    }

    #[test]
    fn backwards_host_time_does_not_rewind() {
        let mut clock = AnimationClock::new(1.0, 0.0, 500.0);
        clock.tick(400.0);
        assert_eq!(clock.accumulated_ms(), 0.0);
        clock.tick(450.0);
        assert_eq!(clock.accumulated_ms(), 50.0);
    }

    #[test]
    fn seed_counts_frames_at_120hz() {
        let mut clock = AnimationClock::new(1.0, 0.0, 0.0);
        clock.seed(120.0, 42.0);
        assert!((clock.accumulated_ms() - 1_000.0).abs() < 1e-9);
        assert_eq!(clock.last_frame_ms(), 42.0);
    }

    #[test]
    fn rebase_prevents_jump_after_pause() {
        let mut clock = AnimationClock::new(1.0, 0.0, 0.0);
        clock.tick(100.0);
        clock.set_speed(0.0);
        clock.tick(5_000.0);
        clock.set_speed(1.0);
        clock.rebase(9_000.0);
        clock.tick(9_016.0);
        assert_eq!(clock.accumulated_ms(), 116.0);
    }
}
