use std::time::Instant;

/// Monotonic frame timer driving animation and camera speed.
///
/// One instance lives for the whole session; there is no pause or resume.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
        }
    }

    /// Returns the seconds elapsed since the previous `tick` and advances
    /// the stored frame time.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        delta
    }

    /// Seconds since the clock was created; feeds the light color curves.
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn tick_returns_nonnegative_delta() {
        let mut clock = FrameClock::new();
        assert!(clock.tick() >= 0.0);
        thread::sleep(Duration::from_millis(5));
        let delta = clock.tick();
        assert!(delta > 0.0);
    }

    #[test]
    fn elapsed_is_monotonic() {
        let clock = FrameClock::new();
        let first = clock.elapsed();
        thread::sleep(Duration::from_millis(2));
        assert!(clock.elapsed() >= first);
    }
}
