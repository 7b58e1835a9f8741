//! Deterministic frame clock injected into every pipeline stage.

/// Counts rendered frames and converts them into session milliseconds.
///
/// Nothing in the core reads the wall clock; replaying the same inputs
/// through a fresh clock reproduces the same timeline.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_rate: f32,
    tick: u64,
}

impl FrameClock {
    pub fn new(frame_rate: f32) -> Self {
        Self {
            frame_rate: frame_rate.max(1.0),
            tick: 0,
        }
    }

    /// Move to the next frame and return its timestamp.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.now_ms()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn frame_period_ms(&self) -> f64 {
        1000.0 / self.frame_rate as f64
    }

    /// Milliseconds since the session started, rounded to the nearest ms.
    pub fn now_ms(&self) -> u64 {
        (self.tick as f64 * self.frame_period_ms()).round() as u64
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_frames_is_one_second() {
        let mut clock = FrameClock::new(60.0);
        for _ in 0..60 {
            clock.advance();
        }
        assert_eq!(clock.now_ms(), 1000);
        assert_eq!(clock.tick(), 60);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let mut clock = FrameClock::default();
        let mut last = clock.now_ms();
        for _ in 0..500 {
            let now = clock.advance();
            assert!(now > last);
            last = now;
        }
    }
}
