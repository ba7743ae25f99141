//! Time sources for fade arithmetic.
//!
//! Fade deadlines are compared against shader time, so the clock must ignore
//! any simulation time scaling and must never run backwards.

use std::time::Instant;

/// Monotonic frame clock.
pub trait Clock {
    /// Advance to the current frame. Called once at the start of every tick.
    fn update(&mut self);

    /// Seconds since the clock started, as of the last [`Clock::update`].
    fn time(&self) -> f32;

    /// Seconds between the last two updates.
    fn delta_time(&self) -> f32;
}

/// Wall-clock time, unaffected by time scaling.
#[derive(Debug)]
pub struct UnscaledClock {
    start: Instant,
    time: f32,
    delta_time: f32,
}

impl UnscaledClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            time: 0.0,
            delta_time: 0.0,
        }
    }
}

impl Default for UnscaledClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for UnscaledClock {
    fn update(&mut self) {
        let now = self.start.elapsed().as_secs_f32();
        self.delta_time = (now - self.time).max(0.0);
        self.time = now;
    }

    fn time(&self) -> f32 {
        self.time
    }

    fn delta_time(&self) -> f32 {
        self.delta_time
    }
}

/// Clock advancing by a fixed step per update, for tests and offline runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManualClock {
    time: f32,
    step: f32,
    delta_time: f32,
}

impl ManualClock {
    /// A clock at zero that advances `step` seconds per update.
    pub fn new(step: f32) -> Self {
        Self {
            time: 0.0,
            step,
            delta_time: 0.0,
        }
    }

    /// Change the step used by later updates.
    pub fn set_step(&mut self, step: f32) {
        self.step = step;
    }

    /// Jump forward without producing a frame.
    pub fn advance(&mut self, seconds: f32) {
        self.time += seconds.max(0.0);
    }
}

impl Clock for ManualClock {
    fn update(&mut self) {
        self.time += self.step;
        self.delta_time = self.step;
    }

    fn time(&self) -> f32 {
        self.time
    }

    fn delta_time(&self) -> f32 {
        self.delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_steps() {
        let mut clock = ManualClock::new(0.5);
        assert_eq!(clock.time(), 0.0);
        clock.update();
        clock.update();
        assert_eq!(clock.time(), 1.0);
        assert_eq!(clock.delta_time(), 0.5);
        clock.advance(2.0);
        clock.set_step(0.25);
        clock.update();
        assert_eq!(clock.time(), 3.25);
        assert_eq!(clock.delta_time(), 0.25);
    }

    #[test]
    fn test_unscaled_clock_monotonic() {
        let mut clock = UnscaledClock::new();
        clock.update();
        let first = clock.time();
        clock.update();
        assert!(clock.time() >= first);
        assert!(clock.delta_time() >= 0.0);
    }
}
