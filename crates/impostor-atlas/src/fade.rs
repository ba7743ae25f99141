//! Per-slot fade state.
//!
//! Deadlines are absolute times on the unscaled clock, so a slot's state only
//! changes when [`crate::Chunk::tick`] observes a deadline has passed. The
//! shader receives the same information as a signed float through
//! [`FadeTimer::encoded`].

/// Fade timer of an occupied slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadeTimer {
    /// Fading in until the deadline, fully visible after it.
    FadingIn {
        /// Time at which the fade-in completes.
        until: f32,
    },
    /// Fading out until the deadline, then the slot is freed.
    FadingOut {
        /// Time at which the fade-out completes.
        until: f32,
    },
}

/// Fade state observed at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadePhase {
    /// Still fading in for `remaining` seconds.
    FadingIn {
        /// Seconds left.
        remaining: f32,
    },
    /// Fully visible.
    Steady,
    /// Fading out for `remaining` seconds.
    FadingOut {
        /// Seconds left, zero once the deadline has passed.
        remaining: f32,
    },
}

impl FadeTimer {
    /// Signed encoding: the fade-in deadline as a positive value, the
    /// fade-out deadline negated.
    pub fn encoded(self) -> f32 {
        match self {
            Self::FadingIn { until } => until,
            Self::FadingOut { until } => -until,
        }
    }

    /// The phase this timer is in at `now`.
    pub fn phase(self, now: f32) -> FadePhase {
        match self {
            Self::FadingIn { until } if until > now => FadePhase::FadingIn {
                remaining: until - now,
            },
            Self::FadingIn { .. } => FadePhase::Steady,
            Self::FadingOut { until } => FadePhase::FadingOut {
                remaining: (until - now).max(0.0),
            },
        }
    }

    /// Returns `true` for a fade-out timer.
    pub fn is_fading_out(self) -> bool {
        matches!(self, Self::FadingOut { .. })
    }
}

impl Default for FadeTimer {
    fn default() -> Self {
        Self::FadingIn { until: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_sign() {
        assert_eq!(FadeTimer::FadingIn { until: 4.5 }.encoded(), 4.5);
        assert_eq!(FadeTimer::FadingOut { until: 4.5 }.encoded(), -4.5);
    }

    #[test]
    fn test_phase_progression() {
        let fade_in = FadeTimer::FadingIn { until: 2.0 };
        assert_eq!(fade_in.phase(1.5), FadePhase::FadingIn { remaining: 0.5 });
        assert_eq!(fade_in.phase(2.0), FadePhase::Steady);
        assert_eq!(fade_in.phase(10.0), FadePhase::Steady);

        let fade_out = FadeTimer::FadingOut { until: 3.0 };
        assert_eq!(fade_out.phase(2.0), FadePhase::FadingOut { remaining: 1.0 });
        assert_eq!(fade_out.phase(5.0), FadePhase::FadingOut { remaining: 0.0 });
    }
}
