use bevy::prelude::*;

/// How long a reconciliation snap takes to ease out of the rendered position.
pub const CORRECTION_DURATION: f32 = 0.12;

/// Visual remainder of a reconciliation snap.
///
/// Reconciliation moves the simulated position instantly. The renderer keeps
/// showing the pre-correction position and this tracks the shrinking offset
/// between the two until they agree again, so a misprediction reads as a
/// quick catch-up instead of a teleport.
#[derive(Component)]
pub struct SmoothCorrection {
    initial_offset: Vec3,
    elapsed: f32,
}

impl SmoothCorrection {
    /// `offset` is old predicted position minus corrected position, as
    /// returned by [`crate::prediction::reconcile`].
    pub fn start(offset: Vec3) -> Self {
        Self {
            initial_offset: offset,
            elapsed: 0.0,
        }
    }

    /// Advance the easing and return the offset still to be displayed.
    pub fn update(&mut self, dt: f32) -> Vec3 {
        self.elapsed += dt;
        self.offset()
    }

    /// Current visual offset. Eased with a cubic ease-out: most of the error
    /// disappears early and the tail settles gently.
    pub fn offset(&self) -> Vec3 {
        let t = (self.elapsed / CORRECTION_DURATION).clamp(0.0, 1.0);
        self.initial_offset * (1.0 - t).powi(3)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= CORRECTION_DURATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_decays_monotonically_to_zero() {
        let mut correction = SmoothCorrection::start(Vec3::new(40.0, -10.0, 5.0));

        let mut last = correction.offset().length();
        for _ in 0..12 {
            let now = correction.update(1.0 / 60.0).length();
            assert!(now <= last, "offset grew from {last} to {now}");
            last = now;
        }

        assert!(correction.is_complete());
        assert_eq!(correction.offset(), Vec3::ZERO);
    }

    #[test]
    fn test_easing_front_loads_the_catch_up() {
        let mut correction = SmoothCorrection::start(Vec3::X * 100.0);

        // Halfway through the window more than half the error is gone
        correction.update(CORRECTION_DURATION * 0.5);
        assert!(correction.offset().length() < 50.0);
    }

    #[test]
    fn test_fresh_correction_shows_the_full_offset() {
        let offset = Vec3::new(-12.0, 3.0, 0.0);
        let correction = SmoothCorrection::start(offset);
        assert_eq!(correction.offset(), offset);
        assert!(!correction.is_complete());
    }
}
