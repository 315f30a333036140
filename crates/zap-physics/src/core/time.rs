use crate::api::error::{PhysicsError, Result};
use crate::math::Real;

/// Fixed timestep accumulator.
/// Feeds a space constant-size steps regardless of frame time.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    /// The fixed delta time per step.
    dt: Real,
    /// Accumulated time from variable frame deltas.
    accumulator: Real,
    /// Upper bound on steps per frame.
    max_steps: u32,
}

impl FixedTimestep {
    /// `dt` must be positive and finite.
    pub fn new(dt: Real) -> Result<Self> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidArgument(format!(
                "fixed time step must be positive and finite, got {}",
                dt
            )));
        }
        Ok(Self {
            dt,
            accumulator: 0.0,
            max_steps: 10,
        })
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Add frame time to the accumulator. Returns the number of fixed steps to run.
    pub fn accumulate(&mut self, frame_dt: Real) -> u32 {
        if !(frame_dt > 0.0) {
            return 0;
        }
        self.accumulator += frame_dt;
        let steps = (self.accumulator / self.dt) as u32;
        if steps >= self.max_steps {
            // Cap to prevent a spiral of death; the backlog is dropped
            self.accumulator = 0.0;
            return self.max_steps;
        }
        self.accumulator -= steps as Real * self.dt;
        steps
    }

    /// Interpolation alpha for rendering between steps (0.0 to 1.0).
    pub fn alpha(&self) -> Real {
        self.accumulator / self.dt
    }

    /// The fixed delta time.
    pub fn dt(&self) -> Real {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_step_exact() {
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap();
        assert_eq!(ts.accumulate(1.0 / 60.0), 1);
    }

    #[test]
    fn accumulates_partial() {
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap();
        assert_eq!(ts.accumulate(0.008), 0);
        assert_eq!(ts.accumulate(0.010), 1);
    }

    #[test]
    fn caps_at_max_steps() {
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap();
        assert_eq!(ts.accumulate(1.0), 10);
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap().with_max_steps(3);
        assert_eq!(ts.accumulate(1.0), 3);
    }

    #[test]
    fn negative_frame_time_is_ignored() {
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap();
        assert_eq!(ts.accumulate(-1.0), 0);
        assert_eq!(ts.alpha(), 0.0);
    }

    #[test]
    fn rejects_degenerate_step() {
        for dt in [0.0, -0.01, Real::NAN, Real::INFINITY] {
            assert!(
                matches!(FixedTimestep::new(dt), Err(PhysicsError::InvalidArgument(_))),
                "dt {} was accepted",
                dt
            );
        }
    }

    #[test]
    fn alpha_is_between_zero_and_one() {
        let mut ts = FixedTimestep::new(1.0 / 60.0).unwrap();
        ts.accumulate(0.008);
        let a = ts.alpha();
        assert!((0.0..=1.0).contains(&a), "alpha was {}", a);
    }
}
