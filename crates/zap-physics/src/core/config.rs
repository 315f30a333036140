use serde::{Deserialize, Serialize};

use crate::api::error::{ensure_non_negative, PhysicsError, Result};
use crate::math::{Real, Vect};

/// Per-space simulation parameters.
///
/// Every field has a default, so a JSON document only needs the values it
/// changes:
///
/// ```json
/// { "gravity": [0.0, -100.0], "iterations": 20, "sleep_time_threshold": 0.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Global gravity applied to every awake dynamic body.
    pub gravity: Vect,
    /// Fraction of velocity kept after one second. 1.0 disables damping.
    pub damping: Real,
    /// Solver passes per step.
    pub iterations: u32,
    /// Speed under which a body counts as idle. 0.0 derives it from gravity.
    pub idle_speed_threshold: Real,
    /// Seconds a group must idle before sleeping. `None` disables sleeping.
    pub sleep_time_threshold: Option<Real>,
    /// Overlap allowed between shapes before positional correction kicks in.
    pub collision_slop: Real,
    /// Fraction of overlap left uncorrected after one second.
    pub collision_bias: Real,
    /// Steps a separated arbiter is kept cached before being dropped.
    pub collision_persistence: u32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            gravity: Vect::ZERO,
            damping: 1.0,
            iterations: 10,
            idle_speed_threshold: 0.0,
            sleep_time_threshold: None,
            collision_slop: 0.1,
            collision_bias: (0.9 as Real).powf(60.0),
            collision_persistence: 3,
        }
    }
}

impl SpaceConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SpaceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_gravity(mut self, gravity: Vect) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_damping(mut self, damping: Real) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_sleep_time_threshold(mut self, seconds: Real) -> Self {
        self.sleep_time_threshold = Some(seconds);
        self
    }

    pub fn with_idle_speed_threshold(mut self, speed: Real) -> Self {
        self.idle_speed_threshold = speed;
        self
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidArgument(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        ensure_finite_non_negative("damping", self.damping)?;
        if self.iterations == 0 {
            return Err(PhysicsError::InvalidArgument(
                "iterations must be at least 1".into(),
            ));
        }
        ensure_finite_non_negative("idle_speed_threshold", self.idle_speed_threshold)?;
        if let Some(t) = self.sleep_time_threshold {
            ensure_non_negative("sleep_time_threshold", t)?;
        }
        ensure_finite_non_negative("collision_slop", self.collision_slop)?;
        if !(self.collision_bias >= 0.0 && self.collision_bias <= 1.0) {
            return Err(PhysicsError::InvalidArgument(format!(
                "collision_bias must be within [0, 1], got {}",
                self.collision_bias
            )));
        }
        Ok(())
    }

    /// Sleep threshold with `None` mapped to infinity.
    pub(crate) fn sleep_threshold(&self) -> Real {
        self.sleep_time_threshold.unwrap_or(Real::INFINITY)
    }
}

fn ensure_finite_non_negative(name: &str, value: Real) -> Result<()> {
    ensure_non_negative(name, value)?;
    if value.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}
