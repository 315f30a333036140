//! Joints, springs and motors between pairs of bodies.
//!
//! Each variant implements [`Joint`]: a pre-step that caches anchors and
//! effective masses, a warm start that re-applies last step's impulse, and
//! an iteration that corrects the remaining velocity error.

pub mod gear;
pub mod groove;
pub mod motor;
pub mod pin;
pub mod pivot;
pub mod ratchet;
pub mod rotary_limit;
pub mod rotary_spring;
pub mod slide;
pub mod spring;

pub use gear::GearJoint;
pub use groove::GrooveJoint;
pub use motor::SimpleMotor;
pub use pin::PinJoint;
pub use pivot::PivotJoint;
pub use ratchet::RatchetJoint;
pub use rotary_limit::RotaryLimitJoint;
pub use rotary_spring::DampedRotarySpring;
pub use slide::SlideJoint;
pub use spring::DampedSpring;

use crate::api::error::{ensure_non_negative, PhysicsError, Result};
use crate::api::types::BodyHandle;
use crate::components::body::Body;
use crate::math::Real;
use crate::solver::SolverBody;

/// Solver limits shared by every constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct JointParams {
    pub max_force: Real,
    pub error_bias: Real,
    pub max_bias: Real,
}

/// Solver hooks for one constraint variant.
pub(crate) trait Joint {
    /// Resolve values that depend on the bodies' poses when added to a space.
    fn attach(&mut self, _a: &Body, _b: &Body) {}

    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real);

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real);

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real);

    /// Impulse applied during the last step.
    fn impulse(&self) -> Real;
}

/// One case per constraint type.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    Pin(PinJoint),
    Slide(SlideJoint),
    Pivot(PivotJoint),
    Groove(GrooveJoint),
    DampedSpring(DampedSpring),
    DampedRotarySpring(DampedRotarySpring),
    RotaryLimit(RotaryLimitJoint),
    Ratchet(RatchetJoint),
    Gear(GearJoint),
    SimpleMotor(SimpleMotor),
}

macro_rules! dispatch {
    ($kind:expr, $j:ident => $body:expr) => {
        match $kind {
            ConstraintKind::Pin($j) => $body,
            ConstraintKind::Slide($j) => $body,
            ConstraintKind::Pivot($j) => $body,
            ConstraintKind::Groove($j) => $body,
            ConstraintKind::DampedSpring($j) => $body,
            ConstraintKind::DampedRotarySpring($j) => $body,
            ConstraintKind::RotaryLimit($j) => $body,
            ConstraintKind::Ratchet($j) => $body,
            ConstraintKind::Gear($j) => $body,
            ConstraintKind::SimpleMotor($j) => $body,
        }
    };
}

macro_rules! kind_conversions {
    ($($variant:ident($ty:ident), $as_ref:ident, $as_mut:ident;)*) => {
        $(
            impl From<$ty> for ConstraintKind {
                fn from(joint: $ty) -> Self {
                    ConstraintKind::$variant(joint)
                }
            }
        )*

        impl Constraint {
            $(
                pub fn $as_ref(&self) -> Option<&$ty> {
                    match &self.kind {
                        ConstraintKind::$variant(j) => Some(j),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                    match &mut self.kind {
                        ConstraintKind::$variant(j) => Some(j),
                        _ => None,
                    }
                }
            )*
        }
    };
}

kind_conversions! {
    Pin(PinJoint), as_pin_joint, as_pin_joint_mut;
    Slide(SlideJoint), as_slide_joint, as_slide_joint_mut;
    Pivot(PivotJoint), as_pivot_joint, as_pivot_joint_mut;
    Groove(GrooveJoint), as_groove_joint, as_groove_joint_mut;
    DampedSpring(DampedSpring), as_damped_spring, as_damped_spring_mut;
    DampedRotarySpring(DampedRotarySpring), as_damped_rotary_spring, as_damped_rotary_spring_mut;
    RotaryLimit(RotaryLimitJoint), as_rotary_limit_joint, as_rotary_limit_joint_mut;
    Ratchet(RatchetJoint), as_ratchet_joint, as_ratchet_joint_mut;
    Gear(GearJoint), as_gear_joint, as_gear_joint_mut;
    SimpleMotor(SimpleMotor), as_simple_motor, as_simple_motor_mut;
}

/// A constraint between two bodies of the same space.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) params: JointParams,
    pub(crate) collide_bodies: bool,
    pub(crate) kind: ConstraintKind,
}

impl Constraint {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<ConstraintKind>) -> Result<Self> {
        if body_a == body_b {
            return Err(PhysicsError::InvalidArgument(
                "a constraint needs two different bodies".into(),
            ));
        }
        Ok(Self {
            body_a,
            body_b,
            params: JointParams {
                max_force: Real::INFINITY,
                error_bias: (0.9 as Real).powf(60.0),
                max_bias: Real::INFINITY,
            },
            collide_bodies: true,
            kind: kind.into(),
        })
    }

    // -- Builder pattern --

    pub fn with_max_force(mut self, max_force: Real) -> Result<Self> {
        self.set_max_force(max_force)?;
        Ok(self)
    }

    pub fn with_error_bias(mut self, error_bias: Real) -> Result<Self> {
        self.set_error_bias(error_bias)?;
        Ok(self)
    }

    pub fn with_max_bias(mut self, max_bias: Real) -> Result<Self> {
        self.set_max_bias(max_bias)?;
        Ok(self)
    }

    pub fn with_collide_bodies(mut self, collide: bool) -> Self {
        self.collide_bodies = collide;
        self
    }

    // -- Accessors --

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ConstraintKind {
        &mut self.kind
    }

    /// Largest force the constraint may apply.
    pub fn max_force(&self) -> Real {
        self.params.max_force
    }

    pub fn set_max_force(&mut self, max_force: Real) -> Result<()> {
        ensure_non_negative("max_force", max_force)?;
        self.params.max_force = max_force;
        Ok(())
    }

    /// Fraction of joint error left uncorrected after one second.
    pub fn error_bias(&self) -> Real {
        self.params.error_bias
    }

    pub fn set_error_bias(&mut self, error_bias: Real) -> Result<()> {
        if !(0.0..=1.0).contains(&error_bias) {
            return Err(PhysicsError::InvalidArgument(format!(
                "error_bias must be within [0, 1], got {}",
                error_bias
            )));
        }
        self.params.error_bias = error_bias;
        Ok(())
    }

    /// Largest speed at which joint error is corrected.
    pub fn max_bias(&self) -> Real {
        self.params.max_bias
    }

    pub fn set_max_bias(&mut self, max_bias: Real) -> Result<()> {
        ensure_non_negative("max_bias", max_bias)?;
        self.params.max_bias = max_bias;
        Ok(())
    }

    /// Whether the two bodies' shapes still collide with each other.
    pub fn collide_bodies(&self) -> bool {
        self.collide_bodies
    }

    pub fn set_collide_bodies(&mut self, collide: bool) {
        self.collide_bodies = collide;
    }

    /// Magnitude of the impulse applied during the last step.
    /// Divide by the step length for a force.
    pub fn impulse(&self) -> Real {
        dispatch!(&self.kind, j => j.impulse())
    }

    // -- Solver hooks --

    pub(crate) fn attach(&mut self, a: &Body, b: &Body) {
        dispatch!(&mut self.kind, j => j.attach(a, b))
    }

    pub(crate) fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt: Real) {
        let params = self.params;
        dispatch!(&mut self.kind, j => j.pre_step(a, b, &params, dt))
    }

    pub(crate) fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        dispatch!(&mut self.kind, j => j.apply_cached_impulse(a, b, dt_coef))
    }

    pub(crate) fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt: Real) {
        let params = self.params;
        dispatch!(&mut self.kind, j => j.apply_impulse(a, b, &params, dt))
    }
}

/// Clamp to `[-limit, limit]`.
pub(crate) fn clamp_abs(value: Real, limit: Real) -> Real {
    value.clamp(-limit, limit)
}
