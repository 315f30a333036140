use super::{clamp_abs, Joint, JointParams};
use crate::api::error::{PhysicsError, Result};
use crate::components::body::Body;
use crate::math::Real;
use crate::solver::{bias_coef, effective_mass, SolverBody};

/// One-way rotary ratchet, like a socket wrench. `ratchet` is the tooth
/// spacing in radians; its sign picks the free direction.
#[derive(Debug, Clone)]
pub struct RatchetJoint {
    angle: Real,
    phase: Real,
    ratchet: Real,

    i_sum: Real,
    bias: Real,
    j_acc: Real,
}

impl RatchetJoint {
    pub fn new(phase: Real, ratchet: Real) -> Result<Self> {
        validate_ratchet(ratchet)?;
        Ok(Self { angle: 0.0, phase, ratchet, i_sum: 0.0, bias: 0.0, j_acc: 0.0 })
    }

    /// Angle of the current tooth. Starts at the bodies' relative angle.
    pub fn angle(&self) -> Real {
        self.angle
    }

    pub fn set_angle(&mut self, angle: Real) {
        self.angle = angle;
    }

    pub fn phase(&self) -> Real {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Real) {
        self.phase = phase;
    }

    pub fn ratchet(&self) -> Real {
        self.ratchet
    }

    pub fn set_ratchet(&mut self, ratchet: Real) -> Result<()> {
        validate_ratchet(ratchet)?;
        self.ratchet = ratchet;
        Ok(())
    }
}

fn validate_ratchet(ratchet: Real) -> Result<()> {
    if ratchet != 0.0 && ratchet.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "ratchet spacing must be nonzero and finite, got {}",
            ratchet
        )))
    }
}

impl Joint for RatchetJoint {
    fn attach(&mut self, a: &Body, b: &Body) {
        self.angle = b.angle() - a.angle();
    }

    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let delta = b.a - a.a;
        let diff = self.angle - delta;
        let mut pdist = 0.0;

        if diff * self.ratchet > 0.0 {
            pdist = diff;
        } else {
            self.angle = ((delta - self.phase) / self.ratchet).floor() * self.ratchet + self.phase;
        }

        self.i_sum = effective_mass(a.i_inv + b.i_inv);
        self.bias = clamp_abs(-bias_coef(params.error_bias, dt) * pdist / dt, params.max_bias);

        if self.bias == 0.0 {
            self.j_acc = 0.0;
        }
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        let j = self.j_acc * dt_coef;
        a.w -= j * a.i_inv;
        b.w += j * b.i_inv;
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        if self.bias == 0.0 {
            return;
        }

        let wr = b.w - a.w;
        let ratchet = self.ratchet;
        let j_max = params.max_force * dt;

        let j = -(self.bias + wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = ((j_old + j) * ratchet).clamp(0.0, j_max * ratchet.abs()) / ratchet;
        let j = self.j_acc - j_old;

        a.w -= j * a.i_inv;
        b.w += j * b.i_inv;
    }

    fn impulse(&self) -> Real {
        self.j_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{anchor, body_at, DT};
    use crate::math::Vect;

    fn params() -> JointParams {
        JointParams { max_force: Real::INFINITY, error_bias: 0.5, max_bias: Real::INFINITY }
    }

    #[test]
    fn free_direction_advances_tooth() {
        let mut joint = RatchetJoint::new(0.0, 0.5).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.a = 1.3;
        b.w = 1.0;
        joint.pre_step(&mut a, &mut b, &params(), DT);
        assert!((joint.angle() - 1.0).abs() < 1e-9, "angle {}", joint.angle());
        joint.apply_impulse(&mut a, &mut b, &params(), DT);
        assert_eq!(b.w, 1.0);
    }

    #[test]
    fn blocked_direction_pushes_back() {
        let mut joint = RatchetJoint::new(0.0, 0.5).unwrap();
        joint.set_angle(1.0);
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.a = 0.9;
        b.w = -1.0;
        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..10 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.w > 0.0, "w = {}", b.w);
    }

    #[test]
    fn zero_spacing_rejected() {
        assert!(RatchetJoint::new(0.0, 0.0).is_err());
    }
}
