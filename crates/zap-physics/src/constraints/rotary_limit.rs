use super::{clamp_abs, Joint, JointParams};
use crate::api::error::{PhysicsError, Result};
use crate::math::Real;
use crate::solver::{bias_coef, effective_mass, SolverBody};

/// Keeps `angle_b - angle_a` within `[min, max]`.
#[derive(Debug, Clone)]
pub struct RotaryLimitJoint {
    min: Real,
    max: Real,

    i_sum: Real,
    bias: Real,
    j_acc: Real,
}

impl RotaryLimitJoint {
    pub fn new(min: Real, max: Real) -> Result<Self> {
        validate_range(min, max)?;
        Ok(Self { min, max, i_sum: 0.0, bias: 0.0, j_acc: 0.0 })
    }

    pub fn min(&self) -> Real {
        self.min
    }

    pub fn max(&self) -> Real {
        self.max
    }

    pub fn set_limits(&mut self, min: Real, max: Real) -> Result<()> {
        validate_range(min, max)?;
        self.min = min;
        self.max = max;
        Ok(())
    }
}

fn validate_range(min: Real, max: Real) -> Result<()> {
    if min <= max {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "rotary limit needs min <= max, got [{}, {}]",
            min, max
        )))
    }
}

impl Joint for RotaryLimitJoint {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let dist = b.a - a.a;
        let mut pdist = 0.0;
        if dist > self.max {
            pdist = self.max - dist;
        } else if dist < self.min {
            pdist = self.min - dist;
        }

        self.i_sum = effective_mass(a.i_inv + b.i_inv);
        self.bias = clamp_abs(-bias_coef(params.error_bias, dt) * pdist / dt, params.max_bias);

        // Only active past a limit
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
        let j_max = params.max_force * dt;

        let j = -(self.bias + wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = if self.bias < 0.0 {
            (j_old + j).clamp(0.0, j_max)
        } else {
            (j_old + j).clamp(-j_max, 0.0)
        };
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
    fn inactive_within_limits() {
        let mut joint = RotaryLimitJoint::new(-1.0, 1.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.w = 3.0;
        joint.pre_step(&mut a, &mut b, &params(), DT);
        joint.apply_impulse(&mut a, &mut b, &params(), DT);
        assert_eq!(b.w, 3.0);
    }

    #[test]
    fn pushes_back_past_max() {
        let mut joint = RotaryLimitJoint::new(-1.0, 1.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.a = 1.2;
        b.w = 2.0;
        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..10 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.w < 0.0, "w = {}", b.w);
        assert!(joint.impulse() > 0.0);
    }

    #[test]
    fn rejects_inverted_limits() {
        assert!(RotaryLimitJoint::new(1.0, -1.0).is_err());
    }
}
