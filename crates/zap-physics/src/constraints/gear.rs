use super::{clamp_abs, Joint, JointParams};
use crate::api::error::{PhysicsError, Result};
use crate::math::Real;
use crate::solver::{bias_coef, effective_mass, SolverBody};

/// Keeps `angle_b * ratio - angle_a` equal to `phase`.
#[derive(Debug, Clone)]
pub struct GearJoint {
    phase: Real,
    ratio: Real,
    ratio_inv: Real,

    i_sum: Real,
    bias: Real,
    j_acc: Real,
}

impl GearJoint {
    pub fn new(phase: Real, ratio: Real) -> Result<Self> {
        validate_ratio(ratio)?;
        Ok(Self {
            phase,
            ratio,
            ratio_inv: 1.0 / ratio,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
        })
    }

    pub fn phase(&self) -> Real {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Real) {
        self.phase = phase;
    }

    pub fn ratio(&self) -> Real {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: Real) -> Result<()> {
        validate_ratio(ratio)?;
        self.ratio = ratio;
        self.ratio_inv = 1.0 / ratio;
        Ok(())
    }
}

fn validate_ratio(ratio: Real) -> Result<()> {
    if ratio != 0.0 && ratio.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "gear ratio must be nonzero and finite, got {}",
            ratio
        )))
    }
}

impl Joint for GearJoint {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        self.i_sum = effective_mass(a.i_inv * self.ratio_inv + self.ratio * b.i_inv);

        let error = b.a * self.ratio - a.a - self.phase;
        self.bias = clamp_abs(-bias_coef(params.error_bias, dt) * error / dt, params.max_bias);
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        let j = self.j_acc * dt_coef;
        a.w -= j * a.i_inv * self.ratio_inv;
        b.w += j * b.i_inv;
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let wr = b.w * self.ratio - a.w;
        let j_max = params.max_force * dt;

        let j = (self.bias - wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = clamp_abs(j_old + j, j_max);
        let j = self.j_acc - j_old;

        a.w -= j * a.i_inv * self.ratio_inv;
        b.w += j * b.i_inv;
    }

    fn impulse(&self) -> Real {
        self.j_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{body_at, DT};
    use crate::math::Vect;

    fn params() -> JointParams {
        JointParams { max_force: Real::INFINITY, error_bias: 0.5, max_bias: Real::INFINITY }
    }

    #[test]
    fn drives_second_gear_at_ratio() {
        let mut joint = GearJoint::new(0.0, 2.0).unwrap();
        let mut a = body_at(Vect::ZERO);
        let mut b = body_at(Vect::new(3.0, 0.0));
        a.w = 4.0;
        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..30 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!((b.w * 2.0 - a.w).abs() < 1e-6, "a.w {} b.w {}", a.w, b.w);
    }

    #[test]
    fn zero_ratio_rejected() {
        assert!(matches!(GearJoint::new(0.0, 0.0), Err(PhysicsError::InvalidArgument(_))));
        let mut joint = GearJoint::new(0.0, 1.0).unwrap();
        assert!(joint.set_ratio(0.0).is_err());
        assert_eq!(joint.ratio(), 1.0);
    }
}
