use super::{Joint, JointParams};
use crate::api::error::{ensure_non_negative, Result};
use crate::math::Real;
use crate::solver::{effective_mass, SolverBody};

/// Angular spring with damping. Torque is
/// `(angle_a - angle_b - rest_angle) * stiffness`.
#[derive(Debug, Clone)]
pub struct DampedRotarySpring {
    rest_angle: Real,
    stiffness: Real,
    damping: Real,

    target_wrn: Real,
    w_coef: Real,
    i_sum: Real,
    j_acc: Real,
}

impl DampedRotarySpring {
    pub fn new(rest_angle: Real, stiffness: Real, damping: Real) -> Result<Self> {
        ensure_non_negative("stiffness", stiffness)?;
        ensure_non_negative("damping", damping)?;
        Ok(Self {
            rest_angle,
            stiffness,
            damping,
            target_wrn: 0.0,
            w_coef: 0.0,
            i_sum: 0.0,
            j_acc: 0.0,
        })
    }

    pub fn rest_angle(&self) -> Real {
        self.rest_angle
    }

    pub fn set_rest_angle(&mut self, rest_angle: Real) {
        self.rest_angle = rest_angle;
    }

    pub fn stiffness(&self) -> Real {
        self.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: Real) -> Result<()> {
        ensure_non_negative("stiffness", stiffness)?;
        self.stiffness = stiffness;
        Ok(())
    }

    pub fn damping(&self) -> Real {
        self.damping
    }

    pub fn set_damping(&mut self, damping: Real) -> Result<()> {
        ensure_non_negative("damping", damping)?;
        self.damping = damping;
        Ok(())
    }

    fn spring_torque(&self, relative_angle: Real) -> Real {
        (relative_angle - self.rest_angle) * self.stiffness
    }
}

impl Joint for DampedRotarySpring {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, _params: &JointParams, dt: Real) {
        let moment = a.i_inv + b.i_inv;
        self.i_sum = effective_mass(moment);

        self.w_coef = 1.0 - (-self.damping * dt * moment).exp();
        self.target_wrn = 0.0;

        let j_spring = self.spring_torque(a.a - b.a) * dt;
        self.j_acc = j_spring;

        a.w -= j_spring * a.i_inv;
        b.w += j_spring * b.i_inv;
    }

    fn apply_cached_impulse(&mut self, _a: &mut SolverBody, _b: &mut SolverBody, _dt_coef: Real) {}

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, _params: &JointParams, _dt: Real) {
        let wrn = a.w - b.w;

        let w_damp = (self.target_wrn - wrn) * self.w_coef;
        self.target_wrn = wrn + w_damp;

        let j_damp = w_damp * self.i_sum;
        self.j_acc += j_damp;

        a.w += j_damp * a.i_inv;
        b.w -= j_damp * b.i_inv;
    }

    fn impulse(&self) -> Real {
        self.j_acc
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
    fn twisted_spring_turns_back() {
        let mut spring = DampedRotarySpring::new(0.0, 50.0, 0.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.a = 1.0;
        spring.pre_step(&mut a, &mut b, &params(), DT);
        // (0 - 1) * 50 * dt applied to b
        assert!((b.w + 50.0 * DT).abs() < 1e-9, "w = {}", b.w);
    }

    #[test]
    fn damping_slows_spin() {
        let mut spring = DampedRotarySpring::new(0.0, 0.0, 20.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.w = 5.0;
        spring.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..10 {
            spring.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.w < 5.0 && b.w > 0.0, "w = {}", b.w);
    }
}
