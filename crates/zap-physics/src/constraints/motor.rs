use super::{clamp_abs, Joint, JointParams};
use crate::math::Real;
use crate::solver::{effective_mass, SolverBody};

/// Holds the relative angular velocity of two bodies at a constant rate.
/// Usually paired with a finite max force.
#[derive(Debug, Clone)]
pub struct SimpleMotor {
    rate: Real,

    i_sum: Real,
    j_acc: Real,
}

impl SimpleMotor {
    pub fn new(rate: Real) -> Self {
        Self { rate, i_sum: 0.0, j_acc: 0.0 }
    }

    pub fn rate(&self) -> Real {
        self.rate
    }

    pub fn set_rate(&mut self, rate: Real) {
        self.rate = rate;
    }
}

impl Joint for SimpleMotor {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, _params: &JointParams, _dt: Real) {
        self.i_sum = effective_mass(a.i_inv + b.i_inv);
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        let j = self.j_acc * dt_coef;
        a.w -= j * a.i_inv;
        b.w += j * b.i_inv;
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let wr = b.w - a.w + self.rate;
        let j_max = params.max_force * dt;

        let j = -wr * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = clamp_abs(j_old + j, j_max);
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

    fn params(max_force: Real) -> JointParams {
        JointParams { max_force, error_bias: 0.5, max_bias: Real::INFINITY }
    }

    #[test]
    fn spins_body_to_rate() {
        let mut motor = SimpleMotor::new(3.0);
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        motor.pre_step(&mut a, &mut b, &params(Real::INFINITY), DT);
        motor.apply_impulse(&mut a, &mut b, &params(Real::INFINITY), DT);
        assert!((b.w + 3.0).abs() < 1e-9, "w = {}", b.w);
    }

    #[test]
    fn torque_limited_by_max_force() {
        let mut motor = SimpleMotor::new(100.0);
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        motor.pre_step(&mut a, &mut b, &params(60.0), DT);
        motor.apply_impulse(&mut a, &mut b, &params(60.0), DT);
        assert!((b.w + 1.0).abs() < 1e-9, "w = {}", b.w);
    }
}
