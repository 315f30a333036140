use super::{Joint, JointParams};
use crate::api::error::{ensure_non_negative, Result};
use crate::math::{Real, Vect};
use crate::solver::{apply_impulses, effective_mass, k_scalar, normal_relative_velocity, SolverBody};

/// Linear spring with damping between two anchors.
/// Force is `(rest_length - dist) * stiffness`, applied along the anchor axis.
#[derive(Debug, Clone)]
pub struct DampedSpring {
    anchor_a: Vect,
    anchor_b: Vect,
    rest_length: Real,
    stiffness: Real,
    damping: Real,

    target_vrn: Real,
    v_coef: Real,
    r1: Vect,
    r2: Vect,
    n_mass: Real,
    n: Vect,
    j_acc: Real,
}

impl DampedSpring {
    pub fn new(anchor_a: Vect, anchor_b: Vect, rest_length: Real, stiffness: Real, damping: Real) -> Result<Self> {
        ensure_non_negative("rest_length", rest_length)?;
        ensure_non_negative("stiffness", stiffness)?;
        ensure_non_negative("damping", damping)?;
        Ok(Self {
            anchor_a,
            anchor_b,
            rest_length,
            stiffness,
            damping,
            target_vrn: 0.0,
            v_coef: 0.0,
            r1: Vect::ZERO,
            r2: Vect::ZERO,
            n_mass: 0.0,
            n: Vect::ZERO,
            j_acc: 0.0,
        })
    }

    pub fn anchor_a(&self) -> Vect {
        self.anchor_a
    }

    pub fn set_anchor_a(&mut self, anchor: Vect) {
        self.anchor_a = anchor;
    }

    pub fn anchor_b(&self) -> Vect {
        self.anchor_b
    }

    pub fn set_anchor_b(&mut self, anchor: Vect) {
        self.anchor_b = anchor;
    }

    pub fn rest_length(&self) -> Real {
        self.rest_length
    }

    pub fn set_rest_length(&mut self, rest_length: Real) -> Result<()> {
        ensure_non_negative("rest_length", rest_length)?;
        self.rest_length = rest_length;
        Ok(())
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

    fn spring_force(&self, dist: Real) -> Real {
        (self.rest_length - dist) * self.stiffness
    }
}

impl Joint for DampedSpring {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, _params: &JointParams, dt: Real) {
        self.r1 = a.anchor_offset(self.anchor_a);
        self.r2 = b.anchor_offset(self.anchor_b);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let dist = delta.length();
        self.n = if dist > 0.0 { delta / dist } else { Vect::ZERO };

        let k = k_scalar(a, b, self.r1, self.r2, self.n);
        self.n_mass = effective_mass(k);

        self.target_vrn = 0.0;
        self.v_coef = 1.0 - (-self.damping * dt * k).exp();

        // Spring impulse goes in once per step, damping is iterated
        let j_spring = self.spring_force(dist) * dt;
        self.j_acc = j_spring;
        apply_impulses(a, b, self.r1, self.r2, self.n * j_spring);
    }

    fn apply_cached_impulse(&mut self, _a: &mut SolverBody, _b: &mut SolverBody, _dt_coef: Real) {}

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, _params: &JointParams, _dt: Real) {
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);

        let v_damp = (self.target_vrn - vrn) * self.v_coef;
        self.target_vrn = vrn + v_damp;

        let j_damp = v_damp * self.n_mass;
        self.j_acc += j_damp;
        apply_impulses(a, b, self.r1, self.r2, self.n * j_damp);
    }

    fn impulse(&self) -> Real {
        self.j_acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{anchor, body_at, DT};

    fn params() -> JointParams {
        JointParams { max_force: Real::INFINITY, error_bias: 0.5, max_bias: Real::INFINITY }
    }

    #[test]
    fn stretched_spring_pulls_inward() {
        let mut spring = DampedSpring::new(Vect::ZERO, Vect::ZERO, 1.0, 100.0, 0.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::new(2.0, 0.0));
        spring.pre_step(&mut a, &mut b, &params(), DT);
        // (1 - 2) * 100 * dt on a unit mass
        assert!((b.v.x + 100.0 * DT).abs() < 1e-9, "v = {:?}", b.v);
        assert!(spring.impulse() < 0.0);
    }

    #[test]
    fn damping_reduces_relative_speed() {
        let mut spring = DampedSpring::new(Vect::ZERO, Vect::ZERO, 2.0, 0.0, 10.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::new(2.0, 0.0));
        b.v = Vect::new(4.0, 0.0);
        spring.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..10 {
            spring.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.v.x < 4.0 && b.v.x > 0.0, "v = {:?}", b.v);
    }

    #[test]
    fn rejects_negative_stiffness() {
        assert!(DampedSpring::new(Vect::ZERO, Vect::ZERO, 1.0, -1.0, 0.0).is_err());
    }
}
