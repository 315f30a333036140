use super::{clamp_abs, Joint, JointParams};
use crate::api::error::{PhysicsError, Result};
use crate::math::{Real, Vect};
use crate::solver::{apply_impulses, bias_coef, effective_mass, k_scalar, relative_velocity, SolverBody};

/// Keeps the distance between two anchors within `[min, max]`, like a chain.
#[derive(Debug, Clone)]
pub struct SlideJoint {
    anchor_a: Vect,
    anchor_b: Vect,
    min: Real,
    max: Real,

    r1: Vect,
    r2: Vect,
    n: Vect,
    n_mass: Real,
    jn_acc: Real,
    bias: Real,
}

impl SlideJoint {
    pub fn new(anchor_a: Vect, anchor_b: Vect, min: Real, max: Real) -> Result<Self> {
        validate_range(min, max)?;
        Ok(Self {
            anchor_a,
            anchor_b,
            min,
            max,
            r1: Vect::ZERO,
            r2: Vect::ZERO,
            n: Vect::ZERO,
            n_mass: 0.0,
            jn_acc: 0.0,
            bias: 0.0,
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
    if min >= 0.0 && min <= max {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "slide joint needs 0 <= min <= max, got [{}, {}]",
            min, max
        )))
    }
}

impl Joint for SlideJoint {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        self.r1 = a.anchor_offset(self.anchor_a);
        self.r2 = b.anchor_offset(self.anchor_b);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let dist = delta.length();
        let mut pdist = 0.0;
        if dist > self.max {
            pdist = dist - self.max;
            self.n = delta.normalize_or_zero();
        } else if dist < self.min {
            pdist = self.min - dist;
            self.n = -delta.normalize_or_zero();
        } else {
            self.n = Vect::ZERO;
            self.jn_acc = 0.0;
        }

        self.n_mass = effective_mass(k_scalar(a, b, self.r1, self.r2, self.n));
        self.bias = clamp_abs(-bias_coef(params.error_bias, dt) * pdist / dt, params.max_bias);
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        let j = self.n * (self.jn_acc * dt_coef);
        apply_impulses(a, b, self.r1, self.r2, j);
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        if self.n == Vect::ZERO {
            return;
        }

        let vr = relative_velocity(a, b, self.r1, self.r2);
        let vrn = vr.dot(self.n);

        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = (jn_old + jn).clamp(-params.max_force * dt, 0.0);
        let jn = self.jn_acc - jn_old;

        apply_impulses(a, b, self.r1, self.r2, self.n * jn);
    }

    fn impulse(&self) -> Real {
        self.jn_acc.abs()
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
    fn slack_inside_range() {
        let mut joint = SlideJoint::new(Vect::ZERO, Vect::ZERO, 1.0, 3.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::new(2.0, 0.0));
        b.v = Vect::new(5.0, 0.0);
        joint.pre_step(&mut a, &mut b, &params(), DT);
        joint.apply_impulse(&mut a, &mut b, &params(), DT);
        assert_eq!(b.v, Vect::new(5.0, 0.0));
        assert_eq!(joint.impulse(), 0.0);
    }

    #[test]
    fn pulls_back_past_max() {
        let mut joint = SlideJoint::new(Vect::ZERO, Vect::ZERO, 0.0, 1.0).unwrap();
        let mut a = anchor();
        let mut b = body_at(Vect::new(1.5, 0.0));
        b.v = Vect::new(2.0, 0.0);
        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..10 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.v.x < 0.0, "should move back inward, v = {:?}", b.v);
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(SlideJoint::new(Vect::ZERO, Vect::ZERO, 2.0, 1.0).is_err());
        assert!(SlideJoint::new(Vect::ZERO, Vect::ZERO, -1.0, 1.0).is_err());
    }
}
