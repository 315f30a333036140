use super::{Joint, JointParams};
use crate::math::{Mat2, Real, Vect};
use crate::solver::{apply_impulses, bias_coef, k_tensor, relative_velocity, SolverBody};

/// Lets an anchor on body B slide along a groove fixed to body A.
#[derive(Debug, Clone)]
pub struct GrooveJoint {
    groove_a: Vect,
    groove_b: Vect,
    groove_n: Vect,
    anchor_b: Vect,

    groove_tn: Vect,
    clamp: Real,
    r1: Vect,
    r2: Vect,
    k: Mat2,
    j_acc: Vect,
    bias: Vect,
}

impl GrooveJoint {
    /// `groove_a` and `groove_b` are in body A's coordinates, `anchor_b` in B's.
    pub fn new(groove_a: Vect, groove_b: Vect, anchor_b: Vect) -> Self {
        Self {
            groove_a,
            groove_b,
            groove_n: groove_normal(groove_a, groove_b),
            anchor_b,
            groove_tn: Vect::ZERO,
            clamp: 0.0,
            r1: Vect::ZERO,
            r2: Vect::ZERO,
            k: Mat2::ZERO,
            j_acc: Vect::ZERO,
            bias: Vect::ZERO,
        }
    }

    pub fn groove_a(&self) -> Vect {
        self.groove_a
    }

    pub fn groove_b(&self) -> Vect {
        self.groove_b
    }

    pub fn set_groove(&mut self, groove_a: Vect, groove_b: Vect) {
        self.groove_a = groove_a;
        self.groove_b = groove_b;
        self.groove_n = groove_normal(groove_a, groove_b);
    }

    pub fn anchor_b(&self) -> Vect {
        self.anchor_b
    }

    pub fn set_anchor_b(&mut self, anchor: Vect) {
        self.anchor_b = anchor;
    }

    fn constrain(&self, j: Vect, dt: Real, max_force: Real) -> Vect {
        let n = self.groove_tn;
        let j_clamp = if self.clamp * j.perp_dot(n) > 0.0 {
            j
        } else {
            n * j.dot(n)
        };
        j_clamp.clamp_length_max(max_force * dt)
    }
}

fn groove_normal(a: Vect, b: Vect) -> Vect {
    (b - a).normalize_or_zero().perp()
}

impl Joint for GrooveJoint {
    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        // World-space groove endpoints
        let ta = a.p + a.anchor_offset(self.groove_a);
        let tb = a.p + a.anchor_offset(self.groove_b);

        let n = self.groove_n.rotate(a.rot);
        let d = ta.dot(n);

        self.groove_tn = n;
        self.r2 = b.anchor_offset(self.anchor_b);

        // Clamp the anchor to the groove
        let td = (b.p + self.r2).perp_dot(n);
        if td <= ta.perp_dot(n) {
            self.clamp = 1.0;
            self.r1 = ta - a.p;
        } else if td >= tb.perp_dot(n) {
            self.clamp = -1.0;
            self.r1 = tb - a.p;
        } else {
            self.clamp = 0.0;
            self.r1 = n.perp() * -td + n * d - a.p;
        }

        self.k = k_tensor(a, b, self.r1, self.r2);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        self.bias = (delta * (-bias_coef(params.error_bias, dt) / dt)).clamp_length_max(params.max_bias);
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        apply_impulses(a, b, self.r1, self.r2, self.j_acc * dt_coef);
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let vr = relative_velocity(a, b, self.r1, self.r2);

        let j = self.k * (self.bias - vr);
        let j_old = self.j_acc;
        self.j_acc = self.constrain(j_old + j, dt, params.max_force);
        let j = self.j_acc - j_old;

        apply_impulses(a, b, self.r1, self.r2, j);
    }

    fn impulse(&self) -> Real {
        self.j_acc.length()
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
    fn slides_freely_along_groove() {
        let mut joint = GrooveJoint::new(Vect::new(-5.0, 0.0), Vect::new(5.0, 0.0), Vect::ZERO);
        let mut a = anchor();
        let mut b = body_at(Vect::ZERO);
        b.v = Vect::new(3.0, 2.0);

        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..20 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!((b.v.x - 3.0).abs() < 1e-9, "tangential velocity changed: {:?}", b.v);
        assert!(b.v.y.abs() < 1e-9, "normal velocity left: {:?}", b.v);
    }

    #[test]
    fn stops_at_groove_end() {
        let mut joint = GrooveJoint::new(Vect::new(-5.0, 0.0), Vect::new(5.0, 0.0), Vect::ZERO);
        let mut a = anchor();
        let mut b = body_at(Vect::new(5.0, 0.0));
        b.v = Vect::new(3.0, 0.0);

        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..20 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        assert!(b.v.x.abs() < 1e-9, "should stop at the end: {:?}", b.v);
    }
}
