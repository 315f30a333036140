use super::{Joint, JointParams};
use crate::components::body::Body;
use crate::math::{Mat2, Real, Vect};
use crate::solver::{apply_impulses, bias_coef, k_tensor, relative_velocity, SolverBody};

/// Pins a point on each body together, leaving rotation free.
#[derive(Debug, Clone)]
pub struct PivotJoint {
    anchor_a: Vect,
    anchor_b: Vect,
    /// World pivot converted to anchors on attach.
    pivot: Option<Vect>,

    r1: Vect,
    r2: Vect,
    k: Mat2,
    j_acc: Vect,
    bias: Vect,
}

impl PivotJoint {
    /// Anchors in each body's coordinates.
    pub fn new(anchor_a: Vect, anchor_b: Vect) -> Self {
        Self {
            anchor_a,
            anchor_b,
            pivot: None,
            r1: Vect::ZERO,
            r2: Vect::ZERO,
            k: Mat2::ZERO,
            j_acc: Vect::ZERO,
            bias: Vect::ZERO,
        }
    }

    /// Single world-space pivot, converted to body anchors when added.
    pub fn at(pivot: Vect) -> Self {
        Self {
            pivot: Some(pivot),
            ..Self::new(Vect::ZERO, Vect::ZERO)
        }
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
}

impl Joint for PivotJoint {
    fn attach(&mut self, a: &Body, b: &Body) {
        if let Some(pivot) = self.pivot.take() {
            self.anchor_a = a.world_to_local(pivot);
            self.anchor_b = b.world_to_local(pivot);
        }
    }

    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        self.r1 = a.anchor_offset(self.anchor_a);
        self.r2 = b.anchor_offset(self.anchor_b);
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
        self.j_acc = (j_old + j).clamp_length_max(params.max_force * dt);
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
    fn anchor_point_stops_moving() {
        let mut joint = PivotJoint::new(Vect::ZERO, Vect::new(-1.0, 0.0));
        let mut a = anchor();
        let mut b = body_at(Vect::new(1.0, 0.0));
        b.v = Vect::new(2.0, -3.0);
        b.w = 1.0;

        joint.pre_step(&mut a, &mut b, &params(), DT);
        for _ in 0..20 {
            joint.apply_impulse(&mut a, &mut b, &params(), DT);
        }
        let point_velocity = relative_velocity(&a, &b, joint.r1, joint.r2);
        assert!(point_velocity.length() < 1e-9, "anchor velocity {:?}", point_velocity);
    }

    #[test]
    fn world_pivot_becomes_anchors() {
        let mut joint = PivotJoint::at(Vect::new(2.0, 0.0));
        let a = Body::static_body();
        let b = Body::new(1.0, 1.0).unwrap().with_position(Vect::new(3.0, 0.0));
        joint.attach(&a, &b);
        assert_eq!(joint.anchor_a(), Vect::new(2.0, 0.0));
        assert!((joint.anchor_b() - Vect::new(-1.0, 0.0)).length() < 1e-9);
    }
}
