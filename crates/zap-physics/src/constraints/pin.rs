use super::{clamp_abs, Joint, JointParams};
use crate::components::body::Body;
use crate::math::{Real, Vect};
use crate::solver::{apply_impulses, bias_coef, effective_mass, k_scalar, normal_relative_velocity, SolverBody};

/// Keeps two anchor points at a fixed distance, like a massless rod.
#[derive(Debug, Clone)]
pub struct PinJoint {
    anchor_a: Vect,
    anchor_b: Vect,
    dist: Option<Real>,

    r1: Vect,
    r2: Vect,
    n: Vect,
    n_mass: Real,
    jn_acc: Real,
    bias: Real,
}

impl PinJoint {
    /// Anchors are in body coordinates. The distance is measured from the
    /// bodies' poses when the joint is added to a space.
    pub fn new(anchor_a: Vect, anchor_b: Vect) -> Self {
        Self {
            anchor_a,
            anchor_b,
            dist: None,
            r1: Vect::ZERO,
            r2: Vect::ZERO,
            n: Vect::ZERO,
            n_mass: 0.0,
            jn_acc: 0.0,
            bias: 0.0,
        }
    }

    /// Use an explicit distance instead of measuring it.
    pub fn with_dist(mut self, dist: Real) -> Self {
        self.dist = Some(dist);
        self
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

    /// Target distance. Zero until measured on attach when none was given.
    pub fn dist(&self) -> Real {
        self.dist.unwrap_or(0.0)
    }

    pub fn set_dist(&mut self, dist: Real) {
        self.dist = Some(dist);
    }
}

impl Joint for PinJoint {
    fn attach(&mut self, a: &Body, b: &Body) {
        if self.dist.is_none() {
            let p1 = a.local_to_world(self.anchor_a);
            let p2 = b.local_to_world(self.anchor_b);
            self.dist = Some(p1.distance(p2));
        }
    }

    fn pre_step(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        self.r1 = a.anchor_offset(self.anchor_a);
        self.r2 = b.anchor_offset(self.anchor_b);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let dist = delta.length();
        self.n = if dist > 0.0 { delta / dist } else { Vect::ZERO };

        self.n_mass = effective_mass(k_scalar(a, b, self.r1, self.r2, self.n));
        self.bias = clamp_abs(-bias_coef(params.error_bias, dt) * (dist - self.dist()) / dt, params.max_bias);
    }

    fn apply_cached_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        let j = self.n * (self.jn_acc * dt_coef);
        apply_impulses(a, b, self.r1, self.r2, j);
    }

    fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody, params: &JointParams, dt: Real) {
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let jn_max = params.max_force * dt;

        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = clamp_abs(jn_old + jn, jn_max);
        let jn = self.jn_acc - jn_old;

        apply_impulses(a, b, self.r1, self.r2, self.n * jn);
    }

    fn impulse(&self) -> Real {
        self.jn_acc.abs()
    }
}
