//! Impulse helpers shared by the contact solver and the constraints.
//!
//! Solving works on a compact copy of each body so that arbiters and
//! constraints can borrow two bodies mutably without touching the arena.

use crate::components::body::{Body, BodyKind};
use crate::math::{Mat2, Real, Vect};

/// Per-step solver view of a body. Sleeping, static and kinematic bodies
/// get zero inverse mass so impulses leave them untouched.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverBody {
    pub m_inv: Real,
    pub i_inv: Real,
    /// World center of gravity.
    pub p: Vect,
    pub cog: Vect,
    pub a: Real,
    pub rot: Vect,
    pub v: Vect,
    pub w: Real,
    pub v_bias: Vect,
    pub w_bias: Real,
}

impl SolverBody {
    pub const EMPTY: SolverBody = SolverBody {
        m_inv: 0.0,
        i_inv: 0.0,
        p: Vect::ZERO,
        cog: Vect::ZERO,
        a: 0.0,
        rot: Vect::X,
        v: Vect::ZERO,
        w: 0.0,
        v_bias: Vect::ZERO,
        w_bias: 0.0,
    };

    pub fn from_body(body: &Body) -> Self {
        let simulated = body.kind == BodyKind::Dynamic && !body.sleeping;
        let moving = body.kind == BodyKind::Kinematic || simulated;
        Self {
            m_inv: if simulated { body.m_inv } else { 0.0 },
            i_inv: if simulated { body.i_inv } else { 0.0 },
            p: body.p,
            cog: body.cog,
            a: body.a,
            rot: body.rot,
            v: if moving { body.v } else { Vect::ZERO },
            w: if moving { body.w } else { 0.0 },
            v_bias: Vect::ZERO,
            w_bias: 0.0,
        }
    }

    /// Anchor in body coordinates to a world-oriented offset from the center of gravity.
    pub fn anchor_offset(&self, anchor: Vect) -> Vect {
        (anchor - self.cog).rotate(self.rot)
    }

    pub fn apply_impulse(&mut self, j: Vect, r: Vect) {
        self.v += j * self.m_inv;
        self.w += self.i_inv * r.perp_dot(j);
    }

    pub fn apply_bias_impulse(&mut self, j: Vect, r: Vect) {
        self.v_bias += j * self.m_inv;
        self.w_bias += self.i_inv * r.perp_dot(j);
    }
}

/// Two distinct entries of the solver body table.
pub(crate) fn pair_mut(bodies: &mut [SolverBody], a: usize, b: usize) -> Option<(&mut SolverBody, &mut SolverBody)> {
    if a == b || a >= bodies.len() || b >= bodies.len() {
        return None;
    }
    if a < b {
        let (head, tail) = bodies.split_at_mut(b);
        Some((&mut head[a], &mut tail[0]))
    } else {
        let (head, tail) = bodies.split_at_mut(a);
        Some((&mut tail[0], &mut head[b]))
    }
}

pub(crate) fn relative_velocity(a: &SolverBody, b: &SolverBody, r1: Vect, r2: Vect) -> Vect {
    let v1 = a.v + r1.perp() * a.w;
    let v2 = b.v + r2.perp() * b.w;
    v2 - v1
}

pub(crate) fn normal_relative_velocity(a: &SolverBody, b: &SolverBody, r1: Vect, r2: Vect, n: Vect) -> Real {
    relative_velocity(a, b, r1, r2).dot(n)
}

/// Apply `j` to `b` and `-j` to `a`.
pub(crate) fn apply_impulses(a: &mut SolverBody, b: &mut SolverBody, r1: Vect, r2: Vect, j: Vect) {
    a.apply_impulse(-j, r1);
    b.apply_impulse(j, r2);
}

pub(crate) fn apply_bias_impulses(a: &mut SolverBody, b: &mut SolverBody, r1: Vect, r2: Vect, j: Vect) {
    a.apply_bias_impulse(-j, r1);
    b.apply_bias_impulse(j, r2);
}

fn k_scalar_body(body: &SolverBody, r: Vect, n: Vect) -> Real {
    let rcn = r.perp_dot(n);
    body.m_inv + body.i_inv * rcn * rcn
}

/// Inverse effective mass along `n`.
pub(crate) fn k_scalar(a: &SolverBody, b: &SolverBody, r1: Vect, r2: Vect, n: Vect) -> Real {
    k_scalar_body(a, r1, n) + k_scalar_body(b, r2, n)
}

/// `1 / k`, or zero when the pair cannot be moved along this axis.
pub(crate) fn effective_mass(k: Real) -> Real {
    if k > 0.0 && k.is_finite() {
        1.0 / k
    } else {
        0.0
    }
}

/// Effective mass matrix for a two-axis point constraint.
pub(crate) fn k_tensor(a: &SolverBody, b: &SolverBody, r1: Vect, r2: Vect) -> Mat2 {
    let m_sum = a.m_inv + b.m_inv;

    let mut k11 = m_sum;
    let mut k12 = 0.0;
    let mut k21 = 0.0;
    let mut k22 = m_sum;

    for (i_inv, r) in [(a.i_inv, r1), (b.i_inv, r2)] {
        k11 += i_inv * r.y * r.y;
        k12 += -i_inv * r.x * r.y;
        k21 += -i_inv * r.x * r.y;
        k22 += i_inv * r.x * r.x;
    }

    let det = k11 * k22 - k12 * k21;
    if det == 0.0 || !det.is_finite() {
        return Mat2::ZERO;
    }
    let det_inv = 1.0 / det;
    Mat2::from_cols(
        Vect::new(k22 * det_inv, -k21 * det_inv),
        Vect::new(-k12 * det_inv, k11 * det_inv),
    )
}

/// Fraction of error corrected per step for a given per-second remainder.
pub(crate) fn bias_coef(error_bias: Real, dt: Real) -> Real {
    1.0 - error_bias.powf(dt)
}
