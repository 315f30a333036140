//! Persistent contact state for one colliding shape pair, and the
//! sequential-impulse contact solver that runs on it.

use log::warn;

use crate::api::error::{PhysicsError, Result};
use crate::api::types::{BodyHandle, ShapeHandle};
use crate::collision::narrow::{Collision, ContactPoint, ContactPointSet};
use crate::components::shape::Shape;
use crate::math::{Real, Vect};
use crate::solver::{
    apply_bias_impulses, apply_impulses, effective_mass, k_scalar, normal_relative_velocity,
    relative_velocity, SolverBody,
};

/// Where an arbiter is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterState {
    /// The shapes started touching this step.
    FirstCollision,
    /// The shapes have been touching for more than one step.
    Normal,
    /// Rejected by a handler; stays ignored until the shapes separate.
    Ignore,
    /// Not touching, kept around so impulses can be reused if they touch again.
    Cached,
    /// One of the shapes was removed from the space.
    Invalidated,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverContact {
    pub point: ContactPoint,
    pub hash: u32,
    /// Offsets from each body's center of gravity.
    pub r1: Vect,
    pub r2: Vect,

    pub n_mass: Real,
    pub t_mass: Real,
    pub bounce: Real,

    pub jn_acc: Real,
    pub jt_acc: Real,
    pub j_bias: Real,
    pub bias: Real,
}

impl SolverContact {
    fn new(point: ContactPoint, hash: u32, p_a: Vect, p_b: Vect) -> Self {
        Self {
            point,
            hash,
            r1: point.point_a - p_a,
            r2: point.point_b - p_b,
            n_mass: 0.0,
            t_mass: 0.0,
            bounce: 0.0,
            jn_acc: 0.0,
            jt_acc: 0.0,
            j_bias: 0.0,
            bias: 0.0,
        }
    }
}

/// Contact state between two shapes, handed to collision handlers.
///
/// Shape A is the one the contact normal points away from.
#[derive(Debug, Clone)]
pub struct Arbiter {
    pub(crate) shape_a: ShapeHandle,
    pub(crate) shape_b: ShapeHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collision_types: (u64, u64),
    pub(crate) sensor: bool,

    pub(crate) normal: Vect,
    pub(crate) contacts: Vec<SolverContact>,

    pub(crate) e: Real,
    pub(crate) u: Real,
    pub(crate) surface_vr: Vect,

    pub(crate) state: ArbiterState,
    /// Step stamp of the last narrow-phase hit.
    pub(crate) stamp: u64,
}

impl Arbiter {
    pub(crate) fn new(shape_a: ShapeHandle, shape_b: ShapeHandle, body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            shape_a,
            shape_b,
            body_a,
            body_b,
            collision_types: (0, 0),
            sensor: false,
            normal: Vect::ZERO,
            contacts: Vec::new(),
            e: 0.0,
            u: 0.0,
            surface_vr: Vect::ZERO,
            state: ArbiterState::FirstCollision,
            stamp: 0,
        }
    }

    /// Take the contacts of a fresh collision, carrying accumulated impulses
    /// over for contacts whose feature id persists. `p_a` and `p_b` are the
    /// bodies' world centers of gravity.
    pub(crate) fn update(&mut self, collision: &Collision, a: &Shape, b: &Shape, p_a: Vect, p_b: Vect, stamp: u64) {
        if self.state == ArbiterState::Cached {
            self.state = ArbiterState::FirstCollision;
        }
        let inherit = self.state != ArbiterState::FirstCollision;

        let contacts = collision
            .contacts
            .iter()
            .map(|c| {
                let mut contact = SolverContact::new(c.point, c.hash, p_a, p_b);
                if inherit {
                    if let Some(old) = self.contacts.iter().find(|old| old.hash == c.hash) {
                        contact.jn_acc = old.jn_acc;
                        contact.jt_acc = old.jt_acc;
                    }
                }
                contact
            })
            .collect();
        self.contacts = contacts;
        self.normal = collision.normal;

        self.e = a.elasticity * b.elasticity;
        self.u = a.friction * b.friction;
        let surface_vr = b.surface_velocity - a.surface_velocity;
        self.surface_vr = surface_vr - self.normal * surface_vr.dot(self.normal);

        self.collision_types = (a.collision_type, b.collision_type);
        self.sensor = a.sensor || b.sensor;
        self.stamp = stamp;
    }

    /// Forget accumulated impulses when the arbiter is not solved this step.
    pub(crate) fn reset_impulses(&mut self) {
        for con in &mut self.contacts {
            con.jn_acc = 0.0;
            con.jt_acc = 0.0;
            con.j_bias = 0.0;
        }
    }

    // -- Solver --

    pub(crate) fn pre_step(&mut self, a: &SolverBody, b: &SolverBody, dt: Real, slop: Real, bias_coef: Real) {
        let n = self.normal;
        let body_delta = b.p - a.p;
        for con in &mut self.contacts {
            let k_n = k_scalar(a, b, con.r1, con.r2, n);
            if !(k_n > 0.0 && k_n.is_finite()) {
                warn!("contact between {:?} and {:?} has no effective mass, skipped", self.shape_a, self.shape_b);
            }
            con.n_mass = effective_mass(k_n);
            con.t_mass = effective_mass(k_scalar(a, b, con.r1, con.r2, n.perp()));

            let dist = (con.r2 - con.r1 + body_delta).dot(n);
            con.bias = -bias_coef * (dist + slop).min(0.0) / dt;
            con.j_bias = 0.0;

            con.bounce = normal_relative_velocity(a, b, con.r1, con.r2, n) * self.e;
        }
    }

    /// Re-apply last step's impulses, scaled for a changed time step.
    pub(crate) fn apply_cached_impulse(&self, a: &mut SolverBody, b: &mut SolverBody, dt_coef: Real) {
        if self.is_first_contact() {
            return;
        }
        let n = self.normal;
        for con in &self.contacts {
            let j = n * con.jn_acc + n.perp() * con.jt_acc;
            apply_impulses(a, b, con.r1, con.r2, j * dt_coef);
        }
    }

    pub(crate) fn apply_impulse(&mut self, a: &mut SolverBody, b: &mut SolverBody) {
        let n = self.normal;
        let t = n.perp();
        let surface_vr = self.surface_vr;
        let friction = self.u;

        for con in &mut self.contacts {
            let (r1, r2) = (con.r1, con.r2);

            let vb1 = a.v_bias + r1.perp() * a.w_bias;
            let vb2 = b.v_bias + r2.perp() * b.w_bias;
            let vr = relative_velocity(a, b, r1, r2) + surface_vr;

            let vbn = (vb2 - vb1).dot(n);
            let vrn = vr.dot(n);
            let vrt = vr.dot(t);

            let jbn = (con.bias - vbn) * con.n_mass;
            let jbn_old = con.j_bias;
            con.j_bias = (jbn_old + jbn).max(0.0);

            let jn = -(con.bounce + vrn) * con.n_mass;
            let jn_old = con.jn_acc;
            con.jn_acc = (jn_old + jn).max(0.0);

            let jt_max = friction * con.jn_acc;
            let jt = -vrt * con.t_mass;
            let jt_old = con.jt_acc;
            con.jt_acc = (jt_old + jt).clamp(-jt_max, jt_max);

            apply_bias_impulses(a, b, r1, r2, n * (con.j_bias - jbn_old));
            apply_impulses(a, b, r1, r2, n * (con.jn_acc - jn_old) + t * (con.jt_acc - jt_old));
        }
    }

    // -- Queries --

    pub fn shapes(&self) -> (ShapeHandle, ShapeHandle) {
        (self.shape_a, self.shape_b)
    }

    pub fn bodies(&self) -> (BodyHandle, BodyHandle) {
        (self.body_a, self.body_b)
    }

    pub fn collision_types(&self) -> (u64, u64) {
        self.collision_types
    }

    pub fn state(&self) -> ArbiterState {
        self.state
    }

    /// Contact normal, pointing from shape A toward shape B.
    pub fn normal(&self) -> Vect {
        self.normal
    }

    pub fn count(&self) -> usize {
        self.contacts.len()
    }

    pub fn point_a(&self, i: usize) -> Option<Vect> {
        self.contacts.get(i).map(|c| c.point.point_a)
    }

    pub fn point_b(&self, i: usize) -> Option<Vect> {
        self.contacts.get(i).map(|c| c.point.point_b)
    }

    /// Signed separation of contact `i`; negative while penetrating.
    pub fn depth(&self, i: usize) -> Option<Real> {
        self.contacts.get(i).map(|c| c.point.distance)
    }

    pub fn contact_point_set(&self) -> ContactPointSet {
        ContactPointSet {
            normal: self.normal,
            points: self.contacts.iter().map(|c| c.point).collect(),
        }
    }

    /// Replace the contact geometry, typically from a `pre_solve` handler.
    /// The set must have as many points as the arbiter.
    pub fn set_contact_point_set(&mut self, set: &ContactPointSet) -> Result<()> {
        if set.points.len() != self.contacts.len() {
            return Err(PhysicsError::InvalidArgument(format!(
                "contact set has {} points, arbiter has {}",
                set.points.len(),
                self.contacts.len()
            )));
        }
        self.normal = set.normal;
        for (con, point) in self.contacts.iter_mut().zip(&set.points) {
            con.r1 += point.point_a - con.point.point_a;
            con.r2 += point.point_b - con.point.point_b;
            con.point = *point;
        }
        Ok(())
    }

    pub fn restitution(&self) -> Real {
        self.e
    }

    pub fn set_restitution(&mut self, e: Real) {
        self.e = e;
    }

    pub fn friction(&self) -> Real {
        self.u
    }

    pub fn set_friction(&mut self, u: Real) {
        self.u = u;
    }

    /// Relative surface velocity of B against A, tangent to the normal.
    pub fn surface_velocity(&self) -> Vect {
        self.surface_vr
    }

    pub fn set_surface_velocity(&mut self, velocity: Vect) {
        self.surface_vr = velocity;
    }

    /// Impulse applied to body B during the last step.
    pub fn total_impulse(&self) -> Vect {
        let n = self.normal;
        self.contacts
            .iter()
            .map(|c| n * c.jn_acc + n.perp() * c.jt_acc)
            .fold(Vect::ZERO, |acc, j| acc + j)
    }

    /// Kinetic energy lost to the collision during the last step.
    pub fn total_ke(&self) -> Real {
        let e_coef = (1.0 - self.e) / (1.0 + self.e);
        self.contacts
            .iter()
            .map(|c| {
                let normal = if c.n_mass > 0.0 { e_coef * c.jn_acc * c.jn_acc / c.n_mass } else { 0.0 };
                let tangent = if c.t_mass > 0.0 { c.jt_acc * c.jt_acc / c.t_mass } else { 0.0 };
                normal + tangent
            })
            .sum()
    }

    pub fn is_first_contact(&self) -> bool {
        self.state == ArbiterState::FirstCollision
    }

    /// True while delivering `separate` for a pair torn down by shape removal.
    pub fn is_removal(&self) -> bool {
        self.state == ArbiterState::Invalidated
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Stop processing this pair until the shapes separate.
    pub fn ignore(&mut self) {
        self.state = ArbiterState::Ignore;
    }
}
