use crate::api::error::{PhysicsError, Result};
use crate::api::types::{BodyHandle, ConstraintHandle, ShapeHandle};
use crate::components::shape::Shape;
use crate::math::{rigid_transform, rotation, Affine, Real, Vect};

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Moved by forces, gravity and collisions.
    Dynamic,
    /// Moved only by its own velocity. Infinite mass.
    Kinematic,
    /// Never moves. Infinite mass.
    Static,
}

/// A rigid body.
///
/// `p` is the world position of the center of gravity; the public
/// `position` is the body origin, which differs when the center of gravity
/// is offset.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) kind: BodyKind,

    pub(crate) m: Real,
    pub(crate) m_inv: Real,
    pub(crate) i: Real,
    pub(crate) i_inv: Real,
    pub(crate) cog: Vect,

    pub(crate) p: Vect,
    pub(crate) v: Vect,
    pub(crate) f: Vect,

    pub(crate) a: Real,
    pub(crate) w: Real,
    pub(crate) t: Real,

    pub(crate) rot: Vect,
    pub(crate) transform: Affine,

    pub(crate) v_bias: Vect,
    pub(crate) w_bias: Real,

    pub(crate) sleeping: bool,
    pub(crate) idle_time: Real,
    pub(crate) sleep_root: Option<BodyHandle>,

    pub(crate) shapes: Vec<ShapeHandle>,
    pub(crate) constraints: Vec<ConstraintHandle>,

    /// Mass and moment assigned while dynamic, restored on kind changes.
    dynamic_mass: (Real, Real),
}

impl Body {
    fn from_parts(kind: BodyKind, m: Real, i: Real) -> Self {
        let mut body = Self {
            kind,
            m,
            m_inv: 1.0 / m,
            i,
            i_inv: 1.0 / i,
            cog: Vect::ZERO,
            p: Vect::ZERO,
            v: Vect::ZERO,
            f: Vect::ZERO,
            a: 0.0,
            w: 0.0,
            t: 0.0,
            rot: Vect::X,
            transform: Affine::IDENTITY,
            v_bias: Vect::ZERO,
            w_bias: 0.0,
            sleeping: false,
            idle_time: 0.0,
            sleep_root: None,
            shapes: Vec::new(),
            constraints: Vec::new(),
            dynamic_mass: (1.0, 1.0),
        };
        if kind == BodyKind::Dynamic {
            body.dynamic_mass = (m, i);
        }
        body.update_transform();
        body
    }

    /// Dynamic body with explicit mass and moment of inertia. An infinite
    /// moment makes a body that never rotates.
    pub fn new(mass: Real, moment: Real) -> Result<Self> {
        validate_mass("mass", mass)?;
        validate_mass("moment", moment)?;
        Ok(Self::from_parts(BodyKind::Dynamic, mass, moment))
    }

    /// Dynamic body whose mass will come from the shapes attached to it.
    /// Until a shape with mass is added it has unit mass and moment.
    pub fn dynamic() -> Self {
        Self::from_parts(BodyKind::Dynamic, 1.0, 1.0)
    }

    pub fn kinematic() -> Self {
        Self::from_parts(BodyKind::Kinematic, Real::INFINITY, Real::INFINITY)
    }

    pub fn static_body() -> Self {
        Self::from_parts(BodyKind::Static, Real::INFINITY, Real::INFINITY)
    }

    // -- Builder pattern --

    pub fn with_position(mut self, position: Vect) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_angle(mut self, angle: Real) -> Self {
        self.set_angle(angle);
        self
    }

    pub fn with_velocity(mut self, velocity: Vect) -> Self {
        self.v = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, w: Real) -> Self {
        self.w = w;
        self
    }

    // -- Kind and mass --

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    /// Builder form of a kind change, for bodies not yet in a space.
    /// Bodies inside a space change kind through `Space::set_body_kind`.
    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.set_kind(kind);
        self
    }

    pub(crate) fn set_kind(&mut self, kind: BodyKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        match kind {
            BodyKind::Dynamic => {
                let (m, i) = self.dynamic_mass;
                self.set_mass_unchecked(m);
                self.set_moment_unchecked(i);
            }
            BodyKind::Kinematic | BodyKind::Static => {
                self.set_mass_unchecked(Real::INFINITY);
                self.set_moment_unchecked(Real::INFINITY);
                self.v = Vect::ZERO;
                self.w = 0.0;
                if kind == BodyKind::Static {
                    self.sleeping = false;
                    self.sleep_root = None;
                }
            }
        }
        self.f = Vect::ZERO;
        self.t = 0.0;
    }

    pub fn mass(&self) -> Real {
        self.m
    }

    pub fn set_mass(&mut self, mass: Real) -> Result<()> {
        self.ensure_dynamic("set the mass of")?;
        validate_mass("mass", mass)?;
        self.dynamic_mass.0 = mass;
        self.set_mass_unchecked(mass);
        Ok(())
    }

    pub fn moment(&self) -> Real {
        self.i
    }

    pub fn set_moment(&mut self, moment: Real) -> Result<()> {
        self.ensure_dynamic("set the moment of")?;
        validate_mass("moment", moment)?;
        self.dynamic_mass.1 = moment;
        self.set_moment_unchecked(moment);
        Ok(())
    }

    fn set_mass_unchecked(&mut self, mass: Real) {
        self.m = mass;
        self.m_inv = 1.0 / mass;
    }

    fn set_moment_unchecked(&mut self, moment: Real) {
        self.i = moment;
        self.i_inv = 1.0 / moment;
    }

    fn ensure_dynamic(&self, action: &str) -> Result<()> {
        if self.kind == BodyKind::Dynamic {
            Ok(())
        } else {
            Err(PhysicsError::IllegalState(format!(
                "cannot {} a {:?} body",
                action, self.kind
            )))
        }
    }

    /// Center of gravity in body coordinates.
    pub fn center_of_gravity(&self) -> Vect {
        self.cog
    }

    pub fn set_center_of_gravity(&mut self, cog: Vect) {
        let position = self.position();
        self.cog = cog;
        self.set_position(position);
    }

    /// Recompute mass, moment and center of gravity from shapes with mass,
    /// keeping the body origin in place. Falls back to the last explicit
    /// mass when no shape carries any.
    pub(crate) fn accumulate_mass_from_shapes<'a>(&mut self, shapes: impl Iterator<Item = &'a Shape>) {
        if self.kind != BodyKind::Dynamic {
            return;
        }
        let position = self.position();
        let mut m = 0.0;
        let mut i = 0.0;
        let mut cog = Vect::ZERO;
        for shape in shapes {
            let info = shape.mass_info();
            if info.mass > 0.0 {
                let msum = m + info.mass;
                i += info.mass * info.moment + cog.distance_squared(info.cog) * (info.mass * m) / msum;
                cog = cog.lerp(info.cog, info.mass / msum);
                m = msum;
            }
        }
        if m > 0.0 {
            self.set_mass_unchecked(m);
            self.set_moment_unchecked(i);
            self.cog = cog;
        } else {
            let (m, i) = self.dynamic_mass;
            self.set_mass_unchecked(m);
            self.set_moment_unchecked(i);
            self.cog = Vect::ZERO;
        }
        self.set_position(position);
    }

    // -- Pose --

    /// Position of the body origin in world coordinates.
    pub fn position(&self) -> Vect {
        self.transform.translation
    }

    pub fn set_position(&mut self, position: Vect) {
        self.p = position + self.cog.rotate(self.rot);
        self.update_transform();
    }

    /// World position of the center of gravity.
    pub fn world_center_of_gravity(&self) -> Vect {
        self.p
    }

    pub fn angle(&self) -> Real {
        self.a
    }

    /// Rotate around the center of gravity.
    pub fn set_angle(&mut self, angle: Real) {
        self.a = angle;
        self.update_transform();
    }

    /// Unit vector `(cos, sin)` of the current angle.
    pub fn rotation(&self) -> Vect {
        self.rot
    }

    pub fn transform(&self) -> Affine {
        self.transform
    }

    pub(crate) fn update_transform(&mut self) {
        self.rot = rotation(self.a);
        self.transform = rigid_transform(self.a, self.p - self.cog.rotate(self.rot));
    }

    pub fn local_to_world(&self, point: Vect) -> Vect {
        self.transform.transform_point2(point)
    }

    pub fn world_to_local(&self, point: Vect) -> Vect {
        self.transform.inverse().transform_point2(point)
    }

    // -- Velocity --

    /// Velocity of the center of gravity.
    pub fn velocity(&self) -> Vect {
        self.v
    }

    pub fn set_velocity(&mut self, velocity: Vect) {
        self.v = velocity;
    }

    pub fn angular_velocity(&self) -> Real {
        self.w
    }

    pub fn set_angular_velocity(&mut self, w: Real) {
        self.w = w;
    }

    pub fn velocity_at_world_point(&self, point: Vect) -> Vect {
        let r = point - self.p;
        self.v + r.perp() * self.w
    }

    pub fn velocity_at_local_point(&self, point: Vect) -> Vect {
        let r = (point - self.cog).rotate(self.rot);
        self.v + r.perp() * self.w
    }

    /// `½mv² + ½Iω²`, with infinite-mass terms counted as zero.
    pub fn kinetic_energy(&self) -> Real {
        let vsq = self.v.length_squared();
        let wsq = self.w * self.w;
        let linear = if vsq > 0.0 { vsq * self.m } else { 0.0 };
        let angular = if wsq > 0.0 { wsq * self.i } else { 0.0 };
        let e = 0.5 * (linear + angular);
        if e.is_finite() {
            e
        } else {
            0.0
        }
    }

    /// `mv² + Iω²` as used by the idle test; infinite for moving kinematic bodies.
    pub(crate) fn energy_for_idle(&self) -> Real {
        let vsq = self.v.length_squared();
        let wsq = self.w * self.w;
        (if vsq > 0.0 { vsq * self.m } else { 0.0 }) + (if wsq > 0.0 { wsq * self.i } else { 0.0 })
    }

    // -- Forces --

    pub fn force(&self) -> Vect {
        self.f
    }

    pub fn set_force(&mut self, force: Vect) {
        self.f = force;
    }

    pub fn torque(&self) -> Real {
        self.t
    }

    pub fn set_torque(&mut self, torque: Real) {
        self.t = torque;
    }

    /// Accumulate a force applied at a world point. Cleared after each step.
    pub fn apply_force_at_world_point(&mut self, force: Vect, point: Vect) {
        self.f += force;
        let r = point - self.p;
        self.t += r.perp_dot(force);
    }

    /// Accumulate a force given in body coordinates at a body point.
    pub fn apply_force_at_local_point(&mut self, force: Vect, point: Vect) {
        let world_force = self.transform.transform_vector2(force);
        let world_point = self.transform.transform_point2(point);
        self.apply_force_at_world_point(world_force, world_point);
    }

    pub fn apply_impulse_at_world_point(&mut self, impulse: Vect, point: Vect) {
        let r = point - self.p;
        self.v += impulse * self.m_inv;
        self.w += self.i_inv * r.perp_dot(impulse);
    }

    pub fn apply_impulse_at_local_point(&mut self, impulse: Vect, point: Vect) {
        let world_impulse = self.transform.transform_vector2(impulse);
        let world_point = self.transform.transform_point2(point);
        self.apply_impulse_at_world_point(world_impulse, world_point);
    }

    // -- Membership --

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Seconds this body has been below the idle speed.
    pub fn idle_time(&self) -> Real {
        self.idle_time
    }

    pub fn shapes(&self) -> &[ShapeHandle] {
        &self.shapes
    }

    pub fn constraints(&self) -> &[ConstraintHandle] {
        &self.constraints
    }
}

fn validate_mass(name: &str, value: Real) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}
