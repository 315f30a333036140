//! The simulation world: owns bodies, shapes and constraints and steps them.
//!
//! Entities are created as plain values and moved in with `add_*`, which
//! hands back a generation-checked handle. `remove_*` gives the value back.

pub(crate) mod index;
mod query;
mod sleep;
mod step;

pub use query::ShapeQueryHit;

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::api::error::{PhysicsError, Result};
use crate::api::types::{BodyHandle, ConstraintHandle, ShapeHandle};
use crate::collision::arbiter::{Arbiter, ArbiterState};
use crate::components::body::{Body, BodyKind};
use crate::components::shape::Shape;
use crate::constraints::Constraint;
use crate::core::arena::Arena;
use crate::core::config::SpaceConfig;
use crate::math::{Real, Vect};
use index::BbTree;

/// Leaf boxes of moving shapes grow by this fraction of their size.
const DYNAMIC_FATTEN: Real = 0.1;

pub(crate) type PairKey = (ShapeHandle, ShapeHandle);

pub(crate) fn pair_key(a: ShapeHandle, b: ShapeHandle) -> PairKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct Space {
    pub(crate) config: SpaceConfig,

    pub(crate) bodies: Arena<Body>,
    pub(crate) shapes: Arena<Shape>,
    pub(crate) constraints: Arena<Constraint>,
    static_body: BodyHandle,

    pub(crate) static_index: BbTree<ShapeHandle>,
    pub(crate) dynamic_index: BbTree<ShapeHandle>,

    /// Contact state per shape pair, ordered for a deterministic solve.
    pub(crate) arbiters: BTreeMap<PairKey, Arbiter>,
    /// Pairs torn down by removals, reported to `separate` on the next step.
    pub(crate) removed_arbiters: Vec<Arbiter>,
    /// Sleeping groups: root body to members.
    pub(crate) sleep_groups: BTreeMap<BodyHandle, Vec<BodyHandle>>,

    pub(crate) stamp: u64,
    pub(crate) curr_dt: Real,
    pub(crate) prev_dt: Real,
    pub(crate) locked: bool,
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}

impl Space {
    pub fn new() -> Self {
        Self::build(SpaceConfig::default())
    }

    pub fn with_config(config: SpaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SpaceConfig) -> Self {
        let mut bodies = Arena::new();
        let static_body = BodyHandle(bodies.insert(Body::static_body()));
        debug!(
            "space created: gravity {:?}, {} iterations, sleep after {:?}s",
            config.gravity, config.iterations, config.sleep_time_threshold
        );
        Self {
            config,
            bodies,
            shapes: Arena::new(),
            constraints: Arena::new(),
            static_body,
            static_index: BbTree::new(0.0),
            dynamic_index: BbTree::new(DYNAMIC_FATTEN),
            arbiters: BTreeMap::new(),
            removed_arbiters: Vec::new(),
            sleep_groups: BTreeMap::new(),
            stamp: 0,
            curr_dt: 0.0,
            prev_dt: 0.0,
            locked: false,
        }
    }

    // -- Parameters --

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SpaceConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn update_config(&mut self, change: impl FnOnce(&mut SpaceConfig)) -> Result<()> {
        let mut config = self.config.clone();
        change(&mut config);
        self.set_config(config)
    }

    pub fn gravity(&self) -> Vect {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vect) -> Result<()> {
        self.update_config(|c| c.gravity = gravity)
    }

    pub fn damping(&self) -> Real {
        self.config.damping
    }

    pub fn set_damping(&mut self, damping: Real) -> Result<()> {
        self.update_config(|c| c.damping = damping)
    }

    pub fn iterations(&self) -> u32 {
        self.config.iterations
    }

    pub fn set_iterations(&mut self, iterations: u32) -> Result<()> {
        self.update_config(|c| c.iterations = iterations)
    }

    pub fn idle_speed_threshold(&self) -> Real {
        self.config.idle_speed_threshold
    }

    pub fn set_idle_speed_threshold(&mut self, speed: Real) -> Result<()> {
        self.update_config(|c| c.idle_speed_threshold = speed)
    }

    pub fn sleep_time_threshold(&self) -> Option<Real> {
        self.config.sleep_time_threshold
    }

    pub fn set_sleep_time_threshold(&mut self, seconds: Option<Real>) -> Result<()> {
        self.update_config(|c| c.sleep_time_threshold = seconds)
    }

    pub fn collision_slop(&self) -> Real {
        self.config.collision_slop
    }

    pub fn set_collision_slop(&mut self, slop: Real) -> Result<()> {
        self.update_config(|c| c.collision_slop = slop)
    }

    pub fn collision_bias(&self) -> Real {
        self.config.collision_bias
    }

    pub fn set_collision_bias(&mut self, bias: Real) -> Result<()> {
        self.update_config(|c| c.collision_bias = bias)
    }

    pub fn collision_persistence(&self) -> u32 {
        self.config.collision_persistence
    }

    pub fn set_collision_persistence(&mut self, steps: u32) -> Result<()> {
        self.update_config(|c| c.collision_persistence = steps)
    }

    /// Length of the last step, or 0 before the first one.
    pub fn current_time_step(&self) -> Real {
        self.curr_dt
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The static body every space owns, for level geometry.
    pub fn static_body(&self) -> BodyHandle {
        self.static_body
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            warn!("structural change rejected: the space is stepping");
            Err(PhysicsError::SpaceLocked)
        } else {
            Ok(())
        }
    }

    // -- Bodies --

    pub fn add_body(&mut self, mut body: Body) -> Result<BodyHandle> {
        self.ensure_unlocked()?;
        body.sleeping = false;
        body.sleep_root = None;
        body.idle_time = 0.0;
        body.update_transform();
        let handle = BodyHandle(self.bodies.insert(body));
        trace!("added {:?}", handle);
        Ok(handle)
    }

    /// Take a body out of the space. It must not have shapes or
    /// constraints attached.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<Body> {
        self.ensure_unlocked()?;
        if handle == self.static_body {
            return Err(PhysicsError::IllegalState(
                "the space's static body cannot be removed".into(),
            ));
        }
        let body = self.body(handle).inspect_err(|_| warn!("remove of stale {:?}", handle))?;
        if !body.shapes.is_empty() || !body.constraints.is_empty() {
            return Err(PhysicsError::IllegalState(format!(
                "{:?} still has {} shapes and {} constraints attached",
                handle,
                body.shapes.len(),
                body.constraints.len()
            )));
        }

        self.activate(handle);
        let mut body = self
            .bodies
            .remove(handle.0)
            .ok_or(PhysicsError::InvalidHandle(BodyHandle::LABEL))?;
        body.idle_time = 0.0;
        trace!("removed {:?}", handle);
        Ok(body)
    }

    pub fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    pub fn body(&self, handle: BodyHandle) -> Result<&Body> {
        self.bodies
            .get(handle.0)
            .ok_or(PhysicsError::InvalidHandle(BodyHandle::LABEL))
    }

    /// Mutable access to a body. Wakes it first so the change is simulated.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        self.body(handle)?;
        self.activate(handle);
        self.bodies
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(BodyHandle::LABEL))
    }

    /// Number of bodies, including the static body.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter().map(|(i, b)| (BodyHandle(i), b))
    }

    /// Change a body's kind, moving its shapes between the static and
    /// dynamic indexes. Contacts involving the body are dropped.
    pub fn set_body_kind(&mut self, handle: BodyHandle, kind: BodyKind) -> Result<()> {
        self.ensure_unlocked()?;
        if handle == self.static_body {
            return Err(PhysicsError::IllegalState(
                "the space's static body cannot change kind".into(),
            ));
        }
        let old = self.body(handle)?.kind;
        if old == kind {
            return Ok(());
        }

        self.activate(handle);
        let Some(body) = self.bodies.get_mut(handle.0) else {
            return Err(PhysicsError::InvalidHandle(BodyHandle::LABEL));
        };
        body.set_kind(kind);
        let shape_handles = body.shapes.clone();

        let has_mass = shape_handles
            .iter()
            .filter_map(|s| self.shapes.get(s.0))
            .any(|s| s.mass() > 0.0);
        if kind == BodyKind::Dynamic && has_mass {
            self.remass_body(handle);
        }

        if (old == BodyKind::Static) != (kind == BodyKind::Static) {
            for s in shape_handles {
                let Some(shape) = self.shapes.get(s.0) else { continue };
                if kind == BodyKind::Static {
                    self.dynamic_index.remove(s);
                    self.static_index.insert(s, shape.bb);
                } else {
                    self.static_index.remove(s);
                    self.dynamic_index.insert(s, shape.bb);
                }
            }
        }
        self.invalidate_arbiters(|arb| arb.body_a == handle || arb.body_b == handle);
        debug!("{:?} changed from {:?} to {:?}", handle, old, kind);
        Ok(())
    }

    // -- Shapes --

    /// Attach a shape to a body of this space.
    pub fn add_shape(&mut self, body: BodyHandle, mut shape: Shape) -> Result<ShapeHandle> {
        self.ensure_unlocked()?;
        let owner = self.body(body)?;
        let is_static = owner.is_static();
        let transform = owner.transform;
        if !is_static {
            self.activate(body);
        }

        shape.body = Some(body);
        let bb = shape.update(&transform);
        let has_mass = shape.mass() > 0.0;
        let handle = ShapeHandle(self.shapes.insert(shape));
        if is_static {
            self.static_index.insert(handle, bb);
        } else {
            self.dynamic_index.insert(handle, bb);
        }
        if let Some(owner) = self.bodies.get_mut(body.0) {
            owner.shapes.push(handle);
        }
        if has_mass {
            self.remass_body(body);
        }
        trace!("added {:?} to {:?}", handle, body);
        Ok(handle)
    }

    /// Detach a shape. Contacts it was part of are reported to `separate`
    /// on the next step.
    pub fn remove_shape(&mut self, handle: ShapeHandle) -> Result<Shape> {
        self.ensure_unlocked()?;
        let shape = self.shape(handle).inspect_err(|_| warn!("remove of stale {:?}", handle))?;
        let owner = shape.body;
        let has_mass = shape.mass() > 0.0;

        if let Some(body) = owner {
            self.activate(body);
        }
        self.static_index.remove(handle);
        self.dynamic_index.remove(handle);
        self.invalidate_arbiters(|arb| arb.shape_a == handle || arb.shape_b == handle);

        let mut shape = self
            .shapes
            .remove(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))?;
        if let Some(body) = owner {
            if let Some(b) = self.bodies.get_mut(body.0) {
                b.shapes.retain(|s| *s != handle);
            }
            if has_mass {
                self.remass_body(body);
            }
        }
        shape.body = None;
        trace!("removed {:?}", handle);
        Ok(shape)
    }

    pub fn contains_shape(&self, handle: ShapeHandle) -> bool {
        self.shapes.contains(handle.0)
    }

    pub fn shape(&self, handle: ShapeHandle) -> Result<&Shape> {
        self.shapes
            .get(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))
    }

    /// Mutable access to a shape; wakes its body. Mass changes go through
    /// [`Space::set_shape_mass`] and [`Space::set_shape_density`].
    pub fn shape_mut(&mut self, handle: ShapeHandle) -> Result<&mut Shape> {
        if let Some(body) = self.shape(handle)?.body {
            self.activate(body);
        }
        self.shapes
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeHandle, &Shape)> {
        self.shapes.iter().map(|(i, s)| (ShapeHandle(i), s))
    }

    pub fn set_shape_mass(&mut self, handle: ShapeHandle, mass: Real) -> Result<()> {
        self.ensure_unlocked()?;
        self.shapes
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))?
            .set_mass(mass)?;
        self.after_shape_mass_change(handle);
        Ok(())
    }

    pub fn set_shape_density(&mut self, handle: ShapeHandle, density: Real) -> Result<()> {
        self.ensure_unlocked()?;
        self.shapes
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))?
            .set_density(density)?;
        self.after_shape_mass_change(handle);
        Ok(())
    }

    fn after_shape_mass_change(&mut self, handle: ShapeHandle) {
        if let Some(body) = self.shapes.get(handle.0).and_then(|s| s.body) {
            self.activate(body);
            self.remass_body(body);
        }
    }

    fn remass_body(&mut self, handle: BodyHandle) {
        let shapes = &self.shapes;
        let Some(body) = self.bodies.get_mut(handle.0) else {
            return;
        };
        let attached = body.shapes.clone();
        body.accumulate_mass_from_shapes(attached.iter().filter_map(|s| shapes.get(s.0)));
        trace!("{:?} re-massed: m = {}, i = {}", handle, body.m, body.i);
    }

    // -- Constraints --

    /// Add a constraint. Both bodies must already be in this space.
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> Result<ConstraintHandle> {
        self.ensure_unlocked()?;
        let (a, b) = (constraint.body_a, constraint.body_b);
        constraint.attach(self.body(a)?, self.body(b)?);

        self.activate(a);
        self.activate(b);
        let handle = ConstraintHandle(self.constraints.insert(constraint));
        for body in [a, b] {
            if let Some(body) = self.bodies.get_mut(body.0) {
                body.constraints.push(handle);
            }
        }
        trace!("added {:?} between {:?} and {:?}", handle, a, b);
        Ok(handle)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<Constraint> {
        self.ensure_unlocked()?;
        let constraint = self
            .constraint(handle)
            .inspect_err(|_| warn!("remove of stale {:?}", handle))?;
        let (a, b) = (constraint.body_a, constraint.body_b);

        self.activate(a);
        self.activate(b);
        let constraint = self
            .constraints
            .remove(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ConstraintHandle::LABEL))?;
        for body in [a, b] {
            if let Some(body) = self.bodies.get_mut(body.0) {
                body.constraints.retain(|c| *c != handle);
            }
        }
        trace!("removed {:?}", handle);
        Ok(constraint)
    }

    pub fn contains_constraint(&self, handle: ConstraintHandle) -> bool {
        self.constraints.contains(handle.0)
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Result<&Constraint> {
        self.constraints
            .get(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ConstraintHandle::LABEL))
    }

    /// Mutable access to a constraint; wakes both bodies.
    pub fn constraint_mut(&mut self, handle: ConstraintHandle) -> Result<&mut Constraint> {
        let constraint = self.constraint(handle)?;
        let (a, b) = (constraint.body_a, constraint.body_b);
        self.activate(a);
        self.activate(b);
        self.constraints
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ConstraintHandle::LABEL))
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> {
        self.constraints.iter().map(|(i, c)| (ConstraintHandle(i), c))
    }

    // -- Reindexing --

    /// Refresh every static shape after static bodies were moved.
    pub fn reindex_static(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        let bodies = &self.bodies;
        for (index, shape) in self.shapes.iter_mut() {
            let Some(body) = shape.body.and_then(|b| bodies.get(b.0)) else {
                continue;
            };
            if body.is_static() {
                let bb = shape.update(&body.transform);
                self.static_index.update(ShapeHandle(index), bb);
            }
        }
        Ok(())
    }

    pub fn reindex_shape(&mut self, handle: ShapeHandle) -> Result<()> {
        self.ensure_unlocked()?;
        let shape = self
            .shapes
            .get_mut(handle.0)
            .ok_or(PhysicsError::InvalidHandle(ShapeHandle::LABEL))?;
        let Some(body) = shape.body.and_then(|b| self.bodies.get(b.0)) else {
            return Err(PhysicsError::IllegalState(format!("{:?} is not attached", handle)));
        };
        let bb = shape.update(&body.transform);
        if body.is_static() {
            self.static_index.update(handle, bb);
        } else {
            self.dynamic_index.update(handle, bb);
        }
        Ok(())
    }

    pub fn reindex_shapes_for_body(&mut self, handle: BodyHandle) -> Result<()> {
        let attached = self.body(handle)?.shapes.clone();
        for shape in attached {
            self.reindex_shape(shape)?;
        }
        Ok(())
    }

    // -- Arbiters --

    /// Arbiters of pairs currently in contact.
    pub fn arbiters(&self) -> impl Iterator<Item = &Arbiter> {
        self.arbiters.values().filter(|arb| is_live(arb))
    }

    pub fn arbiter(&self, a: ShapeHandle, b: ShapeHandle) -> Option<&Arbiter> {
        self.arbiters.get(&pair_key(a, b)).filter(|arb| is_live(arb))
    }

    pub fn arbiters_for_body(&self, handle: BodyHandle) -> Vec<&Arbiter> {
        self.arbiters()
            .filter(|arb| arb.body_a == handle || arb.body_b == handle)
            .collect()
    }

    /// Drop matching arbiters, queueing the ones still in contact for a
    /// removal `separate` callback.
    fn invalidate_arbiters(&mut self, mut matches: impl FnMut(&Arbiter) -> bool) {
        let keys: Vec<PairKey> = self
            .arbiters
            .iter()
            .filter(|(_, arb)| matches(arb))
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            if let Some(mut arb) = self.arbiters.remove(&key) {
                if arb.state != ArbiterState::Cached {
                    arb.state = ArbiterState::Invalidated;
                    self.removed_arbiters.push(arb);
                }
            }
        }
    }
}

fn is_live(arb: &Arbiter) -> bool {
    !matches!(arb.state, ArbiterState::Cached | ArbiterState::Invalidated)
}
