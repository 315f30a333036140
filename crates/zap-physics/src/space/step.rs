//! One simulation step: integrate, find contacts, solve, move, sleep.

use std::collections::BTreeSet;

use log::trace;

use super::{pair_key, PairKey, Space};
use crate::api::error::{PhysicsError, Result};
use crate::api::types::{BodyHandle, ConstraintHandle, ShapeHandle};
use crate::collision::arbiter::{Arbiter, ArbiterState};
use crate::collision::handler::CollisionHandler;
use crate::collision::narrow::collide_ordered;
use crate::components::body::{Body, BodyKind};
use crate::core::time::FixedTimestep;
use crate::math::{Real, Vect};
use crate::solver::{bias_coef, pair_mut, SolverBody};

fn is_simulated(body: &Body) -> bool {
    match body.kind {
        BodyKind::Dynamic => !body.sleeping,
        BodyKind::Kinematic => true,
        BodyKind::Static => false,
    }
}

impl Space {
    /// Advance the simulation by `dt` seconds without collision callbacks.
    pub fn step(&mut self, dt: Real) -> Result<()> {
        self.step_with(dt, &mut ())
    }

    /// Advance the simulation by `dt` seconds, reporting contacts to
    /// `handler`. A zero `dt` does nothing.
    pub fn step_with<H: CollisionHandler + ?Sized>(&mut self, dt: Real, handler: &mut H) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidArgument(format!(
                "time step must be finite and non-negative, got {}",
                dt
            )));
        }
        self.ensure_unlocked()?;
        if dt == 0.0 {
            return Ok(());
        }

        for mut arb in std::mem::take(&mut self.removed_arbiters) {
            handler.separate(&mut arb);
        }

        self.prev_dt = self.curr_dt;
        self.curr_dt = dt;
        self.stamp += 1;
        self.locked = true;

        self.integrate_velocities(dt);
        self.refresh_moving_shapes();

        let mut touched = Vec::new();
        for (a, b) in self.collect_candidates() {
            if let Some(key) = self.collide_pair(a, b) {
                touched.push(key);
            }
        }
        touched.sort_unstable();
        touched.dedup();

        let mut solved = self.run_pre_solve(&touched, handler);
        self.wake_touched(&touched, &mut solved);
        self.solve(&solved, dt);

        for key in &solved {
            if let Some(arb) = self.arbiters.get_mut(key) {
                handler.post_solve(arb);
            }
        }
        for key in touched.iter().chain(&solved) {
            if let Some(arb) = self.arbiters.get_mut(key) {
                if arb.state == ArbiterState::FirstCollision {
                    arb.state = ArbiterState::Normal;
                }
            }
        }

        self.integrate_positions(dt);
        self.refresh_moving_shapes();

        let contacts: Vec<(BodyHandle, BodyHandle)> = solved
            .iter()
            .filter_map(|key| self.arbiters.get(key))
            .map(|arb| (arb.body_a, arb.body_b))
            .collect();
        self.update_sleep(dt, &contacts);
        self.age_arbiters(handler);

        trace!(
            "step {}: {} candidates touched, {} solved, {} arbiters cached, {} sleeping groups",
            self.stamp,
            touched.len(),
            solved.len(),
            self.arbiters.len(),
            self.sleep_groups.len()
        );
        self.locked = false;
        Ok(())
    }

    /// Feed frame time into `timestep` and run the fixed steps it yields.
    /// Returns the number of steps taken.
    pub fn advance(&mut self, frame_dt: Real, timestep: &mut FixedTimestep) -> Result<u32> {
        self.advance_with(frame_dt, timestep, &mut ())
    }

    pub fn advance_with<H: CollisionHandler + ?Sized>(
        &mut self,
        frame_dt: Real,
        timestep: &mut FixedTimestep,
        handler: &mut H,
    ) -> Result<u32> {
        let steps = timestep.accumulate(frame_dt);
        for _ in 0..steps {
            self.step_with(timestep.dt(), handler)?;
        }
        Ok(steps)
    }

    // -- Integration --

    fn integrate_velocities(&mut self, dt: Real) {
        let gravity = self.config.gravity;
        let damping = self.config.damping.powf(dt);
        for (_, body) in self.bodies.iter_mut() {
            if body.kind != BodyKind::Dynamic || body.sleeping {
                continue;
            }
            body.v = body.v * damping + (gravity + body.f * body.m_inv) * dt;
            body.w = body.w * damping + body.t * body.i_inv * dt;
            body.f = Vect::ZERO;
            body.t = 0.0;
        }
    }

    fn integrate_positions(&mut self, dt: Real) {
        for (_, body) in self.bodies.iter_mut() {
            if !is_simulated(body) {
                continue;
            }
            body.p += (body.v + body.v_bias) * dt;
            body.a += (body.w + body.w_bias) * dt;
            body.v_bias = Vect::ZERO;
            body.w_bias = 0.0;
            body.update_transform();
        }
    }

    /// Recompute world geometry of shapes on moving bodies and refit the
    /// dynamic tree.
    fn refresh_moving_shapes(&mut self) {
        let bodies = &self.bodies;
        for (index, shape) in self.shapes.iter_mut() {
            let Some(body) = shape.body.and_then(|b| bodies.get(b.0)) else {
                continue;
            };
            if !is_simulated(body) {
                continue;
            }
            let bb = shape.update(&body.transform);
            self.dynamic_index.update(ShapeHandle(index), bb);
        }
    }

    // -- Collision detection --

    /// Pairs whose boxes overlap, found from the side of awake shapes.
    /// Each awake pair is reported once.
    fn collect_candidates(&self) -> Vec<(ShapeHandle, ShapeHandle)> {
        let awake = |h: ShapeHandle| {
            self.shapes
                .get(h.0)
                .and_then(|s| s.body)
                .and_then(|b| self.bodies.get(b.0))
                .is_some_and(is_simulated)
        };

        let mut pairs = Vec::new();
        for (index, shape) in self.shapes.iter() {
            let handle = ShapeHandle(index);
            if !awake(handle) {
                continue;
            }
            self.dynamic_index.query(&shape.bb, |other| {
                if other != handle && (handle < other || !awake(other)) {
                    pairs.push((handle, other));
                }
            });
            self.static_index.query(&shape.bb, |other| pairs.push((handle, other)));
        }
        pairs
    }

    /// Whether a constraint between the bodies turns their collisions off.
    fn constraints_block(&self, body: &Body, other: BodyHandle) -> bool {
        body.constraints
            .iter()
            .filter_map(|c| self.constraints.get(c.0))
            .any(|c| !c.collide_bodies && (c.body_a == other || c.body_b == other))
    }

    /// Run the narrow phase on one candidate pair and update its arbiter.
    fn collide_pair(&mut self, a: ShapeHandle, b: ShapeHandle) -> Option<PairKey> {
        let shape_a = self.shapes.get(a.0)?;
        let shape_b = self.shapes.get(b.0)?;
        if !shape_a.bb.intersects(&shape_b.bb) || shape_a.filter.rejects(&shape_b.filter) {
            return None;
        }
        let (handle_a, handle_b) = (shape_a.body?, shape_b.body?);
        if handle_a == handle_b {
            return None;
        }
        let body_a = self.bodies.get(handle_a.0)?;
        let body_b = self.bodies.get(handle_b.0)?;
        if body_a.kind != BodyKind::Dynamic && body_b.kind != BodyKind::Dynamic {
            return None;
        }
        if self.constraints_block(body_a, handle_b) {
            return None;
        }

        // Lower rank first so the collision routines see a fixed order.
        let side_a = (a, shape_a, handle_a, body_a.p);
        let side_b = (b, shape_b, handle_b, body_b.p);
        let (first, second) = if (shape_a.geometry.rank(), a) <= (shape_b.geometry.rank(), b) {
            (side_a, side_b)
        } else {
            (side_b, side_a)
        };

        let collision = collide_ordered(first.1, second.1)?;
        let key = pair_key(a, b);
        let stamp = self.stamp;
        let arb = self
            .arbiters
            .entry(key)
            .or_insert_with(|| Arbiter::new(first.0, second.0, first.2, second.2));
        arb.update(&collision, first.1, second.1, first.3, second.3, stamp);
        Some(key)
    }

    /// Fire `begin` and `pre_solve`. Returns the arbiters to solve.
    fn run_pre_solve<H: CollisionHandler + ?Sized>(&mut self, touched: &[PairKey], handler: &mut H) -> Vec<PairKey> {
        let mut solved = Vec::with_capacity(touched.len());
        for key in touched {
            let Some(arb) = self.arbiters.get_mut(key) else {
                continue;
            };
            let immovable = [arb.body_a, arb.body_b]
                .iter()
                .all(|h| self.bodies.get(h.0).map_or(true, |b| b.m == Real::INFINITY));

            if arb.state == ArbiterState::FirstCollision && !handler.begin(arb) {
                arb.ignore();
            }
            let accepted = arb.state != ArbiterState::Ignore
                && handler.pre_solve(arb)
                && arb.state != ArbiterState::Ignore
                && !arb.sensor
                && !immovable;
            if accepted {
                solved.push(*key);
            } else {
                arb.reset_impulses();
            }
        }
        solved
    }

    /// Wake sleeping bodies hit by awake ones, and pull the woken groups'
    /// resting contacts into this step's solve.
    fn wake_touched(&mut self, touched: &[PairKey], solved: &mut Vec<PairKey>) {
        let sleeping = |bodies: &crate::core::arena::Arena<Body>, h: BodyHandle| {
            bodies.get(h.0).is_some_and(|b| b.sleeping)
        };

        let mut to_wake = Vec::new();
        for key in solved.iter() {
            if let Some(arb) = self.arbiters.get(key) {
                to_wake.extend([arb.body_a, arb.body_b].into_iter().filter(|&h| sleeping(&self.bodies, h)));
            }
        }
        for (_, c) in self.constraints.iter() {
            let (Some(a), Some(b)) = (self.bodies.get(c.body_a.0), self.bodies.get(c.body_b.0)) else {
                continue;
            };
            if a.sleeping && is_simulated(b) {
                to_wake.push(c.body_a);
            } else if b.sleeping && is_simulated(a) {
                to_wake.push(c.body_b);
            }
        }
        if to_wake.is_empty() {
            return;
        }

        let mut woken = BTreeSet::new();
        for handle in to_wake {
            woken.extend(self.activate(handle));
        }
        let touched: BTreeSet<PairKey> = touched.iter().copied().collect();
        for (key, arb) in &self.arbiters {
            let involved = woken.contains(&arb.body_a) || woken.contains(&arb.body_b);
            let resting = matches!(arb.state, ArbiterState::Normal | ArbiterState::FirstCollision);
            if involved && resting && !touched.contains(key) && !arb.sensor && !arb.contacts.is_empty() {
                solved.push(*key);
            }
        }
        solved.sort_unstable();
        solved.dedup();
    }

    // -- Solver --

    fn solve(&mut self, solved: &[PairKey], dt: Real) {
        let mut table = vec![SolverBody::EMPTY; self.bodies.slot_capacity()];
        for (index, body) in self.bodies.iter() {
            table[index.slot() as usize] = SolverBody::from_body(body);
        }
        let slot = |h: BodyHandle| h.slot() as usize;

        let active: Vec<ConstraintHandle> = self
            .constraints
            .iter()
            .filter(|(_, c)| {
                [c.body_a, c.body_b]
                    .iter()
                    .any(|h| self.bodies.get(h.0).is_some_and(is_simulated))
            })
            .map(|(index, _)| ConstraintHandle(index))
            .collect();

        let slop = self.config.collision_slop;
        let bias = bias_coef(self.config.collision_bias, dt);
        for key in solved {
            if let Some(arb) = self.arbiters.get_mut(key) {
                let (a, b) = (slot(arb.body_a), slot(arb.body_b));
                if a < table.len() && b < table.len() {
                    arb.pre_step(&table[a], &table[b], dt, slop, bias);
                }
            }
        }
        for handle in &active {
            if let Some(c) = self.constraints.get_mut(handle.0) {
                if let Some((a, b)) = pair_mut(&mut table, slot(c.body_a), slot(c.body_b)) {
                    c.pre_step(a, b, dt);
                }
            }
        }

        let dt_coef = if self.prev_dt > 0.0 { dt / self.prev_dt } else { 0.0 };
        for key in solved {
            if let Some(arb) = self.arbiters.get(key) {
                if let Some((a, b)) = pair_mut(&mut table, slot(arb.body_a), slot(arb.body_b)) {
                    arb.apply_cached_impulse(a, b, dt_coef);
                }
            }
        }
        for handle in &active {
            if let Some(c) = self.constraints.get_mut(handle.0) {
                if let Some((a, b)) = pair_mut(&mut table, slot(c.body_a), slot(c.body_b)) {
                    c.apply_cached_impulse(a, b, dt_coef);
                }
            }
        }

        for _ in 0..self.config.iterations {
            for key in solved {
                if let Some(arb) = self.arbiters.get_mut(key) {
                    if let Some((a, b)) = pair_mut(&mut table, slot(arb.body_a), slot(arb.body_b)) {
                        arb.apply_impulse(a, b);
                    }
                }
            }
            for handle in &active {
                if let Some(c) = self.constraints.get_mut(handle.0) {
                    if let Some((a, b)) = pair_mut(&mut table, slot(c.body_a), slot(c.body_b)) {
                        c.apply_impulse(a, b, dt);
                    }
                }
            }
        }

        for (index, body) in self.bodies.iter_mut() {
            if body.kind != BodyKind::Dynamic || body.sleeping {
                continue;
            }
            let solved_body = &table[index.slot() as usize];
            body.v = solved_body.v;
            body.w = solved_body.w;
            body.v_bias = solved_body.v_bias;
            body.w_bias = solved_body.w_bias;
        }
    }

    // -- Arbiter lifetime --

    /// Report pairs that stopped touching and drop the ones cached longer
    /// than the persistence window. Pairs between resting bodies are kept
    /// untouched while they sleep.
    fn age_arbiters<H: CollisionHandler + ?Sized>(&mut self, handler: &mut H) {
        let stamp = self.stamp;
        let persistence = u64::from(self.config.collision_persistence.max(1));
        let bodies = &self.bodies;
        let resting = |h: BodyHandle| bodies.get(h.0).map_or(true, |b| b.kind == BodyKind::Static || b.sleeping);

        let mut expired = Vec::new();
        for (key, arb) in self.arbiters.iter_mut() {
            if resting(arb.body_a) && resting(arb.body_b) {
                continue;
            }
            let ticks = stamp.saturating_sub(arb.stamp);
            if ticks >= 1 && arb.state != ArbiterState::Cached {
                handler.separate(arb);
                arb.state = ArbiterState::Cached;
            }
            if ticks >= persistence {
                expired.push(*key);
            }
        }
        for key in expired {
            self.arbiters.remove(&key);
        }
    }
}
