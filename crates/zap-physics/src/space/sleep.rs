//! Body activity: idle tracking, sleeping groups and waking.
//!
//! Bodies connected through contacts or constraints form a group. A group
//! falls asleep once every member has idled long enough, and wakes as a
//! whole when anything disturbs one member.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::{is_live, Space};
use crate::api::error::{PhysicsError, Result};
use crate::api::types::{BodyHandle, ShapeHandle};
use crate::collision::arbiter::ArbiterState;
use crate::components::body::BodyKind;
use crate::math::{Real, Vect};

impl Space {
    /// Wake a body and the rest of its sleeping group.
    pub fn activate_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.ensure_unlocked()?;
        self.body(handle)?;
        self.activate(handle);
        Ok(())
    }

    /// Wake every body resting on a static body, or only those touching
    /// `through` when given.
    pub fn activate_touching(&mut self, static_body: BodyHandle, through: Option<ShapeHandle>) -> Result<()> {
        self.ensure_unlocked()?;
        if !self.body(static_body)?.is_static() {
            return Err(PhysicsError::IllegalState(format!(
                "{:?} is not a static body",
                static_body
            )));
        }
        if let Some(shape) = through {
            if self.shape(shape)?.body != Some(static_body) {
                return Err(PhysicsError::InvalidArgument(format!(
                    "{:?} is not attached to {:?}",
                    shape, static_body
                )));
            }
        }

        let touching: Vec<BodyHandle> = self
            .arbiters
            .values()
            .filter(|arb| is_live(arb))
            .filter_map(|arb| {
                let via = |s: ShapeHandle| through.map_or(true, |t| t == s);
                if arb.body_a == static_body && via(arb.shape_a) {
                    Some(arb.body_b)
                } else if arb.body_b == static_body && via(arb.shape_b) {
                    Some(arb.body_a)
                } else {
                    None
                }
            })
            .collect();
        for body in touching {
            self.activate(body);
        }
        Ok(())
    }

    /// Put a dynamic body to sleep in a group of its own.
    pub fn sleep_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.put_to_sleep(handle, None)
    }

    /// Put a dynamic body to sleep in the same group as `group`, which must
    /// already be sleeping. The group wakes as a whole.
    pub fn sleep_body_with_group(&mut self, handle: BodyHandle, group: BodyHandle) -> Result<()> {
        self.put_to_sleep(handle, Some(group))
    }

    fn put_to_sleep(&mut self, handle: BodyHandle, group: Option<BodyHandle>) -> Result<()> {
        self.ensure_unlocked()?;
        if self.config.sleep_time_threshold.is_none() {
            return Err(PhysicsError::IllegalState(
                "sleeping is disabled for this space".into(),
            ));
        }
        let body = self.body(handle)?;
        if body.kind != BodyKind::Dynamic {
            return Err(PhysicsError::IllegalState(format!(
                "only dynamic bodies can sleep, {:?} is {:?}",
                handle, body.kind
            )));
        }
        let current_root = body.sleep_root;

        let root = match group {
            Some(group) => {
                let leader = self.body(group)?;
                match leader.sleep_root {
                    Some(root) if leader.sleeping => root,
                    _ => {
                        return Err(PhysicsError::IllegalState(format!(
                            "{:?} is not sleeping and cannot be used as a group",
                            group
                        )))
                    }
                }
            }
            None => handle,
        };

        if let Some(current) = current_root {
            if group.is_some() && current == root {
                return Ok(());
            }
            return Err(PhysicsError::IllegalState(format!(
                "{:?} is already sleeping in another group",
                handle
            )));
        }

        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.sleeping = true;
            body.sleep_root = Some(root);
            body.idle_time = 0.0;
            body.v = Vect::ZERO;
            body.w = 0.0;
        }
        self.sleep_groups.entry(root).or_default().push(handle);
        debug!("{:?} put to sleep in group {:?}", handle, root);
        Ok(())
    }

    /// Wake the group of `handle`, or reset its idle timer when it is
    /// already awake. Returns the bodies that woke up.
    pub(crate) fn activate(&mut self, handle: BodyHandle) -> Vec<BodyHandle> {
        let Some(body) = self.bodies.get_mut(handle.0) else {
            return Vec::new();
        };
        if body.kind != BodyKind::Dynamic {
            return Vec::new();
        }
        let Some(root) = body.sleep_root else {
            body.idle_time = 0.0;
            return Vec::new();
        };

        let members = self.sleep_groups.remove(&root).unwrap_or_else(|| vec![handle]);
        for member in &members {
            if let Some(b) = self.bodies.get_mut(member.0) {
                b.sleeping = false;
                b.sleep_root = None;
                b.idle_time = 0.0;
            }
        }

        // Contacts held while asleep count as current again.
        let woken: BTreeSet<BodyHandle> = members.iter().copied().collect();
        let stamp = self.stamp;
        for arb in self.arbiters.values_mut() {
            if arb.state != ArbiterState::Cached && (woken.contains(&arb.body_a) || woken.contains(&arb.body_b)) {
                arb.stamp = stamp;
            }
        }
        debug!("woke group {:?} ({} bodies)", root, members.len());
        members
    }

    /// Advance idle timers and put idle groups to sleep. `contacts` lists
    /// the body pairs of the arbiters solved this step.
    pub(crate) fn update_sleep(&mut self, dt: Real, contacts: &[(BodyHandle, BodyHandle)]) {
        let threshold = self.config.sleep_threshold();
        if !threshold.is_finite() {
            return;
        }

        let idle = self.config.idle_speed_threshold;
        let dvsq = if idle > 0.0 {
            idle * idle
        } else {
            self.config.gravity.length_squared() * dt * dt
        };
        for (_, body) in self.bodies.iter_mut() {
            if body.kind != BodyKind::Dynamic || body.sleeping {
                continue;
            }
            let ke_threshold = if dvsq > 0.0 { body.m * dvsq } else { 0.0 };
            body.idle_time = if body.energy_for_idle() > ke_threshold {
                0.0
            } else {
                body.idle_time + dt
            };
        }

        let mut edges: Vec<(BodyHandle, BodyHandle)> = contacts.to_vec();
        edges.extend(self.constraints.iter().map(|(_, c)| (c.body_a, c.body_b)));

        // Union-find over awake dynamic bodies, keyed by arena slot.
        let mut parent: Vec<usize> = (0..self.bodies.slot_capacity()).collect();
        for &(a, b) in &edges {
            let state = |h: BodyHandle| self.bodies.get(h.0).map(|body| (body.kind, body.sleeping));
            let (Some((kind_a, asleep_a)), Some((kind_b, asleep_b))) = (state(a), state(b)) else {
                continue;
            };
            if kind_a == BodyKind::Kinematic || kind_b == BodyKind::Kinematic {
                // Touching a kinematic body keeps a body awake.
                for h in [a, b] {
                    if let Some(body) = self.bodies.get_mut(h.0) {
                        body.idle_time = 0.0;
                    }
                }
            } else if kind_a == BodyKind::Dynamic && kind_b == BodyKind::Dynamic && !asleep_a && !asleep_b {
                let ra = find(&mut parent, a.slot() as usize);
                let rb = find(&mut parent, b.slot() as usize);
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let mut groups: BTreeMap<usize, Vec<BodyHandle>> = BTreeMap::new();
        let mut restless: BTreeSet<usize> = BTreeSet::new();
        for (index, body) in self.bodies.iter() {
            if body.kind != BodyKind::Dynamic || body.sleeping {
                continue;
            }
            let root = find(&mut parent, index.slot() as usize);
            groups.entry(root).or_default().push(BodyHandle(index));
            if body.idle_time < threshold {
                restless.insert(root);
            }
        }

        for (root, members) in groups {
            if restless.contains(&root) {
                continue;
            }
            let Some(&leader) = members.iter().min() else {
                continue;
            };
            for member in &members {
                if let Some(body) = self.bodies.get_mut(member.0) {
                    body.sleeping = true;
                    body.sleep_root = Some(leader);
                    body.v = Vect::ZERO;
                    body.w = 0.0;
                }
            }
            debug!("group {:?} fell asleep ({} bodies)", leader, members.len());
            self.sleep_groups.insert(leader, members);
        }
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::body::Body;
    use crate::core::config::SpaceConfig;

    fn sleepy_space() -> Space {
        Space::with_config(SpaceConfig::default().with_sleep_time_threshold(0.5)).unwrap()
    }

    #[test]
    fn sleeping_disabled_rejects_manual_sleep() {
        let mut space = Space::new();
        let body = space.add_body(Body::dynamic()).unwrap();
        assert!(matches!(space.sleep_body(body), Err(PhysicsError::IllegalState(_))));
        assert!(!space.body(body).unwrap().is_sleeping());
    }

    #[test]
    fn group_wakes_as_a_whole() {
        let mut space = sleepy_space();
        let a = space.add_body(Body::dynamic()).unwrap();
        let b = space.add_body(Body::dynamic().with_position(Vect::new(3.0, 0.0))).unwrap();
        space.sleep_body(a).unwrap();
        space.sleep_body_with_group(b, a).unwrap();
        assert!(space.body(a).unwrap().is_sleeping());
        assert!(space.body(b).unwrap().is_sleeping());

        space.activate_body(b).unwrap();
        assert!(!space.body(a).unwrap().is_sleeping());
        assert!(!space.body(b).unwrap().is_sleeping());
    }

    #[test]
    fn awake_body_is_not_a_group() {
        let mut space = sleepy_space();
        let a = space.add_body(Body::dynamic()).unwrap();
        let b = space.add_body(Body::dynamic()).unwrap();
        assert!(matches!(
            space.sleep_body_with_group(b, a),
            Err(PhysicsError::IllegalState(_))
        ));
        assert!(!space.body(b).unwrap().is_sleeping());
    }

    #[test]
    fn only_dynamic_bodies_sleep() {
        let mut space = sleepy_space();
        let ground = space.static_body();
        assert!(space.sleep_body(ground).is_err());
        let dynamic = space.add_body(Body::dynamic()).unwrap();
        assert!(matches!(
            space.activate_touching(dynamic, None),
            Err(PhysicsError::IllegalState(_))
        ));
        space.activate_touching(ground, None).unwrap();
    }
}
