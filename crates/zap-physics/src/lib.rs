//! Headless 2D rigid-body physics.
//!
//! A [`Space`] owns bodies, shapes and constraints and advances them with
//! an iterative impulse solver. Everything is addressed through
//! generation-checked handles returned by the `add_*` methods.

pub mod api;
pub mod bridge;
pub mod collision;
pub mod components;
pub mod constraints;
pub mod core;
pub mod math;
pub mod space;

mod solver;

// Re-export key types at crate root for convenience
pub use api::error::{PhysicsError, Result};
pub use api::types::{BodyHandle, ConstraintHandle, ShapeHandle};
pub use bridge::{BodySnapshot, SnapshotBuffer};
pub use collision::{
    collide, Arbiter, ArbiterState, CollisionEvent, CollisionHandler, ContactPoint, ContactPointSet,
    PointQueryInfo, SegmentQueryInfo,
};
pub use components::body::{Body, BodyKind};
pub use components::filter::ShapeFilter;
pub use components::shape::{Circle, MassInfo, Poly, Segment, Shape, ShapeGeometry};
pub use constraints::{
    Constraint, ConstraintKind, DampedRotarySpring, DampedSpring, GearJoint, GrooveJoint, PinJoint,
    PivotJoint, RatchetJoint, RotaryLimitJoint, SimpleMotor, SlideJoint,
};
pub use core::config::SpaceConfig;
pub use core::time::FixedTimestep;
pub use math::{Affine, Real, Vect, BB};
pub use space::{ShapeQueryHit, Space};
