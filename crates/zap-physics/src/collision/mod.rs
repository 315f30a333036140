//! Contact generation, persistent contact state and collision callbacks.

pub mod arbiter;
pub mod handler;
pub mod narrow;
pub mod query;

pub use arbiter::{Arbiter, ArbiterState};
pub use handler::{CollisionEvent, CollisionHandler};
pub use narrow::{collide, ContactPoint, ContactPointSet};
pub use query::{PointQueryInfo, SegmentQueryInfo};
