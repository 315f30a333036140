//! Flat, host-readable export of body state.

pub mod snapshot;

pub use snapshot::{BodySnapshot, SnapshotBuffer};
