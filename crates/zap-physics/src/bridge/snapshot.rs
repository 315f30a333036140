use bytemuck::{Pod, Zeroable};

use crate::api::types::BodyHandle;
use crate::components::body::{Body, BodyKind};
use crate::space::Space;

/// Per-body pose and velocity, laid out for direct reads by a host.
/// 8 floats = 32 bytes stride, independent of the engine's precision.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BodySnapshot {
    /// Body origin in world space.
    pub x: f32,
    pub y: f32,
    /// Rotation in radians.
    pub angle: f32,
    pub vx: f32,
    pub vy: f32,
    pub angular_velocity: f32,
    /// Bit 0: sleeping. Bits 1-2: kind (0 dynamic, 1 kinematic, 2 static).
    pub flags: f32,
    /// Arena slot of the body's handle.
    pub slot: f32,
}

impl BodySnapshot {
    pub const FLOATS: usize = 8;
    pub const STRIDE_BYTES: usize = Self::FLOATS * 4;

    pub const FLAG_SLEEPING: u32 = 1;

    pub fn from_body(handle: BodyHandle, body: &Body) -> Self {
        let kind = match body.kind() {
            BodyKind::Dynamic => 0,
            BodyKind::Kinematic => 1,
            BodyKind::Static => 2,
        };
        let flags = (kind << 1) | u32::from(body.is_sleeping());
        let position = body.position();
        let velocity = body.velocity();
        Self {
            x: position.x as f32,
            y: position.y as f32,
            angle: body.angle() as f32,
            vx: velocity.x as f32,
            vy: velocity.y as f32,
            angular_velocity: body.angular_velocity() as f32,
            flags: flags as f32,
            slot: handle.slot() as f32,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        (self.flags as u32) & Self::FLAG_SLEEPING != 0
    }
}

/// Reusable row buffer filled by [`Space::write_snapshots`].
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    rows: Vec<BodySnapshot>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self { rows: Vec::with_capacity(256) }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn push(&mut self, row: BodySnapshot) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[BodySnapshot] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw bytes of all rows, for zero-copy hand-off.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.rows)
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Space {
    /// Replace the buffer's contents with one row per body, the space's
    /// own static body excluded, in handle order.
    pub fn write_snapshots(&self, buffer: &mut SnapshotBuffer) {
        buffer.clear();
        let static_body = self.static_body();
        for (handle, body) in self.bodies() {
            if handle != static_body {
                buffer.push(BodySnapshot::from_body(handle, body));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vect;

    #[test]
    fn stride_matches_layout() {
        assert_eq!(std::mem::size_of::<BodySnapshot>(), BodySnapshot::STRIDE_BYTES);
    }

    #[test]
    fn space_rows_skip_static_body() {
        let mut space = Space::new();
        let a = space
            .add_body(Body::dynamic().with_position(Vect::new(1.0, 2.0)).with_velocity(Vect::new(3.0, 0.0)))
            .unwrap();
        space.add_body(Body::kinematic()).unwrap();

        let mut buffer = SnapshotBuffer::new();
        space.write_snapshots(&mut buffer);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.as_bytes().len(), 2 * BodySnapshot::STRIDE_BYTES);

        let row = buffer.rows()[0];
        assert_eq!((row.x, row.y, row.vx), (1.0, 2.0, 3.0));
        assert_eq!(row.slot, a.slot() as f32);
        assert!(!row.is_sleeping());
        assert_eq!(buffer.rows()[1].flags, 2.0);
    }
}
