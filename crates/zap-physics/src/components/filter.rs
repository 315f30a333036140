use serde::{Deserialize, Serialize};

/// Collision filter: a shape pair collides only if the group test passes
/// and each shape's categories overlap the other's mask.
///
/// Shapes sharing a nonzero `group` never collide, which is the usual way
/// to keep the parts of one compound object apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeFilter {
    pub group: u32,
    pub categories: u32,
    pub mask: u32,
}

impl ShapeFilter {
    /// Collides with everything.
    pub const ALL: ShapeFilter = ShapeFilter {
        group: 0,
        categories: u32::MAX,
        mask: u32::MAX,
    };

    /// Collides with nothing.
    pub const NONE: ShapeFilter = ShapeFilter {
        group: 0,
        categories: u32::MAX,
        mask: 0,
    };

    pub fn new(group: u32, categories: u32, mask: u32) -> Self {
        Self { group, categories, mask }
    }

    /// Whether this filter and `other` rule out a collision.
    pub fn rejects(&self, other: &ShapeFilter) -> bool {
        (self.group != 0 && self.group == other.group)
            || (self.categories & other.mask) == 0
            || (other.categories & self.mask) == 0
    }
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_accepts_all() {
        assert!(!ShapeFilter::ALL.rejects(&ShapeFilter::ALL));
        assert!(ShapeFilter::NONE.rejects(&ShapeFilter::ALL));
        assert!(ShapeFilter::ALL.rejects(&ShapeFilter::NONE));
    }

    #[test]
    fn shared_group_rejects() {
        let a = ShapeFilter::new(7, u32::MAX, u32::MAX);
        assert!(a.rejects(&a));
        assert!(!a.rejects(&ShapeFilter::new(8, u32::MAX, u32::MAX)));
    }

    #[test]
    fn disjoint_categories_reject_both_ways() {
        let player = ShapeFilter::new(0, 0b01, 0b10);
        let enemy = ShapeFilter::new(0, 0b10, 0b01);
        let ghost = ShapeFilter::new(0, 0b100, 0b100);
        assert!(!player.rejects(&enemy));
        assert!(player.rejects(&ghost));
        assert!(ghost.rejects(&player));
    }
}
