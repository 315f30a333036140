use serde::{Deserialize, Serialize};

use super::{Real, Vect};

/// Axis-aligned bounding box stored as left, bottom, right and top edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BB {
    pub l: Real,
    pub b: Real,
    pub r: Real,
    pub t: Real,
}

impl BB {
    pub fn new(l: Real, b: Real, r: Real, t: Real) -> Self {
        Self { l, b, r, t }
    }

    /// Box centered on `c` with the given half extents.
    pub fn for_extents(c: Vect, hw: Real, hh: Real) -> Self {
        Self::new(c.x - hw, c.y - hh, c.x + hw, c.y + hh)
    }

    /// Box enclosing a circle.
    pub fn for_circle(p: Vect, r: Real) -> Self {
        Self::for_extents(p, r, r)
    }

    /// Smallest box containing every point. Empty input gives the zero box.
    pub fn for_points(points: &[Vect]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        points.iter().skip(1).fold(Self::new(first.x, first.y, first.x, first.y), |bb, p| {
            bb.expand(*p)
        })
    }

    pub fn intersects(&self, other: &BB) -> bool {
        self.l <= other.r && other.l <= self.r && self.b <= other.t && other.b <= self.t
    }

    pub fn contains_bb(&self, other: &BB) -> bool {
        self.l <= other.l && self.r >= other.r && self.b <= other.b && self.t >= other.t
    }

    pub fn contains_vect(&self, v: Vect) -> bool {
        self.l <= v.x && self.r >= v.x && self.b <= v.y && self.t >= v.y
    }

    pub fn merge(&self, other: &BB) -> BB {
        BB::new(
            self.l.min(other.l),
            self.b.min(other.b),
            self.r.max(other.r),
            self.t.max(other.t),
        )
    }

    /// Grow the box to include `v`.
    pub fn expand(&self, v: Vect) -> BB {
        BB::new(self.l.min(v.x), self.b.min(v.y), self.r.max(v.x), self.t.max(v.y))
    }

    /// Grow every edge outward by `margin`.
    pub fn inflate(&self, margin: Real) -> BB {
        BB::new(self.l - margin, self.b - margin, self.r + margin, self.t + margin)
    }

    pub fn center(&self) -> Vect {
        Vect::new((self.l + self.r) * 0.5, (self.b + self.t) * 0.5)
    }

    pub fn width(&self) -> Real {
        self.r - self.l
    }

    pub fn height(&self) -> Real {
        self.t - self.b
    }

    pub fn area(&self) -> Real {
        self.width() * self.height()
    }

    /// Area of the box that would contain both `self` and `other`.
    pub fn merged_area(&self, other: &BB) -> Real {
        (self.r.max(other.r) - self.l.min(other.l)) * (self.t.max(other.t) - self.b.min(other.b))
    }

    /// Fraction along `a`-`b` where the segment enters the box,
    /// or `Real::INFINITY` when it misses.
    pub fn segment_query(&self, a: Vect, b: Vect) -> Real {
        let delta = b - a;
        let mut t_min = Real::NEG_INFINITY;
        let mut t_max = Real::INFINITY;

        if delta.x == 0.0 {
            if a.x < self.l || self.r < a.x {
                return Real::INFINITY;
            }
        } else {
            let t1 = (self.l - a.x) / delta.x;
            let t2 = (self.r - a.x) / delta.x;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if delta.y == 0.0 {
            if a.y < self.b || self.t < a.y {
                return Real::INFINITY;
            }
        } else {
            let t1 = (self.b - a.y) / delta.y;
            let t2 = (self.t - a.y) / delta.y;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if t_min <= t_max && 0.0 <= t_max && t_min <= 1.0 {
            t_min.max(0.0)
        } else {
            Real::INFINITY
        }
    }

    pub fn intersects_segment(&self, a: Vect, b: Vect) -> bool {
        self.segment_query(a, b) != Real::INFINITY
    }

    /// Clamp a point to the inside of the box.
    pub fn clamp_vect(&self, v: Vect) -> Vect {
        Vect::new(v.x.clamp(self.l, self.r), v.y.clamp(self.b, self.t))
    }
}
