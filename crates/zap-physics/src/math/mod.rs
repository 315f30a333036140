pub mod bb;
pub mod geometry;

pub use bb::BB;
pub use geometry::{
    area_for_circle, area_for_poly, area_for_segment, centroid_for_poly, convex_hull,
    moment_for_box, moment_for_box2, moment_for_circle, moment_for_poly, moment_for_segment,
};

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

#[cfg(feature = "f64")]
mod precision {
    pub type Real = f64;
    pub type Vect = glam::DVec2;
    pub type Affine = glam::DAffine2;
    pub type Mat2 = glam::DMat2;
    pub use std::f64::consts;
}

#[cfg(not(feature = "f64"))]
mod precision {
    pub type Real = f32;
    pub type Vect = glam::Vec2;
    pub type Affine = glam::Affine2;
    pub type Mat2 = glam::Mat2;
    pub use std::f32::consts;
}

pub use precision::{consts, Affine, Mat2, Real, Vect};

/// Smallest length treated as non-degenerate by normalizations and gradients.
pub const MAGIC_EPSILON: Real = 1e-5;

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Unit rotation vector `(cos, sin)` for an angle in radians.
pub fn rotation(angle: Real) -> Vect {
    Vect::new(angle.cos(), angle.sin())
}

/// Clockwise perpendicular, `(y, -x)`.
#[inline]
pub fn rperp(v: Vect) -> Vect {
    Vect::new(v.y, -v.x)
}

/// Inverse of `Vect::rotate`.
#[inline]
pub fn unrotate(v: Vect, rot: Vect) -> Vect {
    v.rotate(Vect::new(rot.x, -rot.y))
}

/// Rigid transform with rotation `angle` followed by `translation`.
pub fn rigid_transform(angle: Real, translation: Vect) -> Affine {
    let rot = rotation(angle);
    Affine::from_mat2_translation(Mat2::from_cols(rot, rot.perp()), translation)
}

/// Closest point to `p` on the segment `a`-`b`.
pub fn closest_point_on_segment(p: Vect, a: Vect, b: Vect) -> Vect {
    let delta = a - b;
    let len_sq = delta.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = (delta.dot(p - b) / len_sq).clamp(0.0, 1.0);
    b + delta * t
}

/// Closest points between segments `p1`-`q1` and `p2`-`q2`.
/// Returns `(point_on_first, point_on_second)`.
pub fn closest_points_between_segments(p1: Vect, q1: Vect, p2: Vect, q2: Vect) -> (Vect, Vect) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= MAGIC_EPSILON * MAGIC_EPSILON && e <= MAGIC_EPSILON * MAGIC_EPSILON {
        return (p1, p2);
    }
    let (s, t) = if a <= MAGIC_EPSILON * MAGIC_EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= MAGIC_EPSILON * MAGIC_EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom != 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vect, b: Vect) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn rotation_matches_angle() {
        let r = rotation(consts::FRAC_PI_2);
        assert!(close(r, Vect::new(0.0, 1.0)), "got {:?}", r);
        let v = Vect::new(1.0, 0.0).rotate(r);
        assert!(close(unrotate(v, r), Vect::new(1.0, 0.0)));
    }

    #[test]
    fn rperp_is_clockwise() {
        assert_eq!(rperp(Vect::new(1.0, 0.0)), Vect::new(0.0, -1.0));
        assert_eq!(rperp(Vect::new(1.0, 2.0)), -Vect::new(1.0, 2.0).perp());
    }

    #[test]
    fn rigid_transform_rotates_then_translates() {
        let t = rigid_transform(consts::FRAC_PI_2, Vect::new(10.0, 0.0));
        let p = t.transform_point2(Vect::new(1.0, 0.0));
        assert!(close(p, Vect::new(10.0, 1.0)), "got {:?}", p);
    }

    #[test]
    fn closest_point_clamps_to_endpoints() {
        let a = Vect::new(0.0, 0.0);
        let b = Vect::new(10.0, 0.0);
        assert!(close(closest_point_on_segment(Vect::new(5.0, 3.0), a, b), Vect::new(5.0, 0.0)));
        assert!(close(closest_point_on_segment(Vect::new(-5.0, 3.0), a, b), a));
        assert!(close(closest_point_on_segment(Vect::new(15.0, -1.0), a, b), b));
    }

    #[test]
    fn closest_points_of_crossing_and_parallel_segments() {
        let (p, q) = closest_points_between_segments(
            Vect::new(0.0, 0.0),
            Vect::new(4.0, 0.0),
            Vect::new(2.0, 1.0),
            Vect::new(2.0, 5.0),
        );
        assert!(close(p, Vect::new(2.0, 0.0)));
        assert!(close(q, Vect::new(2.0, 1.0)));

        let (p, q) = closest_points_between_segments(
            Vect::new(0.0, 0.0),
            Vect::new(4.0, 0.0),
            Vect::new(6.0, 2.0),
            Vect::new(9.0, 2.0),
        );
        assert!(close(p, Vect::new(4.0, 0.0)));
        assert!(close(q, Vect::new(6.0, 2.0)));
    }
}
