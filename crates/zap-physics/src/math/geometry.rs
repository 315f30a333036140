//! Closed-form mass, area and centroid formulas plus convex hull construction.
//!
//! Moments are about the centroid of the shape unless an offset is given.

use super::{consts, BB, Real, Vect};

/// Moment of inertia for a hollow circle. `r1` and `r2` are the inner and
/// outer radii; a solid circle has `r1 = 0`.
pub fn moment_for_circle(m: Real, r1: Real, r2: Real, offset: Vect) -> Real {
    m * (0.5 * (r1 * r1 + r2 * r2) + offset.length_squared())
}

pub fn area_for_circle(r1: Real, r2: Real) -> Real {
    consts::PI * (r1 * r1 - r2 * r2).abs()
}

/// Moment of inertia for a rounded segment (capsule) from `a` to `b`.
pub fn moment_for_segment(m: Real, a: Vect, b: Vect, radius: Real) -> Real {
    let offset = a.lerp(b, 0.5);
    let length = b.distance(a) + 2.0 * radius;
    m * ((length * length + 4.0 * radius * radius) / 12.0 + offset.length_squared())
}

pub fn area_for_segment(a: Vect, b: Vect, radius: Real) -> Real {
    radius * (consts::PI * radius + 2.0 * a.distance(b))
}

/// Moment of inertia for a solid polygon with vertices shifted by `offset`.
/// The rounding radius is ignored. Two vertices fall back to a segment.
pub fn moment_for_poly(m: Real, verts: &[Vect], offset: Vect, _radius: Real) -> Real {
    if verts.len() == 2 {
        return moment_for_segment(m, verts[0], verts[1], 0.0);
    }

    let mut sum1 = 0.0;
    let mut sum2 = 0.0;
    for (i, v) in verts.iter().enumerate() {
        let v1 = *v + offset;
        let v2 = verts[(i + 1) % verts.len()] + offset;
        let a = v2.perp_dot(v1);
        let b = v1.dot(v1) + v1.dot(v2) + v2.dot(v2);
        sum1 += a * b;
        sum2 += a;
    }
    if sum2 == 0.0 {
        return 0.0;
    }
    (m * sum1) / (6.0 * sum2)
}

/// Signed area of a polygon (positive for counter-clockwise winding)
/// including the area added by a rounding radius.
pub fn area_for_poly(verts: &[Vect], radius: Real) -> Real {
    let mut area = 0.0;
    let mut perimeter = 0.0;
    for (i, v1) in verts.iter().enumerate() {
        let v2 = verts[(i + 1) % verts.len()];
        area += v1.perp_dot(v2);
        perimeter += v1.distance(v2);
    }
    radius * (consts::PI * radius.abs() + perimeter) + area / 2.0
}

pub fn centroid_for_poly(verts: &[Vect]) -> Vect {
    let mut sum = 0.0;
    let mut vsum = Vect::ZERO;
    for (i, v1) in verts.iter().enumerate() {
        let v2 = verts[(i + 1) % verts.len()];
        let cross = v1.perp_dot(v2);
        sum += cross;
        vsum += (*v1 + v2) * cross;
    }
    if sum == 0.0 {
        // Degenerate polygon: average the vertices.
        let n = verts.len().max(1) as Real;
        return verts.iter().fold(Vect::ZERO, |acc, v| acc + *v) / n;
    }
    vsum * (1.0 / (3.0 * sum))
}

/// Moment of inertia for a solid box centered on the body's center of gravity.
pub fn moment_for_box(m: Real, width: Real, height: Real) -> Real {
    m * (width * width + height * height) / 12.0
}

/// Moment of inertia for a solid box given by its bounds, which may be off-center.
pub fn moment_for_box2(m: Real, bb: BB) -> Real {
    moment_for_box(m, bb.width(), bb.height()) + m * bb.center().length_squared()
}

/// Convex hull of a point cloud, counter-clockwise, starting from the
/// lowest-leftmost point. Points closer than `tolerance` to a hull edge
/// are dropped.
pub fn convex_hull(points: &[Vect], tolerance: Real) -> Vec<Vect> {
    let mut sorted: Vec<Vect> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| a.distance_squared(*b) <= tolerance * tolerance);

    if sorted.len() < 3 {
        return sorted;
    }

    // Keeps a turn only when the third point is far enough left of the edge.
    let left_of = |o: Vect, a: Vect, p: Vect| -> bool {
        let edge = a - o;
        let len = edge.length();
        if len == 0.0 {
            return false;
        }
        edge.perp_dot(p - o) / len > tolerance
    };

    let mut lower: Vec<Vect> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && !left_of(lower[lower.len() - 2], lower[lower.len() - 1], *p) {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Vect> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && !left_of(upper[upper.len() - 2], upper[upper.len() - 1], *p) {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Whether the vertices form a strictly convex, counter-clockwise loop.
pub(crate) fn is_convex_ccw(verts: &[Vect]) -> bool {
    let n = verts.len();
    if n < 3 {
        return false;
    }
    (0..n).all(|i| {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        let c = verts[(i + 2) % n];
        (b - a).perp_dot(c - b) > 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(half: Real) -> Vec<Vect> {
        vec![
            Vect::new(-half, -half),
            Vect::new(half, -half),
            Vect::new(half, half),
            Vect::new(-half, half),
        ]
    }

    #[test]
    fn circle_formulas() {
        assert!((moment_for_circle(2.0, 0.0, 3.0, Vect::ZERO) - 9.0).abs() < 1e-9);
        assert!((moment_for_circle(1.0, 0.0, 1.0, Vect::new(2.0, 0.0)) - 4.5).abs() < 1e-9);
        assert!((area_for_circle(0.0, 2.0) - 4.0 * consts::PI).abs() < 1e-9);
    }

    #[test]
    fn polygon_moment_matches_box() {
        let verts = square(1.0);
        let from_poly = moment_for_poly(3.0, &verts, Vect::ZERO, 0.0);
        let from_box = moment_for_box(3.0, 2.0, 2.0);
        assert!((from_poly - from_box).abs() < 1e-6, "{} vs {}", from_poly, from_box);
    }

    #[test]
    fn polygon_area_and_centroid() {
        let verts: Vec<Vect> = square(1.0).into_iter().map(|v| v + Vect::new(5.0, 0.0)).collect();
        assert!((area_for_poly(&verts, 0.0) - 4.0).abs() < 1e-9);
        let c = centroid_for_poly(&verts);
        assert!((c - Vect::new(5.0, 0.0)).length() < 1e-9);
        // Rounding adds a perimeter strip plus a full circle.
        let rounded = area_for_poly(&verts, 0.5);
        assert!((rounded - (4.0 + 0.5 * 8.0 + consts::PI * 0.25)).abs() < 1e-9);
    }

    #[test]
    fn segment_formulas() {
        let a = Vect::new(-1.0, 0.0);
        let b = Vect::new(1.0, 0.0);
        assert!((moment_for_segment(1.0, a, b, 0.0) - 4.0 / 12.0).abs() < 1e-9);
        assert!((area_for_segment(a, b, 1.0) - (consts::PI + 4.0)).abs() < 1e-9);
        assert!((moment_for_poly(1.0, &[a, b], Vect::ZERO, 0.0) - 4.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn box2_adds_parallel_axis_term() {
        let bb = BB::new(1.0, -1.0, 3.0, 1.0);
        let expected = moment_for_box(1.0, 2.0, 2.0) + 4.0;
        assert!((moment_for_box2(1.0, bb) - expected).abs() < 1e-9);
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let points = [
            Vect::new(1.0, 1.0),
            Vect::new(0.0, 0.0),
            Vect::new(2.0, 0.0),
            Vect::new(1.0, 0.0),
            Vect::new(2.0, 2.0),
            Vect::new(0.0, 2.0),
            Vect::new(0.5, 1.5),
        ];
        let hull = convex_hull(&points, 0.0);
        assert_eq!(
            hull,
            vec![
                Vect::new(0.0, 0.0),
                Vect::new(2.0, 0.0),
                Vect::new(2.0, 2.0),
                Vect::new(0.0, 2.0),
            ]
        );
        assert!(is_convex_ccw(&hull));
    }

    #[test]
    fn clockwise_input_is_not_convex_ccw() {
        let mut verts = square(1.0);
        verts.reverse();
        assert!(!is_convex_ccw(&verts));
        assert!(is_convex_ccw(&convex_hull(&verts, 0.0)));
    }
}
