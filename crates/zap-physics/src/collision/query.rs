//! Point and ray queries against a single shape's world geometry.

use crate::api::types::ShapeHandle;
use crate::components::shape::{Shape, ShapeGeometry};
use crate::math::{closest_point_on_segment, Real, Vect, MAGIC_EPSILON};

/// Nearest point on a shape's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointQueryInfo {
    /// Set when the query ran through a space.
    pub shape: Option<ShapeHandle>,
    /// Closest point on the surface.
    pub point: Vect,
    /// Signed distance to the surface. Negative inside the shape.
    pub distance: Real,
    /// Direction of steepest increase of `distance`.
    pub gradient: Vect,
}

/// First intersection of a (possibly thick) segment with a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentQueryInfo {
    pub shape: Option<ShapeHandle>,
    /// Point of impact on the swept segment's surface.
    pub point: Vect,
    /// Surface normal at the hit.
    pub normal: Vect,
    /// Fraction along the query segment, in `[0, 1]`.
    pub alpha: Real,
}

impl Shape {
    /// Closest surface point to `p`, using the geometry from the last update.
    pub fn point_query(&self, p: Vect) -> PointQueryInfo {
        match &self.geometry {
            ShapeGeometry::Circle(c) => round_point_query(p, c.tc, c.radius, Vect::Y),
            ShapeGeometry::Segment(s) => {
                round_point_query(p, closest_point_on_segment(p, s.ta, s.tb), s.radius, s.tn)
            }
            ShapeGeometry::Poly(poly) => {
                let verts = &poly.t_verts;
                let count = verts.len();
                let mut min_dist = Real::INFINITY;
                let mut closest_point = Vect::ZERO;
                let mut closest_normal = Vect::ZERO;
                let mut outside = false;

                for i in 0..count {
                    let v0 = verts[i];
                    let n = poly.t_normals[i];
                    outside |= n.dot(p - v0) > 0.0;

                    let closest = closest_point_on_segment(p, v0, verts[(i + 1) % count]);
                    let dist = p.distance(closest);
                    if dist < min_dist {
                        min_dist = dist;
                        closest_point = closest;
                        closest_normal = n;
                    }
                }

                let dist = if outside { min_dist } else { -min_dist };
                let gradient = if min_dist > MAGIC_EPSILON {
                    (p - closest_point) / dist
                } else {
                    closest_normal
                };
                PointQueryInfo {
                    shape: None,
                    point: closest_point + gradient * poly.radius,
                    distance: dist - poly.radius,
                    gradient,
                }
            }
        }
    }

    /// Sweep a circle of `radius` from `a` to `b` and report the first
    /// contact with this shape. Starting inside the shape is not a hit.
    pub fn segment_query(&self, a: Vect, b: Vect, radius: Real) -> Option<SegmentQueryInfo> {
        match &self.geometry {
            ShapeGeometry::Circle(c) => circle_segment_query(c.tc, c.radius, a, b, radius),
            ShapeGeometry::Segment(s) => {
                let n = s.tn;
                let d = (s.ta - a).dot(n);
                let r = s.radius + radius;

                let flipped_n = if d > 0.0 { -n } else { n };
                let seg_offset = flipped_n * r - a;
                // Segment endpoints relative to `a`, pushed out by the radii.
                let seg_a = s.ta + seg_offset;
                let seg_b = s.tb + seg_offset;
                let delta = b - a;

                if delta.perp_dot(seg_a) * delta.perp_dot(seg_b) <= 0.0 {
                    let d_offset = d + if d > 0.0 { -r } else { r };
                    let ad = -d_offset;
                    let bd = delta.dot(n) - d_offset;
                    if ad * bd < 0.0 {
                        let t = ad / (ad - bd);
                        return Some(SegmentQueryInfo {
                            shape: None,
                            point: a.lerp(b, t) - flipped_n * radius,
                            normal: flipped_n,
                            alpha: t,
                        });
                    }
                    None
                } else if r != 0.0 {
                    let hit_a = circle_segment_query(s.ta, s.radius, a, b, radius);
                    let hit_b = circle_segment_query(s.tb, s.radius, a, b, radius);
                    earliest(hit_a, hit_b)
                } else {
                    None
                }
            }
            ShapeGeometry::Poly(poly) => {
                let verts = &poly.t_verts;
                let count = verts.len();
                let r_sum = poly.radius + radius;
                let mut best: Option<SegmentQueryInfo> = None;

                for i in 0..count {
                    let n = poly.t_normals[i];
                    let an = a.dot(n);
                    let d = an - verts[i].dot(n) - r_sum;
                    if d < 0.0 {
                        continue;
                    }

                    let bn = b.dot(n);
                    let t = d / (an - bn);
                    if !(0.0..=1.0).contains(&t) {
                        continue;
                    }

                    let point = a.lerp(b, t);
                    let tangent = n.perp();
                    let dt = tangent.dot(point);
                    let dt_min = tangent.dot(verts[i]);
                    let dt_max = tangent.dot(verts[(i + 1) % count]);
                    if dt_min <= dt && dt <= dt_max {
                        best = earliest(
                            best,
                            Some(SegmentQueryInfo {
                                shape: None,
                                point: point - n * radius,
                                normal: n,
                                alpha: t,
                            }),
                        );
                    }
                }

                if r_sum > 0.0 {
                    for v in verts {
                        best = earliest(best, circle_segment_query(*v, poly.radius, a, b, radius));
                    }
                }
                best
            }
        }
    }
}

fn round_point_query(p: Vect, center: Vect, radius: Real, fallback: Vect) -> PointQueryInfo {
    let delta = p - center;
    let d = delta.length();
    let gradient = if d > MAGIC_EPSILON { delta / d } else { fallback };
    PointQueryInfo {
        shape: None,
        point: center + gradient * radius,
        distance: d - radius,
        gradient,
    }
}

fn circle_segment_query(center: Vect, r1: Real, a: Vect, b: Vect, r2: Real) -> Option<SegmentQueryInfo> {
    let da = a - center;
    let db = b - center;
    let rsum = r1 + r2;

    let qa = da.dot(da) - 2.0 * da.dot(db) + db.dot(db);
    let qb = da.dot(db) - da.dot(da);
    let det = qb * qb - qa * (da.dot(da) - rsum * rsum);
    if det < 0.0 || qa == 0.0 {
        return None;
    }

    let t = (-qb - det.sqrt()) / qa;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let n = da.lerp(db, t).normalize_or_zero();
    Some(SegmentQueryInfo {
        shape: None,
        point: a.lerp(b, t) - n * r2,
        normal: n,
        alpha: t,
    })
}

fn earliest(a: Option<SegmentQueryInfo>, b: Option<SegmentQueryInfo>) -> Option<SegmentQueryInfo> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.alpha < x.alpha { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Affine;

    fn close(a: Vect, b: Vect) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn circle_point_query() {
        let shape = Shape::circle(1.0, Vect::new(2.0, 0.0)).unwrap();
        let info = shape.point_query(Vect::new(5.0, 0.0));
        assert!((info.distance - 2.0).abs() < 1e-12);
        assert!(close(info.point, Vect::new(3.0, 0.0)));
        assert!(close(info.gradient, Vect::X));

        let inside = shape.point_query(Vect::new(2.5, 0.0));
        assert!((inside.distance + 0.5).abs() < 1e-12);
    }

    #[test]
    fn circle_center_uses_fallback_gradient() {
        let shape = Shape::circle(1.0, Vect::ZERO).unwrap();
        let info = shape.point_query(Vect::ZERO);
        assert!(close(info.gradient, Vect::Y));
        assert!((info.distance + 1.0).abs() < 1e-12);
    }

    #[test]
    fn segment_point_query_beyond_end() {
        let shape = Shape::segment(Vect::ZERO, Vect::new(4.0, 0.0), 0.5).unwrap();
        let info = shape.point_query(Vect::new(6.0, 0.0));
        assert!((info.distance - 1.5).abs() < 1e-12);
        assert!(close(info.point, Vect::new(4.5, 0.0)));
    }

    #[test]
    fn box_point_query_inside_and_out() {
        let mut shape = Shape::box_shape(2.0, 2.0, 0.0).unwrap();
        shape.update(&Affine::from_translation(Vect::new(10.0, 0.0)));

        let outside = shape.point_query(Vect::new(13.0, 0.0));
        assert!((outside.distance - 2.0).abs() < 1e-12);
        assert!(close(outside.gradient, Vect::X));

        let inside = shape.point_query(Vect::new(10.0, 0.75));
        assert!((inside.distance + 0.25).abs() < 1e-12);
        assert!(close(inside.gradient, Vect::Y));
        assert!(close(inside.point, Vect::new(10.0, 1.0)));
    }

    #[test]
    fn ray_hits_circle() {
        let shape = Shape::circle(1.0, Vect::ZERO).unwrap();
        let hit = shape
            .segment_query(Vect::new(-4.0, 0.0), Vect::new(4.0, 0.0), 0.0)
            .unwrap();
        assert!((hit.alpha - 3.0 / 8.0).abs() < 1e-12);
        assert!(close(hit.point, Vect::new(-1.0, 0.0)));
        assert!(close(hit.normal, -Vect::X));
    }

    #[test]
    fn thick_ray_hits_circle_earlier() {
        let shape = Shape::circle(1.0, Vect::ZERO).unwrap();
        let hit = shape
            .segment_query(Vect::new(-4.0, 0.0), Vect::new(4.0, 0.0), 1.0)
            .unwrap();
        assert!((hit.alpha - 2.0 / 8.0).abs() < 1e-12);
        assert!(close(hit.point, Vect::new(-1.0, 0.0)));
    }

    #[test]
    fn ray_misses_circle() {
        let shape = Shape::circle(1.0, Vect::ZERO).unwrap();
        assert!(shape
            .segment_query(Vect::new(-4.0, 2.0), Vect::new(4.0, 2.0), 0.0)
            .is_none());
    }

    #[test]
    fn ray_hits_segment_from_either_side() {
        let shape = Shape::segment(Vect::new(-1.0, 0.0), Vect::new(1.0, 0.0), 0.0).unwrap();
        let down = shape
            .segment_query(Vect::new(0.0, 2.0), Vect::new(0.0, -2.0), 0.0)
            .unwrap();
        assert!((down.alpha - 0.5).abs() < 1e-12);
        assert!(close(down.normal, Vect::Y));

        let up = shape
            .segment_query(Vect::new(0.0, -2.0), Vect::new(0.0, 2.0), 0.0)
            .unwrap();
        assert!(close(up.normal, -Vect::Y));
    }

    #[test]
    fn ray_hits_rounded_segment_cap() {
        let shape = Shape::segment(Vect::new(-1.0, 0.0), Vect::new(1.0, 0.0), 0.5).unwrap();
        let hit = shape
            .segment_query(Vect::new(4.0, 0.0), Vect::new(0.0, 0.0), 0.0)
            .unwrap();
        assert!(close(hit.point, Vect::new(1.5, 0.0)));
        assert!(close(hit.normal, Vect::X));
    }

    #[test]
    fn ray_hits_box_face() {
        let shape = Shape::box_shape(2.0, 2.0, 0.0).unwrap();
        let hit = shape
            .segment_query(Vect::new(0.0, 5.0), Vect::new(0.0, -5.0), 0.0)
            .unwrap();
        assert!((hit.alpha - 0.4).abs() < 1e-12);
        assert!(close(hit.normal, Vect::Y));
        assert!(close(hit.point, Vect::new(0.0, 1.0)));
    }

    #[test]
    fn ray_starting_inside_box_misses() {
        let shape = Shape::box_shape(2.0, 2.0, 0.0).unwrap();
        assert!(shape
            .segment_query(Vect::ZERO, Vect::new(0.0, 5.0), 0.0)
            .is_none());
    }
}
