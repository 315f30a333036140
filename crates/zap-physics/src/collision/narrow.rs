//! Exact contact generation for every pair of shape kinds.
//!
//! Pairs are dispatched with the lower-ranked kind first (circle, segment,
//! polygon), and the normal always points from the first shape toward the
//! second. Segments and polygons share one rounded-hull routine: separating
//! axes over face normals, then reference-face clipping for face contacts
//! or closest core points for vertex contacts.

use crate::components::shape::{Circle, Poly, Segment, Shape, ShapeGeometry};
use crate::math::{closest_point_on_segment, closest_points_between_segments, Real, Vect, MAGIC_EPSILON};

/// Tolerance when preferring A's face over B's and when deciding that a
/// separated pair touches face-first.
const FACE_TOLERANCE: Real = 1e-3;

/// Feature id for contacts found between closest core points.
const VERTEX_CONTACT_ID: u32 = 1 << 20;

/// Contact point on both surfaces, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub point_a: Vect,
    pub point_b: Vect,
    /// Signed distance between the surfaces along the normal. Negative when
    /// the shapes overlap.
    pub distance: Real,
}

/// Up to two contacts sharing one normal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactPointSet {
    /// Unit normal pointing from the first shape toward the second.
    pub normal: Vect,
    pub points: Vec<ContactPoint>,
}

impl ContactPointSet {
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Contact plus the feature id used to match it across steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Contact {
    pub point: ContactPoint,
    pub hash: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Collision {
    pub normal: Vect,
    pub contacts: Vec<Contact>,
}

impl Collision {
    fn single(normal: Vect, point_a: Vect, point_b: Vect, distance: Real, hash: u32) -> Self {
        Self {
            normal,
            contacts: vec![Contact {
                point: ContactPoint { point_a, point_b, distance },
                hash,
            }],
        }
    }
}

/// Collide two shapes using their cached world geometry. Returns an empty
/// set when they do not touch.
pub fn collide(a: &Shape, b: &Shape) -> ContactPointSet {
    let (collision, swapped) = if a.geometry.rank() <= b.geometry.rank() {
        (collide_ordered(a, b), false)
    } else {
        (collide_ordered(b, a), true)
    };
    let Some(collision) = collision else {
        return ContactPointSet::default();
    };

    let points = collision
        .contacts
        .iter()
        .map(|c| {
            if swapped {
                ContactPoint {
                    point_a: c.point.point_b,
                    point_b: c.point.point_a,
                    distance: c.point.distance,
                }
            } else {
                c.point
            }
        })
        .collect();
    ContactPointSet {
        normal: if swapped { -collision.normal } else { collision.normal },
        points,
    }
}

/// Collide a pair whose first shape has the lower or equal rank.
pub(crate) fn collide_ordered(a: &Shape, b: &Shape) -> Option<Collision> {
    match (&a.geometry, &b.geometry) {
        (ShapeGeometry::Circle(c1), ShapeGeometry::Circle(c2)) => circle_to_circle(c1, c2),
        (ShapeGeometry::Circle(c), ShapeGeometry::Segment(s)) => circle_to_segment(c, s),
        (ShapeGeometry::Circle(c), ShapeGeometry::Poly(p)) => circle_to_poly(c, p),
        (ShapeGeometry::Segment(s1), ShapeGeometry::Segment(s2)) => {
            let (v1, n1) = segment_hull(s1);
            let (v2, n2) = segment_hull(s2);
            hull_to_hull(
                &Hull { verts: &v1, normals: &n1, radius: s1.radius, segment: Some(s1) },
                &Hull { verts: &v2, normals: &n2, radius: s2.radius, segment: Some(s2) },
            )
        }
        (ShapeGeometry::Segment(s), ShapeGeometry::Poly(p)) => {
            let (v, n) = segment_hull(s);
            hull_to_hull(
                &Hull { verts: &v, normals: &n, radius: s.radius, segment: Some(s) },
                &poly_hull(p),
            )
        }
        (ShapeGeometry::Poly(p1), ShapeGeometry::Poly(p2)) => hull_to_hull(&poly_hull(p1), &poly_hull(p2)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Circles
// ---------------------------------------------------------------------------

fn circle_to_circle(c1: &Circle, c2: &Circle) -> Option<Collision> {
    let mindist = c1.radius + c2.radius;
    let delta = c2.tc - c1.tc;
    let distsq = delta.length_squared();
    if distsq >= mindist * mindist {
        return None;
    }

    let dist = distsq.sqrt();
    let n = if dist > 0.0 { delta / dist } else { Vect::X };
    Some(Collision::single(
        n,
        c1.tc + n * c1.radius,
        c2.tc - n * c2.radius,
        dist - mindist,
        0,
    ))
}

fn circle_to_segment(circle: &Circle, seg: &Segment) -> Option<Collision> {
    let center = circle.tc;
    let seg_delta = seg.tb - seg.ta;
    let len_sq = seg_delta.length_squared();
    let closest_t = if len_sq > 0.0 {
        (seg_delta.dot(center - seg.ta) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = seg.ta + seg_delta * closest_t;

    let mindist = circle.radius + seg.radius;
    let delta = closest - center;
    let distsq = delta.length_squared();
    if distsq >= mindist * mindist {
        return None;
    }

    let dist = distsq.sqrt();
    let n = if dist > 0.0 { delta / dist } else { seg.tn };

    // Endcaps facing a neighbor segment do not generate contacts.
    let clear_a = closest_t != 0.0 || n.dot(seg.ta_tangent) >= 0.0;
    let clear_b = closest_t != 1.0 || n.dot(seg.tb_tangent) >= 0.0;
    if !(clear_a && clear_b) {
        return None;
    }

    Some(Collision::single(
        n,
        center + n * circle.radius,
        closest - n * seg.radius,
        dist - mindist,
        0,
    ))
}

fn circle_to_poly(circle: &Circle, poly: &Poly) -> Option<Collision> {
    let center = circle.tc;
    let verts = &poly.t_verts;
    let normals = &poly.t_normals;
    let count = verts.len();
    let r_sum = circle.radius + poly.radius;

    let mut best = 0;
    let mut best_sep = Real::NEG_INFINITY;
    for i in 0..count {
        let sep = normals[i].dot(center - verts[i]);
        if sep > best_sep {
            best_sep = sep;
            best = i;
        }
    }
    if best_sep > r_sum {
        return None;
    }

    if best_sep < 0.0 {
        // Center inside the polygon core: push out through the nearest face.
        let n_out = normals[best];
        let normal = -n_out;
        return Some(Collision::single(
            normal,
            center - n_out * circle.radius,
            center - n_out * best_sep + n_out * poly.radius,
            best_sep - r_sum,
            0,
        ));
    }

    let mut closest = verts[0];
    let mut closest_dsq = Real::INFINITY;
    for i in 0..count {
        let q = closest_point_on_segment(center, verts[i], verts[(i + 1) % count]);
        let dsq = center.distance_squared(q);
        if dsq < closest_dsq {
            closest_dsq = dsq;
            closest = q;
        }
    }
    let dist = closest_dsq.sqrt();
    if dist > r_sum {
        return None;
    }

    let n_out = if dist > MAGIC_EPSILON { (center - closest) / dist } else { normals[best] };
    Some(Collision::single(
        -n_out,
        center - n_out * circle.radius,
        closest + n_out * poly.radius,
        dist - r_sum,
        0,
    ))
}

// ---------------------------------------------------------------------------
// Rounded hulls
// ---------------------------------------------------------------------------

/// Convex core with a rounding radius. Edge `i` runs from `verts[i]` to
/// `verts[i + 1]` with outward normal `normals[i]`.
struct Hull<'a> {
    verts: &'a [Vect],
    normals: &'a [Vect],
    radius: Real,
    segment: Option<&'a Segment>,
}

impl Hull<'_> {
    fn len(&self) -> usize {
        self.verts.len()
    }

    fn edge_count(&self) -> usize {
        // Both edges of a two-vertex hull are the same segment
        if self.verts.len() == 2 {
            1
        } else {
            self.verts.len()
        }
    }

    fn edge(&self, i: usize) -> (Vect, Vect) {
        (self.verts[i], self.verts[(i + 1) % self.len()])
    }
}

fn segment_hull(seg: &Segment) -> ([Vect; 2], [Vect; 2]) {
    ([seg.ta, seg.tb], [seg.tn, -seg.tn])
}

fn poly_hull(poly: &Poly) -> Hull<'_> {
    Hull {
        verts: &poly.t_verts,
        normals: &poly.t_normals,
        radius: poly.radius,
        segment: None,
    }
}

/// Face of `h1` with the largest separation from `h2`.
fn find_max_separation(h1: &Hull, h2: &Hull) -> (usize, Real) {
    let mut best = 0;
    let mut best_sep = Real::NEG_INFINITY;
    for i in 0..h1.len() {
        let n = h1.normals[i];
        let v = h1.verts[i];
        let sep = h2
            .verts
            .iter()
            .map(|p| n.dot(*p - v))
            .fold(Real::INFINITY, Real::min);
        if sep > best_sep {
            best_sep = sep;
            best = i;
        }
    }
    (best, best_sep)
}

/// Closest points between two separated cores: `(on_a, on_b, distance)`.
fn closest_core_points(a: &Hull, b: &Hull) -> (Vect, Vect, Real) {
    let mut best = (a.verts[0], b.verts[0], Real::INFINITY);
    for i in 0..a.edge_count() {
        let (p1, q1) = a.edge(i);
        for j in 0..b.edge_count() {
            let (p2, q2) = b.edge(j);
            let (pa, pb) = closest_points_between_segments(p1, q1, p2, q2);
            let d = pa.distance(pb);
            if d < best.2 {
                best = (pa, pb, d);
            }
        }
    }
    best
}

/// Whether a contact at `core_point` of a segment hull sits on an endcap
/// that faces a neighbor. `outward` points from the segment to the other shape.
fn blocked_by_neighbor(hull: &Hull, core_point: Vect, outward: Vect) -> bool {
    let Some(seg) = hull.segment else {
        return false;
    };
    let eps_sq = MAGIC_EPSILON * MAGIC_EPSILON;
    (core_point.distance_squared(seg.ta) <= eps_sq && outward.dot(seg.ta_tangent) > 0.0)
        || (core_point.distance_squared(seg.tb) <= eps_sq && outward.dot(seg.tb_tangent) > 0.0)
}

type ClipPoint = (Vect, u32);

/// Keep the part of a segment with `normal · p <= offset`.
fn clip_segment(input: [ClipPoint; 2], normal: Vect, offset: Real, clip_key: u32) -> Option<[ClipPoint; 2]> {
    let d0 = normal.dot(input[0].0) - offset;
    let d1 = normal.dot(input[1].0) - offset;

    let mut out = [input[0]; 2];
    let mut n = 0;
    if d0 <= 0.0 {
        out[n] = input[0];
        n += 1;
    }
    if d1 <= 0.0 {
        out[n] = input[1];
        n += 1;
    }
    if n < 2 && ((d0 < 0.0 && d1 > 0.0) || (d0 > 0.0 && d1 < 0.0)) {
        let t = d0 / (d0 - d1);
        out[n] = (input[0].0 + (input[1].0 - input[0].0) * t, 0x40 | clip_key);
        n += 1;
    }
    (n == 2).then_some(out)
}

fn hull_to_hull(a: &Hull, b: &Hull) -> Option<Collision> {
    let r_sum = a.radius + b.radius;

    let (edge_a, sep_a) = find_max_separation(a, b);
    if sep_a > r_sum {
        return None;
    }
    let (edge_b, sep_b) = find_max_separation(b, a);
    if sep_b > r_sum {
        return None;
    }

    let flip = sep_b > sep_a + FACE_TOLERANCE;
    let (reference, incident, ref_edge, ref_sep) = if flip {
        (b, a, edge_b, sep_b)
    } else {
        (a, b, edge_a, sep_a)
    };
    let n_ref = reference.normals[ref_edge];

    if ref_sep > 0.0 {
        // Cores are apart; only the rounding radii can touch.
        let (pa, pb, dist) = closest_core_points(a, b);
        if dist > r_sum {
            return None;
        }
        if dist - ref_sep > FACE_TOLERANCE {
            let normal = if dist > MAGIC_EPSILON {
                (pb - pa) / dist
            } else if flip {
                -n_ref
            } else {
                n_ref
            };
            if blocked_by_neighbor(a, pa, normal) || blocked_by_neighbor(b, pb, -normal) {
                return None;
            }
            return Some(Collision::single(
                normal,
                pa + normal * a.radius,
                pb - normal * b.radius,
                dist - r_sum,
                VERTEX_CONTACT_ID,
            ));
        }
    }

    // Incident edge: the one most anti-parallel to the reference normal.
    let mut inc_edge = 0;
    let mut min_dot = Real::INFINITY;
    for i in 0..incident.len() {
        let d = n_ref.dot(incident.normals[i]);
        if d < min_dot {
            min_dot = d;
            inc_edge = i;
        }
    }
    let i1 = inc_edge;
    let i2 = (inc_edge + 1) % incident.len();
    let incident_points = [(incident.verts[i1], i1 as u32), (incident.verts[i2], i2 as u32)];

    let (v11, v12) = reference.edge(ref_edge);
    let tangent = (v12 - v11).normalize_or_zero();
    let clipped = clip_segment(incident_points, -tangent, -tangent.dot(v11), 0)?;
    let clipped = clip_segment(clipped, tangent, tangent.dot(v12), 1)?;

    let (r_ref, r_inc) = (reference.radius, incident.radius);
    let normal = if flip { -n_ref } else { n_ref };
    let mut contacts = Vec::with_capacity(2);
    for (cp, key) in clipped {
        let sep = n_ref.dot(cp - v11);
        if sep > r_sum {
            continue;
        }
        let on_ref = cp - n_ref * sep + n_ref * r_ref;
        let on_inc = cp - n_ref * r_inc;
        let (point_a, point_b) = if flip { (on_inc, on_ref) } else { (on_ref, on_inc) };
        let hash = ((flip as u32) << 16) | ((ref_edge as u32) << 8) | key;
        contacts.push(Contact {
            point: ContactPoint { point_a, point_b, distance: sep - r_sum },
            hash,
        });
    }

    if contacts.is_empty() {
        None
    } else {
        Some(Collision { normal, contacts })
    }
}
