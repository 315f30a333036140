use crate::api::error::{ensure_non_negative, PhysicsError, Result};
use crate::api::types::BodyHandle;
use crate::components::filter::ShapeFilter;
use crate::math::geometry::is_convex_ccw;
use crate::math::{
    area_for_circle, area_for_poly, area_for_segment, centroid_for_poly, convex_hull,
    moment_for_box, moment_for_circle, moment_for_poly, rperp, Affine, Real, Vect, BB,
};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Circle in body-local coordinates, with its cached world center.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub(crate) offset: Vect,
    pub(crate) radius: Real,
    pub(crate) tc: Vect,
}

impl Circle {
    pub fn offset(&self) -> Vect {
        self.offset
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    /// World-space center as of the last update.
    pub fn world_center(&self) -> Vect {
        self.tc
    }
}

/// Rounded segment (capsule) in body-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub(crate) a: Vect,
    pub(crate) b: Vect,
    pub(crate) n: Vect,
    pub(crate) radius: Real,
    pub(crate) a_tangent: Vect,
    pub(crate) b_tangent: Vect,
    pub(crate) ta: Vect,
    pub(crate) tb: Vect,
    pub(crate) tn: Vect,
    pub(crate) ta_tangent: Vect,
    pub(crate) tb_tangent: Vect,
}

impl Segment {
    fn new(a: Vect, b: Vect, radius: Real) -> Self {
        let n = segment_normal(a, b);
        Self {
            a,
            b,
            n,
            radius,
            a_tangent: Vect::ZERO,
            b_tangent: Vect::ZERO,
            ta: a,
            tb: b,
            tn: n,
            ta_tangent: Vect::ZERO,
            tb_tangent: Vect::ZERO,
        }
    }

    pub fn a(&self) -> Vect {
        self.a
    }

    pub fn b(&self) -> Vect {
        self.b
    }

    /// Unit normal, clockwise from `b - a`.
    pub fn normal(&self) -> Vect {
        self.n
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    /// World-space endpoints as of the last update.
    pub fn world_endpoints(&self) -> (Vect, Vect) {
        (self.ta, self.tb)
    }
}

fn segment_normal(a: Vect, b: Vect) -> Vect {
    let n = rperp((b - a).normalize_or_zero());
    if n == Vect::ZERO {
        Vect::Y
    } else {
        n
    }
}

/// Convex polygon with counter-clockwise vertices. Edge `i` runs from
/// vertex `i` to vertex `i + 1` and has outward normal `normals[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Poly {
    pub(crate) verts: Vec<Vect>,
    pub(crate) normals: Vec<Vect>,
    pub(crate) radius: Real,
    pub(crate) t_verts: Vec<Vect>,
    pub(crate) t_normals: Vec<Vect>,
}

impl Poly {
    fn new(verts: Vec<Vect>, radius: Real) -> Self {
        let count = verts.len();
        let normals: Vec<Vect> = (0..count)
            .map(|i| rperp(verts[(i + 1) % count] - verts[i]).normalize_or_zero())
            .collect();
        Self {
            t_verts: verts.clone(),
            t_normals: normals.clone(),
            verts,
            normals,
            radius,
        }
    }

    pub fn count(&self) -> usize {
        self.verts.len()
    }

    pub fn vert(&self, i: usize) -> Option<Vect> {
        self.verts.get(i).copied()
    }

    pub fn verts(&self) -> &[Vect] {
        &self.verts
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    /// World-space vertices as of the last update.
    pub fn world_verts(&self) -> &[Vect] {
        &self.t_verts
    }
}

/// One case per supported shape kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    Circle(Circle),
    Segment(Segment),
    Poly(Poly),
}

impl ShapeGeometry {
    /// Ordering used by collision dispatch: circles first, polygons last.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ShapeGeometry::Circle(_) => 0,
            ShapeGeometry::Segment(_) => 1,
            ShapeGeometry::Poly(_) => 2,
        }
    }
}

/// Mass properties of a shape. `moment` is per unit mass, about `cog`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassInfo {
    pub mass: Real,
    pub moment: Real,
    pub cog: Vect,
    pub area: Real,
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Collision geometry plus surface properties.
///
/// A shape is built as a plain value and handed to `Space::add_shape`, which
/// attaches it to a body. Until then its world geometry equals its local
/// geometry, so detached shapes can be used directly with `collide` or
/// `Space::shape_query`.
#[derive(Debug, Clone)]
pub struct Shape {
    pub(crate) geometry: ShapeGeometry,
    pub(crate) body: Option<BodyHandle>,
    pub(crate) mass_info: MassInfo,
    pub(crate) sensor: bool,
    pub(crate) elasticity: Real,
    pub(crate) friction: Real,
    pub(crate) surface_velocity: Vect,
    pub(crate) collision_type: u64,
    pub(crate) filter: ShapeFilter,
    pub(crate) bb: BB,
}

impl Shape {
    fn from_geometry(geometry: ShapeGeometry, moment: Real, cog: Vect, area: Real) -> Self {
        let mut shape = Self {
            geometry,
            body: None,
            mass_info: MassInfo { mass: 0.0, moment, cog, area },
            sensor: false,
            elasticity: 0.0,
            friction: 0.0,
            surface_velocity: Vect::ZERO,
            collision_type: 0,
            filter: ShapeFilter::ALL,
            bb: BB::default(),
        };
        shape.update(&Affine::IDENTITY);
        shape
    }

    /// Solid circle of `radius` centered on `offset` in body coordinates.
    pub fn circle(radius: Real, offset: Vect) -> Result<Self> {
        ensure_non_negative("radius", radius)?;
        let geometry = ShapeGeometry::Circle(Circle { offset, radius, tc: offset });
        Ok(Self::from_geometry(
            geometry,
            moment_for_circle(1.0, 0.0, radius, Vect::ZERO),
            offset,
            area_for_circle(0.0, radius),
        ))
    }

    /// Segment from `a` to `b` with rounded ends of `radius`.
    pub fn segment(a: Vect, b: Vect, radius: Real) -> Result<Self> {
        ensure_non_negative("radius", radius)?;
        let geometry = ShapeGeometry::Segment(Segment::new(a, b, radius));
        Ok(Self::from_geometry(
            geometry,
            moment_for_box(1.0, a.distance(b) + 2.0 * radius, 2.0 * radius),
            a.lerp(b, 0.5),
            area_for_segment(a, b, radius),
        ))
    }

    /// Convex polygon from the hull of `verts` after applying `transform`.
    pub fn poly(verts: &[Vect], transform: Affine, radius: Real) -> Result<Self> {
        let moved: Vec<Vect> = verts.iter().map(|v| transform.transform_point2(*v)).collect();
        let hull = convex_hull(&moved, 0.0);
        if hull.len() < 3 {
            return Err(PhysicsError::InvalidArgument(format!(
                "polygon hull needs at least 3 distinct vertices, got {}",
                hull.len()
            )));
        }
        Self::poly_raw(hull, radius)
    }

    /// Polygon from vertices that are already convex and counter-clockwise.
    pub fn poly_raw(verts: Vec<Vect>, radius: Real) -> Result<Self> {
        ensure_non_negative("radius", radius)?;
        if !is_convex_ccw(&verts) {
            return Err(PhysicsError::InvalidArgument(
                "polygon vertices must be convex and counter-clockwise".into(),
            ));
        }
        let centroid = centroid_for_poly(&verts);
        let moment = moment_for_poly(1.0, &verts, -centroid, radius);
        let area = area_for_poly(&verts, radius);
        Ok(Self::from_geometry(ShapeGeometry::Poly(Poly::new(verts, radius)), moment, centroid, area))
    }

    /// Box of `width` by `height` centered on the body origin.
    pub fn box_shape(width: Real, height: Real, radius: Real) -> Result<Self> {
        ensure_non_negative("width", width)?;
        ensure_non_negative("height", height)?;
        Self::box_from_bb(BB::for_extents(Vect::ZERO, width / 2.0, height / 2.0), radius)
    }

    /// Box covering `bb` in body coordinates.
    pub fn box_from_bb(bb: BB, radius: Real) -> Result<Self> {
        let verts = vec![
            Vect::new(bb.r, bb.b),
            Vect::new(bb.r, bb.t),
            Vect::new(bb.l, bb.t),
            Vect::new(bb.l, bb.b),
        ];
        Self::poly_raw(verts, radius)
    }

    // -- Builder pattern --

    pub fn with_mass(mut self, mass: Real) -> Result<Self> {
        self.set_mass(mass)?;
        Ok(self)
    }

    pub fn with_density(mut self, density: Real) -> Result<Self> {
        self.set_density(density)?;
        Ok(self)
    }

    pub fn with_friction(mut self, friction: Real) -> Result<Self> {
        self.set_friction(friction)?;
        Ok(self)
    }

    pub fn with_elasticity(mut self, elasticity: Real) -> Result<Self> {
        self.set_elasticity(elasticity)?;
        Ok(self)
    }

    pub fn with_filter(mut self, filter: ShapeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_surface_velocity(mut self, velocity: Vect) -> Self {
        self.surface_velocity = velocity;
        self
    }

    pub fn with_collision_type(mut self, collision_type: u64) -> Self {
        self.collision_type = collision_type;
        self
    }

    // -- Accessors --

    pub fn geometry(&self) -> &ShapeGeometry {
        &self.geometry
    }

    /// Rounding radius for any shape kind (the full radius for circles).
    pub fn radius(&self) -> Real {
        match &self.geometry {
            ShapeGeometry::Circle(c) => c.radius,
            ShapeGeometry::Segment(s) => s.radius,
            ShapeGeometry::Poly(p) => p.radius,
        }
    }

    /// Owning body, or `None` while detached.
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn mass_info(&self) -> MassInfo {
        self.mass_info
    }

    pub fn mass(&self) -> Real {
        self.mass_info.mass
    }

    pub fn density(&self) -> Real {
        if self.mass_info.area > 0.0 {
            self.mass_info.mass / self.mass_info.area
        } else {
            0.0
        }
    }

    /// Moment of inertia about the shape's own center of gravity.
    pub fn moment(&self) -> Real {
        self.mass_info.mass * self.mass_info.moment
    }

    pub fn area(&self) -> Real {
        self.mass_info.area
    }

    pub fn center_of_gravity(&self) -> Vect {
        self.mass_info.cog
    }

    /// World bounding box as of the last update.
    pub fn bb(&self) -> BB {
        self.bb
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    pub fn set_sensor(&mut self, sensor: bool) {
        self.sensor = sensor;
    }

    pub fn elasticity(&self) -> Real {
        self.elasticity
    }

    pub fn set_elasticity(&mut self, elasticity: Real) -> Result<()> {
        ensure_non_negative("elasticity", elasticity)?;
        self.elasticity = elasticity;
        Ok(())
    }

    pub fn friction(&self) -> Real {
        self.friction
    }

    pub fn set_friction(&mut self, friction: Real) -> Result<()> {
        ensure_non_negative("friction", friction)?;
        self.friction = friction;
        Ok(())
    }

    pub fn surface_velocity(&self) -> Vect {
        self.surface_velocity
    }

    pub fn set_surface_velocity(&mut self, velocity: Vect) {
        self.surface_velocity = velocity;
    }

    pub fn collision_type(&self) -> u64 {
        self.collision_type
    }

    pub fn set_collision_type(&mut self, collision_type: u64) {
        self.collision_type = collision_type;
    }

    pub fn filter(&self) -> ShapeFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: ShapeFilter) {
        self.filter = filter;
    }

    /// Set the tangents toward neighboring segments in a chain, so that
    /// objects sliding across a joint do not catch on the endcaps.
    /// `prev` and `next` are the far endpoints of the neighbors.
    pub fn set_neighbors(&mut self, prev: Vect, next: Vect) -> Result<()> {
        match &mut self.geometry {
            ShapeGeometry::Segment(seg) => {
                seg.a_tangent = prev - seg.a;
                seg.b_tangent = next - seg.b;
                Ok(())
            }
            _ => Err(PhysicsError::InvalidArgument(
                "neighbors can only be set on segment shapes".into(),
            )),
        }
    }

    // Mass changes on attached shapes must go through the space so the
    // body's mass is recomputed.

    pub(crate) fn set_mass(&mut self, mass: Real) -> Result<()> {
        ensure_non_negative("mass", mass)?;
        if !mass.is_finite() {
            return Err(PhysicsError::InvalidArgument("mass must be finite".into()));
        }
        self.mass_info.mass = mass;
        Ok(())
    }

    pub(crate) fn set_density(&mut self, density: Real) -> Result<()> {
        ensure_non_negative("density", density)?;
        if !density.is_finite() {
            return Err(PhysicsError::InvalidArgument("density must be finite".into()));
        }
        self.mass_info.mass = density * self.mass_info.area;
        Ok(())
    }

    /// Recompute world geometry and the bounding box for a body transform.
    pub fn update(&mut self, transform: &Affine) -> BB {
        self.bb = match &mut self.geometry {
            ShapeGeometry::Circle(c) => {
                c.tc = transform.transform_point2(c.offset);
                BB::for_circle(c.tc, c.radius)
            }
            ShapeGeometry::Segment(s) => {
                s.ta = transform.transform_point2(s.a);
                s.tb = transform.transform_point2(s.b);
                s.tn = transform.transform_vector2(s.n);
                s.ta_tangent = transform.transform_vector2(s.a_tangent);
                s.tb_tangent = transform.transform_vector2(s.b_tangent);
                BB::for_points(&[s.ta, s.tb]).inflate(s.radius)
            }
            ShapeGeometry::Poly(p) => {
                for (dst, src) in p.t_verts.iter_mut().zip(&p.verts) {
                    *dst = transform.transform_point2(*src);
                }
                for (dst, src) in p.t_normals.iter_mut().zip(&p.normals) {
                    *dst = transform.transform_vector2(*src);
                }
                BB::for_points(&p.t_verts).inflate(p.radius)
            }
        };
        self.bb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::consts;

    #[test]
    fn circle_mass_from_density() {
        let shape = Shape::circle(2.0, Vect::new(1.0, 0.0)).unwrap().with_density(3.0).unwrap();
        let area = consts::PI * 4.0;
        assert!((shape.area() - area).abs() < 1e-9);
        assert!((shape.mass() - 3.0 * area).abs() < 1e-9);
        assert!((shape.density() - 3.0).abs() < 1e-9);
        // Moment about its own center: m r^2 / 2
        assert!((shape.moment() - shape.mass() * 2.0).abs() < 1e-6);
        assert_eq!(shape.center_of_gravity(), Vect::new(1.0, 0.0));
    }

    #[test]
    fn mass_overrides_density() {
        let shape = Shape::box_shape(2.0, 2.0, 0.0).unwrap().with_density(1.0).unwrap().with_mass(8.0).unwrap();
        assert_eq!(shape.mass(), 8.0);
        assert!((shape.density() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn segment_mass_info() {
        let shape = Shape::segment(Vect::new(0.0, 0.0), Vect::new(4.0, 0.0), 1.0).unwrap().with_mass(1.0).unwrap();
        assert_eq!(shape.center_of_gravity(), Vect::new(2.0, 0.0));
        assert!((shape.moment() - moment_for_box(1.0, 6.0, 2.0)).abs() < 1e-9);
        assert!((shape.area() - (consts::PI + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn poly_builds_ccw_hull() {
        let cw = [
            Vect::new(-1.0, -1.0),
            Vect::new(-1.0, 1.0),
            Vect::new(1.0, 1.0),
            Vect::new(1.0, -1.0),
        ];
        let shape = Shape::poly(&cw, Affine::from_translation(Vect::new(3.0, 0.0)), 0.0).unwrap();
        let ShapeGeometry::Poly(poly) = shape.geometry() else {
            panic!("expected a polygon");
        };
        assert_eq!(poly.count(), 4);
        assert!(is_convex_ccw(poly.verts()));
        assert!((shape.center_of_gravity() - Vect::new(3.0, 0.0)).length() < 1e-9);
        assert_eq!(shape.bb(), BB::new(2.0, -1.0, 4.0, 1.0));
    }

    #[test]
    fn degenerate_poly_rejected() {
        let line = [Vect::new(0.0, 0.0), Vect::new(1.0, 0.0), Vect::new(2.0, 0.0)];
        assert!(matches!(
            Shape::poly(&line, Affine::IDENTITY, 0.0),
            Err(PhysicsError::InvalidArgument(_))
        ));
        assert!(Shape::poly_raw(vec![Vect::ZERO, Vect::X, Vect::Y, Vect::ONE], 0.0).is_err());
    }

    #[test]
    fn negative_parameters_rejected() {
        assert!(Shape::circle(-1.0, Vect::ZERO).is_err());
        let shape = Shape::circle(1.0, Vect::ZERO).unwrap();
        assert!(shape.clone().with_friction(-0.1).is_err());
        assert!(shape.clone().with_elasticity(-0.1).is_err());
        assert!(shape.with_mass(-2.0).is_err());
    }

    #[test]
    fn update_moves_world_geometry() {
        let mut shape = Shape::segment(Vect::new(0.0, 0.0), Vect::new(2.0, 0.0), 0.5).unwrap();
        let bb = shape.update(&Affine::from_angle_translation(consts::FRAC_PI_2, Vect::new(1.0, 1.0)));
        let ShapeGeometry::Segment(seg) = shape.geometry() else {
            panic!("expected a segment");
        };
        let (ta, tb) = seg.world_endpoints();
        assert!((ta - Vect::new(1.0, 1.0)).length() < 1e-9);
        assert!((tb - Vect::new(1.0, 3.0)).length() < 1e-9);
        assert!((bb.l - 0.5).abs() < 1e-9 && (bb.t - 3.5).abs() < 1e-9);
    }

    #[test]
    fn neighbors_only_on_segments() {
        let mut seg = Shape::segment(Vect::ZERO, Vect::X, 0.0).unwrap();
        assert!(seg.set_neighbors(-Vect::X, Vect::new(2.0, 0.0)).is_ok());
        let mut circle = Shape::circle(1.0, Vect::ZERO).unwrap();
        assert!(circle.set_neighbors(Vect::ZERO, Vect::ZERO).is_err());
    }
}
