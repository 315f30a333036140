//! Spatial queries over every shape in a space.
//!
//! Queries read the world geometry cached by the last step or reindex and
//! are allowed at any time, including from inside collision callbacks.

use super::Space;
use crate::api::error::Result;
use crate::api::types::ShapeHandle;
use crate::collision::{collide, ContactPointSet, PointQueryInfo, SegmentQueryInfo};
use crate::components::filter::ShapeFilter;
use crate::components::shape::Shape;
use crate::math::{Real, Vect, BB};

/// A shape overlapping the query shape, with the contacts between them.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeQueryHit {
    pub shape: ShapeHandle,
    pub contacts: ContactPointSet,
}

impl Space {
    fn candidates(&self, bb: &BB) -> Vec<ShapeHandle> {
        let mut found = Vec::new();
        self.static_index.query(bb, |h| found.push(h));
        self.dynamic_index.query(bb, |h| found.push(h));
        found.sort_unstable();
        found.dedup();
        found
    }

    fn shape_passes(&self, handle: ShapeHandle, filter: &ShapeFilter) -> Option<&Shape> {
        self.shapes.get(handle.0).filter(|s| !filter.rejects(&s.filter))
    }

    /// Every shape within `max_distance` of `point`, sensors included.
    /// A `max_distance` of 0 finds the shapes containing the point.
    pub fn point_query(&self, point: Vect, max_distance: Real, filter: ShapeFilter) -> Vec<PointQueryInfo> {
        let bb = BB::for_circle(point, max_distance.max(0.0));
        self.candidates(&bb)
            .into_iter()
            .filter_map(|h| {
                let shape = self.shape_passes(h, &filter)?;
                let mut info = shape.point_query(point);
                info.shape = Some(h);
                (info.distance < max_distance || (max_distance == 0.0 && info.distance <= 0.0)).then_some(info)
            })
            .collect()
    }

    /// Closest non-sensor shape within `max_distance` of `point`.
    pub fn point_query_nearest(&self, point: Vect, max_distance: Real, filter: ShapeFilter) -> Option<PointQueryInfo> {
        self.point_query(point, max_distance, filter)
            .into_iter()
            .filter(|info| info.shape.and_then(|h| self.shapes.get(h.0)).is_some_and(|s| !s.sensor))
            .min_by(|x, y| x.distance.total_cmp(&y.distance))
    }

    /// Every shape hit by the segment `a`-`b` swept with `radius`, ordered
    /// along the segment.
    pub fn segment_query(&self, a: Vect, b: Vect, radius: Real, filter: ShapeFilter) -> Vec<SegmentQueryInfo> {
        let mut hits = Vec::new();
        let mut visit = |h: ShapeHandle| {
            if let Some(shape) = self.shape_passes(h, &filter) {
                if let Some(mut info) = shape.segment_query(a, b, radius) {
                    info.shape = Some(h);
                    hits.push(info);
                }
            }
            1.0
        };
        self.static_index.segment_query(a, b, radius, 1.0, &mut visit);
        self.dynamic_index.segment_query(a, b, radius, 1.0, &mut visit);
        hits.sort_by(|x, y| x.alpha.total_cmp(&y.alpha).then(x.shape.cmp(&y.shape)));
        hits
    }

    /// First non-sensor shape hit by the segment.
    pub fn segment_query_first(&self, a: Vect, b: Vect, radius: Real, filter: ShapeFilter) -> Option<SegmentQueryInfo> {
        let mut best: Option<SegmentQueryInfo> = None;
        let mut visit = |h: ShapeHandle| {
            let hit = self
                .shape_passes(h, &filter)
                .filter(|s| !s.sensor)
                .and_then(|s| s.segment_query(a, b, radius));
            if let Some(mut info) = hit {
                let closer = best.map_or(true, |prev| {
                    info.alpha < prev.alpha || (info.alpha == prev.alpha && Some(h) < prev.shape)
                });
                if closer {
                    info.shape = Some(h);
                    best = Some(info);
                }
            }
            best.map_or(1.0, |prev| prev.alpha)
        };
        self.static_index.segment_query(a, b, radius, 1.0, &mut visit);
        self.dynamic_index.segment_query(a, b, radius, 1.0, &mut visit);
        best
    }

    /// Shapes whose bounding box overlaps `bb`.
    pub fn bb_query(&self, bb: BB, filter: ShapeFilter) -> Vec<ShapeHandle> {
        self.candidates(&bb)
            .into_iter()
            .filter(|&h| self.shape_passes(h, &filter).is_some_and(|s| s.bb.intersects(&bb)))
            .collect()
    }

    /// Every shape touching `query`, which is tested at the pose of its
    /// last `Shape::update`. Shapes on the query's own body are skipped.
    pub fn shape_query(&self, query: &Shape) -> Vec<ShapeQueryHit> {
        self.candidates(&query.bb)
            .into_iter()
            .filter_map(|h| {
                let other = self.shape_passes(h, &query.filter)?;
                if query.body.is_some() && query.body == other.body {
                    return None;
                }
                if !other.bb.intersects(&query.bb) {
                    return None;
                }
                let contacts = collide(query, other);
                (!contacts.is_empty()).then_some(ShapeQueryHit { shape: h, contacts })
            })
            .collect()
    }

    /// Contacts between two shapes of this space, ignoring filters.
    pub fn shapes_collide(&self, a: ShapeHandle, b: ShapeHandle) -> Result<ContactPointSet> {
        Ok(collide(self.shape(a)?, self.shape(b)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::body::Body;

    fn world() -> (Space, ShapeHandle, ShapeHandle) {
        let mut space = Space::new();
        let ground = space.static_body();
        let floor = space
            .add_shape(ground, Shape::segment(Vect::new(-10.0, 0.0), Vect::new(10.0, 0.0), 0.0).unwrap())
            .unwrap();
        let body = space
            .add_body(Body::dynamic().with_position(Vect::new(0.0, 2.0)))
            .unwrap();
        let ball = space
            .add_shape(body, Shape::circle(1.0, Vect::ZERO).unwrap().with_mass(1.0).unwrap())
            .unwrap();
        (space, floor, ball)
    }

    #[test]
    fn point_query_finds_containing_shape() {
        let (space, _, ball) = world();
        let hits = space.point_query(Vect::new(0.0, 2.5), 0.0, ShapeFilter::ALL);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].shape, Some(ball));
        assert!((hits[0].distance + 0.5).abs() < 1e-9, "distance {}", hits[0].distance);
    }

    #[test]
    fn nearest_prefers_the_closer_shape() {
        let (space, floor, _) = world();
        let nearest = space
            .point_query_nearest(Vect::new(5.0, 0.5), 10.0, ShapeFilter::ALL)
            .unwrap();
        assert_eq!(nearest.shape, Some(floor));
        assert!((nearest.distance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn segment_queries_are_ordered_along_the_ray() {
        let (space, floor, ball) = world();
        let hits = space.segment_query(Vect::new(0.0, 5.0), Vect::new(0.0, -1.0), 0.0, ShapeFilter::ALL);
        let order: Vec<_> = hits.iter().map(|h| h.shape).collect();
        assert_eq!(order, vec![Some(ball), Some(floor)]);

        let first = space
            .segment_query_first(Vect::new(0.0, 5.0), Vect::new(0.0, -1.0), 0.0, ShapeFilter::ALL)
            .unwrap();
        assert_eq!(first.shape, Some(ball));
        assert!((first.point.y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn filters_hide_shapes_from_queries() {
        let (space, _, _) = world();
        assert!(space.point_query(Vect::new(0.0, 2.0), 0.0, ShapeFilter::NONE).is_empty());
        assert!(space.bb_query(BB::new(-1.0, -1.0, 1.0, 3.0), ShapeFilter::NONE).is_empty());
    }

    #[test]
    fn bb_query_uses_exact_boxes() {
        let (space, floor, ball) = world();
        assert_eq!(space.bb_query(BB::new(-0.5, 1.5, 0.5, 2.5), ShapeFilter::ALL), vec![ball]);
        assert_eq!(space.bb_query(BB::new(5.0, -0.5, 6.0, 0.5), ShapeFilter::ALL), vec![floor]);
    }

    #[test]
    fn shape_query_reports_overlaps() {
        let (space, floor, ball) = world();
        let mut probe = Shape::circle(0.7, Vect::ZERO).unwrap();
        probe.update(&crate::math::Affine::from_translation(Vect::new(0.0, 0.5)));
        let hits = space.shape_query(&probe);
        let shapes: Vec<_> = hits.iter().map(|h| h.shape).collect();
        assert_eq!(shapes, vec![floor, ball]);
        assert!(hits.iter().all(|h| !h.contacts.is_empty()));
    }

    #[test]
    fn shapes_collide_rejects_stale_handles() {
        let (mut space, floor, ball) = world();
        assert!(space.shapes_collide(floor, ball).unwrap().is_empty());
        space.remove_shape(ball).unwrap();
        assert!(space.shapes_collide(floor, ball).is_err());
    }
}
