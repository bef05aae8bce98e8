use geo::{Area, BoundingRect, Coord, MultiPolygon, Rect};
use rstar::{RTree, AABB};

use super::bbox::BoundingBox;

/// A read-only collection of MultiPolygons with an R-tree over their bounding boxes.
///
/// Built once per batch and shared by reference across overlap workers.
#[derive(Debug, Clone)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes have no bounding box and are never returned by queries.
    pub(crate) fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
        }
    }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub(crate) fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Indices of shapes whose bounding boxes intersect the given envelope.
    #[inline]
    pub(crate) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = usize> {
        self.rtree.locate_in_envelope_intersecting(envelope).map(BoundingBox::idx)
    }

    /// Unsigned planar area of every shape, in squared input units.
    pub(crate) fn areas(&self) -> Vec<f64> {
        self.shapes.iter().map(|shape| shape.unsigned_area()).collect()
    }
}

/// Smallest rectangle covering every input rectangle.
pub(crate) fn union_bounds(rects: impl IntoIterator<Item = Rect<f64>>) -> Option<Rect<f64>> {
    rects.into_iter().reduce(|a, b| Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        }
    ))
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::geom::bbox::envelope_of;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size), (x: x, y: y),
        ]])
    }

    #[test]
    fn query_returns_only_intersecting_boxes() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0), MultiPolygon(vec![])]);
        assert_eq!(geoms.shapes().len(), 3);

        let window = Rect::new(Coord { x: 0.5, y: 0.5 }, Coord { x: 0.6, y: 0.6 });
        assert_eq!(geoms.query(&envelope_of(&window)).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn bounds_and_areas() {
        let shapes = vec![square(0.0, 0.0, 2.0), square(3.0, 1.0, 1.0)];
        let bounds = union_bounds(shapes.iter().filter_map(|shape| shape.bounding_rect())).unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 4.0, y: 2.0 });
        assert_eq!(Geometries::new(shapes).areas(), vec![4.0, 1.0]);
        assert!(union_bounds(std::iter::empty::<Rect<f64>>()).is_none());
    }
}
