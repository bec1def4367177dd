use geo::{BoundingRect, Coord, CoordsIter, Intersects, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// The bounding geometry of a catalog record.
///
/// CMR reports most extents as boxes, but some collections carry a real
/// polygon outline, so both are kept as-is rather than collapsed to a box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Footprint {
    Rect(Rect<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Footprint {
    /// Axis-aligned bounds, or `None` for an empty geometry.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Footprint::Rect(rect) => Some(*rect),
            Footprint::Polygon(polygon) => polygon.bounding_rect(),
            Footprint::MultiPolygon(multi) => multi.bounding_rect(),
        }
    }

    /// Closed-set intersection: shared boundary points count.
    ///
    /// # Examples
    ///
    /// ```
    /// use abovegrid_types::footprint::Footprint;
    /// use geo::{Rect, coord};
    ///
    /// let left = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
    /// let right = Rect::new(coord! { x: 1.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 });
    ///
    /// // Touching along x = 1.0 is a hit
    /// assert!(Footprint::Rect(left).intersects_polygon(&right.to_polygon()));
    /// ```
    pub fn intersects_polygon(&self, polygon: &Polygon<f64>) -> bool {
        match self {
            Footprint::Rect(rect) => rect.intersects(polygon),
            Footprint::Polygon(own) => own.intersects(polygon),
            Footprint::MultiPolygon(multi) => multi.intersects(polygon),
        }
    }

    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        match self {
            Footprint::Rect(rect) => MultiPolygon::new(vec![rect.to_polygon()]),
            Footprint::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            Footprint::MultiPolygon(multi) => multi.clone(),
        }
    }

    /// Every vertex of the footprint, exterior and interior rings included.
    pub fn coords(&self) -> Vec<Coord<f64>> {
        match self {
            Footprint::Rect(rect) => rect.coords_iter().collect(),
            Footprint::Polygon(polygon) => polygon.coords_iter().collect(),
            Footprint::MultiPolygon(multi) => multi.coords_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Footprint::Rect(_) => false,
            Footprint::Polygon(polygon) => polygon.exterior().0.is_empty(),
            Footprint::MultiPolygon(multi) => {
                multi.0.iter().all(|polygon| polygon.exterior().0.is_empty())
            }
        }
    }
}

impl From<Rect<f64>> for Footprint {
    fn from(rect: Rect<f64>) -> Self {
        Footprint::Rect(rect)
    }
}

impl From<Polygon<f64>> for Footprint {
    fn from(polygon: Polygon<f64>) -> Self {
        Footprint::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for Footprint {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Footprint::MultiPolygon(multi)
    }
}
