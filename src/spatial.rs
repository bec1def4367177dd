//! Geometry helpers built on the geo crate.
//!
//! Covers the display-side operations (union of selected cells or record
//! footprints, centroid and overall bounds) and parsing of CMR box strings.

use crate::error::{GridError, Result};
use crate::compute::validation::{SkipReason, validate_polygon};
use abovegrid_types::footprint::Footprint;
use geo::{BooleanOps, BoundingRect, Centroid, MultiPolygon, Point, Polygon, Rect};

/// Union of a set of geometries, used to re-center the map.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFootprint {
    pub union: MultiPolygon<f64>,
    pub centroid: Point<f64>,
    pub bounds: Rect<f64>,
}

/// Compute the geometric union of polygons along with its centroid and bounds.
///
/// Polygons that are empty, degenerate or carry non-finite vertices are
/// skipped. Returns `None` when nothing valid remains.
///
/// # Examples
///
/// ```rust
/// use abovegrid::spatial::union_footprint;
/// use geo::{Rect, coord};
///
/// let a = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon();
/// let b = Rect::new(coord! { x: 1.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 }).to_polygon();
///
/// let display = union_footprint([&a, &b]).unwrap();
/// assert_eq!(display.union.0.len(), 1);
/// assert!((display.centroid.x() - 1.0).abs() < 1e-9);
/// assert!((display.centroid.y() - 0.5).abs() < 1e-9);
/// ```
pub fn union_footprint<'a, I>(polygons: I) -> Option<DisplayFootprint>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    let mut union: Option<MultiPolygon<f64>> = None;

    for polygon in polygons {
        if let Err(reason) = validate_polygon(polygon, false) {
            log::debug!("Leaving polygon out of display union: {}", reason);
            continue;
        }
        union = Some(match union {
            None => MultiPolygon::new(vec![polygon.clone()]),
            Some(acc) => acc.union(polygon),
        });
    }

    let union = union?;
    let centroid = union.centroid()?;
    let bounds = union.bounding_rect()?;

    Some(DisplayFootprint {
        union,
        centroid,
        bounds,
    })
}

/// [`union_footprint`] over record footprints.
pub fn union_of_footprints<'a, I>(footprints: I) -> Option<DisplayFootprint>
where
    I: IntoIterator<Item = &'a Footprint>,
{
    let polygons: Vec<Polygon<f64>> = footprints
        .into_iter()
        .flat_map(|footprint| footprint.to_multi_polygon().0)
        .collect();
    union_footprint(polygons.iter())
}

/// The box enclosing every footprint, or `None` for an empty input.
///
/// # Examples
///
/// ```rust
/// use abovegrid::spatial::{bounding_box, bounds_of};
/// use abovegrid::Footprint;
///
/// let a = Footprint::Rect(bounding_box(-150.0, 60.0, -140.0, 65.0).unwrap());
/// let b = Footprint::Rect(bounding_box(-145.0, 62.0, -130.0, 70.0).unwrap());
///
/// let all = bounds_of([&a, &b]).unwrap();
/// assert_eq!(all, bounding_box(-150.0, 60.0, -130.0, 70.0).unwrap());
/// ```
pub fn bounds_of<'a, I>(footprints: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = &'a Footprint>,
{
    footprints
        .into_iter()
        .filter_map(Footprint::bounding_rect)
        .reduce(|acc, rect| {
            Rect::new(
                geo::coord! {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::coord! {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

/// Create a bounding box (Rect) from min/max coordinates.
///
/// # Errors
///
/// Returns an error if min > max for either coordinate
pub fn bounding_box(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Rect> {
    if min_lon > max_lon {
        return Err(GridError::InvalidInput(format!(
            "min_lon ({}) must be <= max_lon ({})",
            min_lon, max_lon
        )));
    }
    if min_lat > max_lat {
        return Err(GridError::InvalidInput(format!(
            "min_lat ({}) must be <= max_lat ({})",
            min_lat, max_lat
        )));
    }

    Ok(Rect::new(
        geo::coord! { x: min_lon, y: min_lat },
        geo::coord! { x: max_lon, y: max_lat },
    ))
}

/// Parse a CMR box string into a rectangle.
///
/// CMR orders box corners as `"south west north east"`, latitude first.
///
/// # Examples
///
/// ```rust
/// use abovegrid::spatial::cmr_box_to_rect;
///
/// let rect = cmr_box_to_rect("58.5 -168.0 72.0 -101.5").unwrap();
/// assert_eq!(rect.min().x, -168.0);
/// assert_eq!(rect.min().y, 58.5);
/// assert_eq!(rect.max().x, -101.5);
/// assert_eq!(rect.max().y, 72.0);
///
/// assert!(cmr_box_to_rect("58.5 -168.0 72.0").is_err());
/// ```
pub fn cmr_box_to_rect(cmr_box: &str) -> std::result::Result<Rect<f64>, SkipReason> {
    let parts: Vec<&str> = cmr_box.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(SkipReason::UnparseableGeometry(format!(
            "CMR box needs 4 values, got {}",
            parts.len()
        )));
    }

    let mut values = [0.0f64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.parse::<f64>().map_err(|e| {
            SkipReason::UnparseableGeometry(format!("CMR box value '{}': {}", part, e))
        })?;
    }

    let [south, west, north, east] = values;
    if south > north {
        return Err(SkipReason::UnparseableGeometry(format!(
            "CMR box south ({}) is above north ({})",
            south, north
        )));
    }

    // Boxes crossing the antimeridian have west > east; Rect would silently
    // swap the corners, so they are rejected instead.
    if west > east {
        return Err(SkipReason::UnsupportedGeometry(
            "CMR box crossing the antimeridian".to_string(),
        ));
    }

    Ok(Rect::new(
        geo::coord! { x: west, y: south },
        geo::coord! { x: east, y: north },
    ))
}
