//! Per-entity validation for cells and record footprints.
//!
//! Validation never aborts a batch. Each check returns a [`SkipReason`] on
//! failure and the caller records it in a [`SkipList`] before moving on to
//! the next entity.

use abovegrid_types::footprint::Footprint;
use abovegrid_types::record::RecordKind;
use geo::{Coord, Polygon};
use std::fmt;
use thiserror::Error;

/// Why a single cell or record was left out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("missing identifier")]
    MissingId,

    #[error("duplicate identifier")]
    DuplicateId,

    #[error("missing tiling level")]
    MissingLevel,

    #[error("unknown tiling level '{0}'")]
    UnknownLevel(String),

    #[error("missing geometry")]
    MissingGeometry,

    #[error("unparseable geometry: {0}")]
    UnparseableGeometry(String),

    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("empty geometry")]
    EmptyGeometry,

    #[error("ring {ring} has {len} vertices, at least 4 are required")]
    DegenerateRing { ring: usize, len: usize },

    #[error("non-finite coordinate at vertex {index}")]
    NonFiniteCoordinate { index: usize },

    #[error("coordinate ({x}, {y}) at vertex {index} is outside [-180, 180] x [-90, 90]")]
    OutOfRange { index: usize, x: f64, y: f64 },
}

/// What kind of entity a skip refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Cell,
    Record(RecordKind),
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Cell => write!(f, "cell"),
            EntityKind::Record(kind) => write!(f, "{}", kind),
        }
    }
}

/// One entity left out of loading or indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub entity: EntityKind,
    /// Position of the entity in its input sequence.
    pub position: usize,
    pub id: Option<String>,
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(
                f,
                "{} '{}' (#{}): {}",
                self.entity, id, self.position, self.reason
            ),
            None => write!(f, "{} #{}: {}", self.entity, self.position, self.reason),
        }
    }
}

/// Aggregated skips from one load or build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipList {
    entries: Vec<Skipped>,
}

impl SkipList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        entity: EntityKind,
        position: usize,
        id: Option<&str>,
        reason: SkipReason,
    ) {
        let skipped = Skipped {
            entity,
            position,
            id: id.map(str::to_string),
            reason,
        };
        log::warn!("Skipping {}", skipped);
        self.entries.push(skipped);
    }

    pub fn extend(&mut self, other: SkipList) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skipped> {
        self.entries.iter()
    }

    pub fn for_entity(&self, entity: EntityKind) -> impl Iterator<Item = &Skipped> {
        self.entries.iter().filter(move |s| s.entity == entity)
    }

    /// Whether an entity with this id was skipped.
    pub fn contains_id(&self, entity: EntityKind, id: &str) -> bool {
        self.for_entity(entity).any(|s| s.id.as_deref() == Some(id))
    }
}

/// Validates one vertex.
///
/// With `geographic` set, longitude must lie in [-180, 180] and latitude in
/// [-90, 90]; otherwise only finiteness is checked (projected grids).
///
/// # Examples
///
/// ```
/// use abovegrid::compute::validation::{validate_coord, SkipReason};
/// use geo::coord;
///
/// assert!(validate_coord(coord! { x: -150.0, y: 65.0 }, 0, true).is_ok());
/// assert!(matches!(
///     validate_coord(coord! { x: 200.0, y: 65.0 }, 3, true),
///     Err(SkipReason::OutOfRange { index: 3, .. })
/// ));
/// // Projected coordinates pass when the geographic check is off
/// assert!(validate_coord(coord! { x: -3_000_000.0, y: 4_000_000.0 }, 0, false).is_ok());
/// ```
pub fn validate_coord(
    coord: Coord<f64>,
    index: usize,
    geographic: bool,
) -> std::result::Result<(), SkipReason> {
    if !coord.x.is_finite() || !coord.y.is_finite() {
        return Err(SkipReason::NonFiniteCoordinate { index });
    }

    if geographic && (!(-180.0..=180.0).contains(&coord.x) || !(-90.0..=90.0).contains(&coord.y))
    {
        return Err(SkipReason::OutOfRange {
            index,
            x: coord.x,
            y: coord.y,
        });
    }

    Ok(())
}

/// Validates a cell or drawn polygon: non-empty, closed rings with at least
/// four vertices, all vertices valid.
pub fn validate_polygon(
    polygon: &Polygon<f64>,
    geographic: bool,
) -> std::result::Result<(), SkipReason> {
    if polygon.exterior().0.is_empty() {
        return Err(SkipReason::EmptyGeometry);
    }

    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());
    let mut index = 0;
    for (ring_idx, ring) in rings.enumerate() {
        if ring.0.len() < 4 {
            return Err(SkipReason::DegenerateRing {
                ring: ring_idx,
                len: ring.0.len(),
            });
        }
        for coord in &ring.0 {
            validate_coord(*coord, index, geographic)?;
            index += 1;
        }
    }

    Ok(())
}

/// Validates a record footprint.
pub fn validate_footprint(
    footprint: &Footprint,
    geographic: bool,
) -> std::result::Result<(), SkipReason> {
    if footprint.is_empty() {
        return Err(SkipReason::EmptyGeometry);
    }

    match footprint {
        Footprint::Rect(_) => {
            for (index, coord) in footprint.coords().into_iter().enumerate() {
                validate_coord(coord, index, geographic)?;
            }
            Ok(())
        }
        Footprint::Polygon(polygon) => validate_polygon(polygon, geographic),
        Footprint::MultiPolygon(multi) => {
            for polygon in multi.0.iter().filter(|p| !p.exterior().0.is_empty()) {
                validate_polygon(polygon, geographic)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Rect, coord, polygon};

    fn square() -> Polygon<f64> {
        polygon![
            (x: -150.0, y: 60.0),
            (x: -140.0, y: 60.0),
            (x: -140.0, y: 70.0),
            (x: -150.0, y: 70.0),
            (x: -150.0, y: 60.0),
        ]
    }

    #[test]
    fn test_valid_polygon() {
        assert!(validate_polygon(&square(), true).is_ok());
    }

    #[test]
    fn test_polar_edges_are_valid() {
        assert!(validate_coord(coord! { x: 180.0, y: 90.0 }, 0, true).is_ok());
        assert!(validate_coord(coord! { x: -180.0, y: -90.0 }, 0, true).is_ok());
    }

    #[test]
    fn test_non_finite_coordinates() {
        assert_eq!(
            validate_coord(coord! { x: f64::NAN, y: 0.0 }, 2, false),
            Err(SkipReason::NonFiniteCoordinate { index: 2 })
        );
        assert!(validate_coord(coord! { x: 0.0, y: f64::INFINITY }, 0, false).is_err());
    }

    #[test]
    fn test_invalid_latitude() {
        assert!(validate_coord(coord! { x: -74.0, y: 95.0 }, 0, true).is_err());
        assert!(validate_coord(coord! { x: -74.0, y: -90.1 }, 0, true).is_err());
    }

    #[test]
    fn test_degenerate_ring() {
        let line = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        );
        assert_eq!(
            validate_polygon(&line, true),
            Err(SkipReason::DegenerateRing { ring: 0, len: 3 })
        );
    }

    #[test]
    fn test_empty_polygon() {
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        assert_eq!(validate_polygon(&empty, true), Err(SkipReason::EmptyGeometry));
    }

    #[test]
    fn test_footprint_with_bad_vertex() {
        let rect = Rect::new(coord! { x: -150.0, y: 60.0 }, coord! { x: 999.0, y: 70.0 });
        assert!(matches!(
            validate_footprint(&Footprint::Rect(rect), true),
            Err(SkipReason::OutOfRange { .. })
        ));
        assert!(validate_footprint(&Footprint::Rect(rect), false).is_ok());
    }

    #[test]
    fn test_multi_polygon_footprint() {
        let multi = MultiPolygon::new(vec![square()]);
        assert!(validate_footprint(&Footprint::MultiPolygon(multi), true).is_ok());

        let empty = MultiPolygon::<f64>::new(vec![]);
        assert_eq!(
            validate_footprint(&Footprint::MultiPolygon(empty), true),
            Err(SkipReason::EmptyGeometry)
        );
    }

    #[test]
    fn test_skip_list_aggregates() {
        let mut skips = SkipList::new();
        skips.push(EntityKind::Cell, 0, Some("Bh01v01"), SkipReason::EmptyGeometry);
        skips.push(
            EntityKind::Record(RecordKind::Granule),
            4,
            None,
            SkipReason::MissingId,
        );

        assert_eq!(skips.len(), 2);
        assert!(skips.contains_id(EntityKind::Cell, "Bh01v01"));
        assert!(!skips.contains_id(EntityKind::Record(RecordKind::Dataset), "Bh01v01"));
        assert_eq!(
            skips
                .for_entity(EntityKind::Record(RecordKind::Granule))
                .count(),
            1
        );
    }
}
