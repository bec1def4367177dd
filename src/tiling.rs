//! The grid tiling: named cells at one or more levels.

use crate::compute::validation::{EntityKind, SkipList, SkipReason, validate_polygon};
use crate::selection::Selection;
use abovegrid_types::cell::{Cell, CellId, TilingLevel};
use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Rect, Translate, coord};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Ordered cells of a tiling, looked up by id or scanned per level.
///
/// Cell ids are unique across all levels. Cells keep their input order, which
/// is also the scan order of [`Tiling::select_by_geometry`].
#[derive(Debug, Clone, Default)]
pub struct Tiling {
    cells: Vec<Cell>,
    by_id: FxHashMap<CellId, usize>,
    by_level: BTreeMap<TilingLevel, Vec<usize>>,
    geographic: bool,
}

impl Tiling {
    /// Create an empty tiling. With `geographic` set, cell vertices must be
    /// valid lon/lat.
    pub fn new(geographic: bool) -> Self {
        Self {
            geographic,
            ..Self::default()
        }
    }

    /// Build a tiling from in-memory cells, skipping invalid or duplicate ones.
    pub fn from_cells<I>(cells: I, geographic: bool) -> (Self, SkipList)
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut tiling = Self::new(geographic);
        let mut skipped = SkipList::new();
        for (position, cell) in cells.into_iter().enumerate() {
            tiling.insert(position, cell, &mut skipped);
        }
        (tiling, skipped)
    }

    /// Add one cell, or record why it was left out.
    pub(crate) fn insert(&mut self, position: usize, cell: Cell, skipped: &mut SkipList) {
        let id = cell.id.as_str();

        if id.trim().is_empty() {
            skipped.push(EntityKind::Cell, position, None, SkipReason::MissingId);
            return;
        }

        if self.by_id.contains_key(&cell.id) {
            skipped.push(EntityKind::Cell, position, Some(id), SkipReason::DuplicateId);
            return;
        }

        if let Err(reason) = validate_polygon(&cell.polygon, self.geographic) {
            skipped.push(EntityKind::Cell, position, Some(id), reason);
            return;
        }

        let slot = self.cells.len();
        self.by_id.insert(cell.id.clone(), slot);
        self.by_level.entry(cell.level).or_default().push(slot);
        self.cells.push(cell);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Levels that have at least one cell.
    pub fn levels(&self) -> impl Iterator<Item = TilingLevel> + '_ {
        self.by_level.keys().copied()
    }

    pub fn get(&self, id: &CellId) -> Option<&Cell> {
        self.by_id.get(id).map(|&slot| &self.cells[slot])
    }

    /// The cell with this id, only if it belongs to `level`.
    pub fn get_at(&self, level: TilingLevel, id: &CellId) -> Option<&Cell> {
        self.get(id).filter(|cell| cell.level == level)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn cells_at(&self, level: TilingLevel) -> impl Iterator<Item = &Cell> {
        self.by_level
            .get(&level)
            .into_iter()
            .flatten()
            .map(move |&slot| &self.cells[slot])
    }

    /// Ids of every cell at `level` that the drawn shape touches or overlaps.
    ///
    /// Map draw controls produce polygons and rectangles, so those (plus
    /// multipolygons and triangles) are accepted. Anything else, an empty
    /// shape, or a shape with invalid vertices selects nothing. On a
    /// geographic tiling, longitudes past ±180° are wrapped around the
    /// antimeridian; latitudes past ±90° still select nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abovegrid::{Cell, Tiling, TilingLevel};
    /// use geo::{Geometry, Rect, coord};
    ///
    /// let cell = |id: &str, x: f64| {
    ///     let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
    ///     Cell::new(id, TilingLevel::Medium, rect.to_polygon())
    /// };
    /// let (tiling, _) = Tiling::from_cells([cell("A", 0.0), cell("B", 1.0), cell("C", 2.0)], true);
    ///
    /// let drawn = Geometry::Rect(Rect::new(coord! { x: 0.2, y: 0.2 }, coord! { x: 1.5, y: 0.8 }));
    /// let selection = tiling.select_by_geometry(&drawn, TilingLevel::Medium);
    /// let ids: Vec<&str> = selection.iter().map(|id| id.as_str()).collect();
    /// assert_eq!(ids, ["A", "B"]);
    /// ```
    pub fn select_by_geometry(&self, drawn: &geo::Geometry<f64>, level: TilingLevel) -> Selection {
        let Some(shape) = self.drawn_area(drawn) else {
            return Selection::new();
        };

        self.cells_at(level)
            .filter(|cell| shape.intersects(&cell.polygon))
            .map(|cell| cell.id.clone())
            .collect()
    }

    fn drawn_area(&self, drawn: &geo::Geometry<f64>) -> Option<MultiPolygon<f64>> {
        let shape = match drawn {
            geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            geo::Geometry::MultiPolygon(multi) => multi.clone(),
            geo::Geometry::Rect(rect) => MultiPolygon::new(vec![rect.to_polygon()]),
            geo::Geometry::Triangle(triangle) => MultiPolygon::new(vec![triangle.to_polygon()]),
            _ => {
                log::debug!("Ignoring drawn geometry that is not an area");
                return None;
            }
        };

        if shape.0.is_empty() {
            log::debug!("Ignoring empty drawn geometry");
            return None;
        }

        for polygon in &shape.0 {
            if let Err(reason) = validate_polygon(polygon, false) {
                log::debug!("Ignoring invalid drawn geometry: {}", reason);
                return None;
            }
        }

        if !self.geographic {
            return Some(shape);
        }

        let bounds = shape.bounding_rect()?;
        if bounds.min().y < -90.0 || bounds.max().y > 90.0 {
            log::debug!("Ignoring drawn geometry beyond the poles");
            return None;
        }
        if bounds.min().x >= -180.0 && bounds.max().x <= 180.0 {
            return Some(shape);
        }

        let wrapped = wrap_longitudes(&shape);
        if wrapped.0.is_empty() {
            log::debug!("Ignoring drawn geometry with no area after wrapping");
            return None;
        }
        Some(wrapped)
    }
}

/// Fold parts of a shape drawn past the antimeridian (as a wrapped web map
/// reports them) back into [-180, 180].
fn wrap_longitudes(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let world = Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 }).to_polygon();

    [-360.0, 0.0, 360.0]
        .into_iter()
        .fold(MultiPolygon::new(vec![]), |wrapped, offset| {
            let part = shape.translate(offset, 0.0).intersection(&world);
            wrapped.union(&part)
        })
}
