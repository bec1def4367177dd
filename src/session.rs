//! Browsing state for one user: the selected cells, the active level and
//! the table being shown.
//!
//! Each interaction is a plain method call that returns everything the map
//! and the tables need to redraw.

use crate::catalog::Catalog;
use crate::selection::Selection;
use crate::spatial::{DisplayFootprint, bounds_of, union_of_footprints};
use abovegrid_types::cell::{CellId, TilingLevel};
use abovegrid_types::record::{Record, RecordId, RecordKind};
use geo::Rect;

/// What to show after an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResult<'a> {
    pub kind: RecordKind,
    pub level: TilingLevel,
    pub selection: Selection,
    /// Rows of the active table, in table order.
    pub records: Vec<&'a Record>,
    /// Outline of the selected cells, for centering the map.
    pub display: Option<DisplayFootprint>,
    /// Suggested map zoom, set only by interactions that re-center the map.
    pub zoom: Option<u8>,
}

impl BrowseResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Footprints of records picked in a table, ready for highlighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight<'a> {
    pub records: Vec<&'a Record>,
    pub display: Option<DisplayFootprint>,
    /// Box around every picked footprint.
    pub bounds: Option<Rect<f64>>,
}

/// Per-user interaction state over a shared [`Catalog`].
#[derive(Debug, Clone)]
pub struct Session<'a> {
    catalog: &'a Catalog,
    level: TilingLevel,
    kind: RecordKind,
    selection: Selection,
}

impl<'a> Session<'a> {
    /// Start at the configured level, showing datasets, with nothing selected.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            level: catalog.config().active_level,
            kind: RecordKind::Dataset,
            selection: Selection::new(),
        }
    }

    pub fn with_level(mut self, level: TilingLevel) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> TilingLevel {
        self.level
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Switch tiling level. Selected cell ids belong to the old level, so the
    /// selection is cleared.
    pub fn set_level(&mut self, level: TilingLevel) -> BrowseResult<'a> {
        if level != self.level {
            self.level = level;
            self.selection.clear();
        }
        self.current(None)
    }

    /// Replace the selection with one clicked cell.
    ///
    /// A cell that does not exist at the active level leaves the selection
    /// empty.
    pub fn click_cell(&mut self, id: &CellId) -> BrowseResult<'a> {
        self.selection = if self.has_cell(id) {
            Selection::single(id.clone())
        } else {
            log::debug!("Clicked unknown {} cell '{}'", self.level, id);
            Selection::new()
        };
        self.current(Some(self.catalog.config().cell_zoom))
    }

    /// Add or remove one cell, keeping the rest of the selection.
    pub fn toggle_cell(&mut self, id: &CellId) -> BrowseResult<'a> {
        if self.has_cell(id) {
            self.selection.toggle(id.clone());
        } else {
            log::debug!("Toggled unknown {} cell '{}'", self.level, id);
        }
        self.current(None)
    }

    /// Replace the selection with every cell the drawn shape touches.
    pub fn draw(&mut self, drawn: &geo::Geometry<f64>) -> BrowseResult<'a> {
        self.selection = self.catalog.select_by_geometry(drawn, self.level);
        self.current(Some(self.catalog.config().draw_zoom))
    }

    /// Show the other table for the same selection.
    pub fn set_kind(&mut self, kind: RecordKind) -> BrowseResult<'a> {
        self.kind = kind;
        self.current(None)
    }

    pub fn clear(&mut self) -> BrowseResult<'a> {
        self.selection.clear();
        self.current(None)
    }

    /// Re-resolve the current selection without changing anything.
    pub fn refresh(&self) -> BrowseResult<'a> {
        self.current(None)
    }

    /// Open a dataset: switch to the granule table and list that dataset's
    /// granules instead of the grid lookup.
    pub fn select_dataset(&mut self, short_name: &str) -> BrowseResult<'a> {
        let catalog = self.catalog;
        self.kind = RecordKind::Granule;

        let records = catalog.granules_for_dataset(short_name);
        let display = union_of_footprints(records.iter().map(|record| &record.footprint));

        BrowseResult {
            kind: self.kind,
            level: self.level,
            selection: self.selection.clone(),
            records,
            display,
            zoom: None,
        }
    }

    /// Union, centroid and bounds of the picked records of the active kind.
    pub fn highlight<'i, I>(&self, ids: I) -> Highlight<'a>
    where
        I: IntoIterator<Item = &'i RecordId>,
    {
        let catalog = self.catalog;
        let records = catalog.records_by_id(self.kind, ids);
        let footprints: Vec<_> = records.iter().map(|record| &record.footprint).collect();

        Highlight {
            display: union_of_footprints(footprints.iter().copied()),
            bounds: bounds_of(footprints.iter().copied()),
            records,
        }
    }

    fn has_cell(&self, id: &CellId) -> bool {
        self.catalog.tiling().get_at(self.level, id).is_some()
    }

    fn current(&self, zoom: Option<u8>) -> BrowseResult<'a> {
        let catalog = self.catalog;
        let resolved = catalog.resolve(self.level, &self.selection, self.kind);
        let display = resolved.display();

        BrowseResult {
            kind: self.kind,
            level: self.level,
            selection: self.selection.clone(),
            records: resolved.records,
            zoom: display.as_ref().and(zoom),
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::table::RecordTable;
    use crate::tiling::Tiling;
    use abovegrid_types::cell::Cell;
    use abovegrid_types::footprint::Footprint;
    use geo::{Geometry, coord};

    fn square(x: f64, y: f64) -> Rect<f64> {
        Rect::new(coord! { x: x, y: y }, coord! { x: x + 1.0, y: y + 1.0 })
    }

    /// A B in the bottom row, C D on top, datasets D1 in A and D2 in D.
    fn catalog() -> Catalog {
        let (tiling, _) = Tiling::from_cells(
            [("A", 0.0, 0.0), ("B", 1.0, 0.0), ("C", 0.0, 1.0), ("D", 1.0, 1.0)]
                .into_iter()
                .map(|(id, x, y)| Cell::new(id, TilingLevel::Medium, square(x, y).to_polygon())),
            true,
        );
        let inside = |x: f64, y: f64| {
            Footprint::Rect(Rect::new(
                coord! { x: x + 0.25, y: y + 0.25 },
                coord! { x: x + 0.75, y: y + 0.75 },
            ))
        };
        let (datasets, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                Record::new("D1", RecordKind::Dataset, inside(0.0, 0.0)).with_short_name("fires"),
                Record::new("D2", RecordKind::Dataset, inside(1.0, 1.0)).with_short_name("lakes"),
            ],
        );
        let (granules, _) = RecordTable::from_records(
            RecordKind::Granule,
            [
                Record::new("G1", RecordKind::Granule, inside(0.0, 0.0)).with_parent("fires"),
                Record::new("G2", RecordKind::Granule, inside(1.0, 0.0)).with_parent("fires"),
                Record::new("G3", RecordKind::Granule, inside(1.0, 1.0)).with_parent("lakes"),
            ],
        );
        Catalog::new(Config::default(), tiling, datasets, granules).unwrap()
    }

    fn ids<'r>(result: &BrowseResult<'r>) -> Vec<&'r str> {
        result.records.iter().copied().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_click_replaces_selection() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);

        let first = session.click_cell(&CellId::from("A"));
        assert_eq!(ids(&first), ["D1"]);
        assert_eq!(first.zoom, Some(6));

        let second = session.click_cell(&CellId::from("D"));
        assert_eq!(ids(&second), ["D2"]);
        assert_eq!(session.selection().len(), 1);
    }

    #[test]
    fn test_click_unknown_cell() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);
        let result = session.click_cell(&CellId::from("Z"));

        assert!(result.is_empty());
        assert!(result.display.is_none());
        assert_eq!(result.zoom, None);
    }

    #[test]
    fn test_toggle_accumulates() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);

        session.toggle_cell(&CellId::from("A"));
        let both = session.toggle_cell(&CellId::from("D"));
        assert_eq!(ids(&both), ["D1", "D2"]);
        assert_eq!(both.zoom, None);

        let one = session.toggle_cell(&CellId::from("A"));
        assert_eq!(ids(&one), ["D2"]);
    }

    #[test]
    fn test_draw_and_switch_kind() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);

        let drawn = Geometry::Rect(Rect::new(
            coord! { x: 0.5, y: 0.2 },
            coord! { x: 1.5, y: 0.8 },
        ));
        let result = session.draw(&drawn);
        assert_eq!(ids(&result), ["D1"]);
        assert_eq!(result.zoom, Some(4));
        assert_eq!(result.selection.len(), 2);

        let granules = session.set_kind(RecordKind::Granule);
        assert_eq!(ids(&granules), ["G1", "G2"]);
        assert_eq!(granules.selection, result.selection);
    }

    #[test]
    fn test_select_dataset_lists_granules() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);
        session.click_cell(&CellId::from("D"));

        let result = session.select_dataset("fires");
        assert_eq!(session.kind(), RecordKind::Granule);
        assert_eq!(ids(&result), ["G1", "G2"]);
        assert!(result.display.is_some());
    }

    #[test]
    fn test_highlight_granules() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);
        session.set_kind(RecordKind::Granule);

        let picked = [RecordId::from("G3"), RecordId::from("G1")];
        let highlight = session.highlight(&picked);

        assert_eq!(highlight.records.len(), 2);
        assert_eq!(
            highlight.bounds,
            Some(Rect::new(coord! { x: 0.25, y: 0.25 }, coord! { x: 1.75, y: 1.75 }))
        );
        let centroid = highlight.display.unwrap().centroid;
        assert!((centroid.x() - 1.0).abs() < 1e-9);
        assert!((centroid.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_switch_clears_selection() {
        let catalog = catalog();
        let mut session = Session::new(&catalog);
        session.click_cell(&CellId::from("A"));

        let result = session.set_level(TilingLevel::Fine);
        assert!(result.selection.is_empty());
        assert!(result.is_empty());
    }
}
