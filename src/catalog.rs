//! The loaded catalog: tiling, record tables and the index between them.

use crate::builder::CatalogBuilder;
use crate::compute::validation::SkipList;
use crate::config::Config;
use crate::error::{GridError, Result};
use crate::index::GridIndex;
use crate::selection::Selection;
use crate::spatial::{DisplayFootprint, union_footprint};
use crate::table::RecordTable;
use crate::tiling::Tiling;
use abovegrid_types::cell::{Cell, CellId, TilingLevel};
use abovegrid_types::record::{Record, RecordId, RecordKind};
use geo::Polygon;

/// Records and cell outlines for a set of selected cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub kind: RecordKind,
    /// Matching records in table order, each once.
    pub records: Vec<&'a Record>,
    /// Outlines of the selected cells that exist at the level, in request
    /// order, each once.
    pub cell_geometries: Vec<&'a Polygon<f64>>,
}

impl<'a> Resolved<'a> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.cell_geometries.is_empty()
    }

    /// Union of the selected cells with its centroid and bounds.
    pub fn display(&self) -> Option<DisplayFootprint> {
        union_footprint(self.cell_geometries.iter().copied())
    }

    pub fn record_ids(&self) -> Vec<&'a RecordId> {
        self.records.iter().map(|record| &record.id).collect()
    }
}

/// Immutable catalog shared by every browsing session.
///
/// Build one with [`CatalogBuilder`], or with [`Catalog::new`] from parts
/// already in memory.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: Config,
    tiling: Tiling,
    datasets: RecordTable,
    granules: RecordTable,
    index: GridIndex,
    report: SkipList,
}

impl Catalog {
    /// Index the tables against the tiling.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidConfig`] for an invalid configuration and
    /// [`GridError::InvalidInput`] when a table holds the wrong record kind.
    pub fn new(config: Config, tiling: Tiling, datasets: RecordTable, granules: RecordTable) -> Result<Self> {
        config.validate().map_err(GridError::InvalidConfig)?;
        check_kind(&datasets, RecordKind::Dataset)?;
        check_kind(&granules, RecordKind::Granule)?;

        let (index, report) = GridIndex::build(&tiling, &datasets, &granules);
        Ok(Self::from_parts(config, tiling, datasets, granules, index, report))
    }

    pub(crate) fn from_parts(
        config: Config,
        tiling: Tiling,
        datasets: RecordTable,
        granules: RecordTable,
        index: GridIndex,
        report: SkipList,
    ) -> Self {
        Self {
            config,
            tiling,
            datasets,
            granules,
            index,
            report,
        }
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Records of `kind` whose footprint intersects any of the given cells.
    ///
    /// Unknown ids, and ids of cells at another level, are ignored. The
    /// result does not depend on the order or repetition of `cell_ids`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abovegrid::{Catalog, Cell, CellId, Config, Footprint, Record, RecordKind, RecordTable, Tiling, TilingLevel};
    /// use geo::{Rect, coord};
    ///
    /// let square = |x: f64| Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
    /// let (tiling, _) = Tiling::from_cells(
    ///     ["A", "B", "C"].iter().enumerate().map(|(i, id)| {
    ///         Cell::new(*id, TilingLevel::Medium, square(i as f64).to_polygon())
    ///     }),
    ///     true,
    /// );
    /// let (datasets, _) = RecordTable::from_records(
    ///     RecordKind::Dataset,
    ///     [Record::new("R1", RecordKind::Dataset, Footprint::Rect(square(0.5)))],
    /// );
    /// let granules = RecordTable::new(RecordKind::Granule);
    /// let catalog = Catalog::new(Config::default(), tiling, datasets, granules).unwrap();
    ///
    /// let hit = catalog.resolve(TilingLevel::Medium, &[CellId::from("B")], RecordKind::Dataset);
    /// assert_eq!(hit.records[0].id.as_str(), "R1");
    ///
    /// let miss = catalog.resolve(TilingLevel::Medium, &[CellId::from("C")], RecordKind::Dataset);
    /// assert!(miss.records.is_empty());
    /// ```
    pub fn resolve<'a, I>(&self, level: TilingLevel, cell_ids: I, kind: RecordKind) -> Resolved<'_>
    where
        I: IntoIterator<Item = &'a CellId>,
    {
        let lookup = self.index.lookup(level, kind, cell_ids);
        let table = self.table(kind);

        let records = lookup
            .rows
            .iter()
            .filter_map(|&row| table.get(row))
            .collect();
        let cell_geometries = lookup
            .found
            .iter()
            .filter_map(|id| self.tiling.get_at(level, id))
            .map(|cell| &cell.polygon)
            .collect();

        Resolved {
            kind,
            records,
            cell_geometries,
        }
    }

    /// Cells at `level` touched by a drawn shape. See [`Tiling::select_by_geometry`].
    pub fn select_by_geometry(&self, drawn: &geo::Geometry<f64>, level: TilingLevel) -> Selection {
        self.tiling.select_by_geometry(drawn, level)
    }

    /// Granules belonging to the dataset with this short name, in table order.
    pub fn granules_for_dataset(&self, short_name: &str) -> Vec<&Record> {
        self.granules.children_of(short_name)
    }

    /// Records of `kind` with the given ids, in table order. Unknown ids are
    /// skipped.
    pub fn records_by_id<'a, I>(&self, kind: RecordKind, ids: I) -> Vec<&Record>
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        self.table(kind).select(ids)
    }

    pub fn table(&self, kind: RecordKind) -> &RecordTable {
        match kind {
            RecordKind::Dataset => &self.datasets,
            RecordKind::Granule => &self.granules,
        }
    }

    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.tiling.get(id)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tiling(&self) -> &Tiling {
        &self.tiling
    }

    pub fn index(&self) -> &GridIndex {
        &self.index
    }

    /// Every cell and record left out while loading and indexing.
    pub fn report(&self) -> &SkipList {
        &self.report
    }
}

fn check_kind(table: &RecordTable, expected: RecordKind) -> Result<()> {
    if table.kind() != expected {
        return Err(GridError::InvalidInput(format!(
            "expected a {} table, got a {} table",
            expected,
            table.kind()
        )));
    }
    Ok(())
}
