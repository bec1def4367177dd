//! Precomputed cell-to-record mapping.
//!
//! For every tiling level the index stores, per cell, the table rows of the
//! datasets and granules whose footprint intersects the cell. Building it
//! costs one R-tree pass per level; a lookup afterwards is a hash probe per
//! requested cell plus a merge of the row lists.

use crate::compute::validation::{EntityKind, SkipList, validate_footprint};
use crate::table::RecordTable;
use crate::tiling::Tiling;
use abovegrid_types::cell::{Cell, CellId, TilingLevel};
use abovegrid_types::footprint::Footprint;
use abovegrid_types::record::RecordKind;
use geo::CoordsIter;
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};

/// A cell's envelope in the build-time R-tree.
struct CellEnvelope {
    slot: usize,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Row lists of one tiling level. Every cell of the level has an entry in
/// both maps, possibly empty. Row lists are sorted ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LevelIndex {
    pub(crate) datasets: FxHashMap<CellId, Vec<usize>>,
    pub(crate) granules: FxHashMap<CellId, Vec<usize>>,
}

impl LevelIndex {
    pub(crate) fn rows(&self, kind: RecordKind) -> &FxHashMap<CellId, Vec<usize>> {
        match kind {
            RecordKind::Dataset => &self.datasets,
            RecordKind::Granule => &self.granules,
        }
    }

    pub(crate) fn rows_mut(&mut self, kind: RecordKind) -> &mut FxHashMap<CellId, Vec<usize>> {
        match kind {
            RecordKind::Dataset => &mut self.datasets,
            RecordKind::Granule => &mut self.granules,
        }
    }
}

/// Result of an index lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    /// Matching table rows, ascending and free of duplicates.
    pub rows: Vec<usize>,
    /// Requested cells that exist at the level, in request order, each once.
    pub found: Vec<CellId>,
}

/// Mapping from (level, cell) to intersecting record rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridIndex {
    pub(crate) levels: FxHashMap<TilingLevel, LevelIndex>,
}

impl GridIndex {
    /// Build the index for both record tables.
    ///
    /// Records whose footprint fails validation stay in their table but are
    /// not indexed; they are listed in the returned [`SkipList`].
    pub fn build(tiling: &Tiling, datasets: &RecordTable, granules: &RecordTable) -> (Self, SkipList) {
        let mut skipped = SkipList::new();
        let geographic = tiling.is_geographic();

        let dataset_rows = indexable_rows(datasets, geographic, &mut skipped);
        let granule_rows = indexable_rows(granules, geographic, &mut skipped);

        let mut index = GridIndex::default();

        for level in tiling.levels() {
            let cells: Vec<&Cell> = tiling.cells_at(level).collect();
            let envelopes: Vec<CellEnvelope> = cells
                .iter()
                .enumerate()
                .filter_map(|(slot, cell)| {
                    let rect = geo::BoundingRect::bounding_rect(&cell.polygon)?;
                    Some(CellEnvelope {
                        slot,
                        min_x: rect.min().x,
                        min_y: rect.min().y,
                        max_x: rect.max().x,
                        max_y: rect.max().y,
                    })
                })
                .collect();
            let tree = RTree::bulk_load(envelopes);

            let mut level_index = LevelIndex::default();
            for cell in &cells {
                level_index.datasets.insert(cell.id.clone(), Vec::new());
                level_index.granules.insert(cell.id.clone(), Vec::new());
            }

            for (table, rows) in [(datasets, &dataset_rows), (granules, &granule_rows)] {
                let map = level_index.rows_mut(table.kind());
                for (row, envelope) in rows.iter() {
                    let footprint = &table.records()[*row].footprint;
                    for candidate in tree.locate_in_envelope_intersecting(envelope) {
                        let cell = cells[candidate.slot];
                        if footprint.intersects_polygon(&cell.polygon) {
                            if let Some(list) = map.get_mut(&cell.id) {
                                list.push(*row);
                            }
                        }
                    }
                }
            }

            log::debug!("Indexed {} cells at {} level", cells.len(), level);
            index.levels.insert(level, level_index);
        }

        log::info!(
            "Built grid index over {} cells, {} datasets and {} granules",
            tiling.len(),
            dataset_rows.len(),
            granule_rows.len()
        );

        (index, skipped)
    }

    /// Rows of `kind` intersecting any of `cell_ids` at `level`.
    ///
    /// Ids that name no cell at `level` contribute nothing.
    pub fn lookup<'a, I>(&self, level: TilingLevel, kind: RecordKind, cell_ids: I) -> Lookup
    where
        I: IntoIterator<Item = &'a CellId>,
    {
        let mut lookup = Lookup::default();
        let Some(level_index) = self.levels.get(&level) else {
            return lookup;
        };
        let map = level_index.rows(kind);
        let mut seen = FxHashSet::default();

        for id in cell_ids {
            match map.get(id) {
                Some(rows) => {
                    if seen.insert(id) {
                        lookup.found.push(id.clone());
                        lookup.rows.extend_from_slice(rows);
                    }
                }
                None => log::debug!("No {} cell '{}', ignoring", level, id),
            }
        }

        lookup.rows.sort_unstable();
        lookup.rows.dedup();
        lookup
    }

    /// Rows of `kind` intersecting one cell, or `None` for an unknown cell.
    pub fn rows_for(&self, level: TilingLevel, kind: RecordKind, cell_id: &CellId) -> Option<&[usize]> {
        self.levels
            .get(&level)
            .and_then(|level_index| level_index.rows(kind).get(cell_id))
            .map(Vec::as_slice)
    }

    /// Number of cells indexed at `level`.
    pub fn cell_count(&self, level: TilingLevel) -> usize {
        self.levels
            .get(&level)
            .map_or(0, |level_index| level_index.datasets.len())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|level_index| level_index.datasets.is_empty())
    }
}

/// The skips [`GridIndex::build`] would report, without building anything.
#[cfg(feature = "snapshot")]
pub(crate) fn footprint_report(tiling: &Tiling, datasets: &RecordTable, granules: &RecordTable) -> SkipList {
    let mut skipped = SkipList::new();
    indexable_rows(datasets, tiling.is_geographic(), &mut skipped);
    indexable_rows(granules, tiling.is_geographic(), &mut skipped);
    skipped
}

/// Rows with a valid footprint, paired with the footprint's envelope.
fn indexable_rows(
    table: &RecordTable,
    geographic: bool,
    skipped: &mut SkipList,
) -> Vec<(usize, AABB<[f64; 2]>)> {
    let entity = EntityKind::Record(table.kind());
    let mut rows = Vec::with_capacity(table.len());

    for (row, record) in table.iter().enumerate() {
        if let Err(reason) = validate_footprint(&record.footprint, geographic) {
            skipped.push(entity, row, Some(record.id.as_str()), reason);
            continue;
        }
        let Some(rect) = record.footprint.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        rows.push((row, envelope));
    }

    rows
}

/// Hash of everything the index depends on.
///
/// Two inputs with the same fingerprint produce the same index, so a stored
/// index can be reused when the fingerprint still matches.
pub fn fingerprint(tiling: &Tiling, datasets: &RecordTable, granules: &RecordTable) -> u64 {
    let mut hasher = FxHasher::default();

    tiling.is_geographic().hash(&mut hasher);
    tiling.len().hash(&mut hasher);
    for cell in tiling.cells() {
        cell.id.hash(&mut hasher);
        cell.level.hash(&mut hasher);
        for coord in cell.polygon.coords_iter() {
            coord.x.to_bits().hash(&mut hasher);
            coord.y.to_bits().hash(&mut hasher);
        }
    }

    for table in [datasets, granules] {
        table.kind().hash(&mut hasher);
        table.len().hash(&mut hasher);
        for record in table.iter() {
            record.id.hash(&mut hasher);
            hash_footprint(&record.footprint, &mut hasher);
        }
    }

    hasher.finish()
}

fn hash_footprint(footprint: &Footprint, hasher: &mut FxHasher) {
    let tag: u8 = match footprint {
        Footprint::Rect(_) => 0,
        Footprint::Polygon(_) => 1,
        Footprint::MultiPolygon(_) => 2,
    };
    tag.hash(hasher);
    for coord in footprint.coords() {
        coord.x.to_bits().hash(hasher);
        coord.y.to_bits().hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abovegrid_types::record::Record;
    use geo::{Rect, coord};

    fn cell(id: &str, level: TilingLevel, x: f64, y: f64) -> Cell {
        let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + 1.0, y: y + 1.0 });
        Cell::new(id, level, rect.to_polygon())
    }

    fn record(id: &str, kind: RecordKind, min: (f64, f64), max: (f64, f64)) -> Record {
        Record::new(
            id,
            kind,
            Footprint::Rect(Rect::new(
                coord! { x: min.0, y: min.1 },
                coord! { x: max.0, y: max.1 },
            )),
        )
    }

    /// Four cells in a row: A [0,1], B [1,2], C [2,3], D [3,4].
    fn fixture() -> (Tiling, RecordTable, RecordTable) {
        let (tiling, _) = Tiling::from_cells(
            [
                cell("A", TilingLevel::Medium, 0.0, 0.0),
                cell("B", TilingLevel::Medium, 1.0, 0.0),
                cell("C", TilingLevel::Medium, 2.0, 0.0),
                cell("D", TilingLevel::Medium, 3.0, 0.0),
                cell("big", TilingLevel::Coarse, 0.0, 0.0),
            ],
            true,
        );
        let (datasets, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                record("R1", RecordKind::Dataset, (0.2, 0.2), (1.8, 0.8)),
                record("R2", RecordKind::Dataset, (2.2, 0.2), (2.8, 0.8)),
            ],
        );
        let (granules, _) = RecordTable::from_records(
            RecordKind::Granule,
            [record("G1", RecordKind::Granule, (3.2, 0.2), (3.4, 0.4))],
        );
        (tiling, datasets, granules)
    }

    fn ids(cells: &[&str]) -> Vec<CellId> {
        cells.iter().map(|id| CellId::from(*id)).collect()
    }

    #[test]
    fn test_lookup_rows() {
        let (tiling, datasets, granules) = fixture();
        let (index, skipped) = GridIndex::build(&tiling, &datasets, &granules);
        assert!(skipped.is_empty());

        let medium = TilingLevel::Medium;
        assert_eq!(index.lookup(medium, RecordKind::Dataset, &ids(&["A"])).rows, [0]);
        assert_eq!(index.lookup(medium, RecordKind::Dataset, &ids(&["C", "A"])).rows, [0, 1]);
        assert!(index.lookup(medium, RecordKind::Dataset, &ids(&["D"])).rows.is_empty());
        assert_eq!(index.lookup(medium, RecordKind::Granule, &ids(&["D"])).rows, [0]);
    }

    #[test]
    fn test_lookup_found_cells() {
        let (tiling, datasets, granules) = fixture();
        let (index, _) = GridIndex::build(&tiling, &datasets, &granules);

        let lookup = index.lookup(
            TilingLevel::Medium,
            RecordKind::Dataset,
            &ids(&["B", "nope", "A", "B", "big"]),
        );
        assert_eq!(lookup.found, ids(&["B", "A"]));
        assert_eq!(lookup.rows, [0]);
    }

    #[test]
    fn test_every_cell_has_an_entry() {
        let (tiling, datasets, granules) = fixture();
        let (index, _) = GridIndex::build(&tiling, &datasets, &granules);

        assert_eq!(index.cell_count(TilingLevel::Medium), 4);
        assert_eq!(
            index.rows_for(TilingLevel::Medium, RecordKind::Granule, &CellId::from("A")),
            Some(&[][..])
        );
        assert_eq!(
            index.rows_for(TilingLevel::Coarse, RecordKind::Dataset, &CellId::from("big")),
            Some(&[0][..])
        );
        assert!(index.rows_for(TilingLevel::Fine, RecordKind::Dataset, &CellId::from("A")).is_none());
    }

    #[test]
    fn test_touching_footprint_is_indexed() {
        let (tiling, _, granules) = fixture();
        let (datasets, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [record("edge", RecordKind::Dataset, (4.0, 0.0), (5.0, 1.0))],
        );
        let (index, _) = GridIndex::build(&tiling, &datasets, &granules);
        assert_eq!(index.lookup(TilingLevel::Medium, RecordKind::Dataset, &ids(&["D"])).rows, [0]);
        assert!(index.lookup(TilingLevel::Medium, RecordKind::Dataset, &ids(&["C"])).rows.is_empty());
    }

    #[test]
    fn test_invalid_footprint_not_indexed() {
        let (tiling, _, granules) = fixture();
        let (datasets, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                record("far", RecordKind::Dataset, (0.0, 0.0), (500.0, 1.0)),
                record("ok", RecordKind::Dataset, (0.0, 0.0), (1.0, 1.0)),
            ],
        );
        let (index, skipped) = GridIndex::build(&tiling, &datasets, &granules);

        assert!(skipped.contains_id(EntityKind::Record(RecordKind::Dataset), "far"));
        assert_eq!(index.lookup(TilingLevel::Medium, RecordKind::Dataset, &ids(&["A"])).rows, [1]);
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let (tiling, datasets, granules) = fixture();
        let before = fingerprint(&tiling, &datasets, &granules);
        assert_eq!(before, fingerprint(&tiling, &datasets, &granules));

        let (moved, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                record("R1", RecordKind::Dataset, (0.2, 0.2), (1.8, 0.8)),
                record("R2", RecordKind::Dataset, (2.2, 0.2), (2.9, 0.8)),
            ],
        );
        assert_ne!(before, fingerprint(&tiling, &moved, &granules));
    }
}
