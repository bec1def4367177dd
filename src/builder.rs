//! Catalog builder
//!
//! Collects the tiling and record table sources, loads them, and indexes
//! them into a [`Catalog`]. With a snapshot path the built index is cached
//! on disk and reused while the inputs stay the same.

use crate::catalog::Catalog;
use crate::compute::validation::SkipList;
use crate::config::Config;
use crate::error::{GridError, Result};
use crate::index::GridIndex;
#[cfg(feature = "snapshot")]
use crate::index::{fingerprint, footprint_report};
#[cfg(feature = "snapshot")]
use crate::storage::{IndexSnapshot, SnapshotFile};
use crate::table::RecordTable;
use crate::tiling::Tiling;
use abovegrid_types::cell::Cell;
use abovegrid_types::record::{Record, RecordKind};
use std::path::PathBuf;

#[derive(Debug)]
enum TilingSource {
    Cells(Vec<Cell>),
    #[cfg(feature = "geojson")]
    GeoJson(String),
    #[cfg(feature = "geojson")]
    GeoJsonFile(PathBuf),
}

#[derive(Debug)]
enum TableSource {
    Records(Vec<Record>),
    Json(String),
    JsonFile(PathBuf),
}

impl TableSource {
    fn load(self, kind: RecordKind) -> Result<(RecordTable, SkipList)> {
        match self {
            TableSource::Records(records) => Ok(RecordTable::from_records(kind, records)),
            TableSource::Json(text) => RecordTable::from_json(kind, &text),
            TableSource::JsonFile(path) => {
                let text = std::fs::read_to_string(&path)?;
                RecordTable::from_json(kind, &text)
            }
        }
    }
}

/// Builder for a [`Catalog`].
///
/// # Example
///
/// ```rust
/// use abovegrid::{CatalogBuilder, Cell, Config, TilingLevel};
/// use geo::{Rect, coord};
///
/// let cell = Cell::new(
///     "Bh05v03",
///     TilingLevel::Medium,
///     Rect::new(coord! { x: -150.0, y: 60.0 }, coord! { x: -140.0, y: 65.0 }).to_polygon(),
/// );
///
/// let catalog = CatalogBuilder::new()
///     .config(Config::default())
///     .cells([cell])
///     .datasets_json(r#"[{"id": "D1", "cmr_box": "61 -149 62 -148"}]"#)
///     .build()
///     .unwrap();
///
/// assert_eq!(catalog.table(abovegrid::RecordKind::Dataset).len(), 1);
/// assert!(catalog.report().is_empty());
/// ```
#[derive(Debug)]
pub struct CatalogBuilder {
    config: Config,
    tiling: Option<TilingSource>,
    datasets: Option<TableSource>,
    granules: Option<TableSource>,
    #[cfg(feature = "snapshot")]
    snapshot_path: Option<PathBuf>,
}

impl CatalogBuilder {
    /// Create a builder with the default configuration and no inputs.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            tiling: None,
            datasets: None,
            granules: None,
            #[cfg(feature = "snapshot")]
            snapshot_path: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use cells already in memory as the tiling.
    pub fn cells<I: IntoIterator<Item = Cell>>(mut self, cells: I) -> Self {
        self.tiling = Some(TilingSource::Cells(cells.into_iter().collect()));
        self
    }

    /// Load the tiling from a GeoJSON `FeatureCollection`.
    #[cfg(feature = "geojson")]
    pub fn tiling_geojson<S: Into<String>>(mut self, text: S) -> Self {
        self.tiling = Some(TilingSource::GeoJson(text.into()));
        self
    }

    /// Load the tiling from a GeoJSON file when the catalog is built.
    #[cfg(feature = "geojson")]
    pub fn tiling_geojson_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.tiling = Some(TilingSource::GeoJsonFile(path.into()));
        self
    }

    pub fn datasets<I: IntoIterator<Item = Record>>(mut self, records: I) -> Self {
        self.datasets = Some(TableSource::Records(records.into_iter().collect()));
        self
    }

    pub fn datasets_json<S: Into<String>>(mut self, text: S) -> Self {
        self.datasets = Some(TableSource::Json(text.into()));
        self
    }

    pub fn datasets_json_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.datasets = Some(TableSource::JsonFile(path.into()));
        self
    }

    pub fn granules<I: IntoIterator<Item = Record>>(mut self, records: I) -> Self {
        self.granules = Some(TableSource::Records(records.into_iter().collect()));
        self
    }

    pub fn granules_json<S: Into<String>>(mut self, text: S) -> Self {
        self.granules = Some(TableSource::Json(text.into()));
        self
    }

    pub fn granules_json_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.granules = Some(TableSource::JsonFile(path.into()));
        self
    }

    /// Cache the built index at `path`. An existing snapshot built from the
    /// same inputs is loaded instead of rebuilding. A snapshot that cannot be
    /// read or written is logged and ignored.
    #[cfg(feature = "snapshot")]
    pub fn snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Load every input and index it.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a missing tiling, or an input
    /// document that cannot be read or parsed at all. Individual bad cells
    /// and records only end up in [`Catalog::report`].
    pub fn build(self) -> Result<Catalog> {
        self.config.validate().map_err(GridError::InvalidConfig)?;

        let Some(tiling_source) = self.tiling else {
            return Err(GridError::InvalidInput("no tiling given".to_string()));
        };

        let (tiling, mut report) = load_tiling(tiling_source, &self.config)?;

        let (datasets, skipped) = match self.datasets {
            Some(source) => source.load(RecordKind::Dataset)?,
            None => (RecordTable::new(RecordKind::Dataset), SkipList::new()),
        };
        report.extend(skipped);

        let (granules, skipped) = match self.granules {
            Some(source) => source.load(RecordKind::Granule)?,
            None => (RecordTable::new(RecordKind::Granule), SkipList::new()),
        };
        report.extend(skipped);

        #[cfg(feature = "snapshot")]
        let (index, skipped) = match &self.snapshot_path {
            Some(path) => index_with_snapshot(path, &tiling, &datasets, &granules),
            None => GridIndex::build(&tiling, &datasets, &granules),
        };
        #[cfg(not(feature = "snapshot"))]
        let (index, skipped) = GridIndex::build(&tiling, &datasets, &granules);
        report.extend(skipped);

        if !report.is_empty() {
            log::warn!("Catalog loaded with {} skipped entities", report.len());
        }

        Ok(Catalog::from_parts(
            self.config,
            tiling,
            datasets,
            granules,
            index,
            report,
        ))
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn load_tiling(source: TilingSource, config: &Config) -> Result<(Tiling, SkipList)> {
    match source {
        TilingSource::Cells(cells) => Ok(Tiling::from_cells(cells, config.validate_geographic)),
        #[cfg(feature = "geojson")]
        TilingSource::GeoJson(text) => crate::compute::geojson::tiling_from_geojson(&text, config),
        #[cfg(feature = "geojson")]
        TilingSource::GeoJsonFile(path) => {
            let text = std::fs::read_to_string(&path)?;
            crate::compute::geojson::tiling_from_geojson(&text, config)
        }
    }
}

/// Reuse the snapshot at `path` if it was built from these inputs, otherwise
/// build the index and overwrite the snapshot.
#[cfg(feature = "snapshot")]
fn index_with_snapshot(
    path: &std::path::Path,
    tiling: &Tiling,
    datasets: &RecordTable,
    granules: &RecordTable,
) -> (GridIndex, SkipList) {
    let file = SnapshotFile::new(path);
    let current = fingerprint(tiling, datasets, granules);

    match file.load() {
        Ok(Some(snapshot)) if snapshot.fingerprint == current => {
            log::info!("Reusing index snapshot {}", path.display());
            let index = snapshot.restore(tiling, datasets, granules);
            return (index, footprint_report(tiling, datasets, granules));
        }
        Ok(Some(_)) => log::info!("Index snapshot {} is stale, rebuilding", path.display()),
        Ok(None) => {}
        Err(e) => log::warn!("Ignoring unreadable index snapshot {}: {}", path.display(), e),
    }

    let (index, skipped) = GridIndex::build(tiling, datasets, granules);
    if let Err(e) = file.save(&IndexSnapshot::capture(&index, current, datasets, granules)) {
        log::warn!("Could not write index snapshot {}: {}", path.display(), e);
    }
    (index, skipped)
}
