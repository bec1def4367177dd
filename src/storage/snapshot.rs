//! Snapshot file holding a built grid index.
//!
//! Layout: magic bytes, one version byte, then the bincode-encoded
//! [`IndexSnapshot`]. Membership is stored by cell and record id rather than
//! by table row, so a snapshot stays meaningful if rows are reordered.
//! Writes go to a temporary file that atomically replaces the old snapshot.

use crate::error::{GridError, Result};
use crate::index::{GridIndex, LevelIndex};
use crate::table::RecordTable;
use crate::tiling::Tiling;
use abovegrid_types::cell::{CellId, TilingLevel};
use abovegrid_types::record::{RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_MAGIC: &[u8] = b"ABOVEGRID_INDEX";
const SNAPSHOT_VERSION: u8 = 1;

/// Records of one kind intersecting one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub level: TilingLevel,
    pub kind: RecordKind,
    pub cell: CellId,
    pub records: Vec<RecordId>,
}

/// Serializable form of a [`GridIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// [`crate::index::fingerprint`] of the inputs the index was built from.
    pub fingerprint: u64,
    pub entries: Vec<SnapshotEntry>,
}

impl IndexSnapshot {
    /// Capture an index, translating table rows to record ids.
    pub fn capture(
        index: &GridIndex,
        fingerprint: u64,
        datasets: &RecordTable,
        granules: &RecordTable,
    ) -> Self {
        let mut entries = Vec::new();

        let mut levels: Vec<(&TilingLevel, &LevelIndex)> = index.levels.iter().collect();
        levels.sort_by_key(|(level, _)| **level);

        for (&level, level_index) in levels {
            for table in [datasets, granules] {
                let kind = table.kind();
                let mut cells: Vec<(&CellId, &Vec<usize>)> = level_index.rows(kind).iter().collect();
                cells.sort_by(|a, b| a.0.cmp(b.0));

                for (cell, rows) in cells {
                    let records = rows
                        .iter()
                        .filter_map(|&row| table.get(row))
                        .map(|record| record.id.clone())
                        .collect();
                    entries.push(SnapshotEntry {
                        level,
                        kind,
                        cell: cell.clone(),
                        records,
                    });
                }
            }
        }

        Self {
            fingerprint,
            entries,
        }
    }

    /// Rebuild an index against the current tiling and tables.
    ///
    /// Cells that no longer exist and record ids missing from their table are
    /// dropped with a warning. Cells without a snapshot entry get empty row
    /// lists.
    pub fn restore(&self, tiling: &Tiling, datasets: &RecordTable, granules: &RecordTable) -> GridIndex {
        let mut index = GridIndex::default();

        for level in tiling.levels() {
            let mut level_index = LevelIndex::default();
            for cell in tiling.cells_at(level) {
                level_index.datasets.insert(cell.id.clone(), Vec::new());
                level_index.granules.insert(cell.id.clone(), Vec::new());
            }
            index.levels.insert(level, level_index);
        }

        let mut dropped_cells = 0usize;
        let mut dropped_records = 0usize;

        for entry in &self.entries {
            let table = match entry.kind {
                RecordKind::Dataset => datasets,
                RecordKind::Granule => granules,
            };

            let Some(rows) = index
                .levels
                .get_mut(&entry.level)
                .and_then(|level_index| level_index.rows_mut(entry.kind).get_mut(&entry.cell))
            else {
                dropped_cells += 1;
                continue;
            };

            for id in &entry.records {
                match table.position(id) {
                    Some(row) => rows.push(row),
                    None => dropped_records += 1,
                }
            }
            rows.sort_unstable();
            rows.dedup();
        }

        if dropped_cells > 0 || dropped_records > 0 {
            log::warn!(
                "Snapshot referenced {} unknown cells and {} unknown records, dropped",
                dropped_cells,
                dropped_records
            );
        }

        index
    }
}

/// A snapshot file on disk.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the snapshot, or `None` if the file is missing or empty.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(None);
        }

        let mut reader = BufReader::new(file);

        let mut magic = vec![0u8; SNAPSHOT_MAGIC.len()];
        reader
            .read_exact(&mut magic)
            .map_err(|_| GridError::InvalidFormat)?;
        if magic != SNAPSHOT_MAGIC {
            return Err(GridError::InvalidFormat);
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != SNAPSHOT_VERSION {
            return Err(GridError::UnsupportedVersion {
                found: version[0],
                expected: SNAPSHOT_VERSION,
            });
        }

        let snapshot: IndexSnapshot = bincode::deserialize_from(&mut reader)?;
        log::debug!(
            "Loaded index snapshot with {} entries from {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let temp_path = self.temp_path();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&[SNAPSHOT_VERSION])?;
        bincode::serialize_into(&mut writer, snapshot)?;

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, &self.path)?;
        self.sync_parent_dir()?;

        log::info!(
            "Wrote index snapshot with {} entries to {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        if let Some(name) = temp.file_name() {
            let mut new_name = name.to_string_lossy().into_owned();
            new_name.push_str(".tmp");
            temp.set_file_name(new_name);
        }
        temp
    }

    fn sync_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fingerprint;
    use abovegrid_types::cell::Cell;
    use abovegrid_types::footprint::Footprint;
    use abovegrid_types::record::Record;
    use geo::{Rect, coord};
    use tempfile::{NamedTempFile, TempDir};

    fn fixture() -> (Tiling, RecordTable, RecordTable) {
        let cells = (0..3).map(|i| {
            let x = i as f64;
            let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
            Cell::new(format!("c{}", i), TilingLevel::Medium, rect.to_polygon())
        });
        let (tiling, _) = Tiling::from_cells(cells, true);

        let footprint = |min: f64, max: f64| {
            Footprint::Rect(Rect::new(coord! { x: min, y: 0.2 }, coord! { x: max, y: 0.8 }))
        };
        let (datasets, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                Record::new("wide", RecordKind::Dataset, footprint(0.2, 2.8)),
                Record::new("left", RecordKind::Dataset, footprint(0.2, 0.4)),
            ],
        );
        let (granules, _) = RecordTable::from_records(
            RecordKind::Granule,
            [Record::new("g", RecordKind::Granule, footprint(2.2, 2.4))],
        );
        (tiling, datasets, granules)
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (tiling, datasets, granules) = fixture();
        let (index, _) = GridIndex::build(&tiling, &datasets, &granules);
        let print = fingerprint(&tiling, &datasets, &granules);

        let file = SnapshotFile::new(dir.path().join("grid.idx"));
        file.save(&IndexSnapshot::capture(&index, print, &datasets, &granules))
            .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.fingerprint, print);
        assert_eq!(loaded.restore(&tiling, &datasets, &granules), index);
    }

    #[test]
    fn test_restore_drops_unknown_ids() {
        let (tiling, datasets, granules) = fixture();
        let (index, _) = GridIndex::build(&tiling, &datasets, &granules);
        let mut snapshot = IndexSnapshot::capture(&index, 0, &datasets, &granules);

        snapshot.entries.push(SnapshotEntry {
            level: TilingLevel::Medium,
            kind: RecordKind::Dataset,
            cell: CellId::from("gone"),
            records: vec![RecordId::from("wide")],
        });

        let (fewer, _) = RecordTable::from_records(
            RecordKind::Dataset,
            [Record::new(
                "wide",
                RecordKind::Dataset,
                datasets.get(0).unwrap().footprint.clone(),
            )],
        );
        let restored = snapshot.restore(&tiling, &fewer, &granules);

        let c0 = CellId::from("c0");
        assert_eq!(
            restored.rows_for(TilingLevel::Medium, RecordKind::Dataset, &c0),
            Some(&[0][..])
        );
        assert!(
            restored
                .rows_for(TilingLevel::Medium, RecordKind::Dataset, &CellId::from("gone"))
                .is_none()
        );
    }

    #[test]
    fn test_load_nonexistent() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().with_extension("nonexistent");
        assert!(SnapshotFile::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_invalid_magic() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = File::create(temp.path()).unwrap();
        file.write_all(b"NOT_A_SNAPSHOT_AT_ALL").unwrap();
        file.sync_all().unwrap();
        drop(file);

        assert!(matches!(
            SnapshotFile::new(temp.path()).load(),
            Err(GridError::InvalidFormat)
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let temp = NamedTempFile::new().unwrap();
        let mut file = File::create(temp.path()).unwrap();
        file.write_all(SNAPSHOT_MAGIC).unwrap();
        file.write_all(&[SNAPSHOT_VERSION + 1]).unwrap();
        file.sync_all().unwrap();
        drop(file);

        assert!(matches!(
            SnapshotFile::new(temp.path()).load(),
            Err(GridError::UnsupportedVersion { .. })
        ));
    }
}
