//! Dataset and granule record tables.
//!
//! A table keeps its rows in input order. That order is the display order
//! of every lookup result, whatever order the cells were selected in.

use crate::compute::validation::{EntityKind, SkipList, SkipReason};
use crate::error::{GridError, Result};
use crate::spatial::{bounding_box, cmr_box_to_rect};
use abovegrid_types::footprint::Footprint;
use abovegrid_types::record::{AttrValue, Record, RecordId, RecordKind};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One row of a JSON record table, before its geometry is resolved.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    geometry: Option<serde_json::Value>,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
    #[serde(default)]
    cmr_box: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default, alias = "collection_short_name")]
    parent: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,
}

impl RawRow {
    fn footprint(&self) -> std::result::Result<Footprint, SkipReason> {
        if let Some(geometry) = &self.geometry {
            return geometry_footprint(geometry);
        }

        if let Some(bbox) = &self.bbox {
            let [min_lon, min_lat, max_lon, max_lat] = bbox.as_slice() else {
                return Err(SkipReason::UnparseableGeometry(format!(
                    "bbox needs 4 values, got {}",
                    bbox.len()
                )));
            };
            return bounding_box(*min_lon, *min_lat, *max_lon, *max_lat)
                .map(Footprint::Rect)
                .map_err(|e| SkipReason::UnparseableGeometry(e.to_string()));
        }

        if let Some(cmr_box) = &self.cmr_box {
            return cmr_box_to_rect(cmr_box).map(Footprint::Rect);
        }

        Err(SkipReason::MissingGeometry)
    }
}

#[cfg(feature = "geojson")]
fn geometry_footprint(value: &serde_json::Value) -> std::result::Result<Footprint, SkipReason> {
    crate::compute::geojson::footprint_from_json(value)
}

#[cfg(not(feature = "geojson"))]
fn geometry_footprint(_value: &serde_json::Value) -> std::result::Result<Footprint, SkipReason> {
    Err(SkipReason::UnsupportedGeometry(
        "GeoJSON geometry (geojson feature disabled)".to_string(),
    ))
}

/// An ordered table of records of one kind.
#[derive(Debug, Clone)]
pub struct RecordTable {
    kind: RecordKind,
    records: Vec<Record>,
    by_id: FxHashMap<RecordId, usize>,
}

impl RecordTable {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            by_id: FxHashMap::default(),
        }
    }

    /// Build a table from in-memory records.
    ///
    /// Records with an empty or duplicate id, or tagged with the other kind,
    /// are skipped.
    pub fn from_records<I>(kind: RecordKind, records: I) -> (Self, SkipList)
    where
        I: IntoIterator<Item = Record>,
    {
        let mut table = Self::new(kind);
        let mut skipped = SkipList::new();
        for (position, record) in records.into_iter().enumerate() {
            table.insert(position, record, &mut skipped);
        }
        (table, skipped)
    }

    /// Load a table from a JSON array of rows.
    ///
    /// Each row carries an `id`, one geometry source (`geometry` as a GeoJSON
    /// geometry object, `bbox` as `[min_lon, min_lat, max_lon, max_lat]`, or
    /// `cmr_box` as a CMR `"south west north east"` string), and optionally
    /// `short_name`, `parent` (alias `collection_short_name`) and
    /// `attributes`. Malformed rows are skipped; only a document that is not
    /// a JSON array fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abovegrid::{RecordKind, RecordTable};
    ///
    /// let json = r#"[
    ///   {"id": "G1", "cmr_box": "60 -150 65 -140", "collection_short_name": "ABoVE_Fires"},
    ///   {"id": "G2", "bbox": [-150, 60, -140, 65], "attributes": {"title": "tile 2"}},
    ///   {"id": "G3"}
    /// ]"#;
    ///
    /// let (table, skipped) = RecordTable::from_json(RecordKind::Granule, json).unwrap();
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(skipped.len(), 1);
    /// assert_eq!(table.get(0).unwrap().parent.as_deref(), Some("ABoVE_Fires"));
    /// ```
    pub fn from_json(kind: RecordKind, json: &str) -> Result<(Self, SkipList)> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Array(rows) = value else {
            return Err(GridError::InvalidInput(format!(
                "{} table must be a JSON array",
                kind
            )));
        };

        let entity = EntityKind::Record(kind);
        let mut table = Self::new(kind);
        let mut skipped = SkipList::new();

        for (position, row) in rows.into_iter().enumerate() {
            let row_id = row
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            let raw: RawRow = match serde_json::from_value(row) {
                Ok(raw) => raw,
                Err(e) => {
                    let reason = SkipReason::MalformedRow(e.to_string());
                    skipped.push(entity, position, row_id.as_deref(), reason);
                    continue;
                }
            };

            let Some(id) = raw.id.clone().filter(|id| !id.trim().is_empty()) else {
                skipped.push(entity, position, None, SkipReason::MissingId);
                continue;
            };

            let footprint = match raw.footprint() {
                Ok(footprint) => footprint,
                Err(reason) => {
                    skipped.push(entity, position, Some(&id), reason);
                    continue;
                }
            };

            let record = Record {
                id: RecordId::from(id),
                kind,
                footprint,
                short_name: raw.short_name,
                parent: raw.parent,
                attributes: raw.attributes,
            };
            table.insert(position, record, &mut skipped);
        }

        log::info!(
            "Loaded {} table with {} records ({} skipped)",
            kind,
            table.len(),
            skipped.len()
        );

        Ok((table, skipped))
    }

    fn insert(&mut self, position: usize, record: Record, skipped: &mut SkipList) {
        let entity = EntityKind::Record(self.kind);
        let id = record.id.as_str();

        if id.trim().is_empty() {
            skipped.push(entity, position, None, SkipReason::MissingId);
            return;
        }

        if record.kind != self.kind {
            skipped.push(
                entity,
                position,
                Some(id),
                SkipReason::MalformedRow(format!("{} record in {} table", record.kind, self.kind)),
            );
            return;
        }

        if self.by_id.contains_key(&record.id) {
            skipped.push(entity, position, Some(id), SkipReason::DuplicateId);
            return;
        }

        self.by_id.insert(record.id.clone(), self.records.len());
        self.records.push(record);
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record at a row position.
    pub fn get(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn by_id(&self, id: &RecordId) -> Option<&Record> {
        self.position(id).map(|row| &self.records[row])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Records whose `parent` equals `short_name`, in table order.
    pub fn children_of(&self, short_name: &str) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|record| record.parent.as_deref() == Some(short_name))
            .collect()
    }

    /// Records whose `short_name` equals `short_name`, in table order.
    pub fn with_short_name(&self, short_name: &str) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|record| record.short_name.as_deref() == Some(short_name))
            .collect()
    }

    /// Records for the given ids, in table order. Unknown ids are skipped and
    /// repeated ids collapse to one row.
    pub fn select<'a, I>(&self, ids: I) -> Vec<&Record>
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        let mut rows: Vec<usize> = ids.into_iter().filter_map(|id| self.position(id)).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.into_iter().map(|row| &self.records[row]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Rect, coord};

    fn boxed(id: &str, kind: RecordKind) -> Record {
        Record::new(
            id,
            kind,
            Footprint::Rect(Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 })),
        )
    }

    #[test]
    fn test_from_records_skips() {
        let (table, skipped) = RecordTable::from_records(
            RecordKind::Dataset,
            [
                boxed("D1", RecordKind::Dataset),
                boxed("D1", RecordKind::Dataset),
                boxed("G1", RecordKind::Granule),
                boxed("", RecordKind::Dataset),
                boxed("D2", RecordKind::Dataset),
            ],
        );

        assert_eq!(table.len(), 2);
        assert_eq!(skipped.len(), 3);
        assert_eq!(table.position(&RecordId::from("D2")), Some(1));
    }

    #[test]
    fn test_json_geometry_sources() {
        let json = r#"[
            {"id": "a", "cmr_box": "60 -150 65 -140"},
            {"id": "b", "bbox": [-150, 60, -140, 65]},
            {"id": "c", "bbox": [-150, 60, -140]},
            {"id": "d", "cmr_box": "garbage"},
            {"id": "e"},
            {"bbox": [0, 0, 1, 1]},
            {"id": 7, "bbox": [0, 0, 1, 1]},
            "not an object"
        ]"#;
        let (table, skipped) = RecordTable::from_json(RecordKind::Dataset, json).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().footprint, table.get(1).unwrap().footprint);
        assert_eq!(skipped.len(), 6);

        let entity = EntityKind::Record(RecordKind::Dataset);
        assert!(skipped.contains_id(entity, "c"));
        assert!(skipped.contains_id(entity, "d"));
        assert!(skipped.contains_id(entity, "e"));
    }

    #[cfg(feature = "geojson")]
    #[test]
    fn test_json_geojson_geometry() {
        let json = r#"[{
            "id": "poly",
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]},
            "attributes": {"title": "Burn scars", "version": 1.0, "keywords": ["fire", "tundra"]}
        }]"#;
        let (table, skipped) = RecordTable::from_json(RecordKind::Dataset, json).unwrap();

        assert!(skipped.is_empty());
        let record = table.get(0).unwrap();
        assert!(matches!(record.footprint, Footprint::Polygon(_)));
        assert_eq!(record.title(), Some("Burn scars"));
        assert_eq!(record.attribute("version"), Some(&AttrValue::Number(1.0)));
        assert_eq!(
            record.attribute("keywords"),
            Some(&AttrValue::List(vec!["fire".into(), "tundra".into()]))
        );
    }

    #[test]
    fn test_json_nested_attributes() {
        let json = r#"[
            {"id": "kw", "bbox": [0, 0, 1, 1],
             "attributes": {"science_keywords": [{"Category": "EARTH SCIENCE", "Topic": "LAND SURFACE"}]}},
            {"id": "params", "bbox": [0, 0, 1, 1], "attributes": {"granule_params": {"size": 12.5}}},
            {"id": "mixed", "bbox": [0, 0, 1, 1], "attributes": {"tags": ["a", 1, null]}},
            {"id": "bad-attrs", "bbox": [0, 0, 1, 1], "attributes": "not a map"}
        ]"#;
        let (table, skipped) = RecordTable::from_json(RecordKind::Dataset, json).unwrap();

        assert_eq!(table.len(), 3);
        let keywords = table.get(0).unwrap().attribute("science_keywords").unwrap();
        assert_eq!(
            keywords.as_list().unwrap()[0].get("Topic").and_then(AttrValue::as_text),
            Some("LAND SURFACE")
        );
        let params = table.get(1).unwrap().attribute("granule_params").unwrap();
        assert_eq!(params.get("size").and_then(AttrValue::as_number), Some(12.5));
        assert_eq!(
            table.get(2).unwrap().attribute("tags"),
            Some(&AttrValue::List(vec!["a".into(), 1.0.into(), AttrValue::Null]))
        );

        // A row that fails to parse is still reported under its id
        assert_eq!(skipped.len(), 1);
        assert!(skipped.contains_id(EntityKind::Record(RecordKind::Dataset), "bad-attrs"));
        assert!(matches!(
            skipped.iter().next().unwrap().reason,
            SkipReason::MalformedRow(_)
        ));
    }

    #[test]
    fn test_json_must_be_array() {
        assert!(RecordTable::from_json(RecordKind::Dataset, r#"{"id": "x"}"#).is_err());
        assert!(RecordTable::from_json(RecordKind::Dataset, "[").is_err());
    }

    #[test]
    fn test_children_and_select_order() {
        let (table, _) = RecordTable::from_records(
            RecordKind::Granule,
            [
                boxed("G1", RecordKind::Granule).with_parent("fires"),
                boxed("G2", RecordKind::Granule).with_parent("lakes"),
                boxed("G3", RecordKind::Granule).with_parent("fires"),
            ],
        );

        let children: Vec<&str> = table
            .children_of("fires")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(children, ["G1", "G3"]);

        let wanted = [
            RecordId::from("G3"),
            RecordId::from("missing"),
            RecordId::from("G1"),
            RecordId::from("G3"),
        ];
        let selected: Vec<&str> = table.select(&wanted).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(selected, ["G1", "G3"]);
    }
}
