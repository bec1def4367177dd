//! GeoJSON conversion for tilings, drawn shapes and record footprints.

use crate::compute::validation::{EntityKind, SkipList, SkipReason};
use crate::config::Config;
use crate::error::{GridError, Result};
use crate::spatial::DisplayFootprint;
use crate::tiling::Tiling;
use abovegrid_types::cell::{Cell, TilingLevel};
use abovegrid_types::footprint::Footprint;
use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue, Value};

/// Load a tiling from a GeoJSON `FeatureCollection`.
///
/// Each feature needs the id and level properties named in `config` and a
/// polygon geometry. Features that do not qualify are skipped and reported;
/// only a document that is not a feature collection fails as a whole.
///
/// # Examples
///
/// ```rust
/// use abovegrid::compute::geojson::tiling_from_geojson;
/// use abovegrid::{Config, TilingLevel};
///
/// let grid = r#"{
///   "type": "FeatureCollection",
///   "features": [{
///     "type": "Feature",
///     "properties": { "grid_id": "Bh01v01", "grid_level": "B" },
///     "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
///   }, {
///     "type": "Feature",
///     "properties": { "grid_level": "B" },
///     "geometry": { "type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]] }
///   }]
/// }"#;
///
/// let (tiling, skipped) = tiling_from_geojson(grid, &Config::default()).unwrap();
/// assert_eq!(tiling.cells_at(TilingLevel::Medium).count(), 1);
/// assert_eq!(skipped.len(), 1);
/// ```
pub fn tiling_from_geojson(text: &str, config: &Config) -> Result<(Tiling, SkipList)> {
    let document: JsonValue = serde_json::from_str(text)?;
    if document.get("type").and_then(JsonValue::as_str) != Some("FeatureCollection") {
        return Err(GridError::InvalidInput(
            "Tiling must be a GeoJSON FeatureCollection".to_string(),
        ));
    }
    let Some(features) = document.get("features").and_then(JsonValue::as_array) else {
        return Err(GridError::InvalidInput(
            "Tiling FeatureCollection has no features array".to_string(),
        ));
    };

    let mut tiling = Tiling::new(config.validate_geographic);
    let mut skipped = SkipList::new();

    for (position, feature) in features.iter().enumerate() {
        match cell_from_feature(feature, config) {
            Ok(cell) => tiling.insert(position, cell, &mut skipped),
            Err((id, reason)) => skipped.push(EntityKind::Cell, position, id.as_deref(), reason),
        }
    }

    log::info!(
        "Loaded tiling with {} cells ({} skipped)",
        tiling.len(),
        skipped.len()
    );

    Ok((tiling, skipped))
}

fn cell_from_feature(
    feature: &JsonValue,
    config: &Config,
) -> std::result::Result<Cell, (Option<String>, SkipReason)> {
    let Some(object) = feature.as_object() else {
        return Err((None, SkipReason::MalformedRow("feature is not an object".to_string())));
    };
    let property = |name: &str| {
        object
            .get("properties")
            .and_then(JsonValue::as_object)
            .and_then(|properties| properties.get(name))
    };

    let id = match property(&config.cell_id_property) {
        Some(JsonValue::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => return Err((None, SkipReason::MissingId)),
    };

    let level = match property(&config.cell_level_property) {
        Some(JsonValue::String(code)) => match TilingLevel::parse(code) {
            Some(level) => level,
            None => return Err((Some(id), SkipReason::UnknownLevel(code.clone()))),
        },
        Some(other) => return Err((Some(id), SkipReason::UnknownLevel(other.to_string()))),
        None => return Err((Some(id), SkipReason::MissingLevel)),
    };

    let geometry = match object.get("geometry") {
        None | Some(JsonValue::Null) => return Err((Some(id), SkipReason::MissingGeometry)),
        Some(value) => match Geometry::from_json_value(value.clone()) {
            Ok(geometry) => geometry,
            Err(e) => return Err((Some(id), SkipReason::UnparseableGeometry(e.to_string()))),
        },
    };

    let polygon = match to_geo(&geometry) {
        Ok(geo::Geometry::Polygon(polygon)) => polygon,
        Ok(geo::Geometry::MultiPolygon(mut multi)) if multi.0.len() == 1 => multi.0.remove(0),
        Ok(other) => {
            return Err((
                Some(id),
                SkipReason::UnsupportedGeometry(geometry_name(&other).to_string()),
            ));
        }
        Err(reason) => return Err((Some(id), reason)),
    };

    Ok(Cell::new(id, level, polygon))
}

/// Parse a drawn shape: a GeoJSON geometry or a feature wrapping one, as
/// emitted by map draw controls.
pub fn drawn_shape_from_geojson(text: &str) -> Result<geo::Geometry<f64>> {
    let geometry = match text.parse::<GeoJson>()? {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature.geometry.ok_or_else(|| {
            GridError::InvalidInput("Drawn feature has no geometry".to_string())
        })?,
        GeoJson::FeatureCollection(_) => {
            return Err(GridError::InvalidInput(
                "Expected a single drawn geometry, got a FeatureCollection".to_string(),
            ));
        }
    };

    Ok(geo::Geometry::<f64>::try_from(geometry.value)?)
}

/// Convert a GeoJSON geometry object, as found in a record table row, into a
/// footprint.
pub fn footprint_from_json(value: &JsonValue) -> std::result::Result<Footprint, SkipReason> {
    let geometry: Geometry = serde_json::from_value(value.clone())
        .map_err(|e| SkipReason::UnparseableGeometry(e.to_string()))?;

    match to_geo(&geometry)? {
        geo::Geometry::Polygon(polygon) => Ok(Footprint::Polygon(polygon)),
        geo::Geometry::MultiPolygon(multi) => Ok(Footprint::MultiPolygon(multi)),
        geo::Geometry::Rect(rect) => Ok(Footprint::Rect(rect)),
        other => Err(SkipReason::UnsupportedGeometry(
            geometry_name(&other).to_string(),
        )),
    }
}

/// GeoJSON geometry of a record footprint, for map overlays.
pub fn footprint_to_geojson(footprint: &Footprint) -> Geometry {
    match footprint {
        Footprint::Rect(rect) => Geometry::new(Value::from(&rect.to_polygon())),
        Footprint::Polygon(polygon) => Geometry::new(Value::from(polygon)),
        Footprint::MultiPolygon(multi) => Geometry::new(Value::from(multi)),
    }
}

/// A feature for the union of a selection, with its centroid stored as a
/// `[lon, lat]` property for re-centering the map.
pub fn display_to_feature(display: &DisplayFootprint) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(
        "centroid".to_string(),
        JsonValue::from(vec![display.centroid.x(), display.centroid.y()]),
    );
    properties.insert(
        "bounds".to_string(),
        JsonValue::from(vec![
            display.bounds.min().x,
            display.bounds.min().y,
            display.bounds.max().x,
            display.bounds.max().y,
        ]),
    );

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&display.union))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn to_geo(geometry: &Geometry) -> std::result::Result<geo::Geometry<f64>, SkipReason> {
    geo::Geometry::<f64>::try_from(geometry.value.clone())
        .map_err(|e| SkipReason::UnparseableGeometry(e.to_string()))
}

fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
