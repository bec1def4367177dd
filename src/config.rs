//! Configuration for loading and browsing a gridded catalog.
//!
//! Designed to be serializable and loadable from JSON or TOML while keeping
//! the number of knobs small.

use abovegrid_types::cell::TilingLevel;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Catalog configuration
///
/// # Example
///
/// ```rust
/// use abovegrid::Config;
/// use abovegrid::TilingLevel;
///
/// let config = Config::default();
/// assert_eq!(config.active_level, TilingLevel::Medium);
///
/// let json = r#"{
///     "active_level": "coarse",
///     "cell_zoom": 7
/// }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.active_level, TilingLevel::Coarse);
/// assert_eq!(config.draw_zoom, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tiling level that clicks and drawn shapes are matched against
    #[serde(default)]
    pub active_level: TilingLevel,

    /// Feature property holding the cell id in grid GeoJSON
    #[serde(default = "Config::default_cell_id_property")]
    pub cell_id_property: String,

    /// Feature property holding the level code (`A`/`B`/`C`) in grid GeoJSON
    #[serde(default = "Config::default_cell_level_property")]
    pub cell_level_property: String,

    /// Reject vertices outside [-180, 180] x [-90, 90].
    /// Turn off for grids stored in projected coordinates.
    #[serde(default = "Config::default_validate_geographic")]
    pub validate_geographic: bool,

    /// Map zoom hint after a single cell is clicked
    #[serde(default = "Config::default_cell_zoom")]
    pub cell_zoom: u8,

    /// Map zoom hint after a shape is drawn
    #[serde(default = "Config::default_draw_zoom")]
    pub draw_zoom: u8,
}

impl Config {
    fn default_cell_id_property() -> String {
        "grid_id".to_string()
    }

    fn default_cell_level_property() -> String {
        "grid_level".to_string()
    }

    const fn default_validate_geographic() -> bool {
        true
    }

    const fn default_cell_zoom() -> u8 {
        6
    }

    const fn default_draw_zoom() -> u8 {
        4
    }

    pub fn with_active_level(mut self, level: TilingLevel) -> Self {
        self.active_level = level;
        self
    }

    pub fn with_property_names<S: Into<String>, T: Into<String>>(mut self, id: S, level: T) -> Self {
        self.cell_id_property = id.into();
        self.cell_level_property = level.into();
        self
    }

    pub fn with_geographic_validation(mut self, enabled: bool) -> Self {
        self.validate_geographic = enabled;
        self
    }

    pub fn with_zoom_hints(mut self, cell_zoom: u8, draw_zoom: u8) -> Self {
        self.cell_zoom = cell_zoom;
        self.draw_zoom = draw_zoom;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.cell_id_property.trim().is_empty() {
            return Err("Cell id property name cannot be empty".to_string());
        }

        if self.cell_level_property.trim().is_empty() {
            return Err("Cell level property name cannot be empty".to_string());
        }

        if self.cell_id_property == self.cell_level_property {
            return Err("Cell id and level properties must differ".to_string());
        }

        // Web map tile pyramids stop well before zoom 25
        if self.cell_zoom > 24 || self.draw_zoom > 24 {
            return Err("Zoom hints must be between 0 and 24".to_string());
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_level: TilingLevel::default(),
            cell_id_property: Self::default_cell_id_property(),
            cell_level_property: Self::default_cell_level_property(),
            validate_geographic: Self::default_validate_geographic(),
            cell_zoom: Self::default_cell_zoom(),
            draw_zoom: Self::default_draw_zoom(),
        }
    }
}
