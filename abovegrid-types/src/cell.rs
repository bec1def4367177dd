use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one grid cell, e.g. `Bh04v02`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Granularity of a tiling.
///
/// Grid files code the levels as single letters in their level property:
/// `A` for the coarse tiles, `B` for the medium tiles and `C` for the fine tiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TilingLevel {
    Coarse,
    #[default]
    Medium,
    Fine,
}

impl TilingLevel {
    pub const ALL: [TilingLevel; 3] = [TilingLevel::Coarse, TilingLevel::Medium, TilingLevel::Fine];

    /// The single-letter code used in grid files.
    pub fn code(&self) -> &'static str {
        match self {
            TilingLevel::Coarse => "A",
            TilingLevel::Medium => "B",
            TilingLevel::Fine => "C",
        }
    }

    /// Parse either the letter code (`A`/`B`/`C`) or the level name.
    ///
    /// # Examples
    ///
    /// ```
    /// use abovegrid_types::cell::TilingLevel;
    ///
    /// assert_eq!(TilingLevel::parse("B"), Some(TilingLevel::Medium));
    /// assert_eq!(TilingLevel::parse("fine"), Some(TilingLevel::Fine));
    /// assert_eq!(TilingLevel::parse("Z"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" | "a" | "coarse" | "Coarse" => Some(TilingLevel::Coarse),
            "B" | "b" | "medium" | "Medium" => Some(TilingLevel::Medium),
            "C" | "c" | "fine" | "Fine" => Some(TilingLevel::Fine),
            _ => None,
        }
    }
}

impl fmt::Display for TilingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TilingLevel::Coarse => "coarse",
            TilingLevel::Medium => "medium",
            TilingLevel::Fine => "fine",
        };
        write!(f, "{}", name)
    }
}

/// One polygon of a tiling. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub level: TilingLevel,
    pub polygon: Polygon<f64>,
}

impl Cell {
    pub fn new<I: Into<CellId>>(id: I, level: TilingLevel, polygon: Polygon<f64>) -> Self {
        Self {
            id: id.into(),
            level,
            polygon,
        }
    }
}
