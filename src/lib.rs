//! Grid-indexed lookup of earth-science catalog records.
//!
//! A study area is partitioned into named grid cells. Every dataset and
//! granule footprint is intersected with the cells once, up front, so that
//! clicking a cell or drawing a shape on the map resolves to matching
//! records in time proportional to the selected cells.
//!
//! ```rust
//! use abovegrid::prelude::*;
//! use geo::coord;
//!
//! let square = |x: f64| Rect::new(coord! { x: x, y: 60.0 }, coord! { x: x + 1.0, y: 61.0 });
//!
//! let catalog = CatalogBuilder::new()
//!     .cells([
//!         Cell::new("Bh01v01", TilingLevel::Medium, square(-150.0).to_polygon()),
//!         Cell::new("Bh02v01", TilingLevel::Medium, square(-149.0).to_polygon()),
//!     ])
//!     .datasets([Record::new("D1", RecordKind::Dataset, Footprint::Rect(square(-149.5)))])
//!     .build()?;
//!
//! let mut session = Session::new(&catalog);
//! let result = session.click_cell(&CellId::from("Bh02v01"));
//! assert_eq!(result.records[0].id.as_str(), "D1");
//! # Ok::<(), abovegrid::GridError>(())
//! ```

pub mod builder;
pub mod catalog;
pub mod compute;
pub mod config;
pub mod error;
pub mod index;
pub mod selection;
pub mod session;
pub mod spatial;
#[cfg(feature = "snapshot")]
pub mod storage;
pub mod table;
pub mod tiling;

pub use builder::CatalogBuilder;
pub use catalog::{Catalog, Resolved};
pub use config::Config;
pub use error::{GridError, Result};
pub use index::{GridIndex, Lookup};
pub use selection::Selection;
pub use session::{BrowseResult, Highlight, Session};
pub use table::RecordTable;
pub use tiling::Tiling;

pub use compute::validation::{EntityKind, SkipList, SkipReason, Skipped};

pub use spatial::{
    DisplayFootprint, bounding_box, bounds_of, cmr_box_to_rect, union_footprint,
    union_of_footprints,
};

#[cfg(feature = "snapshot")]
pub use storage::{IndexSnapshot, SnapshotFile};

pub use abovegrid_types::cell::{Cell, CellId, TilingLevel};
pub use abovegrid_types::footprint::Footprint;
pub use abovegrid_types::record::{AttrValue, Record, RecordId, RecordKind};

pub use geo::{Point, Polygon, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Catalog, CatalogBuilder, Config, GridError, Result, Session};

    pub use crate::{Cell, CellId, Footprint, Record, RecordId, RecordKind, TilingLevel};

    pub use crate::{Selection, SkipList};

    pub use geo::{Point, Polygon, Rect};

    pub use crate::spatial::{bounding_box, cmr_box_to_rect, union_footprint};
}
