//! # abovegrid-types
//!
//! Core data types for the abovegrid spatial index.
//!
//! - **Cell types**: `CellId`, `TilingLevel`, `Cell`
//! - **Record types**: `RecordKind`, `RecordId`, `Record`, `AttrValue`
//! - **Geometry**: `Footprint`, the bounding geometry of a catalog record
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use abovegrid_types::cell::{Cell, TilingLevel};
//! use abovegrid_types::footprint::Footprint;
//! use abovegrid_types::record::{Record, RecordKind};
//! use geo::{Rect, coord};
//!
//! let square = Rect::new(coord! { x: -150.0, y: 60.0 }, coord! { x: -140.0, y: 70.0 });
//! let cell = Cell::new("Bh01v01", TilingLevel::Medium, square.to_polygon());
//!
//! let record = Record::new("C1", RecordKind::Dataset, Footprint::Rect(square));
//! assert!(record.footprint.intersects_polygon(&cell.polygon));
//! ```

pub mod cell;
pub mod footprint;
pub mod record;
