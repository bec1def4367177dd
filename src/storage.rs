//! On-disk caching of the grid index.
//!
//! Building the index is the only expensive step of loading a catalog, so
//! the result can be written to a snapshot file and reused on the next
//! start as long as the tiling and tables are unchanged.

pub mod snapshot;

pub use snapshot::{IndexSnapshot, SnapshotFile};
