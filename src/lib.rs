//! # Geostore - Persistent Element Mapping for Spatial Indexes
//!
//! This crate provides the storage side of a spatial index: a persistent
//! mapping between domain objects and the small integer identifiers a tree
//! hands out, plus a relational filter that refines coarse bounding-box
//! search results into exact topological answers.
//!
//! ## Features
//!
//! - **Fixed-Record Store**: hand-rolled binary format with a 13-byte
//!   header and fixed-width records addressed by 1-based identifiers
//! - **Buffer Window**: all I/O batched through a sliding in-memory window,
//!   flushed and reloaded only when an access falls outside it
//! - **Pluggable Devices**: one store engine over seek-based files or
//!   memory-mapped files
//! - **Element Mapper**: object-to-identifier mapping with random-access
//!   forward lookup and a documented O(n) reverse scan
//! - **Relational Search**: contains, within, disjoint, touches, equals
//!   and overlaps refinement with epsilon-tolerant equality
//! - **Thread Safe**: mapper operations serialized through one lock
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use geostore::{
//!     search, Crs, Envelope, Region, RStarTree, SpatialPredicate,
//!     StoredElementMapper,
//! };
//!
//! # fn main() -> geostore::StoreResult<()> {
//! let mapper = StoredElementMapper::create("cities.bin", CityCodec)?;
//! let tree = RStarTree::new(mapper, Crs::new("EPSG:4326"));
//! tree.insert(&city)?;
//!
//! let region = Region::new(Envelope::new(0.0, 0.0, 10.0, 10.0), Crs::new("EPSG:4326"));
//! let ids = search(&tree, &region, SpatialPredicate::Within)?;
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod error;
pub mod mapper;
pub mod query;
pub mod store;
pub mod tree;

// Re-export geometry primitives
pub use envelope::{Crs, Envelope, Region};

// Re-export error types
pub use error::{StoreError, StoreResult};

// Re-export storage types
pub use store::{
    FileDevice, FixedRecordStore, MappedDevice, RecordDevice, StoreByteOrder, StoreHeader,
    BEGIN_POSITION, DEFAULT_BUFFER_LEN, HEADER_LEN, STORE_MAGIC,
};

// Re-export mapper types
pub use mapper::{ElementCodec, ElementMapper, StoredElementMapper};

// Re-export tree types
pub use tree::{RStarTree, Tree};

// Re-export relational search
pub use query::{search, SpatialPredicate, EQUALITY_EPSILON};
