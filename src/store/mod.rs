//! Persistent fixed-record storage for tree element mapping.
//!
//! This module holds the storage layer of the crate:
//! - A bit-exact 13-byte header with magic number and explicit byte order
//! - A [`RecordDevice`] capability with seek-based and memory-mapped adapters
//! - The [`FixedRecordStore`] buffer-window engine reading and writing
//!   fixed-width records one window at a time

pub mod device;
pub mod header;
pub mod record_store;

pub use device::{FileDevice, MappedDevice, RecordDevice};
pub use header::{StoreByteOrder, StoreHeader, BEGIN_POSITION, HEADER_LEN, STORE_MAGIC};
pub use record_store::{FixedRecordStore, DEFAULT_BUFFER_LEN};
