//! Error types for the element store and relational search.

use std::io;
use thiserror::Error;

/// Errors raised by the record store, the element mapper and the
/// relational search filter.
///
/// The variants fall into four groups: format errors (`UnrecognizedFormat`,
/// `RecordSizeMismatch`) are fatal to the store instance and raised at
/// construction; state errors (`ElementNotFound`, `EmptyStore`, `Closed`)
/// are recoverable by the caller; I/O errors carry the underlying cause;
/// argument errors (`InvalidArgument`, `CrsMismatch`) are validated eagerly
/// at the start of public operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("not a recognized element store (magic number {found:#010x})")]
    UnrecognizedFormat { found: u32 },

    #[error("record size mismatch: store holds {stored} byte records, caller requested {requested}")]
    RecordSizeMismatch { stored: u32, requested: u32 },

    #[error("element not found in store")]
    ElementNotFound,

    #[error("store contains no elements")]
    EmptyStore,

    #[error("store is closed")]
    Closed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("coordinate reference system mismatch between search region and tree")]
    CrsMismatch,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
