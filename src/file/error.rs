use std::io;
use thiserror::Error;

use super::{PageId, TableId};

/// Coarse classification shared by every error type in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A page, table or tuple is absent where it was required
    NotFound,
    /// Short read, or a file whose length is not a page multiple
    Malformed,
    /// The underlying read or write failed
    IoFailure,
    /// The buffer pool cannot satisfy a fetch
    ResourceExhausted,
    /// A caller violated a contract (closed iterator, bad index, ...)
    UsageError,
    /// An iterator was advanced past its last element
    Exhausted,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Short read of page {page}: file ends {missing} bytes early")]
    ShortRead { page: PageId, missing: usize },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Page {page} out of range: file has {num_pages} pages")]
    PageOutOfRange { page: PageId, num_pages: usize },

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Page {page} does not belong to table {table}")]
    WrongTable { page: PageId, table: TableId },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Tuple not found: page={0}, slot={1}")]
    TupleNotFound(PageId, usize),

    #[error("Invalid slot: page={0}, slot={1}")]
    InvalidSlot(PageId, usize),

    #[error("Page full: {0}")]
    PageFull(PageId),

    #[error("No evictable page in buffer pool")]
    NoEvictablePage,

    #[error("Page {0} was fetched read-only")]
    ReadOnlyPage(PageId),

    #[error("Lock on page {0} denied")]
    LockDenied(PageId),

    #[error("Invalid field index {index}: tuple has {num_fields} fields")]
    FieldIndex { index: usize, num_fields: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                ErrorKind::Malformed
            }
            StorageError::Io(_) => ErrorKind::IoFailure,
            StorageError::ShortRead { .. }
            | StorageError::InvalidPageSize { .. }
            | StorageError::Deserialization(_) => ErrorKind::Malformed,
            StorageError::TableNotFound(_)
            | StorageError::WrongTable { .. }
            | StorageError::TupleNotFound(..) => ErrorKind::NotFound,
            StorageError::NoEvictablePage | StorageError::PageFull(_) => {
                ErrorKind::ResourceExhausted
            }
            StorageError::PageOutOfRange { .. }
            | StorageError::MissingRecordId
            | StorageError::InvalidSlot(..)
            | StorageError::ReadOnlyPage(_)
            | StorageError::LockDenied(_)
            | StorageError::FieldIndex { .. }
            | StorageError::SchemaMismatch(_)
            | StorageError::TypeMismatch { .. }
            | StorageError::Serialization(_) => ErrorKind::UsageError,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
