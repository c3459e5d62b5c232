mod buffer_pool;
mod error;
mod lock;
mod paged_file;

pub use buffer_pool::{BufferPool, EvictionPolicy, PageGuard};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use lock::{LockCoordinator, NoLocking};
pub use paged_file::PagedFile;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages in the buffer pool
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Identifier of a table, assigned by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a page: the owning table plus its position in the table's file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE` of the table's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: usize) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    /// Byte offset of this page inside its backing file
    pub fn offset(&self) -> u64 {
        (self.page_number * PAGE_SIZE) as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_number)
    }
}

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// Tag identifying the transaction on whose behalf a page is fetched or dirtied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh, process-unique transaction id
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Access mode requested when fetching a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
