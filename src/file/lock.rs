use super::error::StorageResult;
use super::{PageId, Permissions, TransactionId};

/// Concurrency-control hook consulted by the buffer pool on every fetch.
///
/// The pool never interprets locks itself; it only asks the coordinator for
/// permission before handing out a page. A coordinator that refuses returns
/// `StorageError::LockDenied`, which aborts the fetch.
pub trait LockCoordinator: Send + Sync {
    /// Acquire (or confirm) a lock of the given mode on `page` for `tid`
    fn acquire(&self, tid: TransactionId, page: PageId, perm: Permissions) -> StorageResult<()>;

    /// Release the lock `tid` holds on `page`, if any
    fn release(&self, tid: TransactionId, page: PageId);

    /// Release every lock held by `tid`
    fn release_all(&self, tid: TransactionId);

    /// Whether `tid` currently holds a lock on `page`
    fn holds_lock(&self, tid: TransactionId, page: PageId) -> bool;
}

/// Grants every request and tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocking;

impl LockCoordinator for NoLocking {
    fn acquire(&self, _tid: TransactionId, _page: PageId, _perm: Permissions) -> StorageResult<()> {
        Ok(())
    }

    fn release(&self, _tid: TransactionId, _page: PageId) {}

    fn release_all(&self, _tid: TransactionId) {}

    fn holds_lock(&self, _tid: TransactionId, _page: PageId) -> bool {
        false
    }
}
