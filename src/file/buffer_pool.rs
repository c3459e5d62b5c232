use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use log::{debug, trace, warn};
use lru::LruCache;

use super::error::{StorageError, StorageResult};
use super::lock::{LockCoordinator, NoLocking};
use super::{DEFAULT_POOL_PAGES, PageId, Permissions, TableId, TransactionId};
use crate::catalog::Catalog;
use crate::record::{HeapFile, HeapPage, Tuple};

/// Index of a frame in the pool's page arena
type FrameId = usize;

/// What the pool may do when it has to evict and every resident page is dirty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Flush the least recently used dirty page and evict it
    #[default]
    FlushDirty,
    /// Never evict a dirty page; the triggering fetch fails instead
    NoSteal,
}

struct PoolState {
    capacity: usize,
    /// Page table in recency order; `iter().rev()` yields least recently used first
    page_table: LruCache<PageId, FrameId>,
    frames: Vec<HeapPage>,
    free_frames: Vec<FrameId>,
}

impl PoolState {
    fn install(&mut self, page: HeapPage) -> FrameId {
        let pid = page.id();
        let frame = match self.free_frames.pop() {
            Some(frame) => {
                self.frames[frame] = page;
                frame
            }
            None => {
                self.frames.push(page);
                self.frames.len() - 1
            }
        };
        self.page_table.put(pid, frame);
        frame
    }
}

/// Bounded cache of heap pages; the only path through which pages are read or
/// written once a table is registered in the catalog.
///
/// All bookkeeping happens under a single mutex. A [`PageGuard`] keeps that
/// mutex held, so every other pool operation waits until the guard is dropped.
/// A thread must not call back into the pool while it holds a guard; debug
/// builds panic when it does.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    locks: Arc<dyn LockCoordinator>,
    policy: EvictionPolicy,
    state: Mutex<PoolState>,
    /// Thread currently holding a `PageGuard`
    guard_owner: Mutex<Option<ThreadId>>,
}

impl BufferPool {
    /// Create a pool holding at most `num_pages` pages
    pub fn new(catalog: Arc<Catalog>, num_pages: usize) -> Self {
        Self::with_policy(
            catalog,
            num_pages,
            EvictionPolicy::default(),
            Arc::new(NoLocking),
        )
    }

    pub fn with_default_size(catalog: Arc<Catalog>) -> Self {
        Self::new(catalog, DEFAULT_POOL_PAGES)
    }

    pub fn with_policy(
        catalog: Arc<Catalog>,
        num_pages: usize,
        policy: EvictionPolicy,
        locks: Arc<dyn LockCoordinator>,
    ) -> Self {
        Self {
            catalog,
            locks,
            policy,
            state: Mutex::new(PoolState {
                capacity: num_pages,
                page_table: LruCache::unbounded(),
                frames: Vec::with_capacity(num_pages),
                free_frames: Vec::new(),
            }),
            guard_owner: Mutex::new(None),
        }
    }

    fn guard_owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.guard_owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        if cfg!(debug_assertions) {
            let owner = *self.guard_owner();
            assert_ne!(
                owner,
                Some(thread::current().id()),
                "buffer pool re-entered while this thread holds a PageGuard"
            );
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn heap_file(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.catalog
            .heap_file(table_id)
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn lock_coordinator(&self) -> Arc<dyn LockCoordinator> {
        Arc::clone(&self.locks)
    }

    /// Get a page, reading it through its heap file on a miss.
    ///
    /// On a miss with a full pool one page is evicted first. Fails with
    /// `NoEvictablePage` when nothing can be evicted.
    ///
    /// The returned guard holds the pool lock. Drop it before calling any other
    /// method of this pool, including a second `fetch`, or the call blocks forever.
    pub fn fetch(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> StorageResult<PageGuard<'_>> {
        self.locks.acquire(tid, pid, perm)?;

        let mut state = self.lock_state();
        let frame = match state.page_table.get(&pid).copied() {
            Some(frame) => frame,
            None => {
                trace!("Page {} not cached, reading from disk", pid);
                if state.page_table.len() >= state.capacity {
                    self.evict(&mut state)?;
                }
                let page = self.heap_file(pid.table_id)?.read_page(pid)?;
                state.install(page)
            }
        };

        Ok(PageGuard::new(state, frame, perm, &self.guard_owner))
    }

    /// Add a tuple to a table. The modified page stays dirty in the pool.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: Tuple,
    ) -> StorageResult<()> {
        let file = self.heap_file(table_id)?;
        let pages = file.insert_tuple(self, tid, &tuple)?;
        trace!("Inserted into {} page(s) of table {}", pages.len(), table_id);
        Ok(())
    }

    /// Remove a tuple from the table named by its record id
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self.heap_file(rid.page_id.table_id)?;
        file.delete_tuple(self, tid, tuple)?;
        Ok(())
    }

    /// Cache a page that is about to be appended to `file`.
    ///
    /// A frame is reserved before anything is written, so a failed eviction
    /// leaves the file untouched. The page is then written through and kept
    /// dirty for `tid`.
    pub(crate) fn install_new_page(
        &self,
        tid: TransactionId,
        file: &HeapFile,
        mut page: HeapPage,
    ) -> StorageResult<()> {
        let pid = page.id();
        self.locks.acquire(tid, pid, Permissions::ReadWrite)?;

        let mut state = self.lock_state();
        let cached = state.page_table.get(&pid).copied();
        if cached.is_none() && state.page_table.len() >= state.capacity {
            self.evict(&mut state)?;
        }

        file.write_page(&page)?;
        page.mark_dirty(true, tid);
        match cached {
            Some(frame) => state.frames[frame] = page,
            None => {
                state.install(page);
            }
        }
        Ok(())
    }

    fn write_frame(&self, state: &mut PoolState, frame: FrameId) -> StorageResult<()> {
        let page = &state.frames[frame];
        self.heap_file(page.id().table_id)?.write_page(page)?;
        state.frames[frame].mark_clean();
        Ok(())
    }

    fn evict(&self, state: &mut PoolState) -> StorageResult<()> {
        let order: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .rev()
            .map(|(pid, frame)| (*pid, *frame))
            .collect();

        let clean = order
            .iter()
            .find(|(_, frame)| state.frames[*frame].is_dirty().is_none())
            .copied();

        let (pid, frame) = match (clean, self.policy) {
            (Some(victim), _) => victim,
            (None, EvictionPolicy::NoSteal) => return Err(StorageError::NoEvictablePage),
            (None, EvictionPolicy::FlushDirty) => {
                let (pid, frame) = order.first().copied().ok_or(StorageError::NoEvictablePage)?;
                self.write_frame(state, frame)?;
                debug!("Flushed dirty page {} before eviction", pid);
                (pid, frame)
            }
        };

        state.page_table.pop(&pid);
        state.free_frames.push(frame);
        debug!("Evicted page {}", pid);
        Ok(())
    }

    /// Write every dirty page to disk and mark it clean
    pub fn flush_all(&self) -> StorageResult<()> {
        let mut state = self.lock_state();
        let dirty: Vec<FrameId> = state
            .page_table
            .iter()
            .map(|(_, frame)| *frame)
            .filter(|frame| state.frames[*frame].is_dirty().is_some())
            .collect();

        for frame in dirty {
            self.write_frame(&mut state, frame)?;
        }
        Ok(())
    }

    /// Write one page if it is cached and dirty
    pub fn flush_page(&self, pid: PageId) -> StorageResult<()> {
        let mut state = self.lock_state();
        if let Some(&frame) = state.page_table.peek(&pid)
            && state.frames[frame].is_dirty().is_some()
        {
            self.write_frame(&mut state, frame)?;
            debug!("Flushed page {}", pid);
        }
        Ok(())
    }

    /// Write every page last dirtied by `tid`
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        let mut state = self.lock_state();
        let owned: Vec<FrameId> = state
            .page_table
            .iter()
            .map(|(_, frame)| *frame)
            .filter(|frame| state.frames[*frame].is_dirty() == Some(tid))
            .collect();

        for frame in owned {
            self.write_frame(&mut state, frame)?;
        }
        Ok(())
    }

    /// Drop a page from the pool without writing it
    pub fn discard(&self, pid: PageId) {
        let mut state = self.lock_state();
        if let Some(frame) = state.page_table.pop(&pid) {
            state.free_frames.push(frame);
            debug!("Discarded page {}", pid);
        }
    }

    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    /// Maximum number of resident pages
    pub fn capacity(&self) -> usize {
        self.lock_state().capacity
    }

    /// Number of pages currently cached
    pub fn resident_pages(&self) -> usize {
        self.lock_state().page_table.len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.lock_state().page_table.contains(&pid)
    }

    pub fn dirty_page_count(&self) -> usize {
        let state = self.lock_state();
        state
            .page_table
            .iter()
            .filter(|(_, frame)| state.frames[**frame].is_dirty().is_some())
            .count()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            warn!("Failed to flush buffer pool on drop: {}", err);
        }
    }
}

/// A fetched page. Holds the pool's lock for as long as it lives, so the
/// owning thread must not use the pool again until the guard is dropped.
pub struct PageGuard<'a> {
    state: MutexGuard<'a, PoolState>,
    frame: FrameId,
    perm: Permissions,
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<'a> PageGuard<'a> {
    fn new(
        state: MutexGuard<'a, PoolState>,
        frame: FrameId,
        perm: Permissions,
        owner: &'a Mutex<Option<ThreadId>>,
    ) -> Self {
        *owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self {
            state,
            frame,
            perm,
            owner,
        }
    }

    pub fn permissions(&self) -> Permissions {
        self.perm
    }

    /// Mutable access; only for pages fetched with `Permissions::ReadWrite`
    pub fn page_mut(&mut self) -> StorageResult<&mut HeapPage> {
        if self.perm == Permissions::ReadOnly {
            return Err(StorageError::ReadOnlyPage(self.state.frames[self.frame].id()));
        }
        Ok(&mut self.state.frames[self.frame])
    }
}

impl Deref for PageGuard<'_> {
    type Target = HeapPage;

    fn deref(&self) -> &HeapPage {
        &self.state.frames[self.frame]
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        // Cleared while the pool lock is still held
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
