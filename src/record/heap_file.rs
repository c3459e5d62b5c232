use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::page::HeapPage;
use super::schema::TupleDesc;
use super::tuple::Tuple;
use crate::file::{
    BufferPool, PAGE_SIZE, PageId, PagedFile, Permissions, StorageError, StorageResult, TableId,
    TransactionId,
};

/// Unordered collection of tuples stored in one backing file.
///
/// Page `n` of the table is bytes `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)` of
/// the file. Pages are appended when every existing page is full and are
/// never removed; deletes only clear slot bits.
pub struct HeapFile {
    id: TableId,
    file: PagedFile,
    desc: Arc<TupleDesc>,
    /// Held for a whole insert so two inserters never append the same page
    insert_lock: Mutex<()>,
}

impl HeapFile {
    /// Open (or create) the heap file at `path` with the given schema
    pub fn open<P: AsRef<Path>>(path: P, desc: TupleDesc, id: TableId) -> StorageResult<Self> {
        Ok(Self {
            id,
            file: PagedFile::open(path)?,
            desc: Arc::new(desc),
            insert_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Number of pages, `ceil(file length / PAGE_SIZE)`
    pub fn num_pages(&self) -> StorageResult<usize> {
        self.file.num_pages()
    }

    fn check_owner(&self, pid: PageId) -> StorageResult<()> {
        if pid.table_id != self.id {
            return Err(StorageError::WrongTable {
                page: pid,
                table: self.id,
            });
        }
        Ok(())
    }

    /// Read a page straight from disk, bypassing the buffer pool
    pub fn read_page(&self, pid: PageId) -> StorageResult<HeapPage> {
        self.check_owner(pid)?;

        let mut data = vec![0u8; PAGE_SIZE];
        self.file.read_page(pid, &mut data)?;
        HeapPage::from_bytes(pid, Arc::clone(&self.desc), data)
    }

    /// Write a page in place. Only the page right after the last one may be appended.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        self.check_owner(page.id())?;
        self.file.write_page(page.id(), page.page_data())
    }

    /// Place a tuple in the first free slot of the file, appending a page if needed.
    ///
    /// The slot is filled and the page marked dirty while the pool's guard is
    /// held. Returns the ids of the modified pages, which are dirty in the pool.
    /// On error no page has been changed.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageId>> {
        self.desc.validate(tuple)?;
        let _inserting = self
            .insert_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let num_pages = self.num_pages()?;
        for page_number in 0..num_pages {
            let pid = PageId::new(self.id, page_number);
            let mut guard = pool.fetch(tid, pid, Permissions::ReadWrite)?;
            if guard.is_full() {
                continue;
            }

            let page = guard.page_mut()?;
            page.insert_tuple(tuple)?;
            page.mark_dirty(true, tid);
            return Ok(vec![pid]);
        }

        let pid = PageId::new(self.id, num_pages);
        let mut page = HeapPage::empty(pid, Arc::clone(&self.desc));
        page.insert_tuple(tuple)?;
        pool.install_new_page(tid, self, page)?;
        debug!("Appended page {} to table {}", pid, self.id);

        Ok(vec![pid])
    }

    /// Free the slot named by the tuple's record id
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<PageId> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        self.check_owner(rid.page_id)?;
        if rid.page_id.page_number >= self.num_pages()? {
            return Err(StorageError::TupleNotFound(rid.page_id, rid.slot_id));
        }

        let mut guard = pool.fetch(tid, rid.page_id, Permissions::ReadWrite)?;
        let page = guard.page_mut()?;
        page.delete_tuple(rid)?;
        page.mark_dirty(true, tid);
        Ok(rid.page_id)
    }

    /// Lazily scan every tuple of the file through the buffer pool
    pub fn iter(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapFileIter {
        HeapFileIter {
            file: Arc::clone(self),
            pool,
            tid,
            next_page: 0,
            buffered: Vec::new().into_iter(),
            done: false,
        }
    }
}

/// Tuples of a heap file in page order, then slot order.
///
/// At most one page of decoded tuples is held at a time. The page count is
/// re-read on every page boundary, so pages appended during the scan are seen.
pub struct HeapFileIter {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    next_page: usize,
    buffered: std::vec::IntoIter<Tuple>,
    done: bool,
}

impl HeapFileIter {
    /// Restart from page 0
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered = Vec::new().into_iter();
        self.done = false;
    }

    fn load_next_page(&mut self) -> StorageResult<bool> {
        if self.next_page >= self.file.num_pages()? {
            return Ok(false);
        }

        let pid = PageId::new(self.file.id(), self.next_page);
        let tuples = self
            .pool
            .fetch(self.tid, pid, Permissions::ReadOnly)?
            .tuples()?;
        self.next_page += 1;
        self.buffered = tuples.into_iter();
        Ok(true)
    }
}

impl Iterator for HeapFileIter {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(tuple) = self.buffered.next() {
                return Some(Ok(tuple));
            }

            match self.load_next_page() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::file::ErrorKind;
    use crate::record::{Field, RecordId, Type};
    use tempfile::TempDir;

    fn setup(width: usize, pool_pages: usize) -> (TempDir, Database, Arc<HeapFile>) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(pool_pages);
        let desc = TupleDesc::unnamed(vec![Type::Int; width]);
        let table_id = db
            .catalog()
            .add_table("t", dir.path().join("t.dat"), desc, None)
            .unwrap();
        let file = db.catalog().resolve(table_id).unwrap().file().clone();
        (dir, db, file)
    }

    fn row(width: usize, value: i32) -> Tuple {
        Tuple::new(vec![Field::Int(value); width])
    }

    fn scan(db: &Database, file: &Arc<HeapFile>) -> Vec<Tuple> {
        file.iter(Arc::clone(db.pool()), TransactionId::new())
            .collect::<StorageResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_new_file_is_empty() {
        let (_dir, db, file) = setup(2, 4);
        assert_eq!(file.num_pages().unwrap(), 0);
        assert!(scan(&db, &file).is_empty());
    }

    #[test]
    fn test_insert_appends_first_page() {
        let (_dir, db, file) = setup(2, 4);
        let tid = TransactionId::new();

        let pages = file.insert_tuple(db.pool(), tid, &row(2, 7)).unwrap();
        assert_eq!(pages, vec![PageId::new(file.id(), 0)]);
        assert_eq!(file.num_pages().unwrap(), 1);
        assert!(db.pool().is_cached(pages[0]));
        assert_eq!(db.pool().dirty_page_count(), 1);

        // The appended page was written straight to disk
        let on_disk = file.read_page(PageId::new(file.id(), 0)).unwrap();
        assert_eq!(on_disk.tuples().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_204_rows_fills_two_pages() {
        let (_dir, db, file) = setup(5, 4);
        let tid = TransactionId::new();

        for i in 0..204 {
            db.pool().insert_tuple(tid, file.id(), row(5, i)).unwrap();
        }

        assert_eq!(file.num_pages().unwrap(), 2);
        let page0 = db
            .pool()
            .fetch(tid, PageId::new(file.id(), 0), Permissions::ReadOnly)
            .unwrap()
            .tuples()
            .unwrap();
        let page1 = db
            .pool()
            .fetch(tid, PageId::new(file.id(), 1), Permissions::ReadOnly)
            .unwrap()
            .tuples()
            .unwrap();
        assert_eq!(page0.len(), 203);
        assert_eq!(page1.len(), 1);
        assert_eq!(page1[0].fields(), row(5, 203).fields());
    }

    #[test]
    fn test_insert_into_full_file_grows_by_one_page() {
        let (_dir, db, file) = setup(5, 4);
        let tid = TransactionId::new();
        for i in 0..203 {
            db.pool().insert_tuple(tid, file.id(), row(5, i)).unwrap();
        }
        assert_eq!(file.num_pages().unwrap(), 1);

        db.pool().insert_tuple(tid, file.id(), row(5, -1)).unwrap();
        assert_eq!(file.num_pages().unwrap(), 2);

        let last = db
            .pool()
            .fetch(tid, PageId::new(file.id(), 1), Permissions::ReadOnly)
            .unwrap()
            .tuple(0)
            .unwrap();
        assert_eq!(last.fields(), row(5, -1).fields());
    }

    #[test]
    fn test_insert_reuses_freed_slot() {
        let (_dir, db, file) = setup(5, 4);
        let tid = TransactionId::new();
        for i in 0..204 {
            db.pool().insert_tuple(tid, file.id(), row(5, i)).unwrap();
        }

        let victim = scan(&db, &file)
            .into_iter()
            .find(|t| t.field(0).unwrap() == &Field::Int(10))
            .unwrap();
        db.pool().delete_tuple(tid, &victim).unwrap();
        db.pool().insert_tuple(tid, file.id(), row(5, 999)).unwrap();

        assert_eq!(file.num_pages().unwrap(), 2);
        let refilled = db
            .pool()
            .fetch(tid, victim.record_id().unwrap().page_id, Permissions::ReadOnly)
            .unwrap()
            .tuple(victim.record_id().unwrap().slot_id)
            .unwrap();
        assert_eq!(refilled.fields(), row(5, 999).fields());
    }

    #[test]
    fn test_iter_order_and_record_ids() {
        let (_dir, db, file) = setup(1, 4);
        let tid = TransactionId::new();
        for i in 0..5 {
            db.pool().insert_tuple(tid, file.id(), row(1, i)).unwrap();
        }

        let tuples = scan(&db, &file);
        let values: Vec<_> = tuples.iter().map(|t| t.field(0).unwrap().clone()).collect();
        assert_eq!(values, (0..5).map(Field::Int).collect::<Vec<_>>());
        assert_eq!(
            tuples[3].record_id(),
            Some(RecordId::new(PageId::new(file.id(), 0), 3))
        );
    }

    #[test]
    fn test_iter_rewind() {
        let (_dir, db, file) = setup(1, 4);
        let tid = TransactionId::new();
        for i in 0..3 {
            db.pool().insert_tuple(tid, file.id(), row(1, i)).unwrap();
        }

        let mut iter = file.iter(Arc::clone(db.pool()), tid);
        assert_eq!(iter.by_ref().count(), 3);
        assert!(iter.next().is_none());
        iter.rewind();
        assert_eq!(iter.count(), 3);
    }

    #[test]
    fn test_delete_errors() {
        let (_dir, db, file) = setup(1, 4);
        let tid = TransactionId::new();
        db.pool().insert_tuple(tid, file.id(), row(1, 1)).unwrap();

        let unplaced = row(1, 1);
        let err = file.delete_tuple(db.pool(), tid, &unplaced).unwrap_err();
        assert!(matches!(err, StorageError::MissingRecordId));

        let foreign = row(1, 1).with_record_id(RecordId::new(PageId::new(TableId(999), 0), 0));
        let err = file.delete_tuple(db.pool(), tid, &foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let past_end = row(1, 1).with_record_id(RecordId::new(PageId::new(file.id(), 5), 0));
        let err = file.delete_tuple(db.pool(), tid, &past_end).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_page_errors() {
        let (_dir, _db, file) = setup(1, 4);

        let err = file.read_page(PageId::new(file.id(), 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);

        let err = file.read_page(PageId::new(TableId(999), 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_write_page_past_end_rejected() {
        let (_dir, _db, file) = setup(1, 4);
        let page = HeapPage::empty(PageId::new(file.id(), 3), Arc::clone(file.schema()));
        let err = file.write_page(&page).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageError);
    }

    #[test]
    fn test_insert_rejects_wrong_arity() {
        let (_dir, db, file) = setup(2, 4);
        let err = file
            .insert_tuple(db.pool(), TransactionId::new(), &row(3, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageError);
        assert_eq!(file.num_pages().unwrap(), 0);
    }
}
