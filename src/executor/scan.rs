use std::sync::Arc;

use super::{Cursor, DbIterator, ExecResult};
use crate::database::Database;
use crate::file::{TableId, TransactionId};
use crate::record::{HeapFileIter, Tuple, TupleDesc};

/// Sequential scan over every tuple of one table, in page then slot order.
///
/// Output field names are prefixed with the table alias: `alias.field`.
pub struct SeqScan {
    table_id: TableId,
    table_name: String,
    alias: String,
    desc: TupleDesc,
    iter: HeapFileIter,
    cursor: Cursor,
}

impl SeqScan {
    pub fn new(
        db: &Database,
        tid: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> ExecResult<Self> {
        let entry = db.catalog().resolve(table_id)?;
        Ok(Self {
            table_id,
            table_name: entry.name().to_string(),
            alias: alias.to_string(),
            desc: entry.schema().with_prefix(alias),
            iter: entry.file().iter(Arc::clone(db.pool()), tid),
            cursor: Cursor::default(),
        })
    }

    /// Scan aliased by the table's own name
    pub fn with_table_alias(db: &Database, tid: TransactionId, table_id: TableId) -> ExecResult<Self> {
        let name = db.catalog().table_name(table_id)?;
        Self::new(db, tid, table_id, &name)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl DbIterator for SeqScan {
    fn open(&mut self) -> ExecResult<()> {
        self.iter.rewind();
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor.ensure_open()?;
        self.iter.rewind();
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>> {
        Ok(self.iter.next().transpose()?)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
