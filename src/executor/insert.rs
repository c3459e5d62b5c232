use std::sync::Arc;

use log::debug;

use super::{Cursor, DbIterator, ExecError, ExecResult};
use crate::database::Database;
use crate::file::{BufferPool, TableId, TransactionId};
use crate::record::{Field, Tuple, TupleDesc, Type};

/// Inserts every child tuple into a table through the buffer pool.
///
/// Produces a single tuple holding the number of rows inserted. The child is
/// drained in full by the first `next` before any row is written, so
/// inserting a table into itself copies it once. Later rewinds and re-opens
/// replay the count without inserting again.
pub struct Insert {
    tid: TransactionId,
    table_id: TableId,
    pool: Arc<BufferPool>,
    child: Box<dyn DbIterator>,
    desc: TupleDesc,
    count: Option<i32>,
    emitted: bool,
    cursor: Cursor,
}

impl Insert {
    pub fn new(
        db: &Database,
        tid: TransactionId,
        child: Box<dyn DbIterator>,
        table_id: TableId,
    ) -> ExecResult<Self> {
        let table_desc = db.catalog().schema(table_id)?;
        if *child.schema() != *table_desc {
            return Err(ExecError::SchemaMismatch(format!(
                "Cannot insert ({}) into table {} ({})",
                child.schema(),
                table_id,
                table_desc
            )));
        }

        Ok(Self {
            tid,
            table_id,
            pool: Arc::clone(db.pool()),
            child,
            desc: TupleDesc::new(vec![Type::Int], vec!["inserted_count".to_string()]),
            count: None,
            emitted: false,
            cursor: Cursor::default(),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    fn apply(&mut self) -> ExecResult<i32> {
        // The child may be scanning the table being inserted into
        let tuples = self.child.drain()?;
        let mut inserted: i32 = 0;
        for tuple in tuples {
            self.pool
                .insert_tuple(self.tid, self.table_id, Tuple::new(tuple.into_fields()))?;
            inserted = inserted
                .checked_add(1)
                .ok_or_else(|| ExecError::Overflow("inserted_count".to_string()))?;
        }
        debug!("Inserted {} tuples into table {}", inserted, self.table_id);
        Ok(inserted)
    }
}

impl DbIterator for Insert {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.emitted = false;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.child.close();
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor.ensure_open()?;
        self.emitted = false;
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>> {
        if self.emitted {
            return Ok(None);
        }
        let count = match self.count {
            Some(count) => count,
            None => {
                let count = self.apply()?;
                self.count = Some(count);
                count
            }
        };
        self.emitted = true;
        Ok(Some(Tuple::new(vec![Field::Int(count)])))
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
