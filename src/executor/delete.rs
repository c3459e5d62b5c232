use std::sync::Arc;

use log::debug;

use super::{Cursor, DbIterator, ExecError, ExecResult};
use crate::database::Database;
use crate::file::{BufferPool, TransactionId};
use crate::record::{Field, Tuple, TupleDesc, Type};

/// Deletes every child tuple, located by its record id.
///
/// Like [`Insert`](super::Insert), emits one tuple with the number of rows
/// removed and replays it on rewind.
pub struct Delete {
    tid: TransactionId,
    pool: Arc<BufferPool>,
    child: Box<dyn DbIterator>,
    desc: TupleDesc,
    count: Option<i32>,
    emitted: bool,
    cursor: Cursor,
}

impl Delete {
    pub fn new(db: &Database, tid: TransactionId, child: Box<dyn DbIterator>) -> Self {
        Self {
            tid,
            pool: Arc::clone(db.pool()),
            child,
            desc: TupleDesc::new(vec![Type::Int], vec!["deleted_count".to_string()]),
            count: None,
            emitted: false,
            cursor: Cursor::default(),
        }
    }

    fn apply(&mut self) -> ExecResult<i32> {
        // The child may be scanning the table being deleted from
        let victims = self.child.drain()?;
        let deleted = i32::try_from(victims.len())
            .map_err(|_| ExecError::Overflow("deleted_count".to_string()))?;
        for tuple in &victims {
            self.pool.delete_tuple(self.tid, tuple)?;
        }
        debug!("Deleted {} tuples", deleted);
        Ok(deleted)
    }
}

impl DbIterator for Delete {
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
