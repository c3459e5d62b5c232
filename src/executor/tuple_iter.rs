use super::{Cursor, DbIterator, ExecResult};
use crate::record::{Tuple, TupleDesc};

/// Iterates over a fixed, in-memory list of tuples
pub struct TupleIterator {
    desc: TupleDesc,
    tuples: Vec<Tuple>,
    pos: usize,
    cursor: Cursor,
}

impl TupleIterator {
    /// Every tuple must match `desc`
    pub fn new(desc: TupleDesc, tuples: Vec<Tuple>) -> ExecResult<Self> {
        for tuple in &tuples {
            desc.validate(tuple)?;
        }
        Ok(Self {
            desc,
            tuples,
            pos: 0,
            cursor: Cursor::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl DbIterator for TupleIterator {
    fn open(&mut self) -> ExecResult<()> {
        self.pos = 0;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor.ensure_open()?;
        self.pos = 0;
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>> {
        let tuple = self.tuples.get(self.pos).cloned();
        if tuple.is_some() {
            self.pos += 1;
        }
        Ok(tuple)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
