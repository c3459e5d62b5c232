use std::fmt;

use super::{Cursor, DbIterator, ExecResult};
use crate::record::{Field, Op, Tuple, TupleDesc};

/// Compares one field of a tuple against a constant
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Evaluate `tuple[field] op operand`
    pub fn filter(&self, tuple: &Tuple) -> ExecResult<bool> {
        Ok(tuple.field(self.field)?.compare(self.op, &self.operand)?)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Passes through the child tuples that satisfy a predicate
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn DbIterator>,
    cursor: Cursor,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn DbIterator>) -> Self {
        Self {
            predicate,
            child,
            cursor: Cursor::default(),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl DbIterator for Filter {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.child.close();
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor.ensure_open()?;
        self.child.rewind()?;
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &TupleDesc {
        self.child.schema()
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
