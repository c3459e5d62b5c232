mod aggregate;
mod delete;
mod error;
mod filter;
mod insert;
mod join;
mod scan;
mod tuple_iter;


pub use aggregate::{AggOp, Aggregate, Aggregator, IntegerAggregator, StringAggregator};
pub use delete::Delete;
pub use error::{ExecError, ExecResult};
pub use filter::{Filter, Predicate};
pub use insert::Insert;
pub use join::{DEFAULT_BUILD_CAP, HashEquiJoin, JoinPredicate};
pub use scan::SeqScan;
pub use tuple_iter::TupleIterator;

use crate::record::{Tuple, TupleDesc};

/// Open/closed state plus the one-tuple lookahead behind `has_next`
#[derive(Debug, Default)]
pub struct Cursor {
    open: bool,
    lookahead: Option<Tuple>,
    exhausted: bool,
}

impl Cursor {
    pub fn open(&mut self) {
        self.open = true;
        self.reset();
    }

    pub fn close(&mut self) {
        self.open = false;
        self.reset();
    }

    /// Forget the lookahead and the exhausted flag; stays open
    pub fn reset(&mut self) {
        self.lookahead = None;
        self.exhausted = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn ensure_open(&self) -> ExecResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(ExecError::NotOpen)
        }
    }
}

/// Pull-based iterator protocol shared by scans and every relational operator.
///
/// Lifecycle is closed -> `open` -> closed (`close`). `has_next` and `next`
/// fail with `NotOpen` outside the open state; `next` past the last tuple
/// fails with `Exhausted`. Implementors supply `fetch_next` and expose their
/// [`Cursor`]; the provided methods handle the lookahead.
pub trait DbIterator {
    fn open(&mut self) -> ExecResult<()>;

    fn close(&mut self);

    /// Restart from the first result without leaving the open state
    fn rewind(&mut self) -> ExecResult<()>;

    /// Output schema, available before `open`
    fn schema(&self) -> &TupleDesc;

    /// Produce the next result, `None` once exhausted. Only called while open.
    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>>;

    fn cursor(&mut self) -> &mut Cursor;

    fn has_next(&mut self) -> ExecResult<bool> {
        self.cursor().ensure_open()?;
        if self.cursor().lookahead.is_some() {
            return Ok(true);
        }
        if self.cursor().exhausted {
            return Ok(false);
        }

        match self.fetch_next()? {
            Some(tuple) => {
                self.cursor().lookahead = Some(tuple);
                Ok(true)
            }
            None => {
                self.cursor().exhausted = true;
                Ok(false)
            }
        }
    }

    fn next(&mut self) -> ExecResult<Tuple> {
        if !self.has_next()? {
            return Err(ExecError::Exhausted);
        }
        self.cursor().lookahead.take().ok_or(ExecError::Exhausted)
    }

    /// Pull every remaining tuple
    fn drain(&mut self) -> ExecResult<Vec<Tuple>> {
        let mut tuples = Vec::new();
        while self.has_next()? {
            tuples.push(self.next()?);
        }
        Ok(tuples)
    }
}
