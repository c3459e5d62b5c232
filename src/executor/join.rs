use ahash::AHashMap;
use log::debug;

use super::{Cursor, DbIterator, ExecError, ExecResult};
use crate::record::{Field, Tuple, TupleDesc};

/// Maximum number of left tuples held in the hash table per build pass
pub const DEFAULT_BUILD_CAP: usize = 20_000;

/// Equality between one field of the left input and one field of the right
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    pub left_field: usize,
    pub right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, right_field: usize) -> Self {
        Self {
            left_field,
            right_field,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> ExecResult<bool> {
        Ok(left.field(self.left_field)? == right.field(self.right_field)?)
    }
}

/// The right tuple being matched against its bucket
struct Probe {
    right: Tuple,
    key: Field,
    next: usize,
}

/// Hash equi-join with a bounded build side.
///
/// Left tuples are loaded into a hash table `build_cap` at a time. Each
/// right tuple is then probed against the table. When the right input runs
/// out while left tuples remain, the right input is rewound and the table is
/// refilled from where the left input stopped. Output is the left fields
/// followed by the right fields, in right-major order.
pub struct HashEquiJoin {
    predicate: JoinPredicate,
    left: Box<dyn DbIterator>,
    right: Box<dyn DbIterator>,
    desc: TupleDesc,
    build_cap: usize,
    table: AHashMap<Field, Vec<Tuple>>,
    more_left: bool,
    probe: Option<Probe>,
    cursor: Cursor,
}

impl HashEquiJoin {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn DbIterator>,
        right: Box<dyn DbIterator>,
    ) -> ExecResult<Self> {
        Self::with_build_cap(predicate, left, right, DEFAULT_BUILD_CAP)
    }

    pub fn with_build_cap(
        predicate: JoinPredicate,
        left: Box<dyn DbIterator>,
        right: Box<dyn DbIterator>,
        build_cap: usize,
    ) -> ExecResult<Self> {
        let left_type = left.schema().field_type(predicate.left_field)?;
        let right_type = right.schema().field_type(predicate.right_field)?;
        if left_type != right_type {
            return Err(ExecError::SchemaMismatch(format!(
                "Cannot join {} field with {} field",
                left_type, right_type
            )));
        }

        let desc = TupleDesc::merge(left.schema(), right.schema());
        Ok(Self {
            predicate,
            left,
            right,
            desc,
            build_cap: build_cap.max(1),
            table: AHashMap::new(),
            more_left: false,
            probe: None,
            cursor: Cursor::default(),
        })
    }

    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    pub fn build_cap(&self) -> usize {
        self.build_cap
    }

    /// Names of the join fields in the left and right inputs
    pub fn join_field_names(&self) -> (Option<&str>, Option<&str>) {
        (
            self.left
                .schema()
                .field_name(self.predicate.left_field)
                .ok()
                .flatten(),
            self.right
                .schema()
                .field_name(self.predicate.right_field)
                .ok()
                .flatten(),
        )
    }

    /// Load up to `build_cap` left tuples into the hash table
    fn build(&mut self) -> ExecResult<usize> {
        self.table.clear();
        let mut absorbed = 0;
        while absorbed < self.build_cap && self.left.has_next()? {
            let tuple = self.left.next()?;
            let key = tuple.field(self.predicate.left_field)?.clone();
            self.table.entry(key).or_default().push(tuple);
            absorbed += 1;
        }
        self.more_left = self.left.has_next()?;
        Ok(absorbed)
    }
}

impl DbIterator for HashEquiJoin {
    fn open(&mut self) -> ExecResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.probe = None;
        self.build()?;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.left.close();
        self.right.close();
        self.table.clear();
        self.probe = None;
        self.more_left = false;
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor.ensure_open()?;
        self.left.rewind()?;
        self.right.rewind()?;
        self.probe = None;
        self.build()?;
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Tuple>> {
        loop {
            if let Some(probe) = &mut self.probe {
                if let Some(left) = self
                    .table
                    .get(&probe.key)
                    .and_then(|bucket| bucket.get(probe.next))
                {
                    probe.next += 1;
                    return Ok(Some(Tuple::merge(left, &probe.right)));
                }
                self.probe = None;
            }

            if self.table.is_empty() && !self.more_left {
                return Ok(None);
            }

            if self.right.has_next()? {
                let right = self.right.next()?;
                let key = right.field(self.predicate.right_field)?.clone();
                if self.table.contains_key(&key) {
                    self.probe = Some(Probe {
                        right,
                        key,
                        next: 0,
                    });
                }
                continue;
            }

            if !self.more_left {
                return Ok(None);
            }

            self.right.rewind()?;
            let absorbed = self.build()?;
            debug!("Hash join refilled build table with {} left tuples", absorbed);
        }
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
