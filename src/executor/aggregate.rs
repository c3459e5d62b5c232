use std::fmt;

use ahash::AHashMap;

use super::{Cursor, DbIterator, ExecError, ExecResult};
use crate::file::StorageError;
use crate::record::{Field, TdItem, Tuple, TupleDesc, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        write!(f, "{}", name)
    }
}

/// Folds tuples into per-group aggregate values
pub trait Aggregator {
    /// Fold one tuple into its group
    fn merge_tuple(&mut self, tuple: &Tuple) -> ExecResult<()>;

    /// One tuple per group, `[group,] value`, groups in first-seen order
    fn results(&self) -> ExecResult<Vec<Tuple>>;

    /// Forget every group
    fn clear(&mut self);
}

/// Group bookkeeping that remembers the order groups first appeared in
struct Groups<S> {
    index: AHashMap<Option<Field>, usize>,
    entries: Vec<(Option<Field>, S)>,
}

impl<S: Default> Groups<S> {
    fn new() -> Self {
        Self {
            index: AHashMap::new(),
            entries: Vec::new(),
        }
    }

    fn state(&mut self, key: Option<Field>) -> &mut S {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                self.entries.push((key.clone(), S::default()));
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }
}

fn group_key(tuple: &Tuple, group_field: Option<usize>) -> ExecResult<Option<Field>> {
    group_field
        .map(|i| tuple.field(i).cloned())
        .transpose()
        .map_err(ExecError::from)
}

fn result_tuple(key: &Option<Field>, value: i32) -> Tuple {
    let mut fields = Vec::with_capacity(2);
    if let Some(key) = key {
        fields.push(key.clone());
    }
    fields.push(Field::Int(value));
    Tuple::new(fields)
}

#[derive(Debug, Default)]
struct IntState {
    value: Option<i64>,
    count: i64,
}

/// MIN, MAX, SUM, AVG and COUNT over an INT field.
///
/// Values accumulate in `i64`; a result outside the `i32` range is an error.
/// AVG truncates toward zero.
pub struct IntegerAggregator {
    group_field: Option<usize>,
    agg_field: usize,
    op: AggOp,
    groups: Groups<IntState>,
}

impl IntegerAggregator {
    pub fn new(group_field: Option<usize>, agg_field: usize, op: AggOp) -> Self {
        Self {
            group_field,
            agg_field,
            op,
            groups: Groups::new(),
        }
    }

    fn overflow(&self) -> ExecError {
        ExecError::Overflow(self.op.to_string())
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> ExecResult<()> {
        let field = tuple.field(self.agg_field)?;
        let value = field.as_int().ok_or_else(|| StorageError::TypeMismatch {
            expected: Type::Int.to_string(),
            actual: field.field_type().to_string(),
        })? as i64;
        let key = group_key(tuple, self.group_field)?;
        let op = self.op;
        let overflow = self.overflow();

        let state = self.groups.state(key);
        state.count += 1;
        state.value = Some(match (op, state.value) {
            (_, None) => value,
            (AggOp::Min, Some(current)) => current.min(value),
            (AggOp::Max, Some(current)) => current.max(value),
            (AggOp::Sum | AggOp::Avg, Some(current)) => {
                current.checked_add(value).ok_or(overflow)?
            }
            (AggOp::Count, Some(current)) => current,
        });
        Ok(())
    }

    fn results(&self) -> ExecResult<Vec<Tuple>> {
        self.groups
            .entries
            .iter()
            .map(|(key, state)| {
                let value = state.value.unwrap_or(0);
                let result = match self.op {
                    AggOp::Min | AggOp::Max | AggOp::Sum => value,
                    AggOp::Avg => value / state.count.max(1),
                    AggOp::Count => state.count,
                };
                let result = i32::try_from(result).map_err(|_| self.overflow())?;
                Ok(result_tuple(key, result))
            })
            .collect()
    }

    fn clear(&mut self) {
        self.groups.clear();
    }
}

/// COUNT over a STRING field
pub struct StringAggregator {
    group_field: Option<usize>,
    agg_field: usize,
    groups: Groups<i64>,
}

impl StringAggregator {
    /// Only `AggOp::Count` is supported
    pub fn new(group_field: Option<usize>, agg_field: usize, op: AggOp) -> ExecResult<Self> {
        if op != AggOp::Count {
            return Err(ExecError::UnsupportedAggregate {
                op,
                field_type: Type::String,
            });
        }
        Ok(Self {
            group_field,
            agg_field,
            groups: Groups::new(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> ExecResult<()> {
        tuple.field(self.agg_field)?;
        let key = group_key(tuple, self.group_field)?;
        *self.groups.state(key) += 1;
        Ok(())
    }

    fn results(&self) -> ExecResult<Vec<Tuple>> {
        self.groups
            .entries
            .iter()
            .map(|(key, count)| {
                let count = i32::try_from(*count)
                    .map_err(|_| ExecError::Overflow(AggOp::Count.to_string()))?;
                Ok(result_tuple(key, count))
            })
            .collect()
    }

    fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Computes one aggregate over the child, optionally grouped by one field.
///
/// The whole child is consumed in `open`. Output schema is
/// `[group field,] INT "op(field)"`. An empty child produces no rows.
pub struct Aggregate {
    child: Box<dyn DbIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggOp,
    desc: TupleDesc,
    aggregator: Box<dyn Aggregator>,
    results: Vec<Tuple>,
    pos: usize,
    cursor: Cursor,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn DbIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggOp,
    ) -> ExecResult<Self> {
        let child_desc = child.schema();
        let agg_type = child_desc.field_type(agg_field)?;
        let aggregator: Box<dyn Aggregator> = match agg_type {
            Type::Int => Box::new(IntegerAggregator::new(group_field, agg_field, op)),
            Type::String => Box::new(StringAggregator::new(group_field, agg_field, op)?),
        };

        let agg_name = child_desc.field_name(agg_field)?.unwrap_or("null");
        let mut items = Vec::with_capacity(2);
        if let Some(group) = group_field {
            items.push(TdItem::new(
                child_desc.field_type(group)?,
                child_desc.field_name(group)?.map(str::to_string),
            ));
        }
        items.push(TdItem::new(Type::Int, Some(format!("{}({})", op, agg_name))));

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            desc: TupleDesc::from_items(items),
            aggregator,
            results: Vec::new(),
            pos: 0,
            cursor: Cursor::default(),
        })
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    pub fn group_field_name(&self) -> Option<&str> {
        self.group_field
            .and_then(|i| self.child.schema().field_name(i).ok().flatten())
    }

    pub fn aggregate_field(&self) -> usize {
        self.agg_field
    }

    pub fn aggregate_field_name(&self) -> Option<&str> {
        self.child.schema().field_name(self.agg_field).ok().flatten()
    }

    pub fn aggregate_op(&self) -> AggOp {
        self.op
    }
}

impl DbIterator for Aggregate {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.aggregator.clear();
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.aggregator.merge_tuple(&tuple)?;
        }
        self.results = self.aggregator.results()?;
        self.pos = 0;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
        self.child.close();
        self.results.clear();
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
        let tuple = self.results.get(self.pos).cloned();
        if tuple.is_some() {
            self.pos += 1;
        }
        Ok(tuple)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
