pub mod catalog;
pub mod database;
pub mod executor;
pub mod file;
pub mod record;

pub use catalog::{Catalog, CatalogError, CatalogResult, TableEntry};
pub use database::{Database, DatabaseError, DatabaseResult};
pub use executor::{
    AggOp, Aggregate, DbIterator, Delete, ExecError, ExecResult, Filter, HashEquiJoin, Insert,
    JoinPredicate, Predicate, SeqScan, TupleIterator,
};
pub use file::{
    BufferPool, DEFAULT_POOL_PAGES, ErrorKind, EvictionPolicy, PAGE_SIZE, PageId, Permissions,
    StorageError, StorageResult, TableId, TransactionId,
};
pub use record::{Field, HeapFile, HeapPage, Op, RecordId, Tuple, TupleDesc, Type};
