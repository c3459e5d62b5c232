use std::io;
use std::path::Path;
use std::sync::Arc;

use csv::ReaderBuilder;
use log::info;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::file::{
    BufferPool, ErrorKind, EvictionPolicy, LockCoordinator, StorageError, TableId, TransactionId,
};
use crate::record::{Field, Tuple, Type};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Cannot read/write file: {0}")]
    IoError(#[from] io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Unknown column type {0}")]
    UnknownType(String),

    #[error("Line {line}: expected {expected} fields, got {actual}")]
    ColumnCount {
        line: u64,
        expected: usize,
        actual: usize,
    },
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::IoError(_) => ErrorKind::IoFailure,
            DatabaseError::CsvError(err) if err.is_io_error() => ErrorKind::IoFailure,
            DatabaseError::CsvError(_) | DatabaseError::ColumnCount { .. } => ErrorKind::Malformed,
            DatabaseError::CatalogError(err) => err.kind(),
            DatabaseError::StorageError(err) => err.kind(),
            DatabaseError::UnknownType(_) => ErrorKind::UsageError,
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Parse a comma-separated list of column types, e.g. `int,string,int`
pub fn parse_types(spec: &str) -> DatabaseResult<Vec<Type>> {
    spec.split(',')
        .map(|name| match name.trim().to_lowercase().as_str() {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::String),
            other => Err(DatabaseError::UnknownType(other.to_string())),
        })
        .collect()
}

/// The catalog and buffer pool shared by every component of one engine instance
pub struct Database {
    catalog: Arc<Catalog>,
    pool: Arc<BufferPool>,
}

impl Database {
    /// Empty catalog and a pool of `num_pages` pages
    pub fn new(num_pages: usize) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = Arc::new(BufferPool::new(Arc::clone(&catalog), num_pages));
        Self { catalog, pool }
    }

    pub fn with_pool_config(
        num_pages: usize,
        policy: EvictionPolicy,
        locks: Arc<dyn LockCoordinator>,
    ) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = Arc::new(BufferPool::with_policy(
            Arc::clone(&catalog),
            num_pages,
            policy,
            locks,
        ));
        Self { catalog, pool }
    }

    /// Build a database whose catalog is read from a text schema file
    pub fn from_schema<P: AsRef<Path>>(path: P, num_pages: usize) -> DatabaseResult<Self> {
        let db = Self::new(num_pages);
        db.catalog.load_schema(path)?;
        Ok(db)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Replace the buffer pool with an empty one of `num_pages` pages.
    ///
    /// Dirty pages of the old pool are written first.
    pub fn reset_buffer_pool(&mut self, num_pages: usize) -> DatabaseResult<()> {
        self.pool.flush_all()?;
        self.pool = Arc::new(BufferPool::with_policy(
            Arc::clone(&self.catalog),
            num_pages,
            self.pool.policy(),
            self.pool.lock_coordinator(),
        ));
        Ok(())
    }

    /// Insert every row of a delimited text file into a table, then flush.
    ///
    /// Fields are parsed according to the table's column types. Returns the
    /// number of rows inserted.
    pub fn load_csv<P: AsRef<Path>>(
        &self,
        table_id: TableId,
        csv_path: P,
        delimiter: u8,
    ) -> DatabaseResult<usize> {
        let schema = self.catalog.schema(table_id)?;
        let tid = TransactionId::new();

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(csv_path.as_ref())?;

        let mut inserted = 0;
        for result in reader.records() {
            let record = result?;
            if record.len() != schema.num_fields() {
                return Err(DatabaseError::ColumnCount {
                    line: record.position().map_or(0, |p| p.line()),
                    expected: schema.num_fields(),
                    actual: record.len(),
                });
            }

            let fields = schema
                .items()
                .iter()
                .zip(record.iter())
                .map(|(item, text)| item.field_type.parse(text))
                .collect::<Result<Vec<Field>, _>>()?;

            self.pool.insert_tuple(tid, table_id, Tuple::new(fields))?;
            inserted += 1;
        }

        self.pool.flush_all()?;
        info!(
            "Loaded {} rows from {} into table {}",
            inserted,
            csv_path.as_ref().display(),
            table_id
        );

        Ok(inserted)
    }
}
