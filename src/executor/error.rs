use thiserror::Error;

use super::aggregate::AggOp;
use crate::catalog::CatalogError;
use crate::file::{ErrorKind, StorageError};
use crate::record::Type;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Iterator is not open")]
    NotOpen,

    #[error("Iterator has no more tuples")]
    Exhausted,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Aggregate {op} is not supported over {field_type} fields")]
    UnsupportedAggregate { op: AggOp, field_type: Type },

    #[error("Result of {0} does not fit in an INT field")]
    Overflow(String),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::StorageError(err) => err.kind(),
            ExecError::CatalogError(err) => err.kind(),
            ExecError::Exhausted => ErrorKind::Exhausted,
            ExecError::NotOpen
            | ExecError::SchemaMismatch(_)
            | ExecError::UnsupportedAggregate { .. }
            | ExecError::Overflow(_) => ErrorKind::UsageError,
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
