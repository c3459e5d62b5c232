use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file::{ErrorKind, StorageError, TableId};
use crate::record::{HeapFile, TdItem, TupleDesc, Type};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table {0} not found")]
    TableNameNotFound(String),

    #[error("Invalid catalog entry: {0}")]
    InvalidSchemaLine(String),

    #[error("Unknown type {0}")]
    UnknownType(String),

    #[error("Unknown annotation {0}")]
    UnknownAnnotation(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::IoError(_) => ErrorKind::IoFailure,
            CatalogError::StorageError(err) => err.kind(),
            CatalogError::TableNotFound(_) | CatalogError::TableNameNotFound(_) => {
                ErrorKind::NotFound
            }
            CatalogError::JsonError(_)
            | CatalogError::InvalidSchemaLine(_)
            | CatalogError::UnknownType(_)
            | CatalogError::UnknownAnnotation(_) => ErrorKind::Malformed,
            CatalogError::RegexError(_) => ErrorKind::UsageError,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub column_type: Type,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub path: PathBuf,
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn schema(&self) -> TupleDesc {
        let items = self
            .columns
            .iter()
            .map(|c| TdItem::new(c.column_type, c.name.clone()))
            .collect();
        TupleDesc::from_items(items)
    }
}

/// JSON snapshot of every registered table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub tables: Vec<TableMetadata>,
}

/// A registered table
pub struct TableEntry {
    id: TableId,
    name: String,
    file: Arc<HeapFile>,
    primary_key: Option<String>,
}

impl TableEntry {
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &Arc<HeapFile> {
        &self.file
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        self.file.schema()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    fn metadata(&self) -> TableMetadata {
        TableMetadata {
            name: self.name.clone(),
            path: self.file.path().to_path_buf(),
            primary_key: self.primary_key.clone(),
            columns: self
                .schema()
                .items()
                .iter()
                .map(|item| ColumnMetadata {
                    name: item.name.clone(),
                    column_type: item.field_type,
                })
                .collect(),
        }
    }
}

#[derive(Default)]
struct CatalogState {
    tables: BTreeMap<TableId, Arc<TableEntry>>,
    ids: HashMap<String, TableId>,
    next_id: u32,
}

/// Registry of tables: id -> heap file, name and primary key.
///
/// Adding a table whose name is already registered replaces the earlier entry.
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open (or create) the backing file at `path` and register it under `name`
    pub fn add_table<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        desc: TupleDesc,
        primary_key: Option<&str>,
    ) -> CatalogResult<TableId> {
        let mut state = self.write();
        let id = TableId(state.next_id);
        let file = HeapFile::open(path, desc, id)?;
        state.next_id += 1;

        if let Some(old) = state.ids.insert(name.to_string(), id) {
            state.tables.remove(&old);
        }
        state.tables.insert(
            id,
            Arc::new(TableEntry {
                id,
                name: name.to_string(),
                file: Arc::new(file),
                primary_key: primary_key.map(str::to_string),
            }),
        );

        Ok(id)
    }

    pub fn resolve(&self, table_id: TableId) -> CatalogResult<Arc<TableEntry>> {
        self.read()
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn heap_file(&self, table_id: TableId) -> Option<Arc<HeapFile>> {
        self.read()
            .tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
    }

    pub fn schema(&self, table_id: TableId) -> CatalogResult<Arc<TupleDesc>> {
        Ok(Arc::clone(self.resolve(table_id)?.schema()))
    }

    pub fn table_id(&self, name: &str) -> CatalogResult<TableId> {
        self.read()
            .ids
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::TableNameNotFound(name.to_string()))
    }

    pub fn table_name(&self, table_id: TableId) -> CatalogResult<String> {
        Ok(self.resolve(table_id)?.name.clone())
    }

    pub fn primary_key(&self, table_id: TableId) -> CatalogResult<Option<String>> {
        Ok(self.resolve(table_id)?.primary_key.clone())
    }

    /// Registered table ids, ascending
    pub fn table_ids(&self) -> Vec<TableId> {
        self.read().tables.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tables.is_empty()
    }

    /// Forget every table. Ids are not reused.
    pub fn clear(&self) {
        let mut state = self.write();
        state.tables.clear();
        state.ids.clear();
    }

    /// Register every table described in a text schema file.
    ///
    /// One table per line: `name (field type [pk], field type, ...)`, types
    /// `int` or `string`. Table `name` is backed by `name.dat` next to the
    /// schema file.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> CatalogResult<Vec<TableId>> {
        let path = path.as_ref();
        let base_dir = fs::canonicalize(path)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let content = fs::read_to_string(path)?;
        let line_re = Regex::new(r"^\s*(\w+)\s*\((.*)\)\s*$")?;

        let mut added = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let caps = line_re
                .captures(line)
                .ok_or_else(|| CatalogError::InvalidSchemaLine(line.to_string()))?;
            let name = &caps[1];
            let (desc, primary_key) = parse_columns(line, &caps[2])?;

            info!("Added table {} with schema {}", name, desc);
            let id = self.add_table(
                name,
                base_dir.join(format!("{}.dat", name)),
                desc,
                primary_key.as_deref(),
            )?;
            added.push(id);
        }

        Ok(added)
    }

    pub fn metadata(&self) -> CatalogMetadata {
        CatalogMetadata {
            tables: self
                .read()
                .tables
                .values()
                .map(|entry| entry.metadata())
                .collect(),
        }
    }

    pub fn save_metadata<P: AsRef<Path>>(&self, path: P) -> CatalogResult<()> {
        let content = serde_json::to_string_pretty(&self.metadata())?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Register every table listed in a JSON snapshot written by `save_metadata`
    pub fn load_metadata<P: AsRef<Path>>(&self, path: P) -> CatalogResult<Vec<TableId>> {
        let content = fs::read_to_string(path)?;
        let metadata: CatalogMetadata = serde_json::from_str(&content)?;

        let mut added = Vec::with_capacity(metadata.tables.len());
        for table in &metadata.tables {
            added.push(self.add_table(
                &table.name,
                &table.path,
                table.schema(),
                table.primary_key.as_deref(),
            )?);
        }
        info!("Loaded {} tables from metadata", added.len());

        Ok(added)
    }
}

fn parse_columns(line: &str, columns: &str) -> CatalogResult<(TupleDesc, Option<String>)> {
    let mut types = Vec::new();
    let mut names = Vec::new();
    let mut primary_key = None;

    for column in columns.split(',') {
        let parts: Vec<&str> = column.split_whitespace().collect();
        let (name, type_name, annotation) = match parts.as_slice() {
            [name, type_name] => (*name, *type_name, None),
            [name, type_name, annotation] => (*name, *type_name, Some(*annotation)),
            _ => return Err(CatalogError::InvalidSchemaLine(line.to_string())),
        };

        let field_type = match type_name.to_lowercase().as_str() {
            "int" => Type::Int,
            "string" => Type::String,
            _ => return Err(CatalogError::UnknownType(type_name.to_string())),
        };

        match annotation {
            None => {}
            Some("pk") => primary_key = Some(name.to_string()),
            Some(other) => return Err(CatalogError::UnknownAnnotation(other.to_string())),
        }

        types.push(field_type);
        names.push(name.to_string());
    }

    Ok((TupleDesc::new(types, names), primary_key))
}
