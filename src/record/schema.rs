use std::fmt;

use super::tuple::Tuple;
use super::value::Type;
use crate::file::{StorageError, StorageResult};

/// One column of a tuple descriptor
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

impl TdItem {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }

    /// Get the size of this column in bytes
    pub fn size(&self) -> usize {
        self.field_type.size()
    }
}

/// Tuple descriptor: the ordered (type, name) pairs of a tuple
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
    byte_size: usize,
}

impl TupleDesc {
    /// Create a descriptor from parallel type and name lists
    pub fn new(types: Vec<Type>, names: Vec<String>) -> Self {
        let mut names = names.into_iter();
        let items = types
            .into_iter()
            .map(|field_type| TdItem::new(field_type, names.next()))
            .collect();
        Self::from_items(items)
    }

    /// Create a descriptor with anonymous fields
    pub fn unnamed(types: Vec<Type>) -> Self {
        Self::from_items(types.into_iter().map(|t| TdItem::new(t, None)).collect())
    }

    pub fn from_items(items: Vec<TdItem>) -> Self {
        let byte_size = items.iter().map(|item| item.size()).sum();
        Self { items, byte_size }
    }

    /// Concatenate two descriptors, `first` fields followed by `second` fields
    pub fn merge(first: &TupleDesc, second: &TupleDesc) -> Self {
        let items = first
            .items
            .iter()
            .chain(second.items.iter())
            .cloned()
            .collect();
        Self::from_items(items)
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    /// Total tuple width in bytes
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    fn item(&self, index: usize) -> StorageResult<&TdItem> {
        self.items.get(index).ok_or(StorageError::FieldIndex {
            index,
            num_fields: self.items.len(),
        })
    }

    pub fn field_type(&self, index: usize) -> StorageResult<Type> {
        Ok(self.item(index)?.field_type)
    }

    pub fn field_name(&self, index: usize) -> StorageResult<Option<&str>> {
        Ok(self.item(index)?.name.as_deref())
    }

    /// Find a field index by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    /// Byte offset of a field within a serialized tuple
    pub fn field_offset(&self, index: usize) -> usize {
        self.items[..index.min(self.items.len())]
            .iter()
            .map(|item| item.size())
            .sum()
    }

    /// Copy of this descriptor with every name prefixed by `prefix.`
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let items = self
            .items
            .iter()
            .map(|item| {
                let name = item.name.as_deref().unwrap_or("null");
                TdItem::new(item.field_type, Some(format!("{}.{}", prefix, name)))
            })
            .collect();
        Self::from_items(items)
    }

    /// Check that a tuple has exactly this descriptor's arity and types
    pub fn validate(&self, tuple: &Tuple) -> StorageResult<()> {
        if tuple.len() != self.items.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "Expected {} fields, got {}",
                self.items.len(),
                tuple.len()
            )));
        }

        for (field, item) in tuple.fields().iter().zip(&self.items) {
            if field.field_type() != item.field_type {
                return Err(StorageError::TypeMismatch {
                    expected: item.field_type.to_string(),
                    actual: field.field_type().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Encode a tuple into exactly `byte_size()` bytes
    pub fn serialize(&self, tuple: &Tuple) -> StorageResult<Vec<u8>> {
        self.validate(tuple)?;

        let mut result = Vec::with_capacity(self.byte_size);
        for field in tuple.fields() {
            result.extend_from_slice(&field.serialize()?);
        }
        Ok(result)
    }

    /// Decode a tuple from exactly `byte_size()` bytes
    pub fn deserialize(&self, data: &[u8]) -> StorageResult<Tuple> {
        if data.len() != self.byte_size {
            return Err(StorageError::Deserialization(format!(
                "Expected {} bytes, got {}",
                self.byte_size,
                data.len()
            )));
        }

        let mut offset = 0;
        let mut fields = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let size = item.size();
            fields.push(item.field_type.deserialize(&data[offset..offset + size])?);
            offset += size;
        }

        Ok(Tuple::new(fields))
    }
}

/// Descriptors are equal when their field types match position by position
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({})",
                item.field_type,
                item.name.as_deref().unwrap_or("null")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::ErrorKind;
    use crate::record::Field;

    fn create_test_desc() -> TupleDesc {
        TupleDesc::new(
            vec![Type::Int, Type::String, Type::Int],
            vec!["id".to_string(), "name".to_string(), "score".to_string()],
        )
    }

    #[test]
    fn test_desc_creation() {
        let desc = create_test_desc();
        assert_eq!(desc.num_fields(), 3);
        assert_eq!(desc.byte_size(), 4 + 132 + 4);
        assert_eq!(desc.field_type(1).unwrap(), Type::String);
        assert_eq!(desc.field_name(2).unwrap(), Some("score"));
    }

    #[test]
    fn test_invalid_field_index() {
        let desc = create_test_desc();
        let err = desc.field_type(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageError);
        assert!(desc.field_name(10).is_err());
    }

    #[test]
    fn test_index_of_and_offset() {
        let desc = create_test_desc();
        assert_eq!(desc.index_of("name"), Some(1));
        assert_eq!(desc.index_of("missing"), None);
        assert_eq!(desc.field_offset(0), 0);
        assert_eq!(desc.field_offset(2), 4 + 132);
    }

    #[test]
    fn test_merge() {
        let left = TupleDesc::new(vec![Type::Int], vec!["a".to_string()]);
        let right = create_test_desc();
        let merged = TupleDesc::merge(&left, &right);
        assert_eq!(merged.num_fields(), 4);
        assert_eq!(merged.byte_size(), left.byte_size() + right.byte_size());
        assert_eq!(merged.field_name(0).unwrap(), Some("a"));
        assert_eq!(merged.field_name(1).unwrap(), Some("id"));
    }

    #[test]
    fn test_equality_ignores_names() {
        let named = TupleDesc::new(vec![Type::Int, Type::String], vec!["x".into(), "y".into()]);
        let unnamed = TupleDesc::unnamed(vec![Type::Int, Type::String]);
        assert_eq!(named, unnamed);
        assert_ne!(named, TupleDesc::unnamed(vec![Type::String, Type::Int]));
    }

    #[test]
    fn test_with_prefix() {
        let desc = create_test_desc().with_prefix("t");
        assert_eq!(desc.field_name(0).unwrap(), Some("t.id"));
        let anon = TupleDesc::unnamed(vec![Type::Int]).with_prefix("t");
        assert_eq!(anon.field_name(0).unwrap(), Some("t.null"));
    }

    #[test]
    fn test_validate() {
        let desc = create_test_desc();
        let good = Tuple::new(vec![Field::Int(1), Field::from("a"), Field::Int(2)]);
        assert!(desc.validate(&good).is_ok());

        let short = Tuple::new(vec![Field::Int(1)]);
        assert!(matches!(
            desc.validate(&short),
            Err(StorageError::SchemaMismatch(_))
        ));

        let wrong_type = Tuple::new(vec![Field::from("a"), Field::from("a"), Field::Int(2)]);
        assert!(matches!(
            desc.validate(&wrong_type),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_serialize_layout() {
        let desc = create_test_desc();
        let tuple = Tuple::new(vec![Field::Int(7), Field::from("bob"), Field::Int(-1)]);
        let bytes = desc.serialize(&tuple).unwrap();
        assert_eq!(bytes.len(), desc.byte_size());
        assert_eq!(&bytes[..4], &7i32.to_le_bytes());
        assert_eq!(&bytes[desc.field_offset(2)..], &(-1i32).to_le_bytes());

        let decoded = desc.deserialize(&bytes).unwrap();
        assert_eq!(decoded.fields(), tuple.fields());
        assert!(desc.deserialize(&bytes[1..]).is_err());
    }
}
