use std::fmt;

use super::value::Field;
use crate::file::{PageId, StorageError, StorageResult};

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a tuple (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

/// A single tuple (row) with typed values.
///
/// Tuples read from a heap page carry the `RecordId` they were read from;
/// tuples synthesized by operators do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            record_id: None,
        }
    }

    /// Concatenate the fields of two tuples; the result has no record id
    pub fn merge(first: &Tuple, second: &Tuple) -> Self {
        let mut fields = Vec::with_capacity(first.len() + second.len());
        fields.extend_from_slice(&first.fields);
        fields.extend_from_slice(&second.fields);
        Self::new(fields)
    }

    /// Get the number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> StorageResult<&Field> {
        self.fields.get(index).ok_or(StorageError::FieldIndex {
            index,
            num_fields: self.fields.len(),
        })
    }

    pub fn set_field(&mut self, index: usize, field: Field) -> StorageResult<()> {
        let num_fields = self.fields.len();
        let slot = self
            .fields
            .get_mut(index)
            .ok_or(StorageError::FieldIndex { index, num_fields })?;
        *slot = field;
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::TableId;

    #[test]
    fn test_tuple_fields() {
        let mut tuple = Tuple::new(vec![Field::Int(1), Field::from("Alice")]);
        assert_eq!(tuple.len(), 2);
        assert_eq!(tuple.field(1).unwrap(), &Field::from("Alice"));
        assert!(tuple.field(2).is_err());

        tuple.set_field(0, Field::Int(9)).unwrap();
        assert_eq!(tuple.field(0).unwrap(), &Field::Int(9));
        assert!(tuple.set_field(5, Field::Int(0)).is_err());
    }

    #[test]
    fn test_merge_drops_record_id() {
        let rid = RecordId::new(PageId::new(TableId(3), 0), 4);
        let left = Tuple::new(vec![Field::Int(1)]).with_record_id(rid);
        let right = Tuple::new(vec![Field::from("x"), Field::Int(2)]);

        let merged = Tuple::merge(&left, &right);
        assert_eq!(
            merged.fields(),
            &[Field::Int(1), Field::from("x"), Field::Int(2)]
        );
        assert_eq!(merged.record_id(), None);
        assert_eq!(left.record_id(), Some(rid));
    }

    #[test]
    fn test_display() {
        let tuple = Tuple::new(vec![Field::Int(1), Field::from("a")]);
        assert_eq!(tuple.to_string(), "1\ta");
    }
}
