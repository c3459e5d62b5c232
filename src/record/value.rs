use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::file::{StorageError, StorageResult};

/// Maximum number of bytes stored for a string field
pub const STRING_LEN: usize = 128;

/// Represents a column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,    // 4 bytes
    String, // 4-byte length + STRING_LEN bytes
}

impl Type {
    /// Get the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String => 4 + STRING_LEN,
        }
    }

    /// Parse a field value of this type from its textual form
    pub fn parse(&self, text: &str) -> StorageResult<Field> {
        match self {
            Type::Int => text.trim().parse::<i32>().map(Field::Int).map_err(|e| {
                StorageError::TypeMismatch {
                    expected: "INT".to_string(),
                    actual: format!("{:?} ({})", text, e),
                }
            }),
            Type::String => {
                if text.len() > STRING_LEN {
                    return Err(StorageError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        text.len(),
                        STRING_LEN
                    )));
                }
                Ok(Field::String(text.to_string()))
            }
        }
    }

    /// Decode one field of this type from exactly `self.size()` bytes
    pub fn deserialize(&self, bytes: &[u8]) -> StorageResult<Field> {
        if bytes.len() != self.size() {
            return Err(StorageError::Deserialization(format!(
                "Expected {} bytes for {}, got {}",
                self.size(),
                self,
                bytes.len()
            )));
        }

        match self {
            Type::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Field::Int(i32::from_le_bytes(buf)))
            }
            Type::String => {
                let mut len_buf = [0u8; 4];
                len_buf.copy_from_slice(&bytes[..4]);
                let len = u32::from_le_bytes(len_buf) as usize;
                if len > STRING_LEN {
                    return Err(StorageError::Deserialization(format!(
                        "String length {} exceeds max length {}",
                        len, STRING_LEN
                    )));
                }
                let s = String::from_utf8(bytes[4..4 + len].to_vec()).map_err(|e| {
                    StorageError::Deserialization(format!("Invalid UTF-8: {}", e))
                })?;
                Ok(Field::String(s))
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::String => write!(f, "STRING"),
        }
    }
}

/// Comparison operators usable in predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring containment for strings, equality for integers
    Like,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// Represents a single column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    /// Get the data type of this value
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::String(_) => Type::String,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(i) => Some(*i),
            Field::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Int(_) => None,
            Field::String(s) => Some(s),
        }
    }

    /// Serialize value to exactly `field_type().size()` bytes
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        match self {
            Field::Int(i) => Ok(i.to_le_bytes().to_vec()),
            Field::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > STRING_LEN {
                    return Err(StorageError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        STRING_LEN
                    )));
                }
                let mut result = vec![0u8; Type::String.size()];
                result[..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
                result[4..4 + bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
        }
    }

    /// Evaluate `self op other`
    pub fn compare(&self, op: Op, other: &Field) -> StorageResult<bool> {
        let ordering = match (self, other) {
            (Field::Int(a), Field::Int(b)) => a.cmp(b),
            (Field::String(a), Field::String(b)) => {
                if op == Op::Like {
                    return Ok(a.contains(b.as_str()));
                }
                a.cmp(b)
            }
            _ => {
                return Err(StorageError::TypeMismatch {
                    expected: self.field_type().to_string(),
                    actual: other.field_type().to_string(),
                });
            }
        };

        Ok(match op {
            Op::Equals | Op::Like => ordering == Ordering::Equal,
            Op::NotEquals => ordering != Ordering::Equal,
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::GreaterThanOrEq => ordering != Ordering::Less,
            Op::LessThan => ordering == Ordering::Less,
            Op::LessThanOrEq => ordering != Ordering::Greater,
        })
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(i) => write!(f, "{}", i),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Int(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::ErrorKind;

    #[test]
    fn test_type_size() {
        assert_eq!(Type::Int.size(), 4);
        assert_eq!(Type::String.size(), 132);
    }

    #[test]
    fn test_string_layout() {
        let bytes = Field::from("hello").serialize().unwrap();
        assert_eq!(bytes.len(), Type::String.size());
        assert_eq!(&bytes[..4], &5u32.to_le_bytes());
        assert_eq!(&bytes[4..9], b"hello");
        assert!(bytes[9..].iter().all(|&b| b == 0));

        assert_eq!(
            Type::String.deserialize(&bytes).unwrap(),
            Field::from("hello")
        );
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(STRING_LEN + 1);
        let err = Field::String(long.clone()).serialize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageError);
        assert!(Type::String.parse(&long).is_err());
    }

    #[test]
    fn test_corrupt_string_length() {
        let mut bytes = vec![0u8; Type::String.size()];
        bytes[..4].copy_from_slice(&(STRING_LEN as u32 + 1).to_le_bytes());
        let err = Type::String.deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_int_bytes() {
        let bytes = Field::Int(-7).serialize().unwrap();
        assert_eq!(bytes, (-7i32).to_le_bytes().to_vec());
        assert!(Type::Int.deserialize(&bytes[..3]).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Type::Int.parse(" 42 ").unwrap(), Field::Int(42));
        assert!(Type::Int.parse("forty-two").is_err());
        assert_eq!(Type::String.parse("abc").unwrap(), Field::from("abc"));
    }

    #[test]
    fn test_compare() {
        let one = Field::Int(1);
        let two = Field::Int(2);
        assert!(one.compare(Op::LessThan, &two).unwrap());
        assert!(one.compare(Op::LessThanOrEq, &one).unwrap());
        assert!(two.compare(Op::GreaterThan, &one).unwrap());
        assert!(one.compare(Op::NotEquals, &two).unwrap());
        assert!(one.compare(Op::Like, &one).unwrap());

        let hay = Field::from("haystack");
        assert!(hay.compare(Op::Like, &Field::from("st")).unwrap());
        assert!(!hay.compare(Op::Equals, &Field::from("st")).unwrap());

        let err = one.compare(Op::Equals, &hay).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageError);
    }
}
