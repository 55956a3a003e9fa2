//! The student record and the keys it can be ordered by.
use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

use crate::error::StoreError;

/// Size of the on-disk name buffer, terminator included.
pub const NAME_BUF_LEN: usize = 50;
/// Longest name (in bytes) that fits the buffer with its NUL terminator.
pub const MAX_NAME_LEN: usize = NAME_BUF_LEN - 1;

/// Accepted by the menu driver; the store itself does not check these.
pub const ID_RANGE: RangeInclusive<i32> = 1..=9999;
pub const AGE_RANGE: RangeInclusive<i32> = 5..=30;
pub const SCORE_RANGE: RangeInclusive<f32> = 0.0..=100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    /// Unique within a store.
    pub id: i32,
    /// At most [`MAX_NAME_LEN`] bytes, no NUL.
    pub name: String,
    pub age: i32,
    pub score: f32,
}

impl Student {
    pub fn new(id: i32, name: impl Into<String>, age: i32, score: f32) -> Self {
        Self { id, name: name.into(), age, score }
    }
}

/// Check that `name` can be stored in the fixed name buffer.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::NameTooLong { len: name.len(), max: MAX_NAME_LEN });
    }
    if name.as_bytes().contains(&0) {
        return Err(StoreError::NameHasNul);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    ById,
    ByName,
    ByScore,
}

impl SortKey {
    /// Ascending comparison of two students under this key.
    pub fn compare(self, a: &Student, b: &Student) -> Ordering {
        match self {
            SortKey::ById => a.id.cmp(&b.id),
            // String ordering is byte-wise, i.e. case-sensitive.
            SortKey::ByName => a.name.as_bytes().cmp(b.name.as_bytes()),
            SortKey::ByScore => a.score.total_cmp(&b.score),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::ById => write!(f, "id"),
            SortKey::ByName => write!(f, "name"),
            SortKey::ByScore => write!(f, "score"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown sort key {0:?} (expected id, name or score)")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" | "roll" => Ok(SortKey::ById),
            "name" => Ok(SortKey::ByName),
            "score" | "marks" => Ok(SortKey::ByScore),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_limit_is_in_bytes() {
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_name(&"a".repeat(MAX_NAME_LEN + 1)),
            Err(StoreError::NameTooLong { len: 50, max: 49 })
        ));
        // 25 two-byte chars = 50 bytes
        assert!(validate_name(&"é".repeat(25)).is_err());
        assert!(validate_name("").is_ok());
    }

    #[test]
    fn nul_in_name_rejected() {
        assert!(matches!(validate_name("Al\0ice"), Err(StoreError::NameHasNul)));
    }

    #[test]
    fn name_order_is_case_sensitive() {
        let upper = Student::new(1, "Zed", 20, 0.0);
        let lower = Student::new(2, "alice", 20, 0.0);
        assert_eq!(SortKey::ByName.compare(&upper, &lower), Ordering::Less);
    }

    #[test]
    fn parse_sort_key() {
        assert_eq!("ID".parse::<SortKey>().unwrap(), SortKey::ById);
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::ByName);
        assert_eq!("marks".parse::<SortKey>().unwrap(), SortKey::ByScore);
        assert!("age".parse::<SortKey>().is_err());
    }
}
