//! In-memory student store.
//!
//! [`RecordStore`] owns the records in a single growable buffer and remembers
//! which order they are currently in. Lookups by id use binary search and
//! therefore only run while the store is sorted by id; asking for one in any
//! other order is an error rather than an arbitrary answer.
//!
//! Order bookkeeping:
//! - an empty store counts as sorted by id
//! - [`RecordStore::sort`] switches to the requested order
//! - an insert keeps the current order if the new record sorts at the end,
//!   otherwise the store becomes unordered
//! - deletes never change the order (survivors keep their relative positions)
use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroUsize;
use std::slice::Chunks;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::student::{validate_name, SortKey, Student};

/// Capacity of a freshly created store.
pub const INITIAL_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Unordered,
    Sorted(SortKey),
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Unordered => write!(f, "unordered"),
            Order::Sorted(key) => write!(f, "sorted by {key}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<Student>,
    order: Order,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self { records: Vec::with_capacity(INITIAL_CAPACITY), order: Order::Sorted(SortKey::ById) }
    }

    /// Empty store that holds at least `capacity` records before growing.
    pub fn with_capacity(capacity: usize) -> Result<Self, StoreError> {
        let capacity = capacity.max(INITIAL_CAPACITY);
        let mut records = Vec::new();
        records
            .try_reserve_exact(capacity)
            .map_err(|_| StoreError::OutOfMemory { requested: capacity })?;
        Ok(Self { records, order: Order::Sorted(SortKey::ById) })
    }

    /// Adopt `records` in the given order.
    ///
    /// Fails on a duplicate id or a name that does not fit the name buffer.
    /// The store is sorted by id if the ids happen to be strictly ascending.
    pub fn from_records(records: Vec<Student>) -> Result<Self, StoreError> {
        for s in &records {
            validate_name(&s.name)?;
        }
        let mut ids: Vec<i32> = records.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(StoreError::DuplicateId(pair[0]));
        }
        let order = if records.windows(2).all(|pair| pair[0].id < pair[1].id) {
            Order::Sorted(SortKey::ById)
        } else {
            Order::Unordered
        };
        Ok(Self { records, order })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn get(&self, index: usize) -> Option<&Student> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Student> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Student] {
        &self.records
    }

    /// Append a record at the logical end.
    pub fn insert(&mut self, student: Student) -> Result<(), StoreError> {
        validate_name(&student.name)?;
        if self.contains_id(student.id) {
            warn!(id = student.id, "rejected duplicate student id");
            return Err(StoreError::DuplicateId(student.id));
        }
        self.grow_if_full()?;
        if let (Order::Sorted(key), Some(last)) = (self.order, self.records.last()) {
            if key.compare(last, &student) == Ordering::Greater {
                self.order = Order::Unordered;
            }
        }
        self.records.push(student);
        Ok(())
    }

    /// Binary search for `id`. Requires the store to be sorted by id.
    pub fn find_by_id(&self, id: i32) -> Result<Option<usize>, StoreError> {
        if self.order != Order::Sorted(SortKey::ById) {
            return Err(StoreError::NotSortedById(self.order));
        }
        debug_assert!(self.records.windows(2).all(|pair| pair[0].id < pair[1].id));
        Ok(self.records.binary_search_by_key(&id, |s| s.id).ok())
    }

    /// First record whose name matches exactly, in current order.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|s| s.name == name)
    }

    /// Whether any record has `id`. Works in every order: binary search when
    /// sorted by id, a linear scan otherwise.
    pub fn contains_id(&self, id: i32) -> bool {
        match self.order {
            Order::Sorted(SortKey::ById) => self.records.binary_search_by_key(&id, |s| s.id).is_ok(),
            _ => self.records.iter().any(|s| s.id == id),
        }
    }

    /// Overwrite name, age and score of the record with `id`.
    ///
    /// Returns `Ok(false)` if no such record exists. The name is checked
    /// before anything is touched.
    pub fn update(
        &mut self,
        id: i32,
        name: impl Into<String>,
        age: i32,
        score: f32,
    ) -> Result<bool, StoreError> {
        let name = name.into();
        validate_name(&name)?;
        let Some(index) = self.find_by_id(id)? else {
            return Ok(false);
        };
        let student = &mut self.records[index];
        student.name = name;
        student.age = age;
        student.score = score;
        Ok(true)
    }

    /// Remove the record with `id`, shifting later records forward.
    pub fn delete(&mut self, id: i32) -> Result<bool, StoreError> {
        let Some(index) = self.find_by_id(id)? else {
            return Ok(false);
        };
        self.records.remove(index);
        Ok(true)
    }

    /// Reorder ascending by `key`. Stable, so repeated sorts are no-ops.
    pub fn sort(&mut self, key: SortKey) {
        self.records.sort_by(|a, b| key.compare(a, b));
        self.order = Order::Sorted(key);
    }

    /// Consecutive pages of at most `page_size` records in current order.
    pub fn paginate(&self, page_size: NonZeroUsize) -> Chunks<'_, Student> {
        self.records.chunks(page_size.get())
    }

    pub fn page_count(&self, page_size: NonZeroUsize) -> usize {
        self.records.len().div_ceil(page_size.get())
    }

    /// Double the buffer when it is full.
    fn grow_if_full(&mut self) -> Result<(), StoreError> {
        let len = self.records.len();
        if len < self.records.capacity() {
            return Ok(());
        }
        let additional = len.max(INITIAL_CAPACITY);
        self.records
            .try_reserve_exact(additional)
            .map_err(|_| StoreError::OutOfMemory { requested: len + additional })?;
        debug!(len, capacity = self.records.capacity(), "grew student store");
        Ok(())
    }
}
