//! Error types shared by the store, the codec and the menu session.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::Order;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Growing the record buffer failed. Not recoverable.
    #[error("out of memory while growing the store to {requested} records")]
    OutOfMemory { requested: usize },

    #[error("a student with id {0} already exists")]
    DuplicateId(i32),

    #[error("name is {len} bytes long, the limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("name contains a NUL byte")]
    NameHasNul,

    /// Binary search was requested while the store is in another order.
    #[error("store must be sorted by id for this lookup (current order: {0})")]
    NotSortedById(Order),
}

impl StoreError {
    /// Whether the caller can carry on after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::OutOfMemory { .. })
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed store data: {0}")]
    Malformed(String),

    #[error("{0} records do not fit the count header")]
    TooManyRecords(usize),

    #[error("record encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CodecError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        CodecError::Io { action, path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("saving on exit failed: {0}")]
    Save(#[source] CodecError),

    #[error("fatal store error: {0}")]
    Fatal(#[source] StoreError),
}
