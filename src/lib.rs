//! Student record store with binary file persistence.
//!
//! This crate provides the core used by the `student_db` menu binary and the
//! `inspect` tool:
//!
//! - `student`: the record type, its sort keys and field limits
//! - `store`: the growable in-memory store with sort, binary search by id,
//!   linear search by name and pagination
//! - `codec`: the fixed-width little-endian file format with a CRC-32 trailer
//! - `driver`: the interactive menu session, reading from an abstract input
//!   source so it can be scripted
//! - `error`: typed errors for the above
pub mod codec;
pub mod driver;
pub mod error;
pub mod store;
pub mod student;

pub use error::{CodecError, SessionError, StoreError};
pub use store::{Order, RecordStore};
pub use student::{SortKey, Student};
