//! The Store Abstraction
//!
//! Everything above the storage layer talks to a [`Store`], never to a raw
//! table. A store owns its synchronization: each call is atomic with respect
//! to concurrent calls for the same key, and [`Store::update`] extends that
//! guarantee to a whole read-modify-write sequence.
//!
//! ## Contract
//!
//! | Operation | Meaning |
//! |-----------|---------|
//! | `get`     | Read a record without mutating anything (no lazy expiry here) |
//! | `save`    | Insert or overwrite a record |
//! | `delete`  | Remove a record, reporting whether one existed |
//! | `update`  | Inspect the current record and decide a [`Mutation`] under one lock |
//!
//! The in-memory [`StorageEngine`](crate::storage::StorageEngine) never fails
//! under normal operation. Backends that can fail (disk, network, a poisoned
//! lock) report it as a [`StoreError`] so callers can answer the client
//! instead of silently dropping the write.

use crate::storage::engine::Record;
use bytes::Bytes;
use thiserror::Error;

/// Errors reported by a store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A writer panicked while holding a shard lock
    #[error("storage lock poisoned")]
    Poisoned,

    /// The backing storage could not serve the request
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The decision returned by an [`Store::update`] closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Leave the key untouched
    Keep,
    /// Insert or overwrite the key with this record
    Put(Record),
    /// Remove the key
    Remove,
}

/// A key-value store for cache records.
///
/// Implementations must be shareable across connection tasks.
pub trait Store: Send + Sync {
    /// Returns the record stored under `key`, expired or not.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Record>>;

    /// Stores `record` under `key`, replacing any previous record.
    fn save(&self, key: Bytes, record: Record) -> StoreResult<()>;

    /// Removes `key`. Returns `true` if a record was removed.
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    /// Runs `f` against the current record for `key` while holding exclusive
    /// access to it, then applies the returned [`Mutation`].
    ///
    /// No other writer can touch `key` between the read and the write.
    /// Returns `true` if the store changed.
    fn update(
        &self,
        key: Bytes,
        f: &mut dyn FnMut(Option<&Record>) -> Mutation,
    ) -> StoreResult<bool>;
}
