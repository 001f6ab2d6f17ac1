//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the in-memory [`Store`] for FlashCache: a sharded,
//! concurrent HashMap of cache records with absolute expiration times.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Lazy Expiry**: Readers decide what to do with an expired record; `get` never mutates.
//! 3. **Active Expiry**: `cleanup_expired` is called periodically by the background sweeper.
//! 4. **RwLock**: Allows multiple concurrent readers with exclusive writers.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function. A read-modify-write
//! through [`Store::update`] holds the key's shard write lock for its whole
//! duration, so no other writer can interleave with it.

use crate::storage::store::{Mutation, Store, StoreError, StoreResult};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of shards for the storage engine.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// Returns the current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Converts a client-supplied relative TTL into an absolute expiration.
///
/// `0` stays `0` (never expires). Anything else becomes `now + exptime`,
/// clamped to `1` so a large negative TTL is already expired instead of
/// turning into "never".
pub fn absolute_expiry(exptime: i64, now: u64) -> u64 {
    if exptime == 0 {
        return 0;
    }
    let at = (now as i64).saturating_add(exptime);
    if at <= 0 {
        1
    } else {
        at as u64
    }
}

/// A cached value together with its client flags and expiration.
///
/// The byte count is always derived from the payload itself, so a record can
/// never advertise a length that differs from what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The raw payload
    data: Bytes,
    /// Opaque client flags, echoed back on reads
    flags: u32,
    /// Absolute expiration in Unix seconds (0 = never expires)
    expires_at: u64,
}

impl Record {
    /// Creates a new record.
    pub fn new(data: impl Into<Bytes>, flags: u32, expires_at: u64) -> Self {
        Self {
            data: data.into(),
            flags,
            expires_at,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Length of the payload in bytes.
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.data.len()
    }

    /// Checks if this record has expired at the given Unix time.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at != 0 && self.expires_at < now
    }

    /// Checks if this record has expired right now.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Returns a copy of this record with `suffix` added after the payload.
    ///
    /// Flags are kept; the expiration is replaced with `expires_at`.
    pub fn appended(&self, suffix: &[u8], expires_at: u64) -> Self {
        Self::new(concat(&self.data, suffix), self.flags, expires_at)
    }

    /// Returns a copy of this record with `prefix` added before the payload.
    ///
    /// Flags are kept; the expiration is replaced with `expires_at`.
    pub fn prepended(&self, prefix: &[u8], expires_at: u64) -> Self {
        Self::new(concat(prefix, &self.data), self.flags, expires_at)
    }
}

fn concat(head: &[u8], tail: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(head.len() + tail.len());
    buf.extend_from_slice(head);
    buf.extend_from_slice(tail);
    buf.freeze()
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug)]
struct Shard {
    data: RwLock<HashMap<Bytes, Record>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

/// The in-memory storage engine for FlashCache.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use flashcache::storage::{Record, StorageEngine, Store};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.save(Bytes::from("name"), Record::new("Ariz", 0, 0)).unwrap();
///
/// let record = engine.get(b"name").unwrap().unwrap();
/// assert_eq!(record.data(), &Bytes::from("Ariz"));
/// assert_eq!(record.byte_count(), 4);
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of keys (approximate)
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total writes (save and update puts)
    set_count: AtomicU64,

    /// Statistics: total removals (delete and update removes)
    del_count: AtomicU64,

    /// Statistics: number of expired keys cleaned up by the sweeper
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new storage engine with default settings.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn read_shard(&self, key: &[u8]) -> StoreResult<RwLockReadGuard<'_, HashMap<Bytes, Record>>> {
        self.get_shard(key)
            .data
            .read()
            .map_err(|_| StoreError::Poisoned)
    }

    fn write_shard(
        &self,
        key: &[u8],
    ) -> StoreResult<RwLockWriteGuard<'_, HashMap<Bytes, Record>>> {
        self.get_shard(key)
            .data
            .write()
            .map_err(|_| StoreError::Poisoned)
    }

    /// Returns the approximate number of keys in the store.
    ///
    /// Expired records that have not been cleaned up yet are counted.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Removes expired records from all shards.
    ///
    /// This is called by the background expiry sweeper. Shards whose lock is
    /// poisoned are skipped.
    ///
    /// # Returns
    ///
    /// Returns the number of records that were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = unix_now();
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let Ok(mut data) = shard.data.write() else {
                continue;
            };
            let before = data.len();

            data.retain(|_, record| !record.is_expired_at(now));

            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        cleaned
    }
}

impl Store for StorageEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Record>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let data = self.read_shard(key)?;
        Ok(data.get(key).cloned())
    }

    fn save(&self, key: Bytes, record: Record) -> StoreResult<()> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.write_shard(&key)?;
        if data.insert(key, record).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.write_shard(key)?;
        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn update(
        &self,
        key: Bytes,
        f: &mut dyn FnMut(Option<&Record>) -> Mutation,
    ) -> StoreResult<bool> {
        let mut data = self.write_shard(&key)?;
        let mutation = f(data.get(&key));

        match mutation {
            Mutation::Keep => Ok(false),
            Mutation::Put(record) => {
                self.set_count.fetch_add(1, Ordering::Relaxed);
                if data.insert(key, record).is_none() {
                    self.key_count.fetch_add(1, Ordering::Relaxed);
                }
                Ok(true)
            }
            Mutation::Remove => {
                self.del_count.fetch_add(1, Ordering::Relaxed);
                if data.remove(&key).is_some() {
                    self.key_count.fetch_sub(1, Ordering::Relaxed);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

/// Storage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_save_and_get() {
        let engine = StorageEngine::new();

        engine.save(key("key"), Record::new("value", 7, 0)).unwrap();

        let record = engine.get(b"key").unwrap().unwrap();
        assert_eq!(record.data(), &Bytes::from("value"));
        assert_eq!(record.flags(), 7);
        assert_eq!(record.byte_count(), 5);
        assert_eq!(record.expires_at(), 0);
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let engine = StorageEngine::new();

        engine.save(key("key"), Record::new("one", 1, 0)).unwrap();
        engine.save(key("key"), Record::new("three", 3, 0)).unwrap();

        let record = engine.get(b"key").unwrap().unwrap();
        assert_eq!(record.data(), &Bytes::from("three"));
        assert_eq!(record.flags(), 3);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_delete() {
        let engine = StorageEngine::new();

        engine.save(key("key"), Record::new("value", 0, 0)).unwrap();
        assert!(engine.delete(b"key").unwrap());
        assert_eq!(engine.get(b"key").unwrap(), None);
        assert!(!engine.delete(b"key").unwrap()); // Already deleted
        assert!(engine.is_empty());
    }

    #[test]
    fn test_get_does_not_remove_expired() {
        let engine = StorageEngine::new();

        engine.save(key("old"), Record::new("value", 0, 1)).unwrap();

        // The store hands back expired records; lazy expiry is the caller's job
        let record = engine.get(b"old").unwrap().unwrap();
        assert!(record.is_expired());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_expiry_check() {
        let never = Record::new("v", 0, 0);
        assert!(!never.is_expired_at(u64::MAX));

        let record = Record::new("v", 0, 100);
        assert!(!record.is_expired_at(99));
        assert!(!record.is_expired_at(100));
        assert!(record.is_expired_at(101));
    }

    #[test]
    fn test_absolute_expiry() {
        assert_eq!(absolute_expiry(0, 1_000), 0);
        assert_eq!(absolute_expiry(60, 1_000), 1_060);
        assert_eq!(absolute_expiry(-1, 1_000), 999);
        assert_eq!(absolute_expiry(-5_000, 1_000), 1);
    }

    #[test]
    fn test_append_prepend_keep_byte_count() {
        let record = Record::new("bar", 5, 0);

        let appended = record.appended(b"baz", 42);
        assert_eq!(appended.data(), &Bytes::from("barbaz"));
        assert_eq!(appended.byte_count(), 6);
        assert_eq!(appended.flags(), 5);
        assert_eq!(appended.expires_at(), 42);

        let prepended = record.prepended(b"foo", 0);
        assert_eq!(prepended.data(), &Bytes::from("foobar"));
        assert_eq!(prepended.byte_count(), 6);
    }

    #[test]
    fn test_update_put_keep_remove() {
        let engine = StorageEngine::new();

        // Put on absent key
        let changed = engine
            .update(key("k"), &mut |current| {
                assert!(current.is_none());
                Mutation::Put(Record::new("v1", 0, 0))
            })
            .unwrap();
        assert!(changed);
        assert_eq!(engine.len(), 1);

        // Keep leaves the record alone
        let changed = engine
            .update(key("k"), &mut |current| {
                assert_eq!(current.map(|r| r.data().clone()), Some(Bytes::from("v1")));
                Mutation::Keep
            })
            .unwrap();
        assert!(!changed);

        // Remove
        let changed = engine.update(key("k"), &mut |_| Mutation::Remove).unwrap();
        assert!(changed);
        assert!(engine.is_empty());

        // Remove on absent key changes nothing
        let changed = engine.update(key("k"), &mut |_| Mutation::Remove).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();

        engine.save(key("key1"), Record::new("value1", 0, 1)).unwrap();
        engine.save(key("key2"), Record::new("value2", 0, 1)).unwrap();
        engine.save(key("key3"), Record::new("value3", 0, 0)).unwrap(); // No expiry
        engine
            .save(key("key4"), Record::new("value4", 0, unix_now() + 3600))
            .unwrap();

        let cleaned = engine.cleanup_expired();
        assert_eq!(cleaned, 2);
        assert_eq!(engine.len(), 2);
        assert!(engine.get(b"key3").unwrap().is_some());
        assert!(engine.get(b"key4").unwrap().is_some());
        assert_eq!(engine.stats().expired, 2);
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();

        engine.save(key("a"), Record::new("1", 0, 0)).unwrap();
        engine.save(key("b"), Record::new("2", 0, 0)).unwrap();
        engine.get(b"a").unwrap();
        engine.delete(b"b").unwrap();

        let stats = engine.stats();
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.get_ops, 1);
        assert_eq!(stats.set_ops, 2);
        assert_eq!(stats.del_ops, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let k = format!("key-{}-{}", i, j);
                    engine
                        .save(Bytes::from(k.clone()), Record::new("value", 0, 0))
                        .unwrap();
                    engine.get(k.as_bytes()).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_concurrent_update_is_atomic() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        engine.save(key("counter"), Record::new("", 0, 0)).unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    engine
                        .update(key("counter"), &mut |current| match current {
                            Some(record) => Mutation::Put(record.appended(b"x", 0)),
                            None => Mutation::Keep,
                        })
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let record = engine.get(b"counter").unwrap().unwrap();
        assert_eq!(record.byte_count(), 2000);
    }
}
