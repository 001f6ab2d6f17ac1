//! Storage Module
//!
//! This module provides the core storage functionality for FlashCache.
//! It includes the [`Store`] abstraction, a thread-safe, sharded in-memory
//! implementation with expiration support, and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              StorageEngine (impl Store)                     │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flashcache::storage::{absolute_expiry, unix_now, Record, StorageEngine, Store};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//!
//! // A record that never expires
//! engine.save(Bytes::from("name"), Record::new("Ariz", 0, 0)).unwrap();
//!
//! // A record that expires in an hour
//! let expires_at = absolute_expiry(3600, unix_now());
//! engine.save(Bytes::from("session"), Record::new("token123", 0, expires_at)).unwrap();
//!
//! assert_eq!(engine.len(), 2);
//! ```

pub mod engine;
pub mod expiry;
pub mod store;

// Re-export commonly used types
pub use engine::{absolute_expiry, unix_now, Record, StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use store::{Mutation, Store, StoreError, StoreResult};
