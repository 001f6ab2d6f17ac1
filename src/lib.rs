//! # FlashCache - A Memcached-Compatible In-Memory Cache Server
//!
//! FlashCache is an in-memory key-value cache written in Rust that speaks a
//! subset of the memcached text protocol over TCP.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: `get`, `set`, `add`, `replace`, `append` and
//!   `prepend` over the text protocol, including `noreply`
//! - **Concurrent**: Sharded storage with RwLock; conditional writes are
//!   atomic per key
//! - **TTL Support**: Records can expire, with lazy and background cleanup
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashCache                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│  Session    │───>│  Command    │                  │
//! │  │ (Listener)  │    │ (per conn)  │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │              StorageEngine                   │   │
//! │  │   Decoder   │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashcache::storage::{StorageEngine, start_expiry_sweeper};
//! use flashcache::commands::CommandHandler;
//! use flashcache::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:11211").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(storage.clone());
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, stats));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request line decoder and reply serialization
//! - [`storage`]: The `Store` abstraction, the sharded engine and expiry
//! - [`commands`]: Execution of decoded commands
//! - [`connection`]: Per-client session state machine
//! - [`config`]: Command-line and environment configuration
//!
//! ## Expiry
//!
//! Records with a TTL are expired in two ways:
//! 1. **Lazy**: A `get` that finds an expired record removes it and misses
//! 2. **Active**: A background task periodically scans for expired records

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{Config, SetReply};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{decode, Command, ParseError, Response};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine, Store};

/// The default port FlashCache listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host FlashCache binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of FlashCache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
