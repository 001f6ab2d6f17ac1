//! Command Handler Module
//!
//! This module implements the command processing layer for FlashCache.
//! It receives decoded commands, executes them against the store, and
//! returns the reply to send.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Session        │  (connection module)
//! │  + decoder      │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Execute      │
//! │  - Reply        │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ dyn Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `get`
//! - `set`, `add`, `replace`
//! - `append`, `prepend`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
