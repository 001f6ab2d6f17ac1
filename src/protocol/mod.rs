//! Text Protocol Implementation
//!
//! This module implements the memcached-style text protocol spoken by
//! FlashCache: decoding request lines into commands and serializing replies.
//!
//! ## Modules
//!
//! - `command`: The `Command`/`Action` types and the line decoder
//! - `response`: The `Response` enum and its wire format
//!
//! ## Example
//!
//! ```
//! use flashcache::protocol::{decode, Action, Response};
//! use bytes::Bytes;
//!
//! // Decoding a request line
//! let command = decode(b"get name\r\n").unwrap();
//! assert_eq!(command.action, Action::Get);
//!
//! // Creating replies
//! let reply = Response::Value {
//!     key: Bytes::from("name"),
//!     flags: 0,
//!     data: Bytes::from("Ariz"),
//! };
//! assert_eq!(reply.serialize(), b"VALUE name 0 4\nAriz\nEND\r\n");
//! ```

pub mod command;
pub mod response;

// Re-export commonly used types for convenience
pub use command::{decode, Action, Command, Field, ParseError, ParseResult, NOREPLY};
pub use response::{Response, BAD_DATA_CHUNK, CRLF};
