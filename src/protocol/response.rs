//! Reply Lines
//!
//! Every reply the server sends is one of the variants of [`Response`].
//!
//! ## Wire Format
//!
//! ```text
//! STORED\r\n
//! NOT_STORED\r\n
//! END\r\n
//! ERROR\r\n
//! CLIENT_ERROR <message>\r\n
//! VALUE <key> <flags> <bytes>\n<data>\nEND\r\n
//! ```

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used on reply lines
pub const CRLF: &[u8] = b"\r\n";

/// Message sent when a data block is longer than its declared size
pub const BAD_DATA_CHUNK: &str = "bad data chunk";

/// A reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The write was applied
    Stored,

    /// A precondition of add/replace/append/prepend did not hold
    NotStored,

    /// End of a `get` without a hit, and the default `set` acknowledgement
    End,

    /// The request could not be decoded, or the store failed
    Error,

    /// The request was decoded but its content is invalid
    ClientError(String),

    /// A `get` hit, followed by the end marker
    Value { key: Bytes, flags: u32, data: Bytes },
}

impl Response {
    /// `CLIENT_ERROR bad data chunk`
    pub fn bad_data_chunk() -> Self {
        Response::ClientError(BAD_DATA_CHUNK.to_string())
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => {
                buf.extend_from_slice(b"STORED");
                buf.extend_from_slice(CRLF);
            }
            Response::NotStored => {
                buf.extend_from_slice(b"NOT_STORED");
                buf.extend_from_slice(CRLF);
            }
            Response::End => {
                buf.extend_from_slice(b"END");
                buf.extend_from_slice(CRLF);
            }
            Response::Error => {
                buf.extend_from_slice(b"ERROR");
                buf.extend_from_slice(CRLF);
            }
            Response::ClientError(msg) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Value { key, flags, data } => {
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(format!(" {} {}\n", flags, data.len()).as_bytes());
                buf.extend_from_slice(data);
                buf.push(b'\n');
                Response::End.serialize_into(buf);
            }
        }
    }

    /// Returns true if this reply reports an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error | Response::ClientError(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Stored => write!(f, "STORED"),
            Response::NotStored => write!(f, "NOT_STORED"),
            Response::End => write!(f, "END"),
            Response::Error => write!(f, "ERROR"),
            Response::ClientError(msg) => write!(f, "CLIENT_ERROR {}", msg),
            Response::Value { key, flags, data } => write!(
                f,
                "VALUE {} {} {}",
                String::from_utf8_lossy(key),
                flags,
                data.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(Response::Stored.serialize(), b"STORED\r\n");
        assert_eq!(Response::NotStored.serialize(), b"NOT_STORED\r\n");
        assert_eq!(Response::End.serialize(), b"END\r\n");
        assert_eq!(Response::Error.serialize(), b"ERROR\r\n");
    }

    #[test]
    fn test_bad_data_chunk() {
        let response = Response::bad_data_chunk();
        assert_eq!(response.serialize(), b"CLIENT_ERROR bad data chunk\r\n");
        assert!(response.is_error());
    }

    #[test]
    fn test_value_serialize() {
        let response = Response::Value {
            key: Bytes::from("foo"),
            flags: 0,
            data: Bytes::from("bar"),
        };
        assert_eq!(response.serialize(), b"VALUE foo 0 3\nbar\nEND\r\n");
        assert!(!response.is_error());
    }

    #[test]
    fn test_value_binary_payload() {
        let response = Response::Value {
            key: Bytes::from("bin"),
            flags: 4294967295,
            data: Bytes::from(&b"a\x00\r\nb"[..]),
        };
        assert_eq!(
            response.serialize(),
            b"VALUE bin 4294967295 5\na\x00\r\nb\nEND\r\n"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Response::NotStored.to_string(), "NOT_STORED");
        let response = Response::Value {
            key: Bytes::from("foo"),
            flags: 2,
            data: Bytes::from("bar"),
        };
        assert_eq!(response.to_string(), "VALUE foo 2 3");
    }
}
