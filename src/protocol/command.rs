//! Command Line Decoder
//!
//! This module turns one request line into a typed [`Command`].
//!
//! ## Request Format
//!
//! ```text
//! get <key>\r\n
//! <set|add|replace|append|prepend> <key> <flags> <exptime> <bytes> [noreply]\r\n
//! <data block>\r\n
//! ```
//!
//! The line is split on ASCII spaces. Every token is trimmed of surrounding
//! whitespace (which also drops the line terminator) and empty tokens are
//! discarded, so `set  foo 0 0 3` and `set foo 0 0 3\r\n` decode the same.
//!
//! A `get` is complete after its line. A storage command is not: its data
//! block arrives in the following chunks and is accumulated by the
//! connection session into [`Command::payload`].

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The literal that may follow the byte count of a storage command.
pub const NOREPLY: &[u8] = b"noreply";

/// Errors that can occur while decoding a request line.
///
/// `Empty`, `UnknownAction`, `WrongArity` and `ExpectedNoreply` describe a
/// malformed line; `BadNumeric` a numeric field that failed to parse. The
/// client sees `ERROR` for all of them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line holds no tokens
    #[error("empty command")]
    Empty,

    /// The first token is not a known verb
    #[error("invalid action: {0}")]
    UnknownAction(String),

    /// Wrong number of tokens for the verb
    #[error("incorrect number of elements for \"{action}\" action: {count}")]
    WrongArity { action: Action, count: usize },

    /// A sixth token that is not `noreply`
    #[error("expected \"noreply\", got \"{0}\"")]
    ExpectedNoreply(String),

    /// A numeric field failed to parse
    #[error("{field} conversion error: \"{value}\"")]
    BadNumeric { field: Field, value: String },
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The verb of a request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Set,
    Add,
    Replace,
    Append,
    Prepend,
}

impl Action {
    /// The verb as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Set => "set",
            Action::Add => "add",
            Action::Replace => "replace",
            Action::Append => "append",
            Action::Prepend => "prepend",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&[u8]> for Action {
    type Error = ParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let action = match value {
            b"get" => Action::Get,
            b"set" => Action::Set,
            b"add" => Action::Add,
            b"replace" => Action::Replace,
            b"append" => Action::Append,
            b"prepend" => Action::Prepend,
            _ => {
                return Err(ParseError::UnknownAction(
                    String::from_utf8_lossy(value).into_owned(),
                ));
            }
        };
        Ok(action)
    }
}

/// The numeric fields of a storage command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Flags,
    Exptime,
    ByteCount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Flags => "flags",
            Field::Exptime => "exptime",
            Field::ByteCount => "bytecount",
        })
    }
}

/// One decoded client directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub key: Bytes,
    /// Opaque client flags
    pub flags: u32,
    /// Relative TTL in seconds (0 = never expires)
    pub exptime: i64,
    /// Declared length of the data block
    pub byte_count: usize,
    pub noreply: bool,
    /// Data block received so far
    pub payload: BytesMut,
}

impl Command {
    /// Creates a `get` command.
    pub fn get(key: impl Into<Bytes>) -> Self {
        Self {
            action: Action::Get,
            key: key.into(),
            flags: 0,
            exptime: 0,
            byte_count: 0,
            noreply: false,
            payload: BytesMut::new(),
        }
    }

    /// Creates a storage command with an empty payload.
    pub fn storage(
        action: Action,
        key: impl Into<Bytes>,
        flags: u32,
        exptime: i64,
        byte_count: usize,
        noreply: bool,
    ) -> Self {
        Self {
            action,
            key: key.into(),
            flags,
            exptime,
            byte_count,
            noreply,
            payload: BytesMut::new(),
        }
    }

    /// Sets the payload, for commands built outside the session.
    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload.clear();
        self.payload.extend_from_slice(payload);
        self
    }

    /// Returns true if the command needs no data block.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.action == Action::Get
    }

    /// Appends a continuation chunk to the payload.
    pub fn push_payload(&mut self, chunk: &[u8]) {
        self.payload.extend_from_slice(chunk);
    }

    /// Returns true once at least the declared number of bytes has arrived.
    #[inline]
    pub fn payload_ready(&self) -> bool {
        self.payload.len() >= self.byte_count
    }

    /// Returns true if the client sent more bytes than it declared.
    #[inline]
    pub fn payload_overflows(&self) -> bool {
        self.payload.len() > self.byte_count
    }
}

/// Decodes one request line.
///
/// # Example
///
/// ```
/// use flashcache::protocol::{decode, Action};
///
/// let command = decode(b"set foo 0 60 3 noreply\r\n").unwrap();
/// assert_eq!(command.action, Action::Set);
/// assert_eq!(command.exptime, 60);
/// assert!(command.noreply);
/// assert!(!command.is_complete());
/// ```
pub fn decode(line: &[u8]) -> ParseResult<Command> {
    let tokens: Vec<&[u8]> = line
        .split(|&b| b == b' ')
        .map(|token| token.trim_ascii())
        .filter(|token| !token.is_empty())
        .collect();

    let verb = tokens.first().ok_or(ParseError::Empty)?;

    match Action::try_from(*verb)? {
        Action::Get => decode_get(&tokens),
        action => decode_storage(action, &tokens),
    }
}

/// `get <key>`
fn decode_get(tokens: &[&[u8]]) -> ParseResult<Command> {
    if tokens.len() != 2 {
        return Err(ParseError::WrongArity {
            action: Action::Get,
            count: tokens.len(),
        });
    }

    Ok(Command::get(Bytes::copy_from_slice(tokens[1])))
}

/// `<action> <key> <flags> <exptime> <bytes> [noreply]`
fn decode_storage(action: Action, tokens: &[&[u8]]) -> ParseResult<Command> {
    if !(5..=6).contains(&tokens.len()) {
        return Err(ParseError::WrongArity {
            action,
            count: tokens.len(),
        });
    }

    let flags = parse_field(Field::Flags, tokens[2])?;
    let exptime = parse_field(Field::Exptime, tokens[3])?;
    let byte_count = parse_field(Field::ByteCount, tokens[4])?;

    let noreply = match tokens.get(5) {
        None => false,
        Some(&token) if token == NOREPLY => true,
        Some(token) => {
            return Err(ParseError::ExpectedNoreply(
                String::from_utf8_lossy(token).into_owned(),
            ));
        }
    };

    Ok(Command::storage(
        action,
        Bytes::copy_from_slice(tokens[1]),
        flags,
        exptime,
        byte_count,
        noreply,
    ))
}

fn parse_field<T: FromStr>(field: Field, token: &[u8]) -> ParseResult<T> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::BadNumeric {
            field,
            value: String::from_utf8_lossy(token).into_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set() {
        let command = decode(b"set foo 0 1 4\r\n").unwrap();
        assert_eq!(command, Command::storage(Action::Set, "foo", 0, 1, 4, false));
        assert!(!command.is_complete());
        assert!(command.payload.is_empty());
    }

    #[test]
    fn test_decode_set_noreply() {
        let command = decode(b"set foo 0 0 4 noreply\r\n").unwrap();
        assert_eq!(command, Command::storage(Action::Set, "foo", 0, 0, 4, true));
    }

    #[test]
    fn test_decode_all_storage_actions() {
        for (line, action) in [
            (&b"add k 1 2 3\r\n"[..], Action::Add),
            (&b"replace k 1 2 3\r\n"[..], Action::Replace),
            (&b"append k 1 2 3\r\n"[..], Action::Append),
            (&b"prepend k 1 2 3\r\n"[..], Action::Prepend),
        ] {
            let command = decode(line).unwrap();
            assert_eq!(command, Command::storage(action, "k", 1, 2, 3, false));
        }
    }

    #[test]
    fn test_decode_get() {
        let command = decode(b"get mykey\r\n").unwrap();
        assert_eq!(command, Command::get("mykey"));
        assert!(command.is_complete());
    }

    #[test]
    fn test_decode_collapses_spaces() {
        let command = decode(b"set   foo  12 0   3 \r\n").unwrap();
        assert_eq!(command, Command::storage(Action::Set, "foo", 12, 0, 3, false));

        let command = decode(b"  get   foo  \r\n").unwrap();
        assert_eq!(command.key, Bytes::from("foo"));
    }

    #[test]
    fn test_decode_without_terminator() {
        let command = decode(b"get foo").unwrap();
        assert_eq!(command.key, Bytes::from("foo"));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(b""), Err(ParseError::Empty));
        assert_eq!(decode(b"\r\n"), Err(ParseError::Empty));
        assert_eq!(decode(b"    "), Err(ParseError::Empty));
    }

    #[test]
    fn test_decode_unknown_action() {
        let err = decode(b"delete foo\r\n").unwrap_err();
        assert_eq!(err, ParseError::UnknownAction("delete".to_string()));
        assert_eq!(err.to_string(), "invalid action: delete");

        // Verbs are case-sensitive
        assert!(matches!(
            decode(b"GET foo\r\n"),
            Err(ParseError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_decode_get_wrong_arity() {
        let err = decode(b"get\r\n").unwrap_err();
        assert_eq!(err.to_string(), r#"incorrect number of elements for "get" action: 1"#);

        let err = decode(b"get mykey another one\r\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::WrongArity {
                action: Action::Get,
                count: 4
            }
        );
    }

    #[test]
    fn test_decode_set_wrong_arity() {
        let err = decode(b"set \r\n").unwrap_err();
        assert_eq!(err.to_string(), r#"incorrect number of elements for "set" action: 1"#);

        let err = decode(b"set foo 0 1 3 4 4 4\r\n").unwrap_err();
        assert_eq!(err.to_string(), r#"incorrect number of elements for "set" action: 8"#);

        let err = decode(b"append foo 0 1\r\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::WrongArity {
                action: Action::Append,
                count: 4
            }
        );
    }

    #[test]
    fn test_decode_sixth_token_must_be_noreply() {
        let err = decode(b"set foo 0 0 3 please\r\n").unwrap_err();
        assert_eq!(err, ParseError::ExpectedNoreply("please".to_string()));
    }

    #[test]
    fn test_decode_bad_numeric_fields() {
        assert_eq!(
            decode(b"set foo x 0 3\r\n"),
            Err(ParseError::BadNumeric {
                field: Field::Flags,
                value: "x".to_string()
            })
        );
        assert!(matches!(
            decode(b"set foo 0 soon 3\r\n"),
            Err(ParseError::BadNumeric {
                field: Field::Exptime,
                ..
            })
        ));
        assert!(matches!(
            decode(b"set foo 0 0 -3\r\n"),
            Err(ParseError::BadNumeric {
                field: Field::ByteCount,
                ..
            })
        ));

        // Flags are 32-bit unsigned
        assert!(matches!(
            decode(b"set foo 4294967296 0 3\r\n"),
            Err(ParseError::BadNumeric {
                field: Field::Flags,
                ..
            })
        ));

        let err = decode(b"set foo 0 0 three\r\n").unwrap_err();
        assert_eq!(err.to_string(), r#"bytecount conversion error: "three""#);
    }

    #[test]
    fn test_decode_negative_exptime() {
        let command = decode(b"set foo 0 -1 3\r\n").unwrap();
        assert_eq!(command.exptime, -1);
    }

    #[test]
    fn test_payload_accumulation() {
        let mut command = decode(b"set foo 0 0 5\r\n").unwrap();
        assert!(!command.payload_ready());

        command.push_payload(b"ab");
        assert!(!command.payload_ready());

        command.push_payload(b"cde");
        assert!(command.payload_ready());
        assert!(!command.payload_overflows());
        assert_eq!(&command.payload[..], b"abcde");

        command.push_payload(b"f");
        assert!(command.payload_overflows());
    }

    #[test]
    fn test_binary_key_is_opaque() {
        let command = decode(b"get k\xffey\r\n").unwrap();
        assert_eq!(&command.key[..], b"k\xffey");
    }
}
