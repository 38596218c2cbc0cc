// ============================================
// File: crates/hostcmd-transport/src/resp.rs
// ============================================
//! # RESP2 Codec
//!
//! ## Creation Reason
//! The Redis adapter speaks the RESP2 wire protocol directly over TCP.
//! Only the subset needed for AUTH/SELECT/SET/PUBLISH/SUBSCRIBE is
//! implemented.
//!
//! ## Wire Format
//! ```text
//! +OK\r\n                      simple string
//! -ERR message\r\n             error
//! :42\r\n                      integer
//! $5\r\nhello\r\n              bulk string   ($-1\r\n = null)
//! *2\r\n$3\r\nfoo\r\n:1\r\n    array         (*-1\r\n = null)
//! ```
//!
//! ## Parsing Strategy
//! 1. Peek at the buffer without consuming
//! 2. If a full frame is present, consume exactly its bytes
//! 3. Otherwise report "need more" and leave the buffer untouched
//!
//! ## ⚠️ Important Note for Next Developer
//! - Lengths come from the network; check them before allocating
//! - Nested arrays are depth-limited
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Largest bulk string accepted (Redis' own limit).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest array accepted.
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum array nesting depth.
pub const MAX_DEPTH: usize = 8;

const CRLF: &[u8] = b"\r\n";

// ============================================
// RespValue
// ============================================

/// A decoded RESP2 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+...`
    Simple(String),
    /// `-...`
    Error(String),
    /// `:...`
    Integer(i64),
    /// `$...`
    Bulk(Bytes),
    /// `$-1` or `*-1`
    Null,
    /// `*...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Returns the payload of a simple or bulk string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Simple(s) => Some(s.as_bytes()),
            Self::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Returns a simple or bulk string as UTF-8 text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the integer value.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns `true` for `+OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Simple(s) if s == "OK")
    }

    /// Converts an error reply into `TransportError::Server`.
    ///
    /// # Errors
    /// Returns `Server` if this value is an error reply.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Error(message) => Err(TransportError::Server { message }),
            other => Ok(other),
        }
    }
}

// ============================================
// Encoding
// ============================================

/// Encodes a command as an array of bulk strings.
///
/// # Example
/// ```
/// use bytes::BytesMut;
/// use hostcmd_transport::resp::encode_command;
///
/// let mut buf = BytesMut::new();
/// encode_command(&[b"PUBLISH", b"hostcmd", b"{}"], &mut buf);
/// assert_eq!(&buf[..], b"*3\r\n$7\r\nPUBLISH\r\n$7\r\nhostcmd\r\n$2\r\n{}\r\n");
/// ```
pub fn encode_command(args: &[&[u8]], buf: &mut BytesMut) {
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

// ============================================
// Decoding
// ============================================

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(None)` if `buf` does not yet hold a complete frame; the
/// buffer is then left unchanged.
///
/// # Errors
/// Returns `Protocol` if the bytes are not valid RESP2.
pub fn decode(buf: &mut BytesMut) -> Result<Option<RespValue>> {
    match parse(&buf[..], 0)? {
        Some((value, used)) => {
            buf.advance(used);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse(input: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>> {
    let Some(&tag) = input.first() else {
        return Ok(None);
    };
    let Some((line, after_line)) = read_line(input, 1) else {
        return Ok(None);
    };

    match tag {
        b'+' => Ok(Some((RespValue::Simple(text(line)?), after_line))),
        b'-' => Ok(Some((RespValue::Error(text(line)?), after_line))),
        b':' => Ok(Some((RespValue::Integer(integer(line)?), after_line))),
        b'$' => {
            let len = integer(line)?;
            if len == -1 {
                return Ok(Some((RespValue::Null, after_line)));
            }
            let len = length(len, MAX_BULK_LEN, "bulk")?;
            let end = after_line + len;
            if input.len() < end + CRLF.len() {
                return Ok(None);
            }
            if &input[end..end + CRLF.len()] != CRLF {
                return Err(TransportError::protocol("bulk string not terminated by CRLF"));
            }
            let data = Bytes::copy_from_slice(&input[after_line..end]);
            Ok(Some((RespValue::Bulk(data), end + CRLF.len())))
        }
        b'*' => {
            let count = integer(line)?;
            if count == -1 {
                return Ok(Some((RespValue::Null, after_line)));
            }
            if depth >= MAX_DEPTH {
                return Err(TransportError::protocol("array nesting too deep"));
            }
            let count = length(count, MAX_ARRAY_LEN, "array")?;
            let mut items = Vec::with_capacity(count.min(64));
            let mut pos = after_line;
            for _ in 0..count {
                match parse(&input[pos..], depth + 1)? {
                    Some((item, used)) => {
                        items.push(item);
                        pos += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(items), pos)))
        }
        other => Err(TransportError::protocol(format!(
            "unknown frame type byte 0x{other:02x}"
        ))),
    }
}

/// Finds the CRLF-terminated line starting at `start`.
fn read_line(input: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = input.get(start..)?;
    let end = rest.windows(2).position(|w| w == CRLF)?;
    Some((&rest[..end], start + end + CRLF.len()))
}

fn text(line: &[u8]) -> Result<String> {
    String::from_utf8(line.to_vec()).map_err(|_| TransportError::protocol("line is not UTF-8"))
}

fn integer(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TransportError::protocol("invalid integer"))
}

fn length(value: i64, max: usize, what: &str) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|len| *len <= max)
        .ok_or_else(|| TransportError::protocol(format!("invalid {what} length {value}")))
}

// ============================================
// Tests
// ============================================
