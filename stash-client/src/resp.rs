//! # RESP2 Framing
//!
//! Purpose: Encode outgoing commands as RESP2 arrays and parse the single
//! reply Redis sends back for each of them.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Arguments and bulk replies are raw bytes end to end.
//! 2. **Buffer Reuse**: The caller owns the line buffer so a pooled connection
//!    parses every reply without reallocating.
//! 3. **Fail Fast**: Any framing violation is a protocol error and the
//!    connection is not reused.
//! 4. **Bounded Trust**: Length headers never size an allocation directly;
//!    bulk strings are capped at Redis's `proto-max-bulk-len` and nesting is
//!    capped at `MAX_DEPTH`.

use std::io::{BufRead, Read};

use crate::client::{ClientError, ClientResult};

/// One parsed RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`, `+PONG`.
    Status(Vec<u8>),
    /// `-ERR ...`, `-WRONGTYPE ...`.
    Error(Vec<u8>),
    /// `:1`.
    Integer(i64),
    /// `$n` bulk string; `None` for the nil reply `$-1`.
    Bulk(Option<Vec<u8>>),
    /// `*n` array; nil arrays parse as empty.
    Array(Vec<Reply>),
}

impl Reply {
    /// Coerces a reply into a byte payload.
    ///
    /// Nil maps to `Ok(None)`. Bulk and status replies yield their bytes, an
    /// error reply becomes `ClientError::Server`, and every other shape is
    /// `ClientError::UnexpectedResponse`.
    pub fn into_bytes(self) -> ClientResult<Option<Vec<u8>>> {
        match self {
            Reply::Bulk(data) => Ok(data),
            Reply::Status(text) => Ok(Some(text)),
            Reply::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// True for `+OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(text) if text.as_slice() == b"OK")
    }
}

/// Appends `args` to `out` as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    write_header(out, b'*', args.len());
    for arg in args {
        write_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

fn write_header(out: &mut Vec<u8>, prefix: u8, len: usize) {
    out.push(prefix);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Largest bulk string Redis will send (its default `proto-max-bulk-len`).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted in a reply.
pub const MAX_DEPTH: usize = 32;

const PREALLOC_ITEMS: usize = 64;
const PREALLOC_BYTES: usize = 64 * 1024;

/// Reads exactly one reply from `reader`.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<Reply> {
    read_nested(reader, line_buf, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>, depth: usize) -> ClientResult<Reply> {
    if depth > MAX_DEPTH {
        return Err(ClientError::Protocol);
    }
    read_line(reader, line_buf)?;
    let (&prefix, body) = line_buf.split_first().ok_or(ClientError::Protocol)?;

    match prefix {
        b'+' => Ok(Reply::Status(body.to_vec())),
        b'-' => Ok(Reply::Error(body.to_vec())),
        b':' => parse_int(body).map(Reply::Integer),
        b'$' => {
            let len = parse_int(body)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_int(body)?.max(0);
            let mut items = Vec::with_capacity((len as usize).min(PREALLOC_ITEMS));
            for _ in 0..len {
                items.push(read_nested(reader, line_buf, depth + 1)?);
            }
            Ok(Reply::Array(items))
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<Reply> {
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    if len > MAX_BULK_LEN {
        return Err(ClientError::Protocol);
    }

    // Payload plus trailing CRLF; the buffer grows with what actually arrives.
    let wanted = len as usize + 2;
    let mut data = Vec::with_capacity(wanted.min(PREALLOC_BYTES));
    reader.by_ref().take(wanted as u64).read_to_end(&mut data)?;
    if data.len() != wanted || !data.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    data.truncate(len as usize);
    Ok(Reply::Bulk(Some(data)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        // Peer closed the connection.
        return Err(ClientError::Protocol);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_int(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}
