//! Reply parsing.
//!
//! Replies arrive as a line-oriented byte stream. The first byte of the
//! first non-blank line selects the reply shape:
//!
//! ```text
//! +OK\r\n                        status
//! -ERR unknown command\r\n       error
//! :42\r\n                        integer
//! $5\r\nhello\r\n                bulk ($-1 is the absent marker)
//! *2\r\n$1\r\na\r\n$1\r\nb\r\n   multibulk (*0 is empty, not absent)
//! ```
//!
//! [`Decoder`] is incremental: feed transport bytes with
//! [`Decoder::extend`] and call [`Decoder::decode`] until it yields a reply.
//! A buffer that does not yet hold a complete reply returns `Ok(None)` and
//! consumes nothing.

use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};

/// A single decoded reply.
///
/// `None` payloads are the wire's explicit absent marker. Absence is
/// distinct from an empty byte string or an empty sequence and must not be
/// collapsed into one by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// One-line status, e.g. `OK`.
    Status(String),
    /// Server-reported error message (leading `ERR ` stripped).
    Error(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Binary payload, or absent.
    Bulk(Option<Bytes>),
    /// Ordered bulk elements with absent members retained in place, or
    /// absent as a whole.
    MultiBulk(Option<Vec<Option<Bytes>>>),
}

/// Incremental reply decoder.
#[derive(Debug)]
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Appends raw bytes received from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Attempts to decode the next reply.
    ///
    /// Returns `Ok(Some(reply))` when a complete reply was parsed and
    /// consumed, `Ok(None)` when more input is needed (nothing is consumed),
    /// or an error for a malformed stream.
    pub fn decode(&mut self) -> Result<Option<Reply>, ProtocolError> {
        let mut pos = 0;
        match parse_reply(&self.buffer, &mut pos)? {
            Some(reply) => {
                self.buffer.advance(pos);
                Ok(Some(reply))
            }
            None => Ok(None),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_reply(buf: &[u8], pos: &mut usize) -> Result<Option<Reply>, ProtocolError> {
    let Some(line) = next_content_line(buf, pos) else {
        return Ok(None);
    };

    match line[0] {
        b'+' => Ok(Some(Reply::Status(line_text(trim(&line[1..]), "status")?))),
        b'-' => {
            let message = line[1..].strip_prefix(b"ERR ").unwrap_or(&line[1..]);
            Ok(Some(Reply::Error(line_text(trim(message), "error")?)))
        }
        b':' => {
            let text = line_text(trim(&line[1..]), "integer")?;
            let value = text
                .parse::<i64>()
                .map_err(|_| ProtocolError::InvalidInteger(text))?;
            Ok(Some(Reply::Integer(value)))
        }
        b'$' => Ok(parse_bulk_payload(buf, pos, &line[1..])?.map(Reply::Bulk)),
        b'*' => parse_multibulk(buf, pos, &line[1..]),
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

/// Parses a bulk payload whose `$<len>` header line was already consumed.
///
/// The outer `Option` is "need more input"; the inner one is the absent
/// marker (`$-1`).
fn parse_bulk_payload(
    buf: &[u8],
    pos: &mut usize,
    header: &[u8],
) -> Result<Option<Option<Bytes>>, ProtocolError> {
    let len = parse_len(header)?;
    if len == -1 {
        return Ok(Some(None));
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len.to_string()));
    }

    let len = len as usize;
    if buf.len() - *pos < len {
        return Ok(None);
    }
    let payload = Bytes::copy_from_slice(&buf[*pos..*pos + len]);
    *pos += len;

    if !consume_terminator(buf, pos)? {
        return Ok(None);
    }
    Ok(Some(Some(payload)))
}

fn parse_multibulk(
    buf: &[u8],
    pos: &mut usize,
    header: &[u8],
) -> Result<Option<Reply>, ProtocolError> {
    let count = parse_len(header)?;
    if count <= 0 {
        return Ok(Some(Reply::MultiBulk(Some(Vec::new()))));
    }

    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let Some(line) = next_content_line(buf, pos) else {
            return Ok(None);
        };
        if line[0] != b'$' {
            return Err(ProtocolError::InvalidPrefix(line[0]));
        }
        match parse_bulk_payload(buf, pos, &line[1..])? {
            Some(element) => elements.push(element),
            None => return Ok(None),
        }
    }
    Ok(Some(Reply::MultiBulk(Some(elements))))
}

/// Reads the next non-blank line; blank keep-alive lines are skipped.
fn next_content_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    loop {
        let line = next_line(buf, pos)?;
        if !line.is_empty() {
            return Some(line);
        }
    }
}

/// Reads the next `\n`-terminated line starting at `*pos`, advancing past
/// the terminator. Returns the line trimmed of surrounding ASCII
/// whitespace, or `None` when no full line is buffered yet.
fn next_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let rest = &buf[*pos..];
    let nl = rest.iter().position(|&b| b == b'\n')?;
    *pos += nl + 1;
    Some(trim(&rest[..nl]))
}

/// Consumes the `\r\n` (or bare `\n`) that closes a bulk payload.
/// Returns `false` when the terminator has not arrived yet.
fn consume_terminator(buf: &[u8], pos: &mut usize) -> Result<bool, ProtocolError> {
    match buf.get(*pos) {
        None => Ok(false),
        Some(b'\n') => {
            *pos += 1;
            Ok(true)
        }
        Some(b'\r') => match buf.get(*pos + 1) {
            None => Ok(false),
            Some(b'\n') => {
                *pos += 2;
                Ok(true)
            }
            Some(_) => Err(ProtocolError::MissingTerminator),
        },
        Some(_) => Err(ProtocolError::MissingTerminator),
    }
}

fn parse_len(raw: &[u8]) -> Result<i64, ProtocolError> {
    let text = std::str::from_utf8(trim(raw))
        .map_err(|_| ProtocolError::InvalidLength(String::from_utf8_lossy(raw).into_owned()))?;
    text.parse::<i64>()
        .map_err(|_| ProtocolError::InvalidLength(text.to_string()))
}

fn line_text(raw: &[u8], kind: &'static str) -> Result<String, ProtocolError> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8(kind))
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}
