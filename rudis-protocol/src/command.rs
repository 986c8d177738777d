//! Command framing.

use bytes::{BufMut, Bytes, BytesMut};

/// An operation name and its arguments, ready to be framed.
///
/// Arguments are raw byte strings carried on the wire by explicit length,
/// never by delimiters, so payloads may contain any bytes including `\r\n`.
/// Argument content is not validated here; that is the caller's
/// responsibility.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    /// Creates a command for the given operation name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments (excluding the operation name).
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Encodes the command as a self-delimiting request frame:
    /// `*<argc>\r\n` followed by each token as `$<len>\r\n<bytes>\r\n`,
    /// with the operation name as the first token.
    pub fn encode(&self) -> BytesMut {
        // 16 bytes per token covers any `$<decimal>\r\n` header plus the
        // trailing terminator.
        let hint = self.name.len()
            + self.args.iter().map(Bytes::len).sum::<usize>()
            + 16 * (self.args.len() + 2);
        let mut buf = BytesMut::with_capacity(hint);

        put_header(&mut buf, b'*', self.args.len() + 1);
        put_token(&mut buf, self.name.as_bytes());
        for arg in &self.args {
            put_token(&mut buf, arg);
        }
        buf
    }
}

fn put_header(buf: &mut BytesMut, prefix: u8, n: usize) {
    buf.put_u8(prefix);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(crate::CRLF);
}

fn put_token(buf: &mut BytesMut, token: &[u8]) {
    put_header(buf, b'$', token.len());
    buf.put_slice(token);
    buf.put_slice(crate::CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_with_args() {
        let frame = Command::new("SET").arg("key").arg("value").encode();
        assert_eq!(&frame[..], b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
    }

    #[test]
    fn test_encode_without_args() {
        let frame = Command::new("PING").encode();
        assert_eq!(&frame[..], b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn test_binary_argument_carried_by_length() {
        let frame = Command::new("SET").arg("k").arg(b"a\r\nb\x00c").encode();
        assert_eq!(&frame[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$7\r\na\r\nb\x00c\r\n");
    }

    #[test]
    fn test_empty_argument_has_zero_length() {
        let frame = Command::new("SET").arg("k").arg("").encode();
        assert_eq!(&frame[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn test_arg_count() {
        let cmd = Command::new("MGET").arg("a").arg("b");
        assert_eq!(cmd.name(), "MGET");
        assert_eq!(cmd.arg_count(), 2);
    }
}
