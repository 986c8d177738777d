//! Protocol error types.

use thiserror::Error;

/// Errors produced while parsing a reply stream.
///
/// Every variant means the stream is malformed at the protocol level; these
/// are fatal to the current call and are never retried. Transport failures
/// (closed or broken sockets) are reported separately by the connection
/// layer so callers can tell the two classes apart.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid reply prefix: {0:#04x}")]
    InvalidPrefix(u8),

    #[error("invalid length in reply header: {0:?}")]
    InvalidLength(String),

    #[error("invalid integer reply: {0:?}")]
    InvalidInteger(String),

    #[error("missing line terminator after bulk payload")]
    MissingTerminator,

    #[error("invalid UTF-8 in {0} line")]
    InvalidUtf8(&'static str),
}
