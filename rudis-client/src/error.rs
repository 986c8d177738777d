//! Client error types.

use crate::marshal::MarshalError;
use rudis_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server error: {0}")]
    Server(String),

    #[error("key not found")]
    NotFound,

    #[error("unexpected reply shape: expected {0}")]
    UnexpectedReply(&'static str),

    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),
}

impl ClientError {
    /// Returns whether the transport died mid-call.
    ///
    /// Only this class triggers the single reconnect-and-resend; protocol
    /// errors, server errors, and not-found conditions never do.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classification() {
        let io = ClientError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(io.is_connection_error());
        assert!(ClientError::ConnectionClosed.is_connection_error());

        assert!(!ClientError::Server("boom".to_string()).is_connection_error());
        assert!(!ClientError::NotFound.is_connection_error());
        assert!(!ClientError::UnexpectedReply("bulk").is_connection_error());
    }
}
