//! Connection management.

use crate::config::ClientConfig;
use crate::error::ClientError;
use rudis_protocol::{Command, Decoder, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Read buffer size for socket reads (8 KiB).
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// An open connection to the server, exclusively owned by one pool slot
/// holder at a time.
///
/// There are no request timeouts anywhere on this path: a stalled peer
/// blocks the caller until the transport errors out.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    decoder: Decoder,
    read_buf: Vec<u8>,
    db: u32,
}

impl Connection {
    /// Opens a connection and runs the session bootstrap: `AUTH` when a
    /// password is configured, then `SELECT` when the database index is
    /// non-zero. Bootstrap replies are checked and discarded; any failure
    /// here is a connection-open failure.
    pub async fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        tracing::debug!("connecting to {}", config.addr);
        let stream = TcpStream::connect(&config.addr).await?;
        stream.set_nodelay(true).ok();

        let mut conn = Self {
            stream,
            decoder: Decoder::new(),
            read_buf: vec![0u8; READ_BUFFER_SIZE],
            db: 0,
        };

        if let Some(password) = &config.password {
            conn.bootstrap(Command::new("AUTH").arg(password)).await?;
        }
        if config.db != 0 {
            conn.bootstrap(Command::new("SELECT").arg(config.db.to_string()))
                .await?;
            conn.db = config.db;
        }

        Ok(conn)
    }

    /// Database index this connection is selected to.
    pub fn db(&self) -> u32 {
        self.db
    }

    /// Sends a bootstrap command and discards its reply.
    async fn bootstrap(&mut self, cmd: Command) -> Result<(), ClientError> {
        tracing::debug!("bootstrap: {}", cmd.name());
        match self.round_trip(&cmd.encode()).await? {
            Reply::Error(message) => Err(ClientError::Server(message)),
            _ => Ok(()),
        }
    }

    /// Writes one encoded frame and decodes one reply.
    ///
    /// A stream that ends before the reply completes is reported as
    /// [`ClientError::ConnectionClosed`], distinct from malformed-reply
    /// protocol errors, so the pool can decide to reconnect and retry
    /// exactly that class.
    pub async fn round_trip(&mut self, frame: &[u8]) -> Result<Reply, ClientError> {
        self.stream.write_all(frame).await?;
        loop {
            if let Some(reply) = self.decoder.decode()? {
                return Ok(reply);
            }
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                tracing::debug!("stream ended mid-reply");
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-connection mock: accepts once, then for each canned reply reads
    /// one request and writes the reply. Drops the connection afterwards.
    async fn mock_server(replies: Vec<&'static [u8]>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            for reply in replies {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                socket.write_all(reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_open_selects_configured_db() {
        let addr = mock_server(vec![b"+OK\r\n"]).await;
        let config = ClientConfig::new(addr).with_db(13);
        let conn = Connection::open(&config).await.unwrap();
        assert_eq!(conn.db(), 13);
    }

    #[tokio::test]
    async fn test_open_fails_on_rejected_auth() {
        let addr = mock_server(vec![b"-ERR invalid password\r\n"]).await;
        let config = ClientConfig::new(addr).with_password("wrong");
        let err = Connection::open(&config).await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ref m) if m == "invalid password"));
    }

    #[tokio::test]
    async fn test_round_trip_decodes_reply() {
        let addr = mock_server(vec![b"$5\r\nhello\r\n"]).await;
        let mut conn = Connection::open(&ClientConfig::new(addr)).await.unwrap();
        let reply = conn
            .round_trip(&Command::new("GET").arg("k").encode())
            .await
            .unwrap();
        assert_eq!(reply, Reply::Bulk(Some(Bytes::from_static(b"hello"))));
    }

    #[tokio::test]
    async fn test_round_trip_reports_closed_stream() {
        let addr = mock_server(vec![]).await;
        let mut conn = Connection::open(&ClientConfig::new(addr)).await.unwrap();
        let err = conn
            .round_trip(&Command::new("GET").arg("k").encode())
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }
}
