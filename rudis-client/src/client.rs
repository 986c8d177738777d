//! High-level client API.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::marshal::{pairs, Record};
use crate::pool::{Pool, Slot};
use bytes::Bytes;
use rudis_protocol::{Command, Reply};

/// Pooled client for one server and database.
///
/// Cheap to share by reference across tasks; every call runs exactly one
/// request/reply round trip on an exclusively held pooled connection, so
/// no ordering is promised between concurrent callers.
pub struct Client {
    config: ClientConfig,
    pool: Pool,
}

impl Client {
    /// Creates a client. Connections are opened lazily, on first use of
    /// each pool slot.
    pub fn new(config: ClientConfig) -> Self {
        let pool = Pool::new(config.pool_size);
        Self { config, pool }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Execution core
    // =========================================================================

    /// Executes one command: acquire a slot, run one round trip, release
    /// the slot.
    ///
    /// A connection that dies mid-call is replaced once and the identical
    /// frame resent; a second transport failure, or any other error, is
    /// returned as-is. A server error reply surfaces as
    /// [`ClientError::Server`] and is never retried. The slot goes back to
    /// the pool whatever the outcome.
    pub async fn execute(&self, cmd: &Command) -> Result<Reply, ClientError> {
        let frame = cmd.encode();
        let mut slot = self.pool.acquire().await;
        match self.dispatch(&mut slot, &frame).await? {
            Reply::Error(message) => Err(ClientError::Server(message)),
            reply => Ok(reply),
        }
    }

    /// Runs one round trip on the slot's connection, recovering once from a
    /// dead transport.
    ///
    /// Opening happens at most twice per call, with no backoff and no
    /// circuit breaking.
    async fn dispatch(&self, slot: &mut Slot, frame: &[u8]) -> Result<Reply, ClientError> {
        match self.attempt(slot, frame).await {
            Err(err) if err.is_connection_error() => {
                tracing::debug!("connection lost ({err}), reopening once");
                *slot = None;
                let retry = self.attempt(slot, frame).await;
                if matches!(&retry, Err(e) if e.is_connection_error()) {
                    *slot = None;
                }
                retry
            }
            outcome => outcome,
        }
    }

    /// Opens the slot's connection if it has none, then runs one round
    /// trip.
    async fn attempt(&self, slot: &mut Slot, frame: &[u8]) -> Result<Reply, ClientError> {
        if slot.is_none() {
            *slot = Some(Connection::open(&self.config).await?);
        }
        // Populated just above; open failures returned early.
        let conn = slot.as_mut().expect("slot holds a connection");
        conn.round_trip(frame).await
    }

    // =========================================================================
    // Generic key operations
    // =========================================================================

    pub async fn exists(&self, key: impl AsRef<[u8]>) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("EXISTS").arg(key)).await?)
    }

    pub async fn del(&self, key: impl AsRef<[u8]>) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("DEL").arg(key)).await?)
    }

    /// Type of the value stored at `key` (`string`, `list`, `set`, ...).
    pub async fn type_of(&self, key: impl AsRef<[u8]>) -> Result<String, ClientError> {
        status_reply(self.execute(&Command::new("TYPE").arg(key)).await?)
    }

    /// Keys matching a glob pattern.
    pub async fn keys(&self, pattern: impl AsRef<[u8]>) -> Result<Vec<Bytes>, ClientError> {
        values_reply(self.execute(&Command::new("KEYS").arg(pattern)).await?)
    }

    pub async fn rename(
        &self,
        key: impl AsRef<[u8]>,
        new_key: impl AsRef<[u8]>,
    ) -> Result<(), ClientError> {
        status_reply(self.execute(&Command::new("RENAME").arg(key).arg(new_key)).await?)?;
        Ok(())
    }

    pub async fn expire(&self, key: impl AsRef<[u8]>, seconds: u64) -> Result<bool, ClientError> {
        flag_reply(
            self.execute(&Command::new("EXPIRE").arg(key).arg(seconds.to_string()))
                .await?,
        )
    }

    pub async fn ttl(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("TTL").arg(key)).await?)
    }

    pub async fn dbsize(&self) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("DBSIZE")).await?)
    }

    /// A random key, or `None` when the database is empty.
    pub async fn randomkey(&self) -> Result<Option<Bytes>, ClientError> {
        opt_bulk_reply(self.execute(&Command::new("RANDOMKEY")).await?)
    }

    // =========================================================================
    // String operations
    // =========================================================================

    /// Value of `key`; a key that was never set (or was deleted) is
    /// [`ClientError::NotFound`], never an empty byte string.
    pub async fn get(&self, key: impl AsRef<[u8]>) -> Result<Bytes, ClientError> {
        bulk_reply(self.execute(&Command::new("GET").arg(key)).await?)
    }

    pub async fn set(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<(), ClientError> {
        status_reply(self.execute(&Command::new("SET").arg(key).arg(value)).await?)?;
        Ok(())
    }

    /// Sets `key` and returns the previous value, if any.
    pub async fn getset(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<Option<Bytes>, ClientError> {
        opt_bulk_reply(
            self.execute(&Command::new("GETSET").arg(key).arg(value))
                .await?,
        )
    }

    /// Sets `key` only if it does not exist; returns whether it was set.
    pub async fn setnx(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("SETNX").arg(key).arg(value)).await?)
    }

    /// Values for `keys`, with `None` holding the place of every key that
    /// does not exist.
    pub async fn mget<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
    ) -> Result<Vec<Option<Bytes>>, ClientError> {
        let mut cmd = Command::new("MGET");
        for key in keys {
            cmd = cmd.arg(key);
        }
        elements_reply(self.execute(&cmd).await?)
    }

    pub async fn incr(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("INCR").arg(key)).await?)
    }

    pub async fn incrby(&self, key: impl AsRef<[u8]>, n: i64) -> Result<i64, ClientError> {
        integer_reply(
            self.execute(&Command::new("INCRBY").arg(key).arg(n.to_string()))
                .await?,
        )
    }

    pub async fn decr(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("DECR").arg(key)).await?)
    }

    pub async fn decrby(&self, key: impl AsRef<[u8]>, n: i64) -> Result<i64, ClientError> {
        integer_reply(
            self.execute(&Command::new("DECRBY").arg(key).arg(n.to_string()))
                .await?,
        )
    }

    // =========================================================================
    // List operations
    // =========================================================================

    /// Appends to the list at `key`; returns the new length.
    pub async fn rpush(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("RPUSH").arg(key).arg(value)).await?)
    }

    /// Prepends to the list at `key`; returns the new length.
    pub async fn lpush(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("LPUSH").arg(key).arg(value)).await?)
    }

    pub async fn llen(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("LLEN").arg(key)).await?)
    }

    pub async fn lrange(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, ClientError> {
        values_reply(
            self.execute(
                &Command::new("LRANGE")
                    .arg(key)
                    .arg(start.to_string())
                    .arg(stop.to_string()),
            )
            .await?,
        )
    }

    pub async fn lindex(&self, key: impl AsRef<[u8]>, index: i64) -> Result<Bytes, ClientError> {
        bulk_reply(
            self.execute(&Command::new("LINDEX").arg(key).arg(index.to_string()))
                .await?,
        )
    }

    pub async fn lset(
        &self,
        key: impl AsRef<[u8]>,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> Result<(), ClientError> {
        status_reply(
            self.execute(
                &Command::new("LSET")
                    .arg(key)
                    .arg(index.to_string())
                    .arg(value),
            )
            .await?,
        )?;
        Ok(())
    }

    /// Removes up to `count` occurrences of `value`; returns how many were
    /// removed.
    pub async fn lrem(
        &self,
        key: impl AsRef<[u8]>,
        count: i64,
        value: impl AsRef<[u8]>,
    ) -> Result<i64, ClientError> {
        integer_reply(
            self.execute(
                &Command::new("LREM")
                    .arg(key)
                    .arg(count.to_string())
                    .arg(value),
            )
            .await?,
        )
    }

    pub async fn lpop(&self, key: impl AsRef<[u8]>) -> Result<Bytes, ClientError> {
        bulk_reply(self.execute(&Command::new("LPOP").arg(key)).await?)
    }

    pub async fn rpop(&self, key: impl AsRef<[u8]>) -> Result<Bytes, ClientError> {
        bulk_reply(self.execute(&Command::new("RPOP").arg(key)).await?)
    }

    pub async fn ltrim(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<(), ClientError> {
        status_reply(
            self.execute(
                &Command::new("LTRIM")
                    .arg(key)
                    .arg(start.to_string())
                    .arg(stop.to_string()),
            )
            .await?,
        )?;
        Ok(())
    }

    // =========================================================================
    // Set operations
    // =========================================================================

    pub async fn sadd(
        &self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("SADD").arg(key).arg(member)).await?)
    }

    pub async fn srem(
        &self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("SREM").arg(key).arg(member)).await?)
    }

    pub async fn sismember(
        &self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(
            self.execute(&Command::new("SISMEMBER").arg(key).arg(member))
                .await?,
        )
    }

    pub async fn smembers(&self, key: impl AsRef<[u8]>) -> Result<Vec<Bytes>, ClientError> {
        values_reply(self.execute(&Command::new("SMEMBERS").arg(key)).await?)
    }

    pub async fn scard(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("SCARD").arg(key)).await?)
    }

    /// Removes and returns a random member; [`ClientError::NotFound`] when
    /// the set is empty.
    pub async fn spop(&self, key: impl AsRef<[u8]>) -> Result<Bytes, ClientError> {
        bulk_reply(self.execute(&Command::new("SPOP").arg(key)).await?)
    }

    // =========================================================================
    // Hash operations
    // =========================================================================

    /// Sets one hash field; returns whether the field is new.
    pub async fn hset(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(
            self.execute(&Command::new("HSET").arg(key).arg(field).arg(value))
                .await?,
        )
    }

    pub async fn hget(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<Bytes, ClientError> {
        bulk_reply(self.execute(&Command::new("HGET").arg(key).arg(field)).await?)
    }

    pub async fn hdel(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("HDEL").arg(key).arg(field)).await?)
    }

    pub async fn hexists(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(
            self.execute(&Command::new("HEXISTS").arg(key).arg(field))
                .await?,
        )
    }

    pub async fn hlen(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("HLEN").arg(key)).await?)
    }

    pub async fn hkeys(&self, key: impl AsRef<[u8]>) -> Result<Vec<Bytes>, ClientError> {
        values_reply(self.execute(&Command::new("HKEYS").arg(key)).await?)
    }

    pub async fn hvals(&self, key: impl AsRef<[u8]>) -> Result<Vec<Bytes>, ClientError> {
        values_reply(self.execute(&Command::new("HVALS").arg(key)).await?)
    }

    /// Stores every field of `record` at `key`.
    pub async fn hmset<R: Record>(
        &self,
        key: impl AsRef<[u8]>,
        record: &R,
    ) -> Result<(), ClientError> {
        let mut cmd = Command::new("HMSET").arg(key);
        for (name, value) in record.flatten() {
            cmd = cmd.arg(name).arg(value);
        }
        status_reply(self.execute(&cmd).await?)?;
        Ok(())
    }

    /// Fetches every field at `key` into a record.
    ///
    /// A key that does not exist is [`ClientError::NotFound`], never an
    /// empty, "successfully" decoded record.
    pub async fn hgetall<R: Record>(&self, key: impl AsRef<[u8]>) -> Result<R, ClientError> {
        let reply = self.execute(&Command::new("HGETALL").arg(key)).await?;
        let elements = elements_reply(reply)?;
        if elements.is_empty() {
            return Err(ClientError::NotFound);
        }
        Ok(R::unflatten(&pairs(elements)?)?)
    }

    // =========================================================================
    // Sorted set operations
    // =========================================================================

    /// Adds `member` with `score`; returns whether the member is new.
    pub async fn zadd(
        &self,
        key: impl AsRef<[u8]>,
        score: f64,
        member: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(
            self.execute(
                &Command::new("ZADD")
                    .arg(key)
                    .arg(score.to_string())
                    .arg(member),
            )
            .await?,
        )
    }

    pub async fn zrem(
        &self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<bool, ClientError> {
        flag_reply(self.execute(&Command::new("ZREM").arg(key).arg(member)).await?)
    }

    pub async fn zcard(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        integer_reply(self.execute(&Command::new("ZCARD").arg(key)).await?)
    }

    /// Score of `member`; [`ClientError::NotFound`] when it is not in the
    /// set.
    pub async fn zscore(
        &self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<f64, ClientError> {
        let raw = bulk_reply(
            self.execute(&Command::new("ZSCORE").arg(key).arg(member))
                .await?,
        )?;
        parse_score(&raw)
    }

    pub async fn zincrby(
        &self,
        key: impl AsRef<[u8]>,
        delta: f64,
        member: impl AsRef<[u8]>,
    ) -> Result<f64, ClientError> {
        let raw = bulk_reply(
            self.execute(
                &Command::new("ZINCRBY")
                    .arg(key)
                    .arg(delta.to_string())
                    .arg(member),
            )
            .await?,
        )?;
        parse_score(&raw)
    }

    pub async fn zrange(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, ClientError> {
        values_reply(
            self.execute(
                &Command::new("ZRANGE")
                    .arg(key)
                    .arg(start.to_string())
                    .arg(stop.to_string()),
            )
            .await?,
        )
    }

    pub async fn zrangebyscore(
        &self,
        key: impl AsRef<[u8]>,
        min: f64,
        max: f64,
    ) -> Result<Vec<Bytes>, ClientError> {
        values_reply(
            self.execute(
                &Command::new("ZRANGEBYSCORE")
                    .arg(key)
                    .arg(min.to_string())
                    .arg(max.to_string()),
            )
            .await?,
        )
    }

    pub async fn zremrangebyrank(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<i64, ClientError> {
        integer_reply(
            self.execute(
                &Command::new("ZREMRANGEBYRANK")
                    .arg(key)
                    .arg(start.to_string())
                    .arg(stop.to_string()),
            )
            .await?,
        )
    }

    pub async fn zremrangebyscore(
        &self,
        key: impl AsRef<[u8]>,
        min: f64,
        max: f64,
    ) -> Result<i64, ClientError> {
        integer_reply(
            self.execute(
                &Command::new("ZREMRANGEBYSCORE")
                    .arg(key)
                    .arg(min.to_string())
                    .arg(max.to_string()),
            )
            .await?,
        )
    }

    // =========================================================================
    // Server operations
    // =========================================================================

    pub async fn ping(&self) -> Result<(), ClientError> {
        status_reply(self.execute(&Command::new("PING")).await?)?;
        Ok(())
    }

    pub async fn flushdb(&self) -> Result<(), ClientError> {
        status_reply(self.execute(&Command::new("FLUSHDB")).await?)?;
        Ok(())
    }

    pub async fn flushall(&self) -> Result<(), ClientError> {
        status_reply(self.execute(&Command::new("FLUSHALL")).await?)?;
        Ok(())
    }
}

// =============================================================================
// Reply casts
// =============================================================================

fn status_reply(reply: Reply) -> Result<String, ClientError> {
    match reply {
        Reply::Status(status) => Ok(status),
        _ => Err(ClientError::UnexpectedReply("status")),
    }
}

fn integer_reply(reply: Reply) -> Result<i64, ClientError> {
    match reply {
        Reply::Integer(value) => Ok(value),
        _ => Err(ClientError::UnexpectedReply("integer")),
    }
}

fn flag_reply(reply: Reply) -> Result<bool, ClientError> {
    Ok(integer_reply(reply)? != 0)
}

fn bulk_reply(reply: Reply) -> Result<Bytes, ClientError> {
    match reply {
        Reply::Bulk(Some(data)) => Ok(data),
        Reply::Bulk(None) => Err(ClientError::NotFound),
        _ => Err(ClientError::UnexpectedReply("bulk")),
    }
}

fn opt_bulk_reply(reply: Reply) -> Result<Option<Bytes>, ClientError> {
    match reply {
        Reply::Bulk(data) => Ok(data),
        _ => Err(ClientError::UnexpectedReply("bulk")),
    }
}

fn elements_reply(reply: Reply) -> Result<Vec<Option<Bytes>>, ClientError> {
    match reply {
        Reply::MultiBulk(Some(elements)) => Ok(elements),
        Reply::MultiBulk(None) => Err(ClientError::NotFound),
        _ => Err(ClientError::UnexpectedReply("multibulk")),
    }
}

/// Multibulk cast for commands whose replies never carry absent members.
fn values_reply(reply: Reply) -> Result<Vec<Bytes>, ClientError> {
    Ok(elements_reply(reply)?.into_iter().flatten().collect())
}

fn parse_score(raw: &[u8]) -> Result<f64, ClientError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::UnexpectedReply("numeric bulk"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    /// Scripted mock server. Each inner vec drives one accepted connection:
    /// per canned reply, read one request then write the reply; when a
    /// connection's script runs out it is closed, and the next connection
    /// picks up the next script.
    async fn mock_server(connections: Vec<Vec<&'static [u8]>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            for replies in connections {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                for reply in replies {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    socket.write_all(reply).await.unwrap();
                }
            }
        });
        addr
    }

    fn client_for(addr: String) -> Client {
        Client::new(ClientConfig::new(addr).with_pool_size(1))
    }

    #[tokio::test]
    async fn test_set_get_round_trip_binary_safe() {
        let addr = mock_server(vec![vec![b"+OK\r\n", b"$7\r\na\r\nb\x00c\r\n"]]).await;
        let client = client_for(addr);

        assert_ok!(client.set("k", b"a\r\nb\x00c").await);
        let value = client.get("k").await.unwrap();
        assert_eq!(&value[..], b"a\r\nb\x00c");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let addr = mock_server(vec![vec![b"$-1\r\n"]]).await;
        let client = client_for(addr);

        let err = client.get("nope").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound));
    }

    #[tokio::test]
    async fn test_server_error_reply_surfaces_verbatim() {
        let addr = mock_server(vec![vec![b"-ERR wrong number of arguments\r\n"]]).await;
        let client = client_for(addr);

        let err = client.get("k").await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ref m) if m == "wrong number of arguments"));
    }

    #[tokio::test]
    async fn test_mget_preserves_absent_positions() {
        let addr = mock_server(vec![vec![b"*3\r\n$1\r\na\r\n$-1\r\n$1\r\nb\r\n"]]).await;
        let client = client_for(addr);

        let values = client.mget(&["x", "y", "z"]).await.unwrap();
        assert_eq!(
            values,
            vec![
                Some(Bytes::from_static(b"a")),
                None,
                Some(Bytes::from_static(b"b")),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_after_remote_close() {
        // First connection serves one call then closes; the second one must
        // transparently pick up the resent frame.
        let addr = mock_server(vec![vec![b"+OK\r\n"], vec![b"$5\r\nhello\r\n"]]).await;
        let client = client_for(addr);

        assert_ok!(client.set("k", "v").await);
        let value = client.get("k").await.unwrap();
        assert_eq!(&value[..], b"hello");
    }

    #[tokio::test]
    async fn test_retry_failure_surfaces_connection_error() {
        // Both connections die before replying.
        let addr = mock_server(vec![vec![], vec![]]).await;
        let client = client_for(addr);

        let err = client.get("k").await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_hgetall_missing_record_is_not_found() {
        let addr = mock_server(vec![vec![b"*0\r\n"]]).await;
        let client = client_for(addr);

        let result: Result<HashMap<String, String>, _> = client.hgetall("absent").await;
        let err = assert_err!(result);
        assert!(matches!(err, ClientError::NotFound));
    }

    #[tokio::test]
    async fn test_hgetall_decodes_record() {
        let addr =
            mock_server(vec![vec![b"*4\r\n$1\r\na\r\n$2\r\n10\r\n$1\r\nb\r\n$2\r\n20\r\n"]]).await;
        let client = client_for(addr);

        let map: HashMap<String, i64> = client.hgetall("h").await.unwrap();
        assert_eq!(map.get("a"), Some(&10));
        assert_eq!(map.get("b"), Some(&20));
    }

    #[tokio::test]
    async fn test_integer_and_flag_replies() {
        let addr = mock_server(vec![vec![b":3\r\n", b":1\r\n", b":0\r\n"]]).await;
        let client = client_for(addr);

        assert_eq!(client.llen("l").await.unwrap(), 3);
        assert!(client.exists("l").await.unwrap());
        assert!(!client.exists("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_unexpected_reply_shape() {
        let addr = mock_server(vec![vec![b"+OK\r\n"]]).await;
        let client = client_for(addr);

        let err = client.llen("l").await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedReply("integer")));
    }

    #[tokio::test]
    async fn test_pool_bounds_in_flight_calls() {
        // Two slots, six callers; the mock serves each call on its own
        // connection after a short delay.
        const CAPACITY: usize = 2;
        const CALLERS: usize = 6;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    while socket.read(&mut buf).await.unwrap_or(0) > 0 {
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        if socket.write_all(b"+PONG\r\n").await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let client = std::sync::Arc::new(Client::new(
            ClientConfig::new(addr).with_pool_size(CAPACITY),
        ));

        let mut tasks = Vec::new();
        for _ in 0..CALLERS {
            let client = client.clone();
            tasks.push(tokio::spawn(async move { client.ping().await }));
        }
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }
    }
}
