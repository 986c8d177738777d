//! Client configuration.

/// Default server address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Client configuration.
///
/// Immutable once a [`Client`](crate::Client) is built from it; build a new
/// client to talk to a different server, database, or credential.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (`host:port`).
    pub addr: String,
    /// Database index selected right after a connection opens.
    pub db: u32,
    /// Password sent right after a connection opens, if set.
    pub password: Option<String>,
    /// Pool capacity; also the cap on simultaneous in-flight requests.
    pub pool_size: usize,
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            db: 0,
            password: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.db, 0);
        assert_eq!(config.password, None);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_pool_size_clamped_to_one() {
        let config = ClientConfig::new("127.0.0.1:6379").with_pool_size(0);
        assert_eq!(config.pool_size, 1);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("10.0.0.1:6380")
            .with_db(13)
            .with_password("sekrit")
            .with_pool_size(2);
        assert_eq!(config.addr, "10.0.0.1:6380");
        assert_eq!(config.db, 13);
        assert_eq!(config.password.as_deref(), Some("sekrit"));
        assert_eq!(config.pool_size, 2);
    }
}
