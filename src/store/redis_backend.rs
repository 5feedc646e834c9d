//! Redis session backend
//!
//! Shared between instances. Entries are written with `SET .. EX` and
//! consumed with `GETDEL`.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::SessionError;

pub struct RedisBackend {
    connection: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisBackend {
    /// Connect to `url`; the connection manager reconnects on failure.
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            ttl_seconds,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection.get(key).await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), SessionError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set_ex(key, value, self.ttl_seconds).await?;
        Ok(())
    }

    /// Remove and return in one step
    pub async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(value)
    }

    pub async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await?;
        Ok(())
    }
}
