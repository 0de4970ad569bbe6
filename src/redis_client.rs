use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};

/// Thin handle around a multiplexed Redis connection. `ConnectionManager`
/// reconnects on its own, so one manager is shared across all workers.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
