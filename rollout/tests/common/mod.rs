use std::sync::Arc;

use async_trait::async_trait;
use common_redis::{Client, CustomRedisError, MGetValue, MockRedisClient};
use rand::{distributions::Alphanumeric, Rng};
use rollout::{Manager, RolloutMode};

pub const KEY_PREFIX: &str = "dealsff";

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn mock_manager(client: &MockRedisClient) -> Manager {
    Manager::new(
        Arc::new(client.clone()),
        KEY_PREFIX,
        RolloutMode::Deterministic,
    )
}

/// Hands back the value it read only after yielding to the scheduler, so concurrent
/// read-modify-write cycles on one task all read before any of them writes.
pub struct StaleReadClient {
    pub inner: MockRedisClient,
}

#[async_trait]
impl Client for StaleReadClient {
    async fn get_raw_bytes(&self, k: String) -> Result<Vec<u8>, CustomRedisError> {
        let result = self.inner.get_raw_bytes(k).await;
        tokio::task::yield_now().await;
        result
    }

    async fn set_bytes(&self, k: String, v: Vec<u8>) -> Result<(), CustomRedisError> {
        self.inner.set_bytes(k, v).await
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<MGetValue>, CustomRedisError> {
        self.inner.mget(keys).await
    }

    async fn del(&self, k: String) -> Result<u64, CustomRedisError> {
        self.inner.del(k).await
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError> {
        self.inner.scan_keys(pattern).await
    }
}

/// Reports every matching key twice from `scan_keys`, as redis SCAN may do while the
/// keyspace is being rehashed.
pub struct RepeatingScanClient {
    pub inner: MockRedisClient,
}

#[async_trait]
impl Client for RepeatingScanClient {
    async fn get_raw_bytes(&self, k: String) -> Result<Vec<u8>, CustomRedisError> {
        self.inner.get_raw_bytes(k).await
    }

    async fn set_bytes(&self, k: String, v: Vec<u8>) -> Result<(), CustomRedisError> {
        self.inner.set_bytes(k, v).await
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<MGetValue>, CustomRedisError> {
        self.inner.mget(keys).await
    }

    async fn del(&self, k: String) -> Result<u64, CustomRedisError> {
        self.inner.del(k).await
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError> {
        let keys = self.inner.scan_keys(pattern).await?;
        Ok(keys.iter().chain(keys.iter()).cloned().collect())
    }
}
