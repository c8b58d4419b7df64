use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// Re-export ErrorKind so consumers can construct CustomRedisError in tests
pub use redis::ErrorKind as RedisErrorKind;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl CustomRedisError {
    /// Create a Redis error from an ErrorKind (primarily for testing)
    pub fn from_redis_kind(kind: redis::ErrorKind, description: &'static str) -> Self {
        CustomRedisError::Redis(Arc::new(redis::RedisError::from((kind, description))))
    }
}

/// A single slot of an MGET reply.
///
/// Redis answers MGET with an array whose entries are either nil or a string. Anything
/// else means the key holds a value we can't interpret, which callers must be able to
/// tell apart from a missing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MGetValue {
    Absent,
    Payload(Vec<u8>),
    Malformed(String),
}

impl MGetValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, MGetValue::Absent)
    }
}

impl From<redis::Value> for MGetValue {
    fn from(value: redis::Value) -> Self {
        match value {
            redis::Value::Nil => MGetValue::Absent,
            redis::Value::BulkString(bytes) => MGetValue::Payload(bytes),
            redis::Value::SimpleString(s) => MGetValue::Payload(s.into_bytes()),
            other => MGetValue::Malformed(format!("unexpected {} reply", reply_type(&other))),
        }
    }
}

fn reply_type(value: &redis::Value) -> &'static str {
    match value {
        redis::Value::Int(_) => "integer",
        redis::Value::Array(_) => "array",
        redis::Value::Okay => "status",
        redis::Value::Map(_) => "map",
        redis::Value::Set(_) => "set",
        redis::Value::Double(_) => "double",
        redis::Value::Boolean(_) => "boolean",
        redis::Value::Push { .. } => "push",
        redis::Value::ServerError(_) => "error",
        _ => "non-string",
    }
}

#[async_trait]
pub trait Client {
    /// Fetch the raw bytes stored under a key, `CustomRedisError::NotFound` if it is absent.
    async fn get_raw_bytes(&self, k: String) -> Result<Vec<u8>, CustomRedisError>;
    /// Set raw bytes without any serialization. Keys never expire.
    async fn set_bytes(&self, k: String, v: Vec<u8>) -> Result<(), CustomRedisError>;
    /// Fetch many keys in one round trip. The reply has one entry per key, in order.
    async fn mget(&self, keys: Vec<String>) -> Result<Vec<MGetValue>, CustomRedisError>;
    /// Delete a key, returning how many keys were removed.
    async fn del(&self, k: String) -> Result<u64, CustomRedisError>;
    /// Collect every key matching a glob pattern by walking the SCAN cursor to the end.
    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError>;
}

// Module declarations
mod client;
mod mock;

// Re-export public APIs
pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};
