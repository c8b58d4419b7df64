use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Client, CustomRedisError, MGetValue};

/// An in-memory stand-in for redis.
///
/// Writes are visible to later reads, so read-modify-write code can be exercised end to end.
/// Clones share the same store and call log.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    mget_ret: HashMap<String, MGetValue>,
    get_error: Option<CustomRedisError>,
    set_error: Option<CustomRedisError>,
    mget_error: Option<CustomRedisError>,
    del_error: Option<CustomRedisError>,
    scan_error: Option<CustomRedisError>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

// A poisoned lock only means another test thread panicked mid-call, the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Vec<u8>) -> Self {
        lock(&self.store).insert(key.to_owned(), value);
        self.clone()
    }

    /// Force the MGET slot for `key`, regardless of what the store holds.
    pub fn mget_ret(&mut self, key: &str, ret: MGetValue) -> Self {
        self.mget_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn get_error(&mut self, err: CustomRedisError) -> Self {
        self.get_error = Some(err);
        self.clone()
    }

    pub fn set_error(&mut self, err: CustomRedisError) -> Self {
        self.set_error = Some(err);
        self.clone()
    }

    pub fn mget_error(&mut self, err: CustomRedisError) -> Self {
        self.mget_error = Some(err);
        self.clone()
    }

    pub fn del_error(&mut self, err: CustomRedisError) -> Self {
        self.del_error = Some(err);
        self.clone()
    }

    pub fn scan_error(&mut self, err: CustomRedisError) -> Self {
        self.scan_error = Some(err);
        self.clone()
    }

    pub fn stored(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.store).get(key).cloned()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<MockRedisCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    fn record(&self, op: &str, key: String, value: MockRedisValue) {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key,
            value,
        });
    }
}

fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRedisValue {
    None,
    Bytes(Vec<u8>),
    VecString(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get_raw_bytes(&self, key: String) -> Result<Vec<u8>, CustomRedisError> {
        self.record("get_raw_bytes", key.clone(), MockRedisValue::None);

        if let Some(err) = &self.get_error {
            return Err(err.clone());
        }

        lock(&self.store)
            .get(&key)
            .cloned()
            .ok_or(CustomRedisError::NotFound)
    }

    async fn set_bytes(&self, key: String, value: Vec<u8>) -> Result<(), CustomRedisError> {
        self.record("set_bytes", key.clone(), MockRedisValue::Bytes(value.clone()));

        if let Some(err) = &self.set_error {
            return Err(err.clone());
        }

        lock(&self.store).insert(key, value);
        Ok(())
    }

    async fn mget(&self, keys: Vec<String>) -> Result<Vec<MGetValue>, CustomRedisError> {
        self.record(
            "mget",
            format!("keys={}", keys.len()),
            MockRedisValue::VecString(keys.clone()),
        );

        if let Some(err) = &self.mget_error {
            return Err(err.clone());
        }

        let store = lock(&self.store);
        let results = keys
            .iter()
            .map(|k| match self.mget_ret.get(k) {
                Some(forced) => forced.clone(),
                None => store
                    .get(k)
                    .map_or(MGetValue::Absent, |v| MGetValue::Payload(v.clone())),
            })
            .collect();
        Ok(results)
    }

    async fn del(&self, key: String) -> Result<u64, CustomRedisError> {
        self.record("del", key.clone(), MockRedisValue::None);

        if let Some(err) = &self.del_error {
            return Err(err.clone());
        }

        Ok(u64::from(lock(&self.store).remove(&key).is_some()))
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, CustomRedisError> {
        self.record("scan_keys", pattern.clone(), MockRedisValue::None);

        if let Some(err) = &self.scan_error {
            return Err(err.clone());
        }

        Ok(lock(&self.store)
            .keys()
            .filter(|k| matches_pattern(&pattern, k))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_are_visible_to_reads() {
        let client = MockRedisClient::new();

        client
            .set_bytes("ff:example".to_string(), vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(
            client.get_raw_bytes("ff:example".to_string()).await.unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(client.stored("ff:example"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let client = MockRedisClient::new();

        match client.get_raw_bytes("ff:missing".to_string()).await {
            Err(CustomRedisError::NotFound) => (),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mget_preserves_order_and_overrides() {
        let client = MockRedisClient::new()
            .insert("ff:a", vec![1])
            .insert("ff:c", vec![3])
            .mget_ret("ff:d", MGetValue::Malformed("Int(1)".to_string()));

        let values = client
            .mget(vec![
                "ff:c".to_string(),
                "ff:b".to_string(),
                "ff:a".to_string(),
                "ff:d".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(
            values,
            vec![
                MGetValue::Payload(vec![3]),
                MGetValue::Absent,
                MGetValue::Payload(vec![1]),
                MGetValue::Malformed("Int(1)".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_del_reports_count() {
        let client = MockRedisClient::new().insert("ff:a", vec![1]);

        assert_eq!(client.del("ff:a".to_string()).await.unwrap(), 1);
        assert_eq!(client.del("ff:a".to_string()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_matches_prefix_patterns() {
        let client = MockRedisClient::new()
            .insert("ff:a", vec![1])
            .insert("ff:b", vec![2])
            .insert("other:a", vec![3]);

        let mut keys = client.scan_keys("ff:*".to_string()).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ff:a".to_string(), "ff:b".to_string()]);

        let keys = client.scan_keys("other:a".to_string()).await.unwrap();
        assert_eq!(keys, vec!["other:a".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_errors_and_call_log() {
        let err = CustomRedisError::from_redis_kind(crate::RedisErrorKind::IoError, "mock error");
        let client = MockRedisClient::new().set_error(err);

        let result = client.set_bytes("ff:a".to_string(), vec![1]).await;
        assert!(result.unwrap_err().to_string().contains("mock error"));
        assert_eq!(client.stored("ff:a"), None);

        let calls = client.calls_for("set_bytes");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].key, "ff:a");
        assert_eq!(calls[0].value, MockRedisValue::Bytes(vec![1]));
    }
}
