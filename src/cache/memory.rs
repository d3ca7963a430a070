//! # 进程内缓存
//!
//! 与 Redis 语义一致的单进程实现。所有复合操作（SET NX、条件删除）在同一把锁内完成。
//! 过期时间基于 `tokio::time::Instant`，测试中可以配合 `tokio::time::pause` 推进时间。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::CacheBackend;
use super::keys::redact_key;
use crate::error::{Result, SessionError};

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Hash(HashMap<String, String>),
}

/// 缓存项
#[derive(Debug, Clone)]
struct CacheEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: StoredValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// 内存缓存实现
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// 创建空缓存
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 加锁并清理已过期的键
    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| crate::cache_error!("内存缓存锁已中毒"))?;
        let now = Instant::now();
        data.retain(|_, entry| !entry.is_expired(now));
        Ok(data)
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    /// 是否没有未过期的键
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn wrong_type(key: &str) -> SessionError {
    crate::cache_error!("WRONGTYPE: 键 {} 的类型不匹配", redact_key(key))
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut data = self.entries()?;
        data.insert(
            key.to_string(),
            CacheEntry::new(StoredValue::Text(value.to_string()), Some(ttl)),
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut data = self.entries()?;
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            CacheEntry::new(StoredValue::Text(value.to_string()), Some(ttl)),
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.entries()?;
        match data.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(StoredValue::Text(value)) => Ok(Some(value.clone())),
            Some(StoredValue::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.entries()?.remove(key).is_some())
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let mut data = self.entries()?;
        let matches = matches!(
            data.get(key).map(|entry| &entry.value),
            Some(StoredValue::Text(current)) if current == expected
        );
        if matches {
            data.remove(key);
        }
        Ok(matches)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut data = self.entries()?;
        match data.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let data = self.entries()?;
        let now = Instant::now();
        Ok(data
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| expires_at.saturating_duration_since(now)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut data = self.entries()?;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(StoredValue::Hash(HashMap::new()), None));
        match &mut entry.value {
            StoredValue::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            StoredValue::Text(_) => Err(wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let data = self.entries()?;
        match data.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(StoredValue::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(StoredValue::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut data = self.entries()?;
        let (removed, now_empty) = match data.get_mut(key).map(|entry| &mut entry.value) {
            None => return Ok(false),
            Some(StoredValue::Hash(fields)) => (fields.remove(field).is_some(), fields.is_empty()),
            Some(StoredValue::Text(_)) => return Err(wrong_type(key)),
        };
        // 与 Redis 一致：最后一个字段删除后哈希本身消失
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let data = self.entries()?;
        match data.get(key).map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(StoredValue::Hash(fields)) => Ok(fields.clone()),
            Some(StoredValue::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.entries().map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_nx_respects_existing_key_until_expiry() {
        let cache = MemoryCache::new();
        assert!(cache.set_nx_ex("lock", "a", Duration::from_secs(10)).await.unwrap());
        assert!(!cache.set_nx_ex("lock", "b", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.set_nx_ex("lock", "b", Duration::from_secs(10)).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_del_if_eq_only_removes_matching_owner() {
        let cache = MemoryCache::new();
        cache.set_ex("lock", "owner-a", Duration::from_secs(10)).await.unwrap();

        assert!(!cache.del_if_eq("lock", "owner-b").await.unwrap());
        assert!(cache.get("lock").await.unwrap().is_some());

        assert!(cache.del_if_eq("lock", "owner-a").await.unwrap());
        assert!(cache.get("lock").await.unwrap().is_none());
        assert!(!cache.del_if_eq("lock", "owner-a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_shortens_lifetime() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_secs(3600)).await.unwrap();
        assert!(cache.expire("k", Duration::from_secs(5)).await.unwrap());
        assert!(!cache.expire("missing", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let cache = MemoryCache::new();
        cache.hset("h", "web", "1").await.unwrap();
        cache.hset("h", "ios", "2").await.unwrap();
        cache.hset("h", "web", "3").await.unwrap();

        assert_eq!(cache.hget("h", "web").await.unwrap().as_deref(), Some("3"));
        assert_eq!(cache.hgetall("h").await.unwrap().len(), 2);
        assert_eq!(cache.ttl("h").await.unwrap(), None);

        assert!(cache.hdel("h", "web").await.unwrap());
        assert!(!cache.hdel("h", "web").await.unwrap());
        assert!(cache.hdel("h", "ios").await.unwrap());
        assert!(cache.hgetall("h").await.unwrap().is_empty());
        assert!(cache.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_is_cache_error() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();

        let err = cache.hget("k", "f").await.unwrap_err();
        assert!(err.is_transient());

        let token = "eyJhbGciOiJIUzI1NiJ9.secret-payload.signature";
        let key = format!("token:access:{token}");
        cache.set_ex(&key, "v", Duration::from_secs(10)).await.unwrap();
        let err = cache.hgetall(&key).await.unwrap_err();
        assert!(!err.to_string().contains("secret-payload"));
    }
}
