//! # 会话缓存
//!
//! 基于 [`CacheBackend`] 的强类型会话存储。本身不持有状态，所有数据都在缓存后端中。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheBackend, CacheKey, CacheKeyBuilder};
use crate::auth::types::{PasswordResetRecord, Platform, Session};
use crate::auth::utils::sanitize_token;
use crate::config::TokenConfig;
use crate::error::{Context, Result};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 会话缓存
#[derive(Clone)]
pub struct SessionCache {
    backend: Arc<dyn CacheBackend>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    password_reset_ttl: Duration,
}

impl SessionCache {
    /// 以注入的缓存后端和 Token 配置中的 TTL 创建会话缓存
    pub fn new(backend: Arc<dyn CacheBackend>, config: &TokenConfig) -> Self {
        Self {
            backend,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
            password_reset_ttl: config.password_reset_ttl(),
        }
    }

    async fn put_session(&self, key: &CacheKey, session: &Session, ttl: Duration) -> Result<()> {
        let value = serde_json::to_string(session)?;
        self.backend
            .set_ex(&key.build(), &value, ttl)
            .await
            .with_context(|| format!("写入会话记录 {}", key.namespace()))
    }

    async fn get_session(&self, key: &CacheKey) -> Result<Option<Session>> {
        let raw = self
            .backend
            .get(&key.build())
            .await
            .context("读取会话记录")?;
        Ok(decode_session(raw.as_deref(), key))
    }

    /// 写入访问 Token 反查记录
    pub async fn put_access_token(&self, session: &Session) -> Result<()> {
        let key = CacheKeyBuilder::access_token(&session.access_token);
        self.put_session(&key, session, self.access_ttl).await
    }

    /// 写入刷新 Token 反查记录
    pub async fn put_refresh_token(&self, session: &Session) -> Result<()> {
        let key = CacheKeyBuilder::refresh_token(&session.refresh_token);
        self.put_session(&key, session, self.refresh_ttl).await
    }

    /// 通过访问 Token 查找会话
    pub async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>> {
        self.get_session(&CacheKeyBuilder::access_token(token)).await
    }

    /// 通过刷新 Token 查找会话
    pub async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>> {
        self.get_session(&CacheKeyBuilder::refresh_token(token)).await
    }

    /// 删除访问 Token 记录
    pub async fn delete_access_token(&self, token: &str) -> Result<bool> {
        self.delete_key(&CacheKeyBuilder::access_token(token)).await
    }

    /// 删除刷新 Token 记录
    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool> {
        self.delete_key(&CacheKeyBuilder::refresh_token(token)).await
    }

    /// 缩短刷新 Token 记录的剩余有效期，不删除
    pub async fn expire_refresh_token_in(&self, token: &str, duration: Duration) -> Result<bool> {
        let key = CacheKeyBuilder::refresh_token(token);
        let updated = self
            .backend
            .expire(&key.build(), duration)
            .await
            .context("缩短刷新 Token 有效期")?;

        ldebug!("system", LogStage::Cache, LogComponent::SessionCache, "expire_refresh_token", &format!("刷新 Token 降级: token={}, ttl={}s, found={}", sanitize_token(token), duration.as_secs(), updated));
        Ok(updated)
    }

    /// 写入用户在某平台上的当前会话
    pub async fn put_platform_session(
        &self,
        user_id: i64,
        platform: Platform,
        session: &Session,
    ) -> Result<()> {
        let value = serde_json::to_string(session)?;
        self.backend
            .hset(
                &CacheKeyBuilder::user_session(user_id).build(),
                platform.as_str(),
                &value,
            )
            .await
            .context("写入平台会话")
    }

    /// 读取用户在某平台上的当前会话
    pub async fn get_platform_session(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<Session>> {
        let key = CacheKeyBuilder::user_session(user_id);
        let raw = self
            .backend
            .hget(&key.build(), platform.as_str())
            .await
            .context("读取平台会话")?;
        Ok(decode_session(raw.as_deref(), &key))
    }

    /// 删除用户在某平台上的会话条目
    pub async fn delete_platform_session(&self, user_id: i64, platform: Platform) -> Result<bool> {
        self.backend
            .hdel(
                &CacheKeyBuilder::user_session(user_id).build(),
                platform.as_str(),
            )
            .await
            .context("删除平台会话")
    }

    /// 读取用户所有平台的会话
    pub async fn get_all_platform_sessions(&self, user_id: i64) -> Result<HashMap<Platform, Session>> {
        let key = CacheKeyBuilder::user_session(user_id);
        let fields = self
            .backend
            .hgetall(&key.build())
            .await
            .context("读取全部平台会话")?;

        let mut sessions = HashMap::with_capacity(fields.len());
        for (field, raw) in fields {
            let Ok(platform) = field.parse::<Platform>() else {
                lwarn!("system", LogStage::Cache, LogComponent::SessionCache, "unknown_platform_field", &format!("忽略未知平台字段: key={}, field={}", key, field));
                continue;
            };
            if let Some(session) = decode_session(Some(&raw), &key) {
                sessions.insert(platform, session);
            }
        }
        Ok(sessions)
    }

    /// 删除用户的整个会话哈希
    pub async fn delete_all_platform_sessions(&self, user_id: i64) -> Result<bool> {
        self.delete_key(&CacheKeyBuilder::user_session(user_id)).await
    }

    /// 原子地尝试获取锁（SET NX EX）
    pub async fn try_acquire_lock(&self, key: &CacheKey, owner: &str, ttl: Duration) -> Result<bool> {
        self.backend
            .set_nx_ex(&key.build(), owner, ttl)
            .await
            .context("获取锁")
    }

    /// 仅当锁仍由 `owner` 持有时释放
    pub async fn release_lock(&self, key: &CacheKey, owner: &str) -> Result<bool> {
        self.backend
            .del_if_eq(&key.build(), owner)
            .await
            .context("释放锁")
    }

    /// 无条件删除键
    pub async fn delete_key(&self, key: &CacheKey) -> Result<bool> {
        self.backend
            .del(&key.build())
            .await
            .with_context(|| format!("删除键 {}", key.namespace()))
    }

    /// 写入密码重置记录
    pub async fn put_password_reset(&self, token: &str, user_id: i64, code: &str) -> Result<()> {
        let record = PasswordResetRecord {
            user_id,
            code: code.to_string(),
        };
        self.backend
            .set_ex(
                &CacheKeyBuilder::password_reset(token).build(),
                &record.encode(),
                self.password_reset_ttl,
            )
            .await
            .context("写入密码重置记录")
    }

    /// 读取密码重置记录；格式损坏视为不存在
    pub async fn get_password_reset(&self, token: &str) -> Result<Option<PasswordResetRecord>> {
        let raw = self
            .backend
            .get(&CacheKeyBuilder::password_reset(token).build())
            .await
            .context("读取密码重置记录")?;

        Ok(raw.as_deref().and_then(|value| {
            let record = PasswordResetRecord::decode(value);
            if record.is_none() {
                lwarn!("system", LogStage::Cache, LogComponent::SessionCache, "corrupt_reset_record", &format!("密码重置记录格式错误: token={}", sanitize_token(token)));
            }
            record
        }))
    }

    /// 删除密码重置记录
    pub async fn delete_password_reset(&self, token: &str) -> Result<bool> {
        self.delete_key(&CacheKeyBuilder::password_reset(token)).await
    }
}

/// 解析会话 JSON；无法解析的记录按不存在处理并告警
fn decode_session(raw: Option<&str>, key: &CacheKey) -> Option<Session> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(session) => Some(session),
        Err(e) => {
            lwarn!("system", LogStage::Cache, LogComponent::SessionCache, "corrupt_session", &format!("会话记录无法解析: namespace={}, error={}", key.namespace(), e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::fixtures::session_fixture;
    use crate::testing::mocks::MockCacheBackend;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn cache_with(backend: Arc<dyn CacheBackend>) -> SessionCache {
        SessionCache::new(backend, &TokenConfig::with_secrets("a", "r"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_records_round_trip() {
        let memory = Arc::new(MemoryCache::new());
        let cache = cache_with(memory.clone());
        let session = session_fixture(42, Platform::App);

        cache.put_access_token(&session).await.unwrap();
        cache.put_refresh_token(&session).await.unwrap();

        assert_eq!(
            cache.get_by_access_token(&session.access_token).await.unwrap(),
            Some(session.clone())
        );
        assert_eq!(
            cache.get_by_refresh_token(&session.refresh_token).await.unwrap(),
            Some(session.clone())
        );
        assert_eq!(
            memory
                .ttl(&CacheKeyBuilder::access_token(&session.access_token).build())
                .await
                .unwrap(),
            Some(Duration::from_secs(7200))
        );
        assert_eq!(cache.get_by_access_token("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_platform_sessions() {
        let cache = cache_with(Arc::new(MemoryCache::new()));
        let app = session_fixture(42, Platform::App);
        let h5 = session_fixture(42, Platform::H5);

        cache.put_platform_session(42, Platform::App, &app).await.unwrap();
        cache.put_platform_session(42, Platform::H5, &h5).await.unwrap();

        assert_eq!(cache.get_platform_session(42, Platform::App).await.unwrap(), Some(app));
        assert_eq!(cache.get_all_platform_sessions(42).await.unwrap().len(), 2);

        assert!(cache.delete_platform_session(42, Platform::App).await.unwrap());
        assert_eq!(cache.get_platform_session(42, Platform::App).await.unwrap(), None);

        assert!(cache.delete_all_platform_sessions(42).await.unwrap());
        assert!(cache.get_all_platform_sessions(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_fenced() {
        let cache = cache_with(Arc::new(MemoryCache::new()));
        let key = CacheKeyBuilder::refresh_lock("r1");

        assert!(cache.try_acquire_lock(&key, "a", Duration::from_secs(10)).await.unwrap());
        assert!(!cache.try_acquire_lock(&key, "b", Duration::from_secs(10)).await.unwrap());
        assert!(!cache.release_lock(&key, "b").await.unwrap());
        assert!(cache.release_lock(&key, "a").await.unwrap());
        assert!(cache.try_acquire_lock(&key, "b", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_password_reset_records() {
        let cache = cache_with(Arc::new(MemoryCache::new()));

        cache.put_password_reset("t1", 42, "123456").await.unwrap();
        let record = cache.get_password_reset("t1").await.unwrap().unwrap();
        assert_eq!(record.user_id, 42);
        assert_eq!(record.code, "123456");

        assert!(cache.delete_password_reset("t1").await.unwrap());
        assert_eq!(cache.get_password_reset("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_treated_as_absent() {
        let memory = Arc::new(MemoryCache::new());
        memory
            .set_ex("token:access:bad", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = cache_with(memory);

        assert_eq!(cache.get_by_access_token("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_cache_unavailable() {
        let mut backend = MockCacheBackend::new();
        backend
            .expect_get()
            .returning(|_| Err(crate::error::SessionError::cache("connection reset")));
        let cache = cache_with(Arc::new(backend));

        let err = cache.get_by_refresh_token("r").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheUnavailable);
        assert!(err.to_string().starts_with("读取会话记录"));
    }
}
