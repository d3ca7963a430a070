//! # 刷新互斥锁
//!
//! 同一个刷新 Token 同时只允许一个刷新流程执行。锁值为随机持有者标识，
//! 释放时只删除仍属于自己的锁；持有者异常退出时依赖锁 TTL 回收。

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::auth::utils::sanitize_token;
use crate::cache::{CacheKey, CacheKeyBuilder, SessionCache};
use crate::error::{Context, Result, SessionError};
use crate::{ldebug, lerror, lwarn, logging::{LogComponent, LogStage}};

/// 刷新协调器
#[derive(Clone)]
pub struct RefreshCoordinator {
    cache: SessionCache,
    lock_ttl: Duration,
}

impl RefreshCoordinator {
    /// 创建协调器，`lock_ttl` 为锁的最长持有时间
    #[must_use]
    pub const fn new(cache: SessionCache, lock_ttl: Duration) -> Self {
        Self { cache, lock_ttl }
    }

    /// 持有 `token:refresh:lock:{token}` 执行 `work`
    ///
    /// 锁已被占用时返回 `TooManyRequests`，不会执行 `work`。
    /// 无论 `work` 成功、失败还是 panic，都会尝试释放锁；panic 在释放后继续传播。
    pub async fn with_refresh_lock<F, T>(&self, token: &str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let key = CacheKeyBuilder::refresh_lock(token);
        let owner = uuid::Uuid::new_v4().to_string();

        let acquired = self
            .cache
            .try_acquire_lock(&key, &owner, self.lock_ttl)
            .await
            .context("acquire_refresh_lock")?;

        if !acquired {
            lwarn!("system", LogStage::TokenRefresh, LogComponent::RefreshLock, "refresh_lock_busy", &format!("刷新锁已被占用: token={}", sanitize_token(token)));
            return Err(SessionError::too_many_requests("同一刷新 Token 的请求正在处理中"));
        }

        ldebug!("system", LogStage::TokenRefresh, LogComponent::RefreshLock, "refresh_lock_acquired", &format!("获取刷新锁: token={}", sanitize_token(token)));

        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        self.release(&key, &owner, token).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// 释放失败只记录日志，锁会在 TTL 到期后自动消失
    async fn release(&self, key: &CacheKey, owner: &str, token: &str) {
        match self.cache.release_lock(key, owner).await {
            Ok(true) => {
                ldebug!("system", LogStage::TokenRefresh, LogComponent::RefreshLock, "refresh_lock_released", &format!("释放刷新锁: token={}", sanitize_token(token)));
            }
            Ok(false) => {
                lwarn!("system", LogStage::TokenRefresh, LogComponent::RefreshLock, "refresh_lock_lost", &format!("刷新锁已过期或被其他请求持有，跳过释放: token={}", sanitize_token(token)));
            }
            Err(e) => {
                lerror!("system", LogStage::TokenRefresh, LogComponent::RefreshLock, "refresh_lock_release_failed", &format!("释放刷新锁失败: token={}, error={}", sanitize_token(token), e));
            }
        }
    }
}
