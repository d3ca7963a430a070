//! # Redis 缓存客户端
//!
//! 提供 Redis 连接管理和会话缓存所需的基础操作

use crate::{ldebug, linfo, lerror, logging::{LogComponent, LogStage}};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::collections::HashMap;
use std::time::Duration;

use super::CacheBackend;
use super::keys::redact_key;
use crate::config::RedisConfig;
use crate::error::{Result, SessionError};

/// 仅当值匹配时删除，用于带持有者校验的锁释放
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis 缓存客户端
#[derive(Clone)]
pub struct CacheClient {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
    /// 配置信息
    config: RedisConfig,
}

impl CacheClient {
    /// 创建新的缓存客户端
    pub async fn new(config: RedisConfig) -> Result<Self> {
        linfo!("system", LogStage::Cache, LogComponent::Cache, "connect_to_redis", &format!("正在连接 Redis 服务器: {}:{}", config.host, config.port));

        let client = Client::open(config.build_url())
            .map_err(|e| SessionError::cache_with_source("创建 Redis 客户端失败", e))?;

        let connect = ConnectionManager::new(client);
        let connection_manager =
            tokio::time::timeout(Duration::from_secs(config.connection_timeout), connect)
                .await
                .map_err(|_| SessionError::cache("建立 Redis 连接超时"))?
                .map_err(|e| SessionError::cache_with_source("建立 Redis 连接失败", e))?;

        linfo!("system", LogStage::Cache, LogComponent::Cache, "redis_connected", "Redis 连接建立成功");

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// 获取配置信息
    #[must_use]
    pub const fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// 命令失败时的缓存错误，错误信息中的键已脱敏
fn cache_op_error(action: &str, key: &str, err: redis::RedisError) -> SessionError {
    SessionError::cache_with_source(format!("{action}: {}", redact_key(key)), err)
}

fn ttl_secs(ttl: Duration) -> u64 {
    // Redis 不接受 0 秒的过期时间
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for CacheClient {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "set_cache", &format!("设置缓存: key={}, ttl={}s", redact_key(key), ttl.as_secs()));

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| cache_op_error("设置缓存失败", key, e))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection_manager.clone();

        let reply: redis::Value = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_op_error("SET NX 失败", key, e))?;

        let acquired = !matches!(reply, redis::Value::Nil);
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "set_nx", &format!("SET NX: key={}, acquired={}", redact_key(key), acquired));
        Ok(acquired)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();

        let result: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| cache_op_error("获取缓存失败", key, e))?;

        ldebug!("system", LogStage::Cache, LogComponent::Cache, "get_cache", &format!("获取缓存: key={}, hit={}", redact_key(key), result.is_some()));
        Ok(result)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();

        let deleted_count: i64 = conn
            .del(key)
            .await
            .map_err(|e| cache_op_error("删除缓存失败", key, e))?;

        ldebug!("system", LogStage::Cache, LogComponent::Cache, "delete_cache", &format!("缓存删除结果: key={}, deleted={}", redact_key(key), deleted_count > 0));
        Ok(deleted_count > 0)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();

        let deleted: i64 = Script::new(COMPARE_AND_DELETE)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_op_error("条件删除失败", key, e))?;

        Ok(deleted > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let seconds = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);

        let success: bool = conn.expire(key, seconds).await.map_err(|e| {
            cache_op_error("设置缓存过期时间失败", key, e)
        })?;

        ldebug!("system", LogStage::Cache, LogComponent::Cache, "set_expire", &format!("缓存过期时间设置结果: key={}, ttl={}s, success={}", redact_key(key), seconds, success));
        Ok(success)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection_manager.clone();

        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| cache_op_error("获取缓存TTL失败", key, e))?;

        // -2 表示键不存在，-1 表示未设置过期
        Ok(u64::try_from(ttl).ok().map(Duration::from_secs))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| cache_op_error("写入哈希字段失败", &format!("{key}.{field}"), e))
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();

        conn.hget(key, field)
            .await
            .map_err(|e| cache_op_error("读取哈希字段失败", &format!("{key}.{field}"), e))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();

        let removed: i64 = conn
            .hdel(key, field)
            .await
            .map_err(|e| cache_op_error("删除哈希字段失败", &format!("{key}.{field}"), e))?;

        Ok(removed > 0)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection_manager.clone();

        conn.hgetall(key)
            .await
            .map_err(|e| cache_op_error("读取哈希失败", key, e))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::cache_with_source("Redis ping 失败", e))?;

        if response == "PONG" {
            ldebug!("system", LogStage::Cache, LogComponent::Cache, "ping_success", "Redis 连接测试成功");
            Ok(())
        } else {
            lerror!("system", LogStage::Cache, LogComponent::Cache, "ping_fail", &format!("Redis ping 响应异常: {}", response));
            Err(crate::cache_error!("Redis 连接测试失败: {}", response))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
