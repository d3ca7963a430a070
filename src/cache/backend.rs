//! # 缓存后端抽象
//!
//! 会话缓存只依赖这组原语：字符串键值（带过期）、SET NX、哈希字段和带值比较的删除。
//! 生产环境使用 Redis，单节点和测试使用进程内实现。

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// 缓存后端 trait
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 写入字符串值并设置过期时间
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// 键不存在时写入并设置过期时间，返回是否写入成功
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// 读取字符串值
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 删除键，返回键是否存在
    async fn del(&self, key: &str) -> Result<bool>;

    /// 仅当当前值等于 `expected` 时删除，返回是否删除
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool>;

    /// 重设过期时间，键不存在时返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 剩余存活时间；键不存在或未设置过期时返回 None
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// 写入哈希字段
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// 读取哈希字段
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// 删除哈希字段，返回字段是否存在
    async fn hdel(&self, key: &str, field: &str) -> Result<bool>;

    /// 读取整个哈希
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}
