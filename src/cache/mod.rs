//! # 缓存模块
//!
//! 缓存后端抽象、Redis / 内存实现，以及在其上的会话缓存

pub mod backend;
pub mod client;
pub mod keys;
pub mod memory;
pub mod session_cache;

pub use backend::CacheBackend;
pub use client::CacheClient;
pub use keys::{CacheKey, CacheKeyBuilder};
pub use memory::MemoryCache;
pub use session_cache::SessionCache;

use std::sync::Arc;

use crate::config::{CacheConfig, CacheType};
use crate::error::Result;
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 根据配置创建缓存后端
pub async fn create_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>> {
    let backend: Arc<dyn CacheBackend> = match config.cache_type {
        CacheType::Memory => Arc::new(MemoryCache::new()),
        CacheType::Redis => {
            let redis = config
                .redis
                .clone()
                .ok_or_else(|| crate::config_error!("缺少 Redis 缓存配置"))?;
            Arc::new(CacheClient::new(redis).await?)
        }
    };

    backend.ping().await?;
    linfo!("system", LogStage::Startup, LogComponent::Cache, "cache_ready", &format!("缓存后端就绪: {}", backend.backend_name()));
    Ok(backend)
}
