//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DatabaseConfig;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token 配置
    #[serde(default)]
    pub token: TokenConfig,
}

/// 缓存类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// 进程内缓存（单节点部署 / 测试）
    #[default]
    Memory,
    /// Redis缓存
    Redis,
}

/// 缓存配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 缓存类型
    #[serde(default)]
    pub cache_type: CacheType,
    /// Redis 缓存配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis 服务器地址
    pub host: String,
    /// Redis 服务器端口
    pub port: u16,
    /// 数据库编号
    pub database: u8,
    /// 连接密码（可选）
    pub password: Option<String>,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
    /// 完整连接 URL，设置后优先于 host/port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout: 10,
            url: None,
        }
    }
}

impl RedisConfig {
    /// 构建 Redis 连接 URL
    #[must_use]
    pub fn build_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        if let Some(password) = &self.password {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            )
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

/// Token 与会话生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// 访问 Token 签名密钥
    pub access_secret: String,
    /// 刷新 Token 签名密钥，必须与访问 Token 密钥不同
    pub refresh_secret: String,
    /// 签发者
    pub issuer: String,
    /// 访问 Token 有效期（秒）
    pub access_ttl_secs: u64,
    /// 刷新 Token 有效期（秒）
    pub refresh_ttl_secs: u64,
    /// 被轮换的刷新 Token 保留时间（秒），用于发现 Token 被窃取
    pub refresh_grace_secs: u64,
    /// 刷新锁有效期（秒）
    pub refresh_lock_ttl_secs: u64,
    /// 密码重置 Token 有效期（秒）
    pub password_reset_ttl_secs: u64,
    /// 密码重置验证码位数
    pub reset_code_length: usize,
    /// bcrypt 计算成本
    pub password_hash_cost: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            issuer: "session-gate".to_string(),
            access_ttl_secs: 2 * 60 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            refresh_grace_secs: 6 * 60 * 60,
            refresh_lock_ttl_secs: 10,
            password_reset_ttl_secs: 15 * 60,
            reset_code_length: 6,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl TokenConfig {
    /// 以给定密钥构建其余保持默认值的配置
    #[must_use]
    pub fn with_secrets(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Self::default()
        }
    }

    /// 访问 Token 有效期
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// 刷新 Token 有效期
    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// 被替换的刷新 Token 宽限期
    #[must_use]
    pub const fn refresh_grace(&self) -> Duration {
        Duration::from_secs(self.refresh_grace_secs)
    }

    /// 刷新锁有效期
    #[must_use]
    pub const fn refresh_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_lock_ttl_secs)
    }

    /// 密码重置 Token 有效期
    #[must_use]
    pub const fn password_reset_ttl(&self) -> Duration {
        Duration::from_secs(self.password_reset_ttl_secs)
    }

    /// 验证 Token 配置
    pub fn validate(&self) -> Result<(), String> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err("access_secret and refresh_secret must be provided".to_string());
        }
        if self.access_secret == self.refresh_secret {
            return Err("access_secret and refresh_secret must differ".to_string());
        }
        if self.access_ttl_secs == 0
            || self.refresh_ttl_secs == 0
            || self.refresh_grace_secs == 0
            || self.refresh_lock_ttl_secs == 0
            || self.password_reset_ttl_secs == 0
        {
            return Err("token lifetimes must be greater than 0".to_string());
        }
        if self.refresh_grace_secs >= self.refresh_ttl_secs {
            return Err("refresh_grace_secs must be shorter than refresh_ttl_secs".to_string());
        }
        if self.reset_code_length == 0 {
            return Err("reset_code_length must be greater than 0".to_string());
        }
        if !(4..=31).contains(&self.password_hash_cost) {
            return Err("password_hash_cost must be within 4..=31".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        self.token.validate()?;

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        match self.cache.cache_type {
            CacheType::Memory => {
                if self.cache.redis.is_some() {
                    return Err("cache.redis 配置仅在 cache_type = \"redis\" 时可用".to_string());
                }
            }
            CacheType::Redis => {
                let redis = self
                    .cache
                    .redis
                    .as_ref()
                    .ok_or_else(|| "Redis cache configuration must be provided".to_string())?;

                if redis.url.as_deref().is_some_and(str::is_empty) || redis.host.is_empty() {
                    return Err("Redis URL cannot be empty".to_string());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_config() -> AppConfig {
        AppConfig {
            token: TokenConfig::with_secrets("access-secret", "refresh-secret"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_lifetimes() {
        let token = TokenConfig::default();
        assert_eq!(token.access_ttl(), Duration::from_secs(7200));
        assert_eq!(token.refresh_ttl(), Duration::from_secs(604_800));
        assert_eq!(token.refresh_grace(), Duration::from_secs(21_600));
        assert_eq!(token.refresh_lock_ttl(), Duration::from_secs(10));
        assert_eq!(token.password_reset_ttl(), Duration::from_secs(900));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[rstest]
    #[case::missing_secret(TokenConfig::with_secrets("", "refresh"))]
    #[case::shared_secret(TokenConfig::with_secrets("same", "same"))]
    #[case::grace_too_long(TokenConfig { refresh_grace_secs: 604_800, ..TokenConfig::with_secrets("a", "b") })]
    #[case::zero_lock_ttl(TokenConfig { refresh_lock_ttl_secs: 0, ..TokenConfig::with_secrets("a", "b") })]
    #[case::bcrypt_cost(TokenConfig { password_hash_cost: 2, ..TokenConfig::with_secrets("a", "b") })]
    fn test_invalid_token_config(#[case] token: TokenConfig) {
        assert!(token.validate().is_err());
    }

    #[test]
    fn test_redis_cache_requires_section() {
        let mut config = valid_config();
        config.cache.cache_type = CacheType::Redis;
        assert!(config.validate().is_err());

        config.cache.redis = Some(RedisConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_url_building() {
        let mut redis = RedisConfig::default();
        assert_eq!(redis.build_url(), "redis://127.0.0.1:6379/0");

        redis.password = Some("pass".to_string());
        assert_eq!(redis.build_url(), "redis://:pass@127.0.0.1:6379/0");

        redis.url = Some("redis://cache:6380/2".to_string());
        assert_eq!(redis.build_url(), "redis://cache:6380/2");
    }
}
