//! # 配置管理模块
//!
//! 处理应用配置加载、环境变量覆盖和验证

mod app_config;
mod database;

pub use app_config::{AppConfig, CacheConfig, CacheType, RedisConfig, TokenConfig};
pub use database::DatabaseConfig;

use crate::error::{Result, SessionError};
use crate::{linfo, logging::{LogComponent, LogStage}};
use std::env;
use std::path::{Path, PathBuf};

/// 显式指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "SESSION_GATE_CONFIG_PATH";
/// 访问 Token 密钥覆盖
pub const ACCESS_SECRET_ENV: &str = "SESSION_GATE_ACCESS_SECRET";
/// 刷新 Token 密钥覆盖
pub const REFRESH_SECRET_ENV: &str = "SESSION_GATE_REFRESH_SECRET";
/// Redis 连接 URL 覆盖
pub const REDIS_URL_ENV: &str = "SESSION_GATE_REDIS_URL";
/// 数据库 URL 覆盖
pub const DATABASE_URL_ENV: &str = "SESSION_GATE_DATABASE_URL";

/// 解析当前环境对应的配置文件路径
#[must_use]
pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
pub fn load_config() -> Result<AppConfig> {
    load_config_from(resolve_config_path())
}

/// 从指定路径加载配置，并应用环境变量覆盖
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AppConfig> {
    let config_file = path.as_ref();

    crate::ensure_config!(
        config_file.exists(),
        "配置文件不存在: {}",
        config_file.display()
    );

    let config_content = std::fs::read_to_string(config_file).map_err(|e| {
        SessionError::config_with_source(
            format!("读取配置文件失败: {}", config_file.display()),
            e,
        )
    })?;

    let mut config = parse_config(&config_content)?;
    apply_env_overrides(&mut config);

    // 验证配置的有效性
    validate_config(&config)?;

    linfo!("system", LogStage::Startup, LogComponent::Config, "load_config", &format!("配置加载完成: {}", config_file.display()), cache_type = ?config.cache.cache_type);

    Ok(config)
}

/// 解析 TOML 配置内容
pub fn parse_config(content: &str) -> Result<AppConfig> {
    Ok(toml::from_str(content)?)
}

/// 使用环境变量覆盖敏感字段
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides_with(config, |key| env::var(key).ok());
}

fn apply_overrides_with<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(ACCESS_SECRET_ENV) {
        config.token.access_secret = secret;
    }
    if let Some(secret) = lookup(REFRESH_SECRET_ENV) {
        config.token.refresh_secret = secret;
    }
    if let Some(url) = lookup(DATABASE_URL_ENV) {
        config.database.url = url;
    }
    if let Some(url) = lookup(REDIS_URL_ENV) {
        config.cache.cache_type = CacheType::Redis;
        config
            .cache
            .redis
            .get_or_insert_with(RedisConfig::default)
            .url = Some(url);
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<()> {
    config.validate().map_err(SessionError::config)
}
