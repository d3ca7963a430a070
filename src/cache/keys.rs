//! # 缓存键命名规范
//!
//! 所有会话相关的缓存键都在这里生成，保证多节点间格式一致

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::utils::sanitize_token;

/// 后缀为 Token 的键前缀；`token:refresh:lock:` 需排在 `token:refresh:` 之前匹配
const TOKEN_KEY_PREFIXES: [&str; 4] = [
    "token:refresh:lock:",
    "token:access:",
    "token:refresh:",
    "token:pwdreset:",
];

/// 用于日志和错误信息的键：保留前缀，Token 部分脱敏
#[must_use]
pub fn redact_key(key: &str) -> String {
    TOKEN_KEY_PREFIXES
        .iter()
        .find_map(|prefix| {
            key.strip_prefix(prefix)
                .map(|token| format!("{prefix}{}", sanitize_token(token)))
        })
        .unwrap_or_else(|| key.to_string())
}

/// 缓存键类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKey {
    /// 访问 Token 记录 - `token:access:{token}`
    AccessToken { token: String },

    /// 刷新 Token 记录 - `token:refresh:{token}`
    RefreshToken { token: String },

    /// 用户平台会话哈希 - `user:session:{user_id}`
    UserSession { user_id: i64 },

    /// 刷新互斥锁 - `token:refresh:lock:{token}`
    RefreshLock { token: String },

    /// 密码重置 Token - `token:pwdreset:{token}`
    PasswordReset { token: String },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::AccessToken { token } => format!("token:access:{token}"),
            Self::RefreshToken { token } => format!("token:refresh:{token}"),
            Self::UserSession { user_id } => format!("user:session:{user_id}"),
            Self::RefreshLock { token } => format!("token:refresh:lock:{token}"),
            Self::PasswordReset { token } => format!("token:pwdreset:{token}"),
        }
    }

    /// 获取缓存键的命名空间
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::UserSession { .. } => "user",
            Self::AccessToken { .. }
            | Self::RefreshToken { .. }
            | Self::RefreshLock { .. }
            | Self::PasswordReset { .. } => "token",
        }
    }
}

/// 显示形式已脱敏，可直接写入日志
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact_key(&self.build()))
    }
}

/// 缓存键构建器
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// 构建访问 Token 缓存键
    #[must_use]
    pub fn access_token(token: &str) -> CacheKey {
        CacheKey::AccessToken {
            token: token.to_string(),
        }
    }

    /// 构建刷新 Token 缓存键
    #[must_use]
    pub fn refresh_token(token: &str) -> CacheKey {
        CacheKey::RefreshToken {
            token: token.to_string(),
        }
    }

    /// 构建用户会话哈希键
    #[must_use]
    pub const fn user_session(user_id: i64) -> CacheKey {
        CacheKey::UserSession { user_id }
    }

    /// 构建刷新锁键
    #[must_use]
    pub fn refresh_lock(token: &str) -> CacheKey {
        CacheKey::RefreshLock {
            token: token.to_string(),
        }
    }

    /// 构建密码重置 Token 键
    #[must_use]
    pub fn password_reset(token: &str) -> CacheKey {
        CacheKey::PasswordReset {
            token: token.to_string(),
        }
    }
}
