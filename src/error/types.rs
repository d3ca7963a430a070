//! # 错误类型定义

use thiserror::Error;

use super::{ErrorCategory, TokenError};

/// 会话管理主要错误类型
#[derive(Debug, Error)]
pub enum SessionError {
    /// 登录名不存在或密码不匹配
    #[error("认证凭据无效: {message}")]
    InvalidCredentials { message: String },

    /// 账号已删除或被封禁
    #[error("用户状态无效: {message}")]
    UserInvalid { message: String },

    /// 账号不存在
    #[error("用户不存在: {message}")]
    UserNotFound { message: String },

    /// 登录名已被占用
    #[error("登录名已被占用: {message}")]
    UserNameOccupied { message: String },

    /// Token 不存在、已过期或被判定为重放
    #[error("鉴权失败，Token错误: {message}")]
    InvalidToken { message: String },

    /// 同一个刷新 Token 的并发刷新
    #[error("请求过多: {message}")]
    TooManyRequests { message: String },

    /// 入参错误
    #[error("入参错误: {message}")]
    InvalidParams { message: String },

    /// 缓存后端不可用
    #[error("缓存错误: {message}")]
    CacheUnavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 用户仓储不可用
    #[error("用户仓储错误: {message}")]
    RepositoryUnavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附带操作标签的错误链
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<SessionError>,
    },
}

/// 错误种类，屏蔽上下文包装后的根因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCredentials,
    UserInvalid,
    UserNotFound,
    UserNameOccupied,
    InvalidToken,
    TooManyRequests,
    InvalidParams,
    CacheUnavailable,
    RepositoryUnavailable,
    Config,
    Internal,
}

impl SessionError {
    /// 返回根错误种类（穿透任意层 `Context`）
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::UserInvalid { .. } => ErrorKind::UserInvalid,
            Self::UserNotFound { .. } => ErrorKind::UserNotFound,
            Self::UserNameOccupied { .. } => ErrorKind::UserNameOccupied,
            Self::InvalidToken { .. } => ErrorKind::InvalidToken,
            Self::TooManyRequests { .. } => ErrorKind::TooManyRequests,
            Self::InvalidParams { .. } => ErrorKind::InvalidParams,
            Self::CacheUnavailable { .. } => ErrorKind::CacheUnavailable,
            Self::RepositoryUnavailable { .. } => ErrorKind::RepositoryUnavailable,
            Self::Config { .. } => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// 映射为 HTTP 状态码，供外部控制器层使用
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidCredentials | ErrorKind::InvalidToken => 401,
            ErrorKind::UserInvalid => 403,
            ErrorKind::UserNotFound => 404,
            ErrorKind::UserNameOccupied => 409,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InvalidParams => 400,
            ErrorKind::CacheUnavailable | ErrorKind::RepositoryUnavailable => 503,
            ErrorKind::Config | ErrorKind::Internal => 500,
        }
    }

    /// 错误归属（客户端 / 服务端）
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.status_code() < 500 {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }

    /// 后端暂时性故障，调用方可自行决定是否重试
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CacheUnavailable | ErrorKind::RepositoryUnavailable
        )
    }

    /// 创建凭据错误
    pub fn invalid_credentials<T: Into<String>>(message: T) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// 创建用户状态错误
    pub fn user_invalid<T: Into<String>>(message: T) -> Self {
        Self::UserInvalid {
            message: message.into(),
        }
    }

    /// 创建用户不存在错误
    pub fn user_not_found<T: Into<String>>(message: T) -> Self {
        Self::UserNotFound {
            message: message.into(),
        }
    }

    /// 创建登录名占用错误
    pub fn user_name_occupied<T: Into<String>>(message: T) -> Self {
        Self::UserNameOccupied {
            message: message.into(),
        }
    }

    /// 创建 Token 无效错误
    pub fn invalid_token<T: Into<String>>(message: T) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// 创建并发刷新错误
    pub fn too_many_requests<T: Into<String>>(message: T) -> Self {
        Self::TooManyRequests {
            message: message.into(),
        }
    }

    /// 创建入参错误
    pub fn invalid_params<T: Into<String>>(message: T) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// 创建缓存错误
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::CacheUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的缓存错误
    pub fn cache_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::CacheUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建用户仓储错误
    pub fn repository<T: Into<String>>(message: T) -> Self {
        Self::RepositoryUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的用户仓储错误
    pub fn repository_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::RepositoryUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::cache_with_source("Redis 操作失败", err)
    }
}

impl From<sea_orm::DbErr> for SessionError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::repository_with_source("数据库操作失败", err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON 序列化失败", err)
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML 解析失败", err)
    }
}

impl From<bcrypt::BcryptError> for SessionError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("密码哈希处理失败", err)
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => Self::internal_with_source("Token 签发失败", err),
            other => Self::invalid_token(other.to_string()),
        }
    }
}
