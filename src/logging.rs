//! # 日志配置模块
//!
//! 提供日志初始化以及带阶段 / 组件标签的结构化日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的业务阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Command,
    Authentication,
    TokenIssue,
    TokenRefresh,
    Logout,
    PasswordReset,
    Cache,
    Database,
}

impl LogStage {
    /// 日志字段中使用的标签
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Command => "command",
            Self::Authentication => "authentication",
            Self::TokenIssue => "token_issue",
            Self::TokenRefresh => "token_refresh",
            Self::Logout => "logout",
            Self::PasswordReset => "password_reset",
            Self::Cache => "cache",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    Config,
    TokenCodec,
    Cache,
    SessionCache,
    RefreshLock,
    AuthService,
    UserRepository,
    Database,
}

impl LogComponent {
    /// 日志字段中使用的标签
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::TokenCodec => "token_codec",
            Self::Cache => "cache",
            Self::SessionCache => "session_cache",
            Self::RefreshLock => "refresh_lock",
            Self::AuthService => "auth_service",
            Self::UserRepository => "user_repository",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化日志宏的公共实现
#[doc(hidden)]
#[macro_export]
macro_rules! __log_event {
    ($level:ident, $request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::$level!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($level:ident, $request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($field:tt)+) => {
        ::tracing::$level!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $message
        )
    };
}

/// INFO 级别结构化日志
#[macro_export]
macro_rules! linfo {
    ($($arg:tt)+) => {
        $crate::__log_event!(info, $($arg)+)
    };
}

/// DEBUG 级别结构化日志
#[macro_export]
macro_rules! ldebug {
    ($($arg:tt)+) => {
        $crate::__log_event!(debug, $($arg)+)
    };
}

/// WARN 级别结构化日志
#[macro_export]
macro_rules! lwarn {
    ($($arg:tt)+) => {
        $crate::__log_event!(warn, $($arg)+)
    };
}

/// ERROR 级别结构化日志
#[macro_export]
macro_rules! lerror {
    ($($arg:tt)+) => {
        $crate::__log_event!(error, $($arg)+)
    };
}

/// 初始化日志系统
pub fn init_optimized_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    // 默认关闭数据库查询的详细日志
    let default_filter = format!(
        "{level},session_gate=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn"
    );

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            fmt_layer::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                         # 标准日志级别");
    println!("  RUST_LOG=debug                        # 调试级别");
    println!("  RUST_LOG=session_gate=trace           # 会话模块详细追踪");
    println!("  RUST_LOG=info,session_gate::auth=warn # 只保留认证告警（如刷新 Token 重放）");
}
