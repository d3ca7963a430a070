//! # Session Gate Library
//!
//! 多平台用户会话与 Token 生命周期管理核心库

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod testing;

// Re-export commonly used types
pub use auth::{AuthenticationService, Platform, Session, TokenPair};
pub use config::AppConfig;
pub use error::{Result, SessionError};
