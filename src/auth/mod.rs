//! # 认证与会话模块
//!
//! Token 编解码、刷新互斥、用户仓储以及会话生命周期服务。
//! 对外只暴露 `AuthenticationService` 和核心数据结构，其余实现需通过子模块路径访问。

pub mod jwt;
pub mod refresh_lock;
pub mod repository;
pub mod service;
pub mod types;
pub mod utils;

pub use jwt::TokenCodec;
pub use refresh_lock::RefreshCoordinator;
pub use repository::{SeaOrmUserRepository, UserRepository};
pub use service::AuthenticationService;
pub use types::{
    NewAccount, PasswordResetApplication, Platform, Session, TerminalClass, TokenClass,
    TokenPair, TokenReply, TokenSubject, UserAccount,
};
