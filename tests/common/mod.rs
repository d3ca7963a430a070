//! 集成测试共享的初始化逻辑

#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

use session_gate::auth::{AuthenticationService, NewAccount, SeaOrmUserRepository, UserAccount};
use session_gate::cache::MemoryCache;
use session_gate::config::TokenConfig;

pub fn token_config() -> TokenConfig {
    TokenConfig {
        password_hash_cost: 4,
        ..TokenConfig::with_secrets("it-access-secret", "it-refresh-secret")
    }
}

/// 内存 SQLite + 内存缓存组成的完整服务
pub async fn setup() -> (Arc<AuthenticationService>, Arc<MemoryCache>) {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("连接内存数据库失败");
    migration::Migrator::up(&db, None).await.expect("迁移失败");

    let memory = Arc::new(MemoryCache::new());
    let service = AuthenticationService::new(
        Arc::new(SeaOrmUserRepository::new(db)),
        memory.clone(),
        token_config(),
    )
    .expect("创建服务失败");

    (Arc::new(service), memory)
}

pub async fn register(service: &AuthenticationService, login_name: &str, password: &str) -> UserAccount {
    service
        .register_user(NewAccount {
            login_name: login_name.to_string(),
            nickname: login_name.to_string(),
            password: password.to_string(),
        })
        .await
        .expect("注册失败")
}
