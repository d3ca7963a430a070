//! # 测试辅助函数
//!
//! 提供通用的测试工具和辅助函数

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing::Level;

use crate::auth::{AuthenticationService, SeaOrmUserRepository};
use crate::cache::MemoryCache;
use crate::error::Result;
use crate::testing::fixtures::test_token_config;

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建内存数据库连接并执行迁移
///
/// 内存库只能使用单连接，否则每个连接各自是一个空库
pub async fn create_test_db() -> std::result::Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// 创建临时数据库文件
pub async fn create_temp_db() -> std::result::Result<(DatabaseConnection, TempDir), DbErr> {
    let temp_dir = tempfile::tempdir()
        .map_err(|e| DbErr::Custom(format!("创建临时目录失败: {e}")))?;

    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;

    Ok((db, temp_dir))
}

/// 基于内存缓存和内存数据库构建完整服务
pub async fn create_test_service() -> Result<(AuthenticationService, Arc<MemoryCache>)> {
    init_test_env();
    let db = create_test_db().await?;
    let memory = Arc::new(MemoryCache::new());
    let service = AuthenticationService::new(
        Arc::new(SeaOrmUserRepository::new(db)),
        memory.clone(),
        test_token_config(),
    )?;
    Ok((service, memory))
}
