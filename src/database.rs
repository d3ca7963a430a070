//! # 数据库模块
//!
//! 数据库连接和迁移管理

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Result, SessionError};
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let database_url = config.get_connection_url()?;

    linfo!("system", LogStage::Startup, LogComponent::Database, "connect_database", &format!("正在连接数据库: {}", database_url.chars().take(50).collect::<String>()));

    let mut options = ConnectOptions::new(database_url);
    options
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    // 内存库的每个连接都是独立的空库
    if config.is_memory_database() {
        options.max_connections(1).min_connections(1);
    } else {
        options.max_connections(config.max_connections);
    }

    let db = Database::connect(options)
        .await
        .map_err(|e| SessionError::repository_with_source("数据库连接失败", e))?;

    linfo!("system", LogStage::Startup, LogComponent::Database, "database_connected", "数据库连接成功");
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> std::result::Result<(), DbErr> {
    linfo!("system", LogStage::Database, LogComponent::Database, "run_migrations", "开始运行数据库迁移...");

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!("system", LogStage::Database, LogComponent::Database, "migrations_done", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!("system", LogStage::Database, LogComponent::Database, "migrations_failed", &format!("数据库迁移失败: {}", e));
            Err(e)
        }
    }
}

/// 检查数据库状态，返回待应用的迁移数
pub async fn check_database_status(db: &DatabaseConnection) -> std::result::Result<usize, DbErr> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;

    if pending.is_empty() {
        ldebug!("system", LogStage::Database, LogComponent::Database, "migrations_up_to_date", "所有迁移都已应用");
    } else {
        lwarn!("system", LogStage::Database, LogComponent::Database, "pending_migrations", &format!("有 {} 个待应用的迁移", pending.len()));
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_migrate_memory_database() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };

        let db = init_database(&config).await.unwrap();
        assert_eq!(check_database_status(&db).await.unwrap(), 1);

        run_migrations(&db).await.unwrap();
        assert_eq!(check_database_status(&db).await.unwrap(), 0);
    }
}
