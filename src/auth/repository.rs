//! # 用户仓储
//!
//! 账号与凭据的唯一数据源。会话层只读，除密码更新和注册外不修改数据。

use async_trait::async_trait;
use chrono::Utc;
use entity::users;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::auth::types::UserAccount;
use crate::error::{Result, SessionError};
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// 用户仓储 trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 按登录名查找用户
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<UserAccount>>;

    /// 按ID查找用户
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>>;

    /// 更新密码哈希
    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()>;

    /// 创建用户，返回新账号
    async fn create_user(
        &self,
        login_name: &str,
        nickname: &str,
        password_hash: &str,
    ) -> Result<UserAccount>;
}

impl From<users::Model> for UserAccount {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            login_name: model.login_name,
            nickname: model.nickname,
            password_hash: model.password_hash,
            is_blocked: model.is_blocked,
            deleted_at: model.deleted_at.map(|at| at.and_utc()),
            created_at: model.created_at.and_utc(),
        }
    }
}

/// 基于 Sea-ORM 的用户仓储实现
#[derive(Clone)]
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    /// 基于数据库连接创建仓储
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<UserAccount>> {
        let user = users::Entity::find()
            .filter(users::Column::LoginName.eq(login_name))
            .one(&self.db)
            .await
            .map_err(|e| SessionError::repository_with_source("按登录名查询用户失败", e))?;

        ldebug!("system", LogStage::Database, LogComponent::UserRepository, "find_by_login_name", &format!("按登录名查询用户: found={}", user.is_some()));
        Ok(user.map(UserAccount::from))
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| {
                SessionError::repository_with_source(format!("查询用户失败: id={user_id}"), e)
            })?;

        Ok(user.map(UserAccount::from))
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| {
                SessionError::repository_with_source(format!("查询用户失败: id={user_id}"), e)
            })?
            .ok_or_else(|| SessionError::user_not_found(format!("用户不存在: id={user_id}")))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        active
            .update(&self.db)
            .await
            .map_err(|e| SessionError::repository_with_source("更新密码失败", e))?;

        linfo!("system", LogStage::PasswordReset, LogComponent::UserRepository, "update_password", "用户密码已更新", user_id = user_id);
        Ok(())
    }

    async fn create_user(
        &self,
        login_name: &str,
        nickname: &str,
        password_hash: &str,
    ) -> Result<UserAccount> {
        let now = Utc::now().naive_utc();
        let user = users::ActiveModel {
            login_name: Set(login_name.to_string()),
            nickname: Set(nickname.to_string()),
            password_hash: Set(password_hash.to_string()),
            is_blocked: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = user
            .insert(&self.db)
            .await
            .map_err(|e| SessionError::repository_with_source("创建用户失败", e))?;

        linfo!("system", LogStage::Database, LogComponent::UserRepository, "create_user", "用户创建成功", user_id = model.id);
        Ok(model.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::helpers::create_test_db;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = SeaOrmUserRepository::new(create_test_db().await.unwrap());

        let created = repo.create_user("u@example.com", "u", "hash-1").await.unwrap();
        assert!(created.is_usable());

        let by_name = repo.find_by_login_name("u@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.password_hash, "hash-1");

        let by_id = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.login_name, "u@example.com");

        assert!(repo.find_by_login_name("nobody").await.unwrap().is_none());
        assert!(repo.find_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let repo = SeaOrmUserRepository::new(create_test_db().await.unwrap());
        let created = repo.create_user("u@example.com", "u", "old").await.unwrap();

        repo.update_password(created.id, "new").await.unwrap();
        let user = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new");

        let err = repo.update_password(9999, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }

    #[tokio::test]
    async fn test_duplicate_login_name_is_repository_error() {
        let repo = SeaOrmUserRepository::new(create_test_db().await.unwrap());
        repo.create_user("dup", "a", "h").await.unwrap();

        let err = repo.create_user("dup", "b", "h").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepositoryUnavailable);
    }
}
