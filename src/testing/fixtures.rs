//! # 测试数据 Fixtures
//!
//! 提供测试用的账号、会话和配置

use chrono::Utc;

use crate::auth::types::{Platform, Session, UserAccount};
use crate::config::TokenConfig;

/// 测试使用的 bcrypt 成本，保证测试速度
pub const TEST_HASH_COST: u32 = 4;

/// 测试用 Token 配置
#[must_use]
pub fn test_token_config() -> TokenConfig {
    TokenConfig {
        password_hash_cost: TEST_HASH_COST,
        ..TokenConfig::with_secrets("test-access-secret", "test-refresh-secret")
    }
}

/// 会话 fixture，Token 为随机字符串
#[must_use]
pub fn session_fixture(user_id: i64, platform: Platform) -> Session {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Session {
        user_id,
        platform,
        session_id: format!("{user_id}-1700000000-000000"),
        access_token: format!("access-{suffix}"),
        refresh_token: format!("refresh-{suffix}"),
    }
}

/// 用户测试数据构建器
pub struct UserFixture {
    id: i64,
    login_name: String,
    nickname: String,
    password: String,
    is_blocked: bool,
    is_deleted: bool,
}

impl Default for UserFixture {
    fn default() -> Self {
        Self {
            id: 1,
            login_name: "test@example.com".to_string(),
            nickname: "test_user".to_string(),
            password: "password123".to_string(),
            is_blocked: false,
            is_deleted: false,
        }
    }
}

impl UserFixture {
    /// 创建新的用户 fixture
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn login_name(mut self, login_name: &str) -> Self {
        self.login_name = login_name.to_string();
        self
    }

    /// 设置明文密码，构建时计算哈希
    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// 设置为封禁状态
    #[must_use]
    pub const fn blocked(mut self) -> Self {
        self.is_blocked = true;
        self
    }

    /// 设置为已删除
    #[must_use]
    pub const fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// 构建账号
    ///
    /// # Panics
    ///
    /// bcrypt 计算失败时 panic，仅用于测试
    #[must_use]
    pub fn build(self) -> UserAccount {
        let password_hash = bcrypt::hash(&self.password, TEST_HASH_COST)
            .unwrap_or_else(|e| panic!("bcrypt 计算失败: {e}"));
        UserAccount {
            id: self.id,
            login_name: self.login_name,
            nickname: self.nickname,
            password_hash,
            is_blocked: self.is_blocked,
            deleted_at: self.is_deleted.then(Utc::now),
            created_at: Utc::now(),
        }
    }
}
