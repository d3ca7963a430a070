//! # 测试 Mock 对象
//!
//! 用户仓储与缓存后端的 Mock 实现，用于单元测试

use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::time::Duration;

use crate::auth::types::UserAccount;
use crate::error::Result;

// Mock 用户仓储
mock! {
    pub UserRepository {}

    #[async_trait]
    impl crate::auth::repository::UserRepository for UserRepository {
        async fn find_by_login_name(&self, login_name: &str) -> Result<Option<UserAccount>>;
        async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>>;
        async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()>;
        async fn create_user(
            &self,
            login_name: &str,
            nickname: &str,
            password_hash: &str,
        ) -> Result<UserAccount>;
    }
}

// Mock 缓存后端，用于模拟后端故障
mock! {
    pub CacheBackend {}

    #[async_trait]
    impl crate::cache::CacheBackend for CacheBackend {
        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
        async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
        async fn get(&self, key: &str) -> Result<Option<String>>;
        async fn del(&self, key: &str) -> Result<bool>;
        async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool>;
        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
        async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
        async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
        async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
        async fn hdel(&self, key: &str, field: &str) -> Result<bool>;
        async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;
        async fn ping(&self) -> Result<()>;
        fn backend_name(&self) -> &'static str;
    }
}
