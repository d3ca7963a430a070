//! Authentication service
//!
//! 登录、Token 签发与刷新、登出和密码重置的编排。
//! 会话状态全部写入 [`SessionCache`]，账号数据来自 [`UserRepository`]。

use chrono::Utc;
use std::sync::Arc;

use crate::auth::jwt::TokenCodec;
use crate::auth::refresh_lock::RefreshCoordinator;
use crate::auth::repository::UserRepository;
use crate::auth::types::{
    NewAccount, PasswordResetApplication, Platform, Session, TokenClass, TokenPair, UserAccount,
};
use crate::auth::utils::{
    codes_match, gen_opaque_token, gen_session_id, hash_password, mask_login_name,
    rand_num_str, sanitize_token, verify_password,
};
use crate::cache::{CacheBackend, SessionCache};
use crate::config::TokenConfig;
use crate::error::{Context, Result, SessionError};
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 统一的凭据错误，不区分用户不存在与密码错误
fn invalid_credentials_error() -> SessionError {
    SessionError::invalid_credentials("用户名或密码错误")
}

fn invalid_token_error() -> SessionError {
    SessionError::invalid_token("Token 无效或已过期")
}

/// 会话生命周期服务
pub struct AuthenticationService {
    users: Arc<dyn UserRepository>,
    cache: SessionCache,
    codec: TokenCodec,
    coordinator: RefreshCoordinator,
    config: TokenConfig,
}

impl AuthenticationService {
    /// 创建服务；Token 配置无效时返回 `Config` 错误
    pub fn new(
        users: Arc<dyn UserRepository>,
        backend: Arc<dyn CacheBackend>,
        config: TokenConfig,
    ) -> Result<Self> {
        config.validate().map_err(SessionError::config)?;

        let codec = TokenCodec::new(&config)?;
        let cache = SessionCache::new(backend, &config);
        let coordinator = RefreshCoordinator::new(cache.clone(), config.refresh_lock_ttl());

        Ok(Self {
            users,
            cache,
            codec,
            coordinator,
            config,
        })
    }

    /// 会话缓存
    #[must_use]
    pub const fn session_cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Token 编解码器
    #[must_use]
    pub const fn token_codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 用户名密码登录
    pub async fn login(
        &self,
        login_name: &str,
        password: &str,
        platform: Platform,
    ) -> Result<TokenPair> {
        let user = self
            .users
            .find_by_login_name(login_name)
            .await
            .context("login")?
            .ok_or_else(invalid_credentials_error)?;

        if !verify_password(password, &user.password_hash).await? {
            lwarn!("system", LogStage::Authentication, LogComponent::AuthService, "login_password_mismatch", &format!("密码校验失败: login_name={}", mask_login_name(login_name)));
            return Err(invalid_credentials_error());
        }

        let pair = self.gen_auth_token(user.id, platform, None).await?;

        linfo!("system", LogStage::Authentication, LogComponent::AuthService, "login_success", &format!("用户登录成功: login_name={}, platform={}", mask_login_name(login_name), platform), user_id = user.id);
        Ok(pair)
    }

    /// 为用户在指定平台签发新的 Token 对
    ///
    /// `session_id` 为空时生成新会话；刷新时传入原会话ID以保持会话连续。
    /// 该平台上旧会话的访问 Token 立即失效，旧刷新 Token 降级到宽限期，
    /// 宽限期内再次使用会被识别为重放。
    pub async fn gen_auth_token(
        &self,
        user_id: i64,
        platform: Platform,
        session_id: Option<&str>,
    ) -> Result<TokenPair> {
        let user = self.load_usable_user(user_id).await?;

        let session_id = session_id.map_or_else(|| gen_session_id(user.id), str::to_string);
        let access_token = self.codec.issue_access_token(user.id, platform, &session_id)?;
        let refresh_token = self.codec.issue_refresh_token(user.id, platform, &session_id)?;
        let issued_at = Utc::now().timestamp();

        let session = Session {
            user_id: user.id,
            platform,
            session_id,
            access_token,
            refresh_token,
        };

        self.cache
            .put_access_token(&session)
            .await
            .context("gen_auth_token")?;
        self.cache
            .put_refresh_token(&session)
            .await
            .context("gen_auth_token")?;

        let previous = self
            .cache
            .get_platform_session(user.id, platform)
            .await
            .context("gen_auth_token")?;

        if let Some(previous) = previous {
            self.cache
                .delete_access_token(&previous.access_token)
                .await
                .context("gen_auth_token")?;
            self.cache
                .expire_refresh_token_in(&previous.refresh_token, self.config.refresh_grace())
                .await
                .context("gen_auth_token")?;

            ldebug!("system", LogStage::TokenIssue, LogComponent::AuthService, "supersede_session", &format!("替换旧会话: platform={}, old_session={}", platform, previous.session_id), user_id = user.id);
        }

        self.cache
            .put_platform_session(user.id, platform, &session)
            .await
            .context("gen_auth_token")?;

        ldebug!("system", LogStage::TokenIssue, LogComponent::AuthService, "issue_token_pair", &format!("签发 Token 对: platform={}, session={}", platform, session.session_id), user_id = user.id);

        Ok(TokenPair {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            session_id: session.session_id,
            token_type: "Bearer".to_string(),
            expires_in: i64::try_from(self.config.access_ttl_secs).unwrap_or(i64::MAX),
            issued_at,
        })
    }

    /// 使用刷新 Token 换取新的 Token 对，会话ID保持不变
    pub async fn refresh_token(&self, presented: &str) -> Result<TokenPair> {
        let subject = self
            .codec
            .parse_and_verify(presented, TokenClass::Refresh)
            .map_err(|e| {
                ldebug!("system", LogStage::TokenRefresh, LogComponent::AuthService, "refresh_token_rejected", &format!("刷新 Token 校验失败: token={}, error={}", sanitize_token(presented), e));
                invalid_token_error()
            })?;

        self.coordinator
            .with_refresh_lock(presented, async {
                let record = self
                    .cache
                    .get_by_refresh_token(presented)
                    .await
                    .context("refresh_token")?
                    .ok_or_else(invalid_token_error)?;

                if record.user_id != subject.user_id || record.session_id != subject.session_id {
                    lwarn!("system", LogStage::TokenRefresh, LogComponent::AuthService, "refresh_subject_mismatch", &format!("刷新 Token 与缓存记录不一致: token={}", sanitize_token(presented)), user_id = subject.user_id);
                    return Err(invalid_token_error());
                }

                let current = self
                    .cache
                    .get_platform_session(record.user_id, record.platform)
                    .await
                    .context("refresh_token")?;

                let is_current = current
                    .as_ref()
                    .is_some_and(|session| session.refresh_token == presented);
                if !is_current {
                    // 已被轮换的刷新 Token 再次出现，可能已泄露
                    lwarn!("system", LogStage::TokenRefresh, LogComponent::AuthService, "stale_refresh_token", &format!("检测到过期的刷新 Token: platform={}, session={}, token={}", record.platform, record.session_id, sanitize_token(presented)), user_id = record.user_id);
                    return Err(invalid_token_error());
                }

                let pair = self
                    .gen_auth_token(record.user_id, record.platform, Some(&record.session_id))
                    .await?;

                linfo!("system", LogStage::TokenRefresh, LogComponent::AuthService, "refresh_success", &format!("Token 刷新成功: platform={}, session={}", record.platform, record.session_id), user_id = record.user_id);
                Ok(pair)
            })
            .await
    }

    /// 校验访问 Token 并返回其会话
    pub async fn authenticate(&self, access_token: &str) -> Result<Session> {
        let subject = self
            .codec
            .parse_and_verify(access_token, TokenClass::Access)
            .map_err(|e| {
                ldebug!("system", LogStage::Authentication, LogComponent::AuthService, "access_token_rejected", &format!("访问 Token 校验失败: token={}, error={}", sanitize_token(access_token), e));
                invalid_token_error()
            })?;

        let session = self
            .cache
            .get_by_access_token(access_token)
            .await
            .context("authenticate")?
            .ok_or_else(invalid_token_error)?;

        if session.user_id != subject.user_id || session.session_id != subject.session_id {
            return Err(invalid_token_error());
        }
        Ok(session)
    }

    /// 登出某个平台，会话不存在时直接成功
    pub async fn logout(&self, user_id: i64, platform: Platform) -> Result<()> {
        let Some(session) = self
            .cache
            .get_platform_session(user_id, platform)
            .await
            .context("logout")?
        else {
            ldebug!("system", LogStage::Logout, LogComponent::AuthService, "logout_noop", &format!("平台会话不存在，跳过登出: platform={}", platform), user_id = user_id);
            return Ok(());
        };

        self.revoke_session_tokens(&session).await.context("logout")?;
        self.cache
            .delete_platform_session(user_id, platform)
            .await
            .context("logout")?;

        linfo!("system", LogStage::Logout, LogComponent::AuthService, "logout_success", &format!("用户登出: platform={}, session={}", platform, session.session_id), user_id = user_id);
        Ok(())
    }

    /// 注销用户在所有平台上的会话（不保留宽限期）
    pub async fn revoke_all_sessions(&self, user_id: i64) -> Result<usize> {
        let sessions = self
            .cache
            .get_all_platform_sessions(user_id)
            .await
            .context("revoke_all_sessions")?;

        for session in sessions.values() {
            self.revoke_session_tokens(session)
                .await
                .context("revoke_all_sessions")?;
        }
        self.cache
            .delete_all_platform_sessions(user_id)
            .await
            .context("revoke_all_sessions")?;

        Ok(sessions.len())
    }

    /// 列出用户当前所有平台的会话，按平台编号排序
    pub async fn list_sessions(&self, user_id: i64) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .cache
            .get_all_platform_sessions(user_id)
            .await
            .context("list_sessions")?
            .into_values()
            .collect();
        sessions.sort_by_key(|session| session.platform.id());
        Ok(sessions)
    }

    /// 申请密码重置，返回重置 Token 与验证码
    pub async fn apply_password_reset(&self, login_name: &str) -> Result<PasswordResetApplication> {
        let user = self
            .users
            .find_by_login_name(login_name)
            .await
            .context("apply_password_reset")?
            .ok_or_else(|| {
                SessionError::user_not_found(format!("用户不存在: {}", mask_login_name(login_name)))
            })?;

        let token = gen_opaque_token();
        let code = rand_num_str(self.config.reset_code_length);

        self.cache
            .put_password_reset(&token, user.id, &code)
            .await
            .context("apply_password_reset")?;

        linfo!("system", LogStage::PasswordReset, LogComponent::AuthService, "apply_password_reset", &format!("已生成密码重置 Token: login_name={}", mask_login_name(login_name)), user_id = user.id);
        Ok(PasswordResetApplication { token, code })
    }

    /// 使用重置 Token 与验证码设置新密码，并注销该用户所有会话
    pub async fn reset_password(&self, token: &str, code: &str, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(SessionError::invalid_params("新密码不能为空"));
        }

        let record = self
            .cache
            .get_password_reset(token)
            .await
            .context("reset_password")?
            .ok_or_else(|| SessionError::invalid_params("重置 Token 无效或已过期"))?;

        if !codes_match(&record.code, code) {
            lwarn!("system", LogStage::PasswordReset, LogComponent::AuthService, "reset_code_mismatch", &format!("密码重置验证码错误: token={}", sanitize_token(token)), user_id = record.user_id);
            return Err(SessionError::invalid_params("验证码错误"));
        }

        let user = self.load_usable_user(record.user_id).await?;

        let password_hash = hash_password(new_password, self.config.password_hash_cost).await?;
        self.users
            .update_password(user.id, &password_hash)
            .await
            .context("reset_password")?;

        let revoked = self.revoke_all_sessions(user.id).await?;

        // 密码已更新，重置记录删除失败不影响结果，TTL 到期后自动清理
        if let Err(e) = self.cache.delete_password_reset(token).await {
            lerror!("system", LogStage::PasswordReset, LogComponent::AuthService, "delete_reset_token_failed", &format!("删除密码重置 Token 失败: token={}, error={}", sanitize_token(token), e), user_id = user.id);
        }

        linfo!("system", LogStage::PasswordReset, LogComponent::AuthService, "reset_password_success", &format!("密码重置成功，注销会话数: {}", revoked), user_id = user.id);
        Ok(())
    }

    /// 注册新账号
    pub async fn register_user(&self, account: NewAccount) -> Result<UserAccount> {
        let login_name = account.login_name.trim();
        if login_name.is_empty() {
            return Err(SessionError::invalid_params("登录名不能为空"));
        }
        if account.password.is_empty() {
            return Err(SessionError::invalid_params("密码不能为空"));
        }

        let existing = self
            .users
            .find_by_login_name(login_name)
            .await
            .context("register_user")?;
        if existing.is_some() {
            return Err(SessionError::user_name_occupied(format!(
                "登录名已被占用: {}",
                mask_login_name(login_name)
            )));
        }

        let password_hash = hash_password(&account.password, self.config.password_hash_cost).await?;
        let user = self
            .users
            .create_user(login_name, &account.nickname, &password_hash)
            .await
            .context("register_user")?;

        linfo!("system", LogStage::Authentication, LogComponent::AuthService, "register_user", &format!("注册新用户: login_name={}", mask_login_name(login_name)), user_id = user.id);
        Ok(user)
    }

    async fn load_usable_user(&self, user_id: i64) -> Result<UserAccount> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .context("load_user")?
            .ok_or_else(|| SessionError::user_invalid(format!("用户不存在: id={user_id}")))?;

        if !user.is_usable() {
            lwarn!("system", LogStage::Authentication, LogComponent::AuthService, "user_unusable", "用户已被封禁或删除", user_id = user_id);
            return Err(SessionError::user_invalid(format!("用户不可用: id={user_id}")));
        }
        Ok(user)
    }

    async fn revoke_session_tokens(&self, session: &Session) -> Result<()> {
        self.cache.delete_access_token(&session.access_token).await?;
        self.cache.delete_refresh_token(&session.refresh_token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::ErrorKind;
    use crate::testing::fixtures::{UserFixture, test_token_config};
    use crate::testing::mocks::MockUserRepository;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn service_with(repo: MockUserRepository) -> (AuthenticationService, Arc<MemoryCache>) {
        let memory = Arc::new(MemoryCache::new());
        let service =
            AuthenticationService::new(Arc::new(repo), memory.clone(), test_token_config()).unwrap();
        (service, memory)
    }

    fn repo_with_user(user: UserAccount) -> MockUserRepository {
        let mut repo = MockUserRepository::new();
        let by_id = user.clone();
        repo.expect_find_by_id()
            .with(eq(user.id))
            .returning(move |_| Ok(Some(by_id.clone())));
        let by_name = user.clone();
        let login_name = user.login_name;
        repo.expect_find_by_login_name()
            .withf(move |name| name == login_name)
            .returning(move |_| Ok(Some(by_name.clone())));
        repo
    }

    #[tokio::test]
    async fn test_gen_auth_token_writes_records() {
        let (service, _) = service_with(repo_with_user(UserFixture::new().id(42).build()));

        let pair = service.gen_auth_token(42, Platform::App, None).await.unwrap();
        assert!(pair.session_id.starts_with("42-"));
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 7200);

        let cache = service.session_cache();
        let session = cache.get_by_access_token(&pair.access_token).await.unwrap().unwrap();
        assert_eq!(session.refresh_token, pair.refresh_token);
        assert_eq!(
            cache.get_platform_session(42, Platform::App).await.unwrap(),
            Some(session)
        );
    }

    #[tokio::test]
    async fn test_new_login_supersedes_platform_session() {
        let (service, memory) = service_with(repo_with_user(UserFixture::new().id(42).build()));

        let first = service.gen_auth_token(42, Platform::Web, None).await.unwrap();
        let second = service.gen_auth_token(42, Platform::Web, None).await.unwrap();
        assert_ne!(first.session_id, second.session_id);

        let cache = service.session_cache();
        assert_eq!(cache.get_by_access_token(&first.access_token).await.unwrap(), None);
        // 旧刷新 Token 仍可解析，但只保留宽限期
        assert!(cache.get_by_refresh_token(&first.refresh_token).await.unwrap().is_some());
        let ttl = memory
            .ttl(&format!("token:refresh:{}", first.refresh_token))
            .await
            .unwrap()
            .unwrap();
        assert!(ttl <= Duration::from_secs(21_600));

        let sessions = service.list_sessions(42).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, second.session_id);
    }

    #[tokio::test]
    async fn test_gen_auth_token_rejects_blocked_user() {
        let (service, _) = service_with(repo_with_user(UserFixture::new().id(5).blocked().build()));

        let err = service.gen_auth_token(5, Platform::Web, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserInvalid);
    }

    #[tokio::test]
    async fn test_gen_auth_token_rejects_missing_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let (service, _) = service_with(repo);

        let err = service.gen_auth_token(5, Platform::Web, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserInvalid);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let user = UserFixture::new().id(1).login_name("a@example.com").password("right").build();
        let (service, _) = service_with(repo_with_user(user));

        let err = service
            .login("a@example.com", "wrong", Platform::Web)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_login_name().returning(|_| Ok(None));
        let (service, _) = service_with(repo);

        let err = service.login("ghost", "x", Platform::Web).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_detects_replay() {
        let (service, _) = service_with(repo_with_user(UserFixture::new().id(42).build()));

        let first = service.gen_auth_token(42, Platform::App, None).await.unwrap();
        let second = service.refresh_token(&first.refresh_token).await.unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_ne!(second.refresh_token, first.refresh_token);

        let err = service.refresh_token(&first.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);

        // 重放不影响当前会话
        assert!(service.authenticate(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_rejected() {
        let (service, _) = service_with(repo_with_user(UserFixture::new().id(42).build()));
        let pair = service.gen_auth_token(42, Platform::App, None).await.unwrap();

        let err = service.refresh_token(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_refresh_while_locked_is_too_many_requests() {
        let (service, memory) = service_with(repo_with_user(UserFixture::new().id(42).build()));
        let pair = service.gen_auth_token(42, Platform::App, None).await.unwrap();

        memory
            .set_ex(
                &format!("token:refresh:lock:{}", pair.refresh_token),
                "other-node",
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        let err = service.refresh_token(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, _) = service_with(repo_with_user(UserFixture::new().id(42).build()));
        let pair = service.gen_auth_token(42, Platform::H5, None).await.unwrap();

        service.logout(42, Platform::H5).await.unwrap();
        service.logout(42, Platform::H5).await.unwrap();

        let err = service.authenticate(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
        let err = service.refresh_token(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let user = UserFixture::new().id(9).login_name("u@example.com").build();
        let mut repo = repo_with_user(user);
        repo.expect_update_password()
            .withf(|id, hash| *id == 9 && hash.starts_with("$2"))
            .times(1)
            .returning(|_, _| Ok(()));
        let (service, _) = service_with(repo);

        let web = service.gen_auth_token(9, Platform::Web, None).await.unwrap();
        let app = service.gen_auth_token(9, Platform::App, None).await.unwrap();

        let application = service.apply_password_reset("u@example.com").await.unwrap();
        assert_eq!(application.code.len(), 6);

        let err = service
            .reset_password(&application.token, "not-the-code", "n3w")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);

        service
            .reset_password(&application.token, &application.code, "n3w")
            .await
            .unwrap();

        for access in [&web.access_token, &app.access_token] {
            assert_eq!(
                service.authenticate(access).await.unwrap_err().kind(),
                ErrorKind::InvalidToken
            );
        }
        assert!(service.list_sessions(9).await.unwrap().is_empty());

        let err = service
            .reset_password(&application.token, &application.code, "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
    }

    #[tokio::test]
    async fn test_apply_password_reset_unknown_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_login_name().returning(|_| Ok(None));
        let (service, _) = service_with(repo);

        let err = service.apply_password_reset("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
    }

    #[tokio::test]
    async fn test_register_rejects_occupied_name() {
        let user = UserFixture::new().id(1).login_name("taken").build();
        let (service, _) = service_with(repo_with_user(user));

        let err = service
            .register_user(NewAccount {
                login_name: "taken".to_string(),
                nickname: "x".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNameOccupied);
    }

    #[tokio::test]
    async fn test_cache_failure_is_cache_unavailable() {
        use crate::testing::mocks::MockCacheBackend;

        let mut backend = MockCacheBackend::new();
        backend
            .expect_set_ex()
            .returning(|_, _, _| Err(SessionError::cache("connection refused")));
        let service = AuthenticationService::new(
            Arc::new(repo_with_user(UserFixture::new().id(3).build())),
            Arc::new(backend),
            test_token_config(),
        )
        .unwrap();

        let err = service.gen_auth_token(3, Platform::Web, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheUnavailable);
        assert!(err.to_string().starts_with("gen_auth_token"));
    }
}
