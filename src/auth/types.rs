//! # 认证类型定义
//!
//! 会话、Token 与平台等领域数据结构

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// 终端大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalClass {
    Mobile,
    Pc,
    Pad,
    Web,
    MiniWeb,
    Admin,
}

/// 客户端平台，每个用户在每个平台上最多保留一个会话
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "IOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
    #[serde(rename = "Windows")]
    Windows,
    #[serde(rename = "OSX")]
    Osx,
    #[serde(rename = "Web")]
    Web,
    #[serde(rename = "MiniWeb")]
    MiniWeb,
    #[serde(rename = "Linux")]
    Linux,
    #[serde(rename = "APad")]
    APad,
    #[serde(rename = "IPad")]
    IPad,
    #[serde(rename = "Admin")]
    Admin,
    /// 移动端网页
    #[serde(rename = "H5")]
    H5,
    /// 通用原生应用
    #[serde(rename = "APP")]
    App,
}

impl Platform {
    pub const ALL: [Self; 12] = [
        Self::Ios,
        Self::Android,
        Self::Windows,
        Self::Osx,
        Self::Web,
        Self::MiniWeb,
        Self::Linux,
        Self::APad,
        Self::IPad,
        Self::Admin,
        Self::H5,
        Self::App,
    ];

    /// 平台名称，同时作为会话哈希的字段名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "IOS",
            Self::Android => "Android",
            Self::Windows => "Windows",
            Self::Osx => "OSX",
            Self::Web => "Web",
            Self::MiniWeb => "MiniWeb",
            Self::Linux => "Linux",
            Self::APad => "APad",
            Self::IPad => "IPad",
            Self::Admin => "Admin",
            Self::H5 => "H5",
            Self::App => "APP",
        }
    }

    /// 平台数字编号
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Ios => 1,
            Self::Android => 2,
            Self::Windows => 3,
            Self::Osx => 4,
            Self::Web => 5,
            Self::MiniWeb => 6,
            Self::Linux => 7,
            Self::APad => 8,
            Self::IPad => 9,
            Self::Admin => 10,
            Self::H5 => 11,
            Self::App => 12,
        }
    }

    /// 按平台编号查找
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|platform| platform.id() == id)
    }

    /// 平台所属的终端类别
    #[must_use]
    pub const fn terminal_class(self) -> TerminalClass {
        match self {
            Self::Ios | Self::Android | Self::App => TerminalClass::Mobile,
            Self::Windows | Self::Osx | Self::Linux => TerminalClass::Pc,
            Self::APad | Self::IPad => TerminalClass::Pad,
            Self::Web | Self::H5 => TerminalClass::Web,
            Self::MiniWeb => TerminalClass::MiniWeb,
            Self::Admin => TerminalClass::Admin,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| SessionError::invalid_params(format!("未知平台: {name}")))
    }
}

/// Token 类别，两类 Token 使用各自独立的密钥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    /// 写入 `typ` 声明的类别名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// 用户ID
    pub sub: String,
    /// 平台
    pub platform: Platform,
    /// 会话ID，刷新时保持不变
    pub sid: String,
    /// Token 类别
    pub typ: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
    /// JWT ID，保证同一秒内签发的 Token 也互不相同
    pub jti: String,
}

impl JwtClaims {
    /// 获取用户ID
    pub fn user_id(&self) -> Result<i64, std::num::ParseIntError> {
        self.sub.parse()
    }
}

/// Token 校验通过后得到的主体信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
    pub platform: Platform,
    pub session_id: String,
}

/// 一个已认证的客户端会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub platform: Platform,
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// 新签发的 Token 对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// 会话ID
    pub session_id: String,
    /// Token type
    pub token_type: String,
    /// 访问 Token 有效期（秒）
    pub expires_in: i64,
    /// 签发时间（Unix 秒）
    pub issued_at: i64,
}

/// 返回给客户端的 Token 响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReply {
    pub access_token: String,
    pub refresh_token: String,
    /// 访问 Token 有效期（秒）
    pub duration: i64,
    /// 服务端签发时间
    pub srv_create_time: DateTime<Utc>,
}

impl From<TokenPair> for TokenReply {
    fn from(pair: TokenPair) -> Self {
        Self {
            srv_create_time: Utc
                .timestamp_opt(pair.issued_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            duration: pair.expires_in,
        }
    }
}

/// 密码重置申请结果，`code` 通过外部渠道（邮件 / 短信）发给用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetApplication {
    pub token: String,
    pub code: String,
}

/// 缓存中的密码重置记录，存储格式为 `{user_id}:{code}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetRecord {
    pub user_id: i64,
    pub code: String,
}

impl PasswordResetRecord {
    /// 编码为缓存值 `{user_id}:{code}`
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.user_id, self.code)
    }

    /// 解析缓存值，格式错误返回 `None`
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let (user_id, code) = raw.split_once(':')?;
        Some(Self {
            user_id: user_id.parse().ok()?,
            code: code.to_string(),
        })
    }
}

/// 用户账号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub login_name: String,
    pub nickname: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_blocked: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// 未删除且未封禁的账号才允许签发会话
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !self.is_blocked && self.deleted_at.is_none()
    }
}

/// 注册新账号的入参
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub login_name: String,
    pub nickname: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("web", Platform::Web)]
    #[case("H5", Platform::H5)]
    #[case("app", Platform::App)]
    #[case(" ios ", Platform::Ios)]
    #[case("OSX", Platform::Osx)]
    fn test_platform_parse_case_insensitive(#[case] input: &str, #[case] expected: Platform) {
        assert_eq!(input.parse::<Platform>().unwrap(), expected);
    }

    #[test]
    fn test_platform_parse_unknown() {
        let err = "fridge".parse::<Platform>().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_platform_ids_unique_and_reversible() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_id(platform.id()), Some(platform));
        }
        assert_eq!(Platform::from_id(0), None);
    }

    #[test]
    fn test_platform_serde_uses_names() {
        assert_eq!(serde_json::to_string(&Platform::App).unwrap(), "\"APP\"");
        let parsed: Platform = serde_json::from_str("\"IPad\"").unwrap();
        assert_eq!(parsed.terminal_class(), TerminalClass::Pad);
    }

    #[test]
    fn test_password_reset_record_format() {
        let record = PasswordResetRecord {
            user_id: 42,
            code: "012345".to_string(),
        };
        assert_eq!(record.encode(), "42:012345");
        assert_eq!(PasswordResetRecord::decode("42:012345"), Some(record));
        assert_eq!(PasswordResetRecord::decode("garbage"), None);
        assert_eq!(PasswordResetRecord::decode("x:1"), None);
    }

    #[test]
    fn test_token_reply_from_pair() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            session_id: "s".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 7200,
            issued_at: 1_700_000_000,
        };
        let reply = TokenReply::from(pair);
        assert_eq!(reply.duration, 7200);
        assert_eq!(reply.srv_create_time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_user_account_usable() {
        let mut account = UserAccount {
            id: 1,
            login_name: "u@example.com".to_string(),
            nickname: "u".to_string(),
            password_hash: String::new(),
            is_blocked: false,
            deleted_at: None,
            created_at: Utc::now(),
        };
        assert!(account.is_usable());
        account.is_blocked = true;
        assert!(!account.is_usable());
        account.is_blocked = false;
        account.deleted_at = Some(Utc::now());
        assert!(!account.is_usable());
    }
}
