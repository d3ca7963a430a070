//! # 认证工具函数
//!
//! 会话ID、随机码、脱敏和密码哈希等共享工具

use rand::Rng;

use crate::error::{Result, SessionError};

/// 生成 `n` 位数字随机码（允许前导 0）
#[must_use]
pub fn rand_num_str(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// 生成会话ID，格式 `{user_id}-{unix_secs}-{6 位随机数}`
#[must_use]
pub fn gen_session_id(user_id: i64) -> String {
    format!(
        "{}-{}-{}",
        user_id,
        chrono::Utc::now().timestamp(),
        rand_num_str(6)
    )
}

/// 生成不透明随机 Token（32 位十六进制）
#[must_use]
pub fn gen_opaque_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// 脱敏 Token 用于日志记录
///
/// 格式: "eyJh***Xk9w"
#[must_use]
pub fn sanitize_token(token: &str) -> String {
    match (token.get(..4), token.get(token.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if token.len() > 10 => format!("{head}***{tail}"),
        _ => "***".to_string(),
    }
}

/// 脱敏登录名
///
/// - 邮箱: `alice@example.com` -> `a***e@example.com`
/// - 手机号: `13812345678` -> `138****5678`
/// - 其他: 保留首字符
#[must_use]
pub fn mask_login_name(login_name: &str) -> String {
    if let Some((local, domain)) = login_name.split_once('@') {
        let chars: Vec<char> = local.chars().collect();
        let masked_local = match chars.as_slice() {
            [] => String::new(),
            [only] => format!("{only}***"),
            [first, .., last] => format!("{first}***{last}"),
        };
        return format!("{masked_local}@{domain}");
    }

    let chars: Vec<char> = login_name.chars().collect();
    if chars.len() >= 7 && chars.iter().all(char::is_ascii_digit) {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        return format!("{head}****{tail}");
    }

    chars
        .first()
        .map_or_else(String::new, |first| format!("{first}***"))
}

/// 比较验证码，耗时只与长度有关，与首个不同字符的位置无关
#[must_use]
pub fn codes_match(expected: &str, presented: &str) -> bool {
    let (expected, presented) = (expected.as_bytes(), presented.as_bytes());
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .iter()
        .zip(presented)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// 使用 bcrypt 计算密码哈希，在阻塞线程池中执行
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| SessionError::internal_with_source("密码哈希任务异常退出", e))?
        .map_err(SessionError::from)
}

/// 校验密码与 bcrypt 哈希是否匹配
///
/// 哈希格式损坏视为不匹配
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash))
        .await
        .map_err(|e| SessionError::internal_with_source("密码校验任务异常退出", e))?;
    Ok(matched.unwrap_or(false))
}
