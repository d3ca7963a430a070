//! JWT token codec
//!
//! Signs and verifies access / refresh tokens. Each class has its own secret,
//! so a token of one class never verifies as the other.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::Duration;

use crate::auth::types::{JwtClaims, Platform, TokenClass, TokenSubject};
use crate::config::TokenConfig;
use crate::error::{Result, SessionError, TokenError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

struct ClassKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl ClassKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Stateless token signer / verifier
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    /// Validation configuration
    validation: Validation,
    issuer: String,
}

impl TokenCodec {
    /// Create a codec from the token configuration
    pub fn new(config: &TokenConfig) -> Result<Self> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(SessionError::config("token secrets must not be empty"));
        }
        if config.access_secret == config.refresh_secret {
            return Err(SessionError::config(
                "access and refresh tokens must use different secrets",
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            access: ClassKeys::new(&config.access_secret, config.access_ttl()),
            refresh: ClassKeys::new(&config.refresh_secret, config.refresh_ttl()),
            validation,
            issuer: config.issuer.clone(),
        })
    }

    const fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given class
    #[must_use]
    pub const fn lifetime(&self, class: TokenClass) -> Duration {
        self.keys(class).ttl
    }

    /// Generate access token
    pub fn issue_access_token(
        &self,
        user_id: i64,
        platform: Platform,
        session_id: &str,
    ) -> std::result::Result<String, TokenError> {
        self.issue(TokenClass::Access, user_id, platform, session_id)
    }

    /// Generate refresh token
    pub fn issue_refresh_token(
        &self,
        user_id: i64,
        platform: Platform,
        session_id: &str,
    ) -> std::result::Result<String, TokenError> {
        self.issue(TokenClass::Refresh, user_id, platform, session_id)
    }

    fn issue(
        &self,
        class: TokenClass,
        user_id: i64,
        platform: Platform,
        session_id: &str,
    ) -> std::result::Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.keys(class).ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = JwtClaims {
            sub: user_id.to_string(),
            platform,
            sid: session_id.to_string(),
            typ: class.as_str().to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        self.sign(class, &claims)
    }

    fn sign(
        &self,
        class: TokenClass,
        claims: &JwtClaims,
    ) -> std::result::Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(class).encoding_key,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a token of the expected class and extract its subject
    pub fn parse_and_verify(
        &self,
        token: &str,
        expected: TokenClass,
    ) -> std::result::Result<TokenSubject, TokenError> {
        let token_data = decode::<JwtClaims>(token, &self.keys(expected).decoding_key, &self.validation)
            .map_err(|e| {
                let err = TokenError::from(e);
                ldebug!("system", LogStage::Authentication, LogComponent::TokenCodec, "token_rejected", &format!("Token 校验失败: class={}, reason={}", expected.as_str(), err));
                err
            })?;
        let claims = token_data.claims;

        if claims.typ != expected.as_str() {
            return Err(TokenError::Malformed(format!(
                "expected {} token, got {}",
                expected.as_str(),
                claims.typ
            )));
        }

        let user_id = claims
            .user_id()
            .map_err(|e| TokenError::Malformed(format!("invalid subject: {e}")))?;

        Ok(TokenSubject {
            user_id,
            platform: claims.platform,
            session_id: claims.sid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codec() -> TokenCodec {
        TokenCodec::new(&TokenConfig::with_secrets("access-secret", "refresh-secret")).unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = codec();
        let token = codec.issue_access_token(42, Platform::App, "42-1700000000-123456").unwrap();

        let subject = codec.parse_and_verify(&token, TokenClass::Access).unwrap();
        assert_eq!(
            subject,
            TokenSubject {
                user_id: 42,
                platform: Platform::App,
                session_id: "42-1700000000-123456".to_string(),
            }
        );
    }

    #[test]
    fn test_tokens_issued_together_are_distinct() {
        let codec = codec();
        let a = codec.issue_refresh_token(1, Platform::Web, "s").unwrap();
        let b = codec.issue_refresh_token(1, Platform::Web, "s").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = codec();
        let refresh = codec.issue_refresh_token(7, Platform::Web, "s").unwrap();

        assert!(matches!(
            codec.parse_and_verify(&refresh, TokenClass::Access),
            Err(TokenError::InvalidSignature)
        ));
        assert!(codec.parse_and_verify(&refresh, TokenClass::Refresh).is_ok());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = TokenCodec::new(&TokenConfig::with_secrets("other-a", "other-r")).unwrap();
        let token = other.issue_access_token(7, Platform::Web, "s").unwrap();

        assert!(matches!(
            codec().parse_and_verify(&token, TokenClass::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: "7".to_string(),
            platform: Platform::Web,
            sid: "s".to_string(),
            typ: "access".to_string(),
            iat: now - 7300,
            exp: now - 100,
            iss: "session-gate".to_string(),
            jti: "jti".to_string(),
        };
        let token = codec.sign(TokenClass::Access, &claims).unwrap();

        assert!(matches!(
            codec.parse_and_verify(&token, TokenClass::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_token_rejected_right_after_expiry() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: "7".to_string(),
            platform: Platform::Web,
            sid: "s".to_string(),
            typ: "access".to_string(),
            iat: now - 7200,
            exp: now - 1,
            iss: "session-gate".to_string(),
            jti: "jti".to_string(),
        };
        let token = codec.sign(TokenClass::Access, &claims).unwrap();

        assert!(matches!(
            codec.parse_and_verify(&token, TokenClass::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            codec().parse_and_verify("not.a.jwt", TokenClass::Access),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_identical_secrets_rejected() {
        assert!(TokenCodec::new(&TokenConfig::with_secrets("same", "same")).is_err());
    }

    #[test]
    fn test_lifetimes_follow_config() {
        let codec = codec();
        assert_eq!(codec.lifetime(TokenClass::Access), Duration::from_secs(7200));
        assert_eq!(codec.lifetime(TokenClass::Refresh), Duration::from_secs(604_800));
    }
}
