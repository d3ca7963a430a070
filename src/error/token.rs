//! Errors raised by the token codec.

use thiserror::Error;

/// Failure modes of signing and verifying access / refresh tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature or signing method does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims cannot be decoded: {0}")]
    Malformed(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(err.to_string()),
        }
    }
}
