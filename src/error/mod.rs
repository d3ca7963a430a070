//! The unified error handling system for the session manager.

// 1. Core Types
pub use token::TokenError;
pub use types::{ErrorKind, SessionError};

/// A unified `Result` type for the entire crate.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, SessionError>;

// 2. Module declarations
pub mod macros;
pub mod token;
pub mod types;

// 3. Context Trait for tagging errors with the operation that produced them.
pub trait Context<T, E> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<SessionError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(SessionError::Context {
                context: context().to_string(),
                source: Box::new(error.into()),
            }),
        }
    }
}

// 4. Error Category for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (bad credentials, stale tokens, contention).
    /// Corresponds to 4xx HTTP status codes.
    Client,
    /// Errors caused by the cache, the user repository or the process itself.
    /// Corresponds to 5xx HTTP status codes.
    Server,
}
