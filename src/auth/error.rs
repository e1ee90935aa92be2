//! Authentication error taxonomy.

use thiserror::Error;

/// Errors produced by the authentication core.
///
/// The caller-facing variants carry fixed messages so that the reason behind a
/// rejected login or token never leaks through `Display` or `Debug`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Signing key or algorithm missing/invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input failed a shape constraint (password length, email format, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Registration for an email that is already taken
    #[error("User already exists")]
    DuplicateUser,

    /// Unknown email or wrong password
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Bad signature, malformed, expired, or missing claims
    #[error("Invalid token")]
    InvalidToken,

    /// A protected operation was attempted without a usable identity
    #[error("Could not validate credentials")]
    Unauthenticated,

    /// Credential store failure
    #[error("Credential store error: {0}")]
    Store(String),

    /// Hashing library failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error must abort process startup rather than be reported
    /// to a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
