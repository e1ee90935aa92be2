//! Authentication and session-token core.
//!
//! This module owns everything between a submitted credential and an
//! authenticated identity:
//!
//! - **Passwords**: Argon2id hashing and verification, plus input shape checks
//! - **Tokens**: HMAC-signed JWTs carrying `sub`/`exp`, verified statelessly
//! - **Identity**: resolving a bearer token to a stored [`UserRecord`]
//! - **Orchestration**: registration and login via [`AuthService`]
//!
//! ## Security Model
//!
//! - Login failures never reveal whether the email exists
//! - Token failures never reveal whether the token was expired, forged or
//!   belongs to a deleted user
//! - Plaintext passwords and hashes are never logged
//!
//! ## Usage
//!
//! ```ignore
//! let config = AuthConfig::from_env()?;
//! let service = AuthService::new(&config, Arc::new(UserStore::new(db)));
//!
//! let user = service.register("a@example.com", "password123").await?;
//! let token = service.login("a@example.com", "password123").await?;
//! let me = service.resolve_authorization(Some("Bearer ...")).await?;
//! ```

mod error;
mod password;
mod resolver;
mod service;
mod token;
mod user_store;


pub use error::{AuthError, AuthResult};
pub use password::{
    Credentials, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN, hash_password, validate_email,
    validate_password, verify_password,
};
pub use resolver::{IdentityResolver, bearer_token};
pub use service::AuthService;
pub use token::{Claims, TokenIssuer, TokenResponse, TokenVerifier, ttl_from_minutes};
pub use user_store::{CredentialStore, DuplicateEmail, UserRecord, UserStore};
