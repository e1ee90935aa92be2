// Core modules
pub mod auth;
pub mod config;
pub mod db;

// Re-export key types and functions
pub use auth::{
    AuthError, AuthResult, AuthService, CredentialStore, Credentials, IdentityResolver,
    TokenIssuer, TokenResponse, TokenVerifier, UserRecord, UserStore,
};
pub use config::AuthConfig;
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};

use anyhow::Result;
use std::sync::Arc;

/// Convenience function to build an auth service backed by SurrealDB.
///
/// Connects to the database, ensures the schema exists, and wires the
/// credential store into an [`AuthService`].
pub async fn create_auth_service(
    auth_config: &AuthConfig,
    db_config: DatabaseConfig,
) -> Result<AuthService<UserStore>> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let store = Arc::new(UserStore::new(db));
    Ok(AuthService::new(auth_config, store))
}
