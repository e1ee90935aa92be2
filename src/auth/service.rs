//! Registration and login orchestration.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::password::{
    Credentials, burn_verification, hash_password, validate_email, validate_password,
    verify_password,
};
use crate::auth::resolver::IdentityResolver;
use crate::auth::token::{TokenIssuer, TokenResponse, TokenVerifier};
use crate::auth::user_store::{CredentialStore, DuplicateEmail, UserRecord};
use crate::config::AuthConfig;

/// Entry point for everything the boundary layer needs from the auth core.
pub struct AuthService<S: CredentialStore + ?Sized> {
    store: Arc<S>,
    issuer: TokenIssuer,
    resolver: IdentityResolver<S>,
}

impl<S: CredentialStore + ?Sized> AuthService<S> {
    /// Wire the service from a validated config and a credential store.
    pub fn new(config: &AuthConfig, store: Arc<S>) -> Self {
        let verifier = TokenVerifier::new(config);
        Self {
            issuer: TokenIssuer::new(config),
            resolver: IdentityResolver::new(verifier, store.clone()),
            store,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn resolver(&self) -> &IdentityResolver<S> {
        &self.resolver
    }

    /// Register a new user.
    ///
    /// Input is validated before any hashing happens.
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<UserRecord> {
        validate_email(email)?;
        validate_password(password)?;

        if self
            .store
            .find_by_email(email)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .is_some()
        {
            debug!(email, "registration rejected: email already registered");
            return Err(AuthError::DuplicateUser);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create(email, &password_hash)
            .await
            .map_err(|e| {
                if e.downcast_ref::<DuplicateEmail>().is_some() {
                    AuthError::DuplicateUser
                } else {
                    AuthError::Store(e.to_string())
                }
            })?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Authenticate with email and password and issue an access token.
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenResponse> {
        let user = self
            .store
            .find_by_email(email)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            Some(_) => return Err(AuthError::InvalidCredentials),
            None => {
                burn_verification(password);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let response = self.issuer.issue_response(&user.email, None)?;
        info!(user_id = user.id, email = %user.email, "login succeeded");
        Ok(response)
    }

    /// [`login`](Self::login) taking a [`Credentials`] value.
    pub async fn login_credentials(&self, credentials: Credentials) -> AuthResult<TokenResponse> {
        self.login(&credentials.username, &credentials.password).await
    }

    /// Resolve a bearer token to its user.
    pub async fn resolve(&self, token: &str) -> AuthResult<UserRecord> {
        self.resolver.resolve(token).await
    }

    /// Resolve from the value of an `Authorization` header.
    pub async fn resolve_authorization(&self, header: Option<&str>) -> AuthResult<UserRecord> {
        self.resolver.resolve_authorization(header).await
    }
}
