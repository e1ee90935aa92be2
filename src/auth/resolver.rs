//! Request-scoped identity resolution.

use std::sync::Arc;

use tracing::debug;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::token::TokenVerifier;
use crate::auth::user_store::{CredentialStore, UserRecord};

/// Resolves a bearer token to the user it belongs to.
///
/// Every token problem, and a valid token whose subject no longer exists,
/// surfaces as the same [`AuthError::Unauthenticated`].
pub struct IdentityResolver<S: CredentialStore + ?Sized> {
    verifier: TokenVerifier,
    store: Arc<S>,
}

impl<S: CredentialStore + ?Sized> IdentityResolver<S> {
    pub fn new(verifier: TokenVerifier, store: Arc<S>) -> Self {
        Self { verifier, store }
    }

    /// Resolve a raw token string.
    pub async fn resolve(&self, token: &str) -> AuthResult<UserRecord> {
        let subject = self
            .verifier
            .verify(token)
            .map_err(|_| AuthError::Unauthenticated)?;

        let user = self
            .store
            .find_by_email(&subject)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        match user {
            Some(user) => Ok(user),
            None => {
                debug!("token subject has no matching user");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    /// Resolve from the value of an `Authorization` header.
    pub async fn resolve_authorization(&self, header: Option<&str>) -> AuthResult<UserRecord> {
        let token = header
            .and_then(bearer_token)
            .ok_or(AuthError::Unauthenticated)?;
        self.resolve(token).await
    }
}

/// Extract the token from a `Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; an empty token yields `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenIssuer;
    use crate::config::AuthConfig;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration;

    /// Store with a fixed set of users.
    struct FixedStore(Vec<UserRecord>);

    #[async_trait]
    impl CredentialStore for FixedStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
            Ok(self.0.iter().find(|u| u.email == email).cloned())
        }

        async fn create(&self, _email: &str, _password_hash: &str) -> Result<UserRecord> {
            anyhow::bail!("read-only store")
        }
    }

    /// Store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<UserRecord>> {
            anyhow::bail!("connection reset")
        }

        async fn create(&self, _email: &str, _password_hash: &str) -> Result<UserRecord> {
            anyhow::bail!("connection reset")
        }
    }

    fn alice() -> UserRecord {
        UserRecord {
            id: 1,
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    fn setup<S: CredentialStore>(store: S) -> (TokenIssuer, IdentityResolver<S>) {
        let config = AuthConfig::new("resolver-secret", "HS256", 15).unwrap();
        let resolver = IdentityResolver::new(TokenVerifier::new(&config), Arc::new(store));
        (TokenIssuer::new(&config), resolver)
    }

    #[tokio::test]
    async fn test_resolve_existing_user() {
        let (issuer, resolver) = setup(FixedStore(vec![alice()]));

        let token = issuer.issue("a@example.com", None).unwrap();
        assert_eq!(resolver.resolve(&token).await.unwrap(), alice());
    }

    #[tokio::test]
    async fn test_resolve_unknown_subject() {
        let (issuer, resolver) = setup(FixedStore(vec![alice()]));

        let token = issuer.issue("ghost@example.com", None).unwrap();
        assert_eq!(resolver.resolve(&token).await, Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_resolve_expired_token() {
        let (issuer, resolver) = setup(FixedStore(vec![alice()]));

        let token = issuer
            .issue("a@example.com", Some(Duration::minutes(-1)))
            .unwrap();
        assert_eq!(resolver.resolve(&token).await, Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_resolve_garbage_token() {
        let (_, resolver) = setup(FixedStore(vec![alice()]));
        assert_eq!(resolver.resolve("garbage").await, Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_resolve_store_failure_propagates() {
        let (issuer, resolver) = setup(BrokenStore);

        let token = issuer.issue("a@example.com", None).unwrap();
        assert!(matches!(resolver.resolve(&token).await, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_resolve_authorization_header() {
        let (issuer, resolver) = setup(FixedStore(vec![alice()]));
        let token = issuer.issue("a@example.com", None).unwrap();

        let header = format!("Bearer {}", token);
        assert_eq!(
            resolver.resolve_authorization(Some(&header)).await.unwrap(),
            alice()
        );

        assert_eq!(
            resolver.resolve_authorization(None).await,
            Err(AuthError::Unauthenticated)
        );
        let basic = format!("Basic {}", token);
        assert_eq!(
            resolver.resolve_authorization(Some(&basic)).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER   abc  "), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token(""), None);
    }
}
