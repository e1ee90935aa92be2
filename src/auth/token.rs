//! Signed bearer tokens.
//!
//! Tokens are compact JWS strings carrying `sub`, `iat`, `exp` and `jti`.
//! They are verified statelessly against the shared secret; there is no
//! server-side session or revocation list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::error::{AuthError, AuthResult};
use crate::config::AuthConfig;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the user's email)
    #[serde(default)]
    pub sub: String,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id
    #[serde(default)]
    pub jti: String,
}

/// Login response in OAuth2 password-flow shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Convert a lifetime in minutes to a [`Duration`].
///
/// Values too large for a `Duration` are a [`AuthError::Validation`] error.
pub fn ttl_from_minutes(minutes: i64) -> AuthResult<Duration> {
    Duration::try_minutes(minutes).ok_or_else(|| {
        AuthError::Validation(format!("token lifetime of {} minutes is out of range", minutes))
    })
}

/// Creates signed, time-limited access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    header: Header,
    encoding_key: EncodingKey,
    default_expiry: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            header: Header::new(config.algorithm()),
            encoding_key: EncodingKey::from_secret(config.secret_key().as_bytes()),
            default_expiry: config.default_expiry(),
        }
    }

    /// Issue a token for `subject` that expires after `ttl`, or after the
    /// configured default when `ttl` is `None`.
    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> AuthResult<String> {
        self.issue_at(subject, ttl, Utc::now())
    }

    /// Same as [`issue`](Self::issue) with an explicit clock.
    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        self.sign(subject, ttl, now).map(|(token, _)| token)
    }

    /// Issue a token and wrap it in a [`TokenResponse`].
    pub fn issue_response(&self, subject: &str, ttl: Option<Duration>) -> AuthResult<TokenResponse> {
        let (access_token, expires_at) = self.sign(subject, ttl, Utc::now())?;
        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_at,
        })
    }

    fn sign(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        if subject.trim().is_empty() {
            return Err(AuthError::Validation(
                "token subject must not be empty".to_string(),
            ));
        }

        let expires_at = now
            .checked_add_signed(ttl.unwrap_or(self.default_expiry))
            .ok_or_else(|| AuthError::Validation("token lifetime is out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Configuration(format!("failed to sign token: {}", e)))?;

        Ok((token, expires_at))
    }
}

/// Validates presented tokens and extracts their subject.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(config.algorithm());
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(config.secret_key().as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str) -> AuthResult<String> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock.
    ///
    /// Every failure (signature, encoding, algorithm, expiry, missing claims)
    /// is reported as [`AuthError::InvalidToken`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = self.claims_at(token, now)?;
        Ok(claims.sub)
    }

    /// Verify a token and return all of its claims.
    pub fn claims_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("token rejected: {}", e);
                AuthError::InvalidToken
            })?;

        let claims = token_data.claims;

        if claims.exp <= now.timestamp() {
            debug!("token rejected: expired at {}", claims.exp);
            return Err(AuthError::InvalidToken);
        }

        if claims.sub.trim().is_empty() {
            debug!("token rejected: empty subject");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    fn config() -> AuthConfig {
        AuthConfig::new("test-secret-key", "HS256", 15).unwrap()
    }

    fn pair(config: &AuthConfig) -> (TokenIssuer, TokenVerifier) {
        (TokenIssuer::new(config), TokenVerifier::new(config))
    }

    #[test]
    fn test_issue_and_verify() {
        let (issuer, verifier) = pair(&config());

        let token = issuer.issue("a@example.com", None).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verifier.verify(&token).unwrap(), "a@example.com");
    }

    #[test]
    fn test_default_expiry_applied() {
        let (issuer, verifier) = pair(&config());
        let now = Utc::now();

        let token = issuer.issue_at("a@example.com", None, now).unwrap();
        let claims = verifier.claims_at(&token, now).unwrap();

        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, (now + Duration::minutes(15)).timestamp());
    }

    #[test]
    fn test_explicit_ttl_applied() {
        let (issuer, verifier) = pair(&config());
        let now = Utc::now();

        let token = issuer
            .issue_at("a@example.com", Some(Duration::minutes(90)), now)
            .unwrap();
        let claims = verifier.claims_at(&token, now).unwrap();

        assert_eq!(claims.exp, (now + Duration::minutes(90)).timestamp());
    }

    #[test]
    fn test_tokens_for_same_subject_are_distinct() {
        let (issuer, verifier) = pair(&config());
        let now = Utc::now();

        let token1 = issuer.issue_at("a@example.com", None, now).unwrap();
        let token2 = issuer.issue_at("a@example.com", None, now).unwrap();

        assert_ne!(token1, token2);
        assert_eq!(verifier.verify(&token1).unwrap(), "a@example.com");
        assert_eq!(verifier.verify(&token2).unwrap(), "a@example.com");
    }

    #[test]
    fn test_already_expired_token_rejected() {
        let (issuer, verifier) = pair(&config());

        let token = issuer
            .issue("a@example.com", Some(Duration::minutes(-1)))
            .unwrap();

        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expiry_boundary_uses_clock() {
        let (issuer, verifier) = pair(&config());
        let now = Utc::now();

        let token = issuer
            .issue_at("a@example.com", Some(Duration::minutes(5)), now)
            .unwrap();

        assert!(verifier.verify_at(&token, now + Duration::minutes(4)).is_ok());
        assert_eq!(
            verifier.verify_at(&token, now + Duration::minutes(5)),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            verifier.verify_at(&token, now + Duration::minutes(6)),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_different_secret_rejected() {
        let issuer = TokenIssuer::new(&AuthConfig::new("other-secret", "HS256", 15).unwrap());
        let verifier = TokenVerifier::new(&config());

        let token = issuer.issue("a@example.com", None).unwrap();
        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_different_algorithm_rejected() {
        let issuer = TokenIssuer::new(&AuthConfig::new("test-secret-key", "HS512", 15).unwrap());
        let verifier = TokenVerifier::new(&config());

        let token = issuer.issue("a@example.com", None).unwrap();
        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let verifier = TokenVerifier::new(&config());

        for token in ["", "abc", "a.b.c", "not.a.token.at.all"] {
            assert_eq!(verifier.verify(token), Err(AuthError::InvalidToken));
        }
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (issuer, verifier) = pair(&config());
        let token = issuer.issue("a@example.com", None).unwrap();
        let other = issuer.issue("b@example.com", None).unwrap();

        // Splice b's payload onto a's signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(verifier.verify(&forged), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let verifier = TokenVerifier::new(&config());
        let key = EncodingKey::from_secret(b"test-secret-key");
        let exp = (Utc::now() + Duration::minutes(10)).timestamp();

        let no_sub = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "exp": exp }),
            &key,
        )
        .unwrap();
        assert_eq!(verifier.verify(&no_sub), Err(AuthError::InvalidToken));

        let empty_sub = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "", "exp": exp }),
            &key,
        )
        .unwrap();
        assert_eq!(verifier.verify(&empty_sub), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_missing_expiry_rejected() {
        let verifier = TokenVerifier::new(&config());
        let key = EncodingKey::from_secret(b"test-secret-key");

        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "a@example.com" }),
            &key,
        )
        .unwrap();
        assert_eq!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_empty_subject_cannot_be_issued() {
        let issuer = TokenIssuer::new(&config());
        assert!(matches!(
            issuer.issue("", None),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            issuer.issue("   ", None),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_ttl_is_validation_error() {
        let issuer = TokenIssuer::new(&config());

        for ttl in [Duration::MAX, Duration::MIN] {
            assert!(matches!(
                issuer.issue("a@example.com", Some(ttl)),
                Err(AuthError::Validation(_))
            ));
            assert!(matches!(
                issuer.issue_response("a@example.com", Some(ttl)),
                Err(AuthError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_ttl_from_minutes() {
        assert_eq!(ttl_from_minutes(90).unwrap(), Duration::minutes(90));
        assert_eq!(ttl_from_minutes(-1).unwrap(), Duration::minutes(-1));

        for minutes in [i64::MAX / 1000, i64::MAX, i64::MIN] {
            assert!(matches!(
                ttl_from_minutes(minutes),
                Err(AuthError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_issue_response_shape() {
        let (issuer, verifier) = pair(&config());

        let response = issuer.issue_response("a@example.com", None).unwrap();
        assert_eq!(response.token_type, "bearer");
        assert!(response.expires_at > Utc::now());
        assert_eq!(verifier.verify(&response.access_token).unwrap(), "a@example.com");
    }
}
