//! Process configuration for the authentication core.
//!
//! [`AuthConfig`] is built once at startup and shared read-only afterwards.
//! Nothing below the configuration layer reads the environment.

use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use tracing::warn;

use crate::auth::{AuthError, AuthResult};

/// Environment variable holding the symmetric signing key.
pub const SECRET_KEY_VAR: &str = "SECRET_KEY";
/// Environment variable naming the signing algorithm (e.g. `HS256`).
pub const ALGORITHM_VAR: &str = "ALGORITHM";
/// Environment variable holding the default token lifetime in minutes.
pub const EXPIRATION_VAR: &str = "JWT_EXPIRATION_TIME";

/// Default token lifetime when `JWT_EXPIRATION_TIME` is missing or malformed.
pub const DEFAULT_EXPIRY_MINUTES: i64 = 15;
/// Longest accepted default token lifetime (one year).
pub const MAX_EXPIRY_MINUTES: i64 = 60 * 24 * 365;

/// Signing configuration shared by the token issuer and verifier.
#[derive(Clone)]
pub struct AuthConfig {
    secret_key: String,
    algorithm: Algorithm,
    default_expiry_minutes: i64,
}

impl AuthConfig {
    /// Build a config from explicit values.
    ///
    /// The secret must be non-empty and the algorithm must be an HMAC variant
    /// (`HS256`, `HS384`, `HS512`), since the key is symmetric. The expiry must
    /// lie in `1..=MAX_EXPIRY_MINUTES`.
    pub fn new(
        secret_key: impl Into<String>,
        algorithm: &str,
        default_expiry_minutes: i64,
    ) -> AuthResult<Self> {
        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(AuthError::Configuration(format!(
                "{} must be set to a non-empty value",
                SECRET_KEY_VAR
            )));
        }

        let algorithm = parse_algorithm(algorithm)?;

        if !(1..=MAX_EXPIRY_MINUTES).contains(&default_expiry_minutes) {
            return Err(AuthError::Configuration(format!(
                "default expiry must be between 1 and {} minutes, got {}",
                MAX_EXPIRY_MINUTES, default_expiry_minutes
            )));
        }

        Ok(Self {
            secret_key,
            algorithm,
            default_expiry_minutes,
        })
    }

    /// Load from the process environment.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    ///
    /// `SECRET_KEY` and `ALGORITHM` are required. `JWT_EXPIRATION_TIME` falls
    /// back to [`DEFAULT_EXPIRY_MINUTES`] with a warning when it is missing,
    /// unparsable or outside `1..=MAX_EXPIRY_MINUTES`.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup(SECRET_KEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AuthError::Configuration(format!("{} is not set", SECRET_KEY_VAR))
            })?;

        let algorithm = lookup(ALGORITHM_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AuthError::Configuration(format!("{} is not set", ALGORITHM_VAR))
            })?;

        let expiry = parse_expiry_minutes(lookup(EXPIRATION_VAR).as_deref());

        Self::new(secret_key, &algorithm, expiry)
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn default_expiry_minutes(&self) -> i64 {
        self.default_expiry_minutes
    }

    /// Default token lifetime as a duration.
    pub fn default_expiry(&self) -> Duration {
        Duration::minutes(self.default_expiry_minutes)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("default_expiry_minutes", &self.default_expiry_minutes)
            .finish()
    }
}

fn parse_algorithm(name: &str) -> AuthResult<Algorithm> {
    let name = name.trim();
    let algorithm = Algorithm::from_str(name).map_err(|_| {
        AuthError::Configuration(format!("unknown signing algorithm `{}`", name))
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(AuthError::Configuration(format!(
            "algorithm {:?} needs an asymmetric key; only HS256, HS384 and HS512 are supported",
            other
        ))),
    }
}

fn parse_expiry_minutes(raw: Option<&str>) -> i64 {
    match raw {
        None => {
            warn!(
                "{} not set, using default of {} minutes",
                EXPIRATION_VAR, DEFAULT_EXPIRY_MINUTES
            );
            DEFAULT_EXPIRY_MINUTES
        }
        Some(value) => match value.trim().parse::<i64>() {
            Ok(minutes) if (1..=MAX_EXPIRY_MINUTES).contains(&minutes) => minutes,
            _ => {
                warn!(
                    "{}={:?} is not an integer between 1 and {}, using default of {} minutes",
                    EXPIRATION_VAR, value, MAX_EXPIRY_MINUTES, DEFAULT_EXPIRY_MINUTES
                );
                DEFAULT_EXPIRY_MINUTES
            }
        },
    }
}
