//! User credential storage.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::db::Db;
use crate::db::schema::{UserCreate, UserRow};

/// A registered user as seen by the authentication core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Numeric id, unique across the store
    pub id: i64,
    /// Login identifier
    pub email: String,
    /// Argon2 PHC string; never serialized to clients
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.user_id,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

/// Returned (via `anyhow`) when `create` hits an email that is already taken.
#[derive(Debug, Error)]
#[error("email is already registered")]
pub struct DuplicateEmail;

/// Persistence interface the authentication core depends on.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by login email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Persist a new user. Fails with [`DuplicateEmail`] if the email exists.
    async fn create(&self, email: &str, password_hash: &str) -> Result<UserRecord>;
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

/// Allocates the next numeric id and creates the row in one statement, so
/// the id read and the insert share a transaction.
const INSERT_USER: &str = r#"
    CREATE user CONTENT {
        user_id: (math::max((SELECT VALUE user_id FROM user)) ?? 0) + 1,
        email: $email,
        password_hash: $password_hash
    }
"#;

/// Attempts before a conflicting insert is reported as a store error.
const MAX_INSERT_ATTEMPTS: u32 = 32;

/// Concurrent inserts that read the same `max(user_id)` either fail to commit
/// or trip the `user_user_id` index. Both are safe to retry.
fn is_id_conflict(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("user_user_id") || msg.contains("conflict")
}

/// SurrealDB-backed credential store.
#[derive(Clone)]
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get a user by numeric id.
    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let query = "SELECT * FROM user WHERE user_id = $user_id LIMIT 1";

        let mut res = self.db
            .query(query)
            .bind(("user_id", user_id))
            .await?;

        let users: Vec<UserRow> = res.take(0)?;
        Ok(users.into_iter().next().map(UserRecord::from))
    }

    /// Number of registered users.
    pub async fn count(&self) -> Result<i64> {
        let mut res = self.db
            .query("SELECT count() FROM user GROUP ALL")
            .await?;

        let rows: Vec<CountRow> = res.take(0)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }

    async fn try_insert(&self, create: &UserCreate) -> surrealdb::Result<Vec<UserRow>> {
        let mut res = self.db
            .query(INSERT_USER)
            .bind(("email", create.email.clone()))
            .bind(("password_hash", create.password_hash.clone()))
            .await?;

        res.take(0)
    }

    async fn insert(&self, create: UserCreate) -> Result<UserRecord> {
        let mut attempt = 1;
        let users = loop {
            match self.try_insert(&create).await {
                Ok(users) => break users,
                // Unique index on `email` raced with another registration
                Err(e) if e.to_string().contains("user_email") => {
                    return Err(DuplicateEmail.into());
                }
                Err(e) if is_id_conflict(&e) && attempt < MAX_INSERT_ATTEMPTS => {
                    debug!("User id allocation conflicted on attempt {}: {}", attempt, e);
                    let jitter = rand::thread_rng().gen_range(0..5);
                    tokio::time::sleep(Duration::from_millis(u64::from(attempt) + jitter)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        users.into_iter().next()
            .map(UserRecord::from)
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_string();
        let query = "SELECT * FROM user WHERE email = $email LIMIT 1";

        let mut res = self.db
            .query(query)
            .bind(("email", email))
            .await?;

        let users: Vec<UserRow> = res.take(0)?;
        Ok(users.into_iter().next().map(UserRecord::from))
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<UserRecord> {
        if self.find_by_email(email).await?.is_some() {
            return Err(DuplicateEmail.into());
        }

        let create = UserCreate {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };

        self.insert(create).await
    }
}
