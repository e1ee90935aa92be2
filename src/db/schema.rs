use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

/// Persisted representation of a registered user in SurrealDB (table: `user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    /// Database record identifier.
    pub id: RecordId,
    /// Numeric user id exposed to the rest of the application.
    pub user_id: i64,
    /// Login identifier, unique across the table.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// When the user registered.
    pub created_at: Option<Datetime>,
}

/// Payload for creating a new user row. `user_id` is allocated on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password_hash: String,
}
