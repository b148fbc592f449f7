use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tido_core::UserId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether a username is already registered (case-sensitive exact match).
    #[instrument(skip(self))]
    pub fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
        })
    }

    /// Create a user. The password must already be hashed.
    #[instrument(skip(self, password_hash))]
    pub fn create(&self, username: &str, password_hash: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, password_hash, now],
            )
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("username \"{username}\" is taken"))
                }
                other => other,
            })?;

            Ok(UserRow {
                id: UserId::from_raw(conn.last_insert_rowid()),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_i64()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Look up a user by username (case-sensitive).
    #[instrument(skip(self))]
    pub fn find_by_username(&self, username: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            )?;
            let mut rows = stmt.query([username])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user \"{username}\""))),
            }
        })
    }

    /// Delete a user. Lists and tasks cascade at the database level.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id.as_i64()])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    Ok(UserRow {
        id: UserId::from_raw(row_helpers::get(row, 0, "users", "id")?),
        username: row_helpers::get(row, 1, "users", "username")?,
        password_hash: row_helpers::get(row, 2, "users", "password_hash")?,
        created_at: row_helpers::get(row, 3, "users", "created_at")?,
    })
}
