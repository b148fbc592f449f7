use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tido_core::{ListId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Name of the protected list created at registration.
pub const DEFAULT_LIST_NAME: &str = "My Day";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListRow {
    pub id: ListId,
    pub user_id: UserId,
    pub name: String,
    pub is_default: bool,
    pub created_at: String,
}

pub struct ListRepo {
    db: Database,
}

impl ListRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the protected default list for a freshly registered user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn create_default(&self, user_id: UserId) -> Result<ListRow, StoreError> {
        self.insert(user_id, DEFAULT_LIST_NAME, true)
    }

    /// Create a custom list. The name must be unique per owner.
    #[instrument(skip(self), fields(user_id = %user_id, name))]
    pub fn create(&self, user_id: UserId, name: &str) -> Result<ListRow, StoreError> {
        self.insert(user_id, name, false)
    }

    fn insert(&self, user_id: UserId, name: &str, is_default: bool) -> Result<ListRow, StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO lists (user_id, name, is_default, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id.as_i64(), name, is_default, now],
            )
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("list \"{name}\" already exists"))
                }
                other => other,
            })?;

            Ok(ListRow {
                id: ListId::from_raw(conn.last_insert_rowid()),
                user_id,
                name: name.to_string(),
                is_default,
                created_at: now,
            })
        })
    }

    /// All of a user's lists, default first, then by creation time.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn list_for_user(&self, user_id: UserId) -> Result<Vec<ListRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, is_default, created_at FROM lists
                 WHERE user_id = ?1
                 ORDER BY is_default DESC, created_at ASC, id ASC",
            )?;
            let mut rows = stmt.query([user_id.as_i64()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_list(row)?);
            }
            Ok(results)
        })
    }

    /// Get a list, scoped to its owner. A list owned by someone else is
    /// reported as not found.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id))]
    pub fn get_owned(&self, user_id: UserId, list_id: ListId) -> Result<ListRow, StoreError> {
        self.db.with_conn(|conn| get_owned_list(conn, user_id, list_id))
    }

    /// Rename a list. The default list is protected.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id, name))]
    pub fn rename(
        &self,
        user_id: UserId,
        list_id: ListId,
        name: &str,
    ) -> Result<ListRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut list = get_owned_list(conn, user_id, list_id)?;
            if list.is_default {
                return Err(StoreError::Protected(
                    "the default list cannot be renamed".into(),
                ));
            }

            conn.execute(
                "UPDATE lists SET name = ?1 WHERE id = ?2",
                rusqlite::params![name, list_id.as_i64()],
            )
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("list \"{name}\" already exists"))
                }
                other => other,
            })?;

            list.name = name.to_string();
            Ok(list)
        })
    }

    /// Delete a list and, via cascade, all its tasks. The default list is
    /// protected.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id))]
    pub fn delete(&self, user_id: UserId, list_id: ListId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let list = get_owned_list(conn, user_id, list_id)?;
            if list.is_default {
                return Err(StoreError::Protected(
                    "the default list cannot be deleted".into(),
                ));
            }

            conn.execute("DELETE FROM lists WHERE id = ?1", [list_id.as_i64()])?;
            Ok(())
        })
    }
}

pub(crate) fn get_owned_list(
    conn: &rusqlite::Connection,
    user_id: UserId,
    list_id: ListId,
) -> Result<ListRow, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, is_default, created_at FROM lists
         WHERE id = ?1 AND user_id = ?2",
    )?;
    let mut rows = stmt.query([list_id.as_i64(), user_id.as_i64()])?;
    match rows.next()? {
        Some(row) => row_to_list(row),
        None => Err(StoreError::NotFound(format!("list {list_id}"))),
    }
}

fn row_to_list(row: &rusqlite::Row<'_>) -> Result<ListRow, StoreError> {
    Ok(ListRow {
        id: ListId::from_raw(row_helpers::get(row, 0, "lists", "id")?),
        user_id: UserId::from_raw(row_helpers::get(row, 1, "lists", "user_id")?),
        name: row_helpers::get(row, 2, "lists", "name")?,
        is_default: row_helpers::get(row, 3, "lists", "is_default")?,
        created_at: row_helpers::get(row, 4, "lists", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepo;

    fn setup() -> (Database, UserId) {
        let db = Database::in_memory().unwrap();
        let user = UserRepo::new(db.clone()).create("alice", "hash").unwrap();
        (db, user.id)
    }

    #[test]
    fn default_list_created_with_flag() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        let list = repo.create_default(user_id).unwrap();
        assert_eq!(list.name, DEFAULT_LIST_NAME);
        assert!(list.is_default);
    }

    #[test]
    fn custom_list_is_mutable() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        let list = repo.create(user_id, "Work").unwrap();
        assert!(!list.is_default);

        let renamed = repo.rename(user_id, list.id, "Office").unwrap();
        assert_eq!(renamed.name, "Office");

        repo.delete(user_id, list.id).unwrap();
        assert!(repo.get_owned(user_id, list.id).is_err());
    }

    #[test]
    fn duplicate_name_per_owner_conflicts() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        repo.create(user_id, "Work").unwrap();
        assert!(matches!(
            repo.create(user_id, "Work"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn same_name_allowed_across_owners() {
        let (db, alice) = setup();
        let bob = UserRepo::new(db.clone()).create("bob", "hash").unwrap();
        let repo = ListRepo::new(db);
        repo.create(alice, "Work").unwrap();
        repo.create(bob.id, "Work").unwrap();
    }

    #[test]
    fn rename_to_existing_name_conflicts() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        repo.create(user_id, "Work").unwrap();
        let other = repo.create(user_id, "Home").unwrap();
        assert!(matches!(
            repo.rename(user_id, other.id, "Work"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn default_list_rename_rejected() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        let list = repo.create_default(user_id).unwrap();
        assert!(matches!(
            repo.rename(user_id, list.id, "Anything"),
            Err(StoreError::Protected(_))
        ));
    }

    #[test]
    fn default_list_delete_rejected() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        let list = repo.create_default(user_id).unwrap();
        assert!(matches!(
            repo.delete(user_id, list.id),
            Err(StoreError::Protected(_))
        ));
        // Still there.
        repo.get_owned(user_id, list.id).unwrap();
    }

    #[test]
    fn lists_ordered_default_first_then_created() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db);
        repo.create(user_id, "First").unwrap();
        repo.create_default(user_id).unwrap();
        repo.create(user_id, "Second").unwrap();

        let names: Vec<String> = repo
            .list_for_user(user_id)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec![DEFAULT_LIST_NAME, "First", "Second"]);
    }

    #[test]
    fn foreign_list_reported_as_not_found() {
        let (db, alice) = setup();
        let bob = UserRepo::new(db.clone()).create("bob", "hash").unwrap();
        let repo = ListRepo::new(db);
        let list = repo.create(alice, "Private").unwrap();

        assert!(matches!(
            repo.get_owned(bob.id, list.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.rename(bob.id, list.id, "Stolen"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(bob.id, list.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_user_cascades_to_lists() {
        let (db, user_id) = setup();
        let repo = ListRepo::new(db.clone());
        repo.create(user_id, "Work").unwrap();
        repo.create_default(user_id).unwrap();

        UserRepo::new(db.clone()).delete(user_id).unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM lists", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
