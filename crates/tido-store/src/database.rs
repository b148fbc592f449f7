use std::path::{Path, PathBuf};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

const POOL_SIZE: u32 = 8;

/// Pooled SQLite handle shared by all repositories.
/// Excess requests wait on the pool rather than fail.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let manager = SqliteConnectionManager::file(path);
        let db = Self::build(manager, path.to_owned())?;

        info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    ///
    /// Uses a uniquely named shared-cache URI so every pooled connection
    /// sees the same database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let uri = format!(
            "file:tido-mem-{}?mode=memory&cache=shared",
            uuid::Uuid::now_v7()
        );
        let manager = SqliteConnectionManager::file(&uri);
        Self::build(manager, PathBuf::from(":memory:"))
    }

    fn build(manager: SqliteConnectionManager, path: PathBuf) -> Result<Self, StoreError> {
        let manager = manager.with_init(|conn| conn.execute_batch(schema::PRAGMAS));
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .build(manager)
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let db = Self { pool, path };

        db.with_conn(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

            let version: Option<u32> = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                    row.get(0)
                })
                .ok();

            if version.is_none() {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [schema::SCHEMA_VERSION],
                )
                .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
            }
            Ok(())
        })?;

        Ok(db)
    }

    /// Execute a closure with a pooled connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.pool.get()?;
        f(&conn)
    }

    /// Execute a closure inside a transaction.
    /// The transaction commits only if the closure returns Ok.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
    }

    #[test]
    fn schema_version_set() {
        let db = Database::in_memory().unwrap();
        let version: u32 = db
            .with_conn(|conn| {
                conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn tables_created() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let tables: Vec<String> = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            assert!(tables.contains(&"users".to_string()));
            assert!(tables.contains(&"lists".to_string()));
            assert!(tables.contains(&"tasks".to_string()));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn pooled_connections_share_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES ('a', 'h', 'now')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        // A second checkout must see the same rows.
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn separate_in_memory_databases_are_isolated() {
        let a = Database::in_memory().unwrap();
        let b = Database::in_memory().unwrap();
        a.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES ('a', 'h', 'now')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = b
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn open_file_database() {
        let dir = std::env::temp_dir().join(format!("tido-store-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("test.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let db2 = Database::open(&path).unwrap();
        drop(db);
        drop(db2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn with_tx_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), StoreError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES ('a', 'h', 'now')",
                [],
            )?;
            Err(StoreError::Conflict("forced".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn with_tx_commits_on_ok() {
        let db = Database::in_memory().unwrap();
        db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES ('a', 'h', 'now')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
