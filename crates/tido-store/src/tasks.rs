use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tido_core::{ListId, TaskId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::lists::get_owned_list;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub list_id: ListId,
    pub user_id: UserId,
    pub title: String,
    pub is_completed: bool,
    pub is_important: bool,
    pub position: i64,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update. Omitted fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
    pub is_important: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_completed.is_none() && self.is_important.is_none()
    }
}

/// One entry of a bulk reorder request.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ReorderItem {
    pub id: TaskId,
    pub position: i64,
}

/// A task in the cross-list important view, tagged with its list's name.
#[derive(Clone, Debug, Serialize)]
pub struct ImportantTaskRow {
    #[serde(flatten)]
    pub task: TaskRow,
    pub list_name: String,
}

/// Apply a patch to a task, returning the new row and the changed columns.
///
/// Pure: the caller decides what to write. `completed_at` is set or
/// cleared only on an actual completion transition, so toggling a task
/// back to incomplete restores nothing but the null timestamp.
pub fn apply_patch(row: &TaskRow, patch: &TaskPatch, now: &str) -> (TaskRow, Vec<&'static str>) {
    let mut updated = row.clone();
    let mut changed: Vec<&'static str> = Vec::new();

    if let Some(title) = &patch.title {
        if *title != updated.title {
            updated.title = title.clone();
            changed.push("title");
        }
    }

    if let Some(is_completed) = patch.is_completed {
        if is_completed != updated.is_completed {
            updated.is_completed = is_completed;
            updated.completed_at = if is_completed {
                Some(now.to_string())
            } else {
                None
            };
            changed.push("is_completed");
            changed.push("completed_at");
        }
    }

    if let Some(is_important) = patch.is_important {
        if is_important != updated.is_important {
            updated.is_important = is_important;
            changed.push("is_important");
        }
    }

    if !changed.is_empty() {
        updated.updated_at = now.to_string();
        changed.push("updated_at");
    }

    (updated, changed)
}

pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a task to a list. Ownership is derived through the list;
    /// the new task's position is max(position) + 1, or 0 if the list is
    /// empty, so new tasks always sort last.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id))]
    pub fn create(
        &self,
        user_id: UserId,
        list_id: ListId,
        title: &str,
    ) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            get_owned_list(conn, user_id, list_id)?;

            let position: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE list_id = ?1",
                [list_id.as_i64()],
                |row| row.get(0),
            )?;

            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO tasks (list_id, user_id, title, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![list_id.as_i64(), user_id.as_i64(), title, position, now],
            )?;

            Ok(TaskRow {
                id: TaskId::from_raw(conn.last_insert_rowid()),
                list_id,
                user_id,
                title: title.to_string(),
                is_completed: false,
                is_important: false,
                position,
                completed_at: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// A list's tasks, ordered by position ascending.
    #[instrument(skip(self), fields(user_id = %user_id, list_id = %list_id))]
    pub fn list_for_list(
        &self,
        user_id: UserId,
        list_id: ListId,
    ) -> Result<Vec<TaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            get_owned_list(conn, user_id, list_id)?;
            tasks_by_position(conn, list_id)
        })
    }

    /// Get a task, scoped to its owner.
    #[instrument(skip(self), fields(user_id = %user_id, task_id = %task_id))]
    pub fn get_owned(&self, user_id: UserId, task_id: TaskId) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| get_owned_task(conn, user_id, task_id))
    }

    /// Apply a partial update. Only changed columns are written; an empty
    /// patch returns the task unchanged.
    #[instrument(skip(self, patch), fields(user_id = %user_id, task_id = %task_id))]
    pub fn update(
        &self,
        user_id: UserId,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let row = get_owned_task(conn, user_id, task_id)?;
            let now = Utc::now().to_rfc3339();
            let (updated, changed) = apply_patch(&row, patch, &now);
            if changed.is_empty() {
                return Ok(row);
            }

            let mut sets: Vec<String> = Vec::new();
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            for column in &changed {
                params.push(match *column {
                    "title" => Box::new(updated.title.clone()),
                    "is_completed" => Box::new(updated.is_completed),
                    "completed_at" => Box::new(updated.completed_at.clone()),
                    "is_important" => Box::new(updated.is_important),
                    "updated_at" => Box::new(updated.updated_at.clone()),
                    other => {
                        return Err(StoreError::Database(format!(
                            "unexpected patch column: {other}"
                        )))
                    }
                });
                sets.push(format!("{} = ?{}", column, params.len()));
            }
            params.push(Box::new(task_id.as_i64()));
            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ?{}",
                sets.join(", "),
                params.len()
            );

            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            conn.execute(&sql, param_refs.as_slice())?;

            Ok(updated)
        })
    }

    /// Delete a task. Position gaps left behind are never compacted.
    #[instrument(skip(self), fields(user_id = %user_id, task_id = %task_id))]
    pub fn delete(&self, user_id: UserId, task_id: TaskId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![task_id.as_i64(), user_id.as_i64()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {task_id}")));
            }
            Ok(())
        })
    }

    /// Overwrite positions for a list in a single transaction.
    ///
    /// Every pair is validated against the caller and the target list
    /// before any write; one bad pair rolls the whole batch back.
    /// Returns the list's tasks in their new order.
    #[instrument(skip(self, items), fields(user_id = %user_id, list_id = %list_id, count = items.len()))]
    pub fn reorder(
        &self,
        user_id: UserId,
        list_id: ListId,
        items: &[ReorderItem],
    ) -> Result<Vec<TaskRow>, StoreError> {
        self.db.with_tx(|tx| {
            get_owned_list(tx, user_id, list_id)?;

            for item in items {
                let owned: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1 AND list_id = ?2 AND user_id = ?3)",
                    rusqlite::params![item.id.as_i64(), list_id.as_i64(), user_id.as_i64()],
                    |row| row.get(0),
                )?;
                if !owned {
                    return Err(StoreError::NotFound(format!("task {}", item.id)));
                }
            }

            let now = Utc::now().to_rfc3339();
            for item in items {
                tx.execute(
                    "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![item.position, now, item.id.as_i64()],
                )?;
            }

            tasks_by_position(tx, list_id)
        })
    }

    /// Important tasks across all of a user's lists, newest first.
    /// Position is meaningless across lists, so creation time orders the
    /// view instead.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn important_for_user(&self, user_id: UserId) -> Result<Vec<ImportantTaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.list_id, t.user_id, t.title, t.is_completed, t.is_important,
                        t.position, t.completed_at, t.created_at, t.updated_at, l.name
                 FROM tasks t
                 JOIN lists l ON l.id = t.list_id
                 WHERE t.user_id = ?1 AND t.is_important = 1
                 ORDER BY t.created_at DESC, t.id DESC",
            )?;
            let mut rows = stmt.query([user_id.as_i64()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(ImportantTaskRow {
                    task: row_to_task(row)?,
                    list_name: row_helpers::get(row, 10, "lists", "name")?,
                });
            }
            Ok(results)
        })
    }
}

fn tasks_by_position(
    conn: &rusqlite::Connection,
    list_id: ListId,
) -> Result<Vec<TaskRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, list_id, user_id, title, is_completed, is_important,
                position, completed_at, created_at, updated_at
         FROM tasks WHERE list_id = ?1
         ORDER BY position ASC",
    )?;
    let mut rows = stmt.query([list_id.as_i64()])?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(row_to_task(row)?);
    }
    Ok(results)
}

fn get_owned_task(
    conn: &rusqlite::Connection,
    user_id: UserId,
    task_id: TaskId,
) -> Result<TaskRow, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, list_id, user_id, title, is_completed, is_important,
                position, completed_at, created_at, updated_at
         FROM tasks WHERE id = ?1 AND user_id = ?2",
    )?;
    let mut rows = stmt.query([task_id.as_i64(), user_id.as_i64()])?;
    match rows.next()? {
        Some(row) => row_to_task(row),
        None => Err(StoreError::NotFound(format!("task {task_id}"))),
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<TaskRow, StoreError> {
    Ok(TaskRow {
        id: TaskId::from_raw(row_helpers::get(row, 0, "tasks", "id")?),
        list_id: ListId::from_raw(row_helpers::get(row, 1, "tasks", "list_id")?),
        user_id: UserId::from_raw(row_helpers::get(row, 2, "tasks", "user_id")?),
        title: row_helpers::get(row, 3, "tasks", "title")?,
        is_completed: row_helpers::get(row, 4, "tasks", "is_completed")?,
        is_important: row_helpers::get(row, 5, "tasks", "is_important")?,
        position: row_helpers::get(row, 6, "tasks", "position")?,
        completed_at: row_helpers::get_opt(row, 7, "tasks", "completed_at")?,
        created_at: row_helpers::get(row, 8, "tasks", "created_at")?,
        updated_at: row_helpers::get(row, 9, "tasks", "updated_at")?,
    })
}
