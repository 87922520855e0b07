//! Task CRUD. Every query is scoped by `user_id`.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::db::{now_str, Database, DbResult};
use crate::models::{NewTask, Task, TaskChanges};

const TASK_COLUMNS: &str = "task_id, user_id, category_id, category, title, description, due_date, \
                            due_time, has_no_due_date, status, priority, source, source_id, \
                            synced_to_google, google_event_id, created_at, updated_at";

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        task_id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        category: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        due_date: row.get(6)?,
        due_time: row.get(7)?,
        has_no_due_date: row.get(8)?,
        status: row.get(9)?,
        priority: row.get(10)?,
        source: row.get(11)?,
        source_id: row.get(12)?,
        synced_to_google: row.get(13)?,
        google_event_id: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn opt_text(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

impl Database {
    pub fn create_task(&self, user_id: i64, task: &NewTask) -> DbResult<Task> {
        let conn = self.conn()?;
        let now = now_str();
        conn.execute(
            "INSERT INTO tasks (user_id, category_id, category, title, description, due_date, due_time, has_no_due_date, priority, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'manual', ?10, ?10)",
            params![
                user_id,
                task.category_id,
                task.category,
                task.title,
                task.description,
                task.due_date,
                task.due_time,
                task.has_no_due_date,
                task.priority.as_ref(),
                now
            ],
        )?;
        let task_id = conn.last_insert_rowid();
        let task = conn.query_row(
            &format!("SELECT {} FROM tasks WHERE task_id = ?1", TASK_COLUMNS),
            [task_id],
            row_to_task,
        )?;
        Ok(task)
    }

    /// Ordered by due date, undated tasks last
    pub fn list_tasks(&self, user_id: i64) -> DbResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 ORDER BY due_date IS NULL, due_date ASC, task_id ASC",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map([user_id], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Tasks due in `[from, to]`, both in the stored `YYYY-MM-DD HH:MM:SS` format
    pub fn list_tasks_due_between(&self, user_id: i64, from: &str, to: &str) -> DbResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 AND due_date IS NOT NULL AND due_date >= ?2 AND due_date <= ?3
             ORDER BY due_date ASC",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![user_id, from, to], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, user_id: i64, task_id: i64) -> DbResult<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE task_id = ?1 AND user_id = ?2", TASK_COLUMNS),
                params![task_id, user_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Apply a partial update; `None` when the task does not exist for this user
    pub fn update_task(&self, user_id: i64, task_id: i64, changes: &TaskChanges) -> DbResult<Option<Task>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &changes.title {
            sets.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(description) = &changes.description {
            sets.push("description = ?");
            values.push(Value::Text(description.clone()));
        }
        if let Some(category) = &changes.category {
            sets.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(category_id) = changes.category_id {
            sets.push("category_id = ?");
            values.push(Value::Integer(category_id));
        }
        if let Some(priority) = changes.priority {
            sets.push("priority = ?");
            values.push(Value::Text(priority.as_ref().to_string()));
        }
        if let Some(status) = changes.status {
            sets.push("status = ?");
            values.push(Value::Text(status.as_db_str().to_string()));
        }
        if let Some(flag) = changes.has_no_due_date {
            sets.push("has_no_due_date = ?");
            values.push(Value::Integer(flag as i64));
        }
        if let Some(due) = &changes.due_date {
            sets.push("due_date = ?");
            values.push(opt_text(due.clone()));
        }
        if let Some(time) = &changes.due_time {
            sets.push("due_time = ?");
            values.push(opt_text(time.clone()));
        }
        sets.push("updated_at = ?");
        values.push(Value::Text(now_str()));
        values.push(Value::Integer(task_id));
        values.push(Value::Integer(user_id));

        let conn = self.conn()?;
        let updated = conn.execute(
            &format!(
                "UPDATE tasks SET {} WHERE task_id = ? AND user_id = ?",
                sets.join(", ")
            ),
            params_from_iter(values),
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let task = conn.query_row(
            &format!("SELECT {} FROM tasks WHERE task_id = ?1", TASK_COLUMNS),
            [task_id],
            row_to_task,
        )?;
        Ok(Some(task))
    }

    pub fn mark_task_synced(&self, task_id: i64, google_event_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tasks SET synced_to_google = 1, google_event_id = ?1 WHERE task_id = ?2",
            params![google_event_id, task_id],
        )?;
        Ok(())
    }

    pub fn delete_task(&self, user_id: i64, task_id: i64) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM tasks WHERE task_id = ?1 AND user_id = ?2",
            params![task_id, user_id],
        )?;
        Ok(removed > 0)
    }
}
