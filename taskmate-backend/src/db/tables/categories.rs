use rusqlite::{params, OptionalExtension};

use crate::db::{Database, DbResult};
use crate::models::Category;

impl Database {
    pub fn list_categories(&self, user_id: i64) -> DbResult<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT category_id, user_id, name, color FROM categories WHERE user_id = ?1 ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(Category {
                    category_id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create_category(&self, user_id: i64, name: &str, color: Option<&str>) -> DbResult<Category> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (user_id, name, color) VALUES (?1, ?2, ?3)",
            params![user_id, name, color],
        )?;
        Ok(Category {
            category_id: conn.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            color: color.map(String::from),
        })
    }

    /// Whether `category_id` exists and belongs to the user
    pub fn owns_category(&self, user_id: i64, category_id: i64) -> DbResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM categories WHERE category_id = ?1 AND user_id = ?2",
                params![category_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Tasks pointing at the category keep their text category; the FK nulls `category_id`.
    pub fn delete_category(&self, user_id: i64, category_id: i64) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM categories WHERE category_id = ?1 AND user_id = ?2",
            params![category_id, user_id],
        )?;
        Ok(removed > 0)
    }
}
