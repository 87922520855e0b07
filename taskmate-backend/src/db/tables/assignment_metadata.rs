use std::collections::HashMap;

use rusqlite::params;

use crate::db::{now_str, Database, DbResult};
use crate::models::{AssignmentMetadata, ValidatedMetadata};

impl Database {
    /// assignment_id -> metadata for one user
    pub fn assignment_metadata_map(&self, user_id: i64) -> DbResult<HashMap<String, AssignmentMetadata>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, assignment_id, priority, estimated_hours, status, updated_at
             FROM assignment_metadata WHERE user_id = ?1",
        )?;
        let map = stmt
            .query_map([user_id], |row| {
                Ok(AssignmentMetadata {
                    user_id: row.get(0)?,
                    assignment_id: row.get(1)?,
                    priority: row.get(2)?,
                    estimated_hours: row.get(3)?,
                    status: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .map(|r| r.map(|m| (m.assignment_id.clone(), m)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    /// Insert or merge; fields left as `None` keep their stored value
    pub fn upsert_assignment_metadata(
        &self,
        user_id: i64,
        assignment_id: &str,
        update: &ValidatedMetadata,
    ) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO assignment_metadata (user_id, assignment_id, priority, estimated_hours, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, assignment_id) DO UPDATE SET
                priority = COALESCE(excluded.priority, assignment_metadata.priority),
                estimated_hours = COALESCE(excluded.estimated_hours, assignment_metadata.estimated_hours),
                status = COALESCE(excluded.status, assignment_metadata.status),
                updated_at = excluded.updated_at",
            params![
                user_id,
                assignment_id,
                update.priority.map(|p| p.as_ref().to_string()),
                update.estimated_hours,
                update.status.map(|s| s.as_ref().to_string()),
                now_str()
            ],
        )?;
        Ok(())
    }
}
