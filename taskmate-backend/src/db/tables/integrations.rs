//! Per-service sync bookkeeping

use std::collections::HashMap;

use rusqlite::params;

use crate::db::{now_str, Database, DbResult};

impl Database {
    /// Stamp `last_synced_at` for a service, creating the row on first sync
    pub fn touch_integration(&self, user_id: i64, service_name: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO integrations (user_id, service_name, last_synced_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, service_name) DO UPDATE SET last_synced_at = excluded.last_synced_at",
            params![user_id, service_name, now_str()],
        )?;
        Ok(())
    }

    /// service_name -> last_synced_at
    pub fn last_synced_by_service(&self, user_id: i64) -> DbResult<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT service_name, last_synced_at FROM integrations WHERE user_id = ?1 AND last_synced_at IS NOT NULL",
        )?;
        let map = stmt
            .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }
}
