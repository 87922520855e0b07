//! Mapping between local users and Composio connected accounts

use rusqlite::{params, OptionalExtension, Row};

use crate::db::{now_str, Database, DbResult};
use crate::models::ComposioConnection;

fn row_to_connection(row: &Row) -> rusqlite::Result<ComposioConnection> {
    Ok(ComposioConnection {
        connection_id: row.get(0)?,
        user_id: row.get(1)?,
        composio_account_id: row.get(2)?,
        service_name: row.get(3)?,
        external_user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// Store a connected account. Re-linking the same account moves it; a new
    /// account for a service the user already has replaces the old row.
    pub fn upsert_connection(
        &self,
        user_id: i64,
        composio_account_id: &str,
        service_name: &str,
        external_user_id: &str,
    ) -> DbResult<ComposioConnection> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM composio_connections WHERE user_id = ?1 AND service_name = ?2 AND composio_account_id <> ?3",
            params![user_id, service_name, composio_account_id],
        )?;
        tx.execute(
            "INSERT INTO composio_connections (user_id, composio_account_id, service_name, external_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(composio_account_id) DO UPDATE SET
                user_id = excluded.user_id,
                service_name = excluded.service_name,
                external_user_id = excluded.external_user_id",
            params![user_id, composio_account_id, service_name, external_user_id, now_str()],
        )?;
        let stored = tx.query_row(
            "SELECT connection_id, user_id, composio_account_id, service_name, external_user_id, created_at
             FROM composio_connections WHERE composio_account_id = ?1",
            [composio_account_id],
            row_to_connection,
        )?;
        tx.commit()?;
        Ok(stored)
    }

    pub fn list_connections(&self, user_id: i64) -> DbResult<Vec<ComposioConnection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT connection_id, user_id, composio_account_id, service_name, external_user_id, created_at
             FROM composio_connections WHERE user_id = ?1 ORDER BY connection_id",
        )?;
        let rows = stmt
            .query_map([user_id], row_to_connection)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_connection_for_service(
        &self,
        user_id: i64,
        service_name: &str,
    ) -> DbResult<Option<ComposioConnection>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT connection_id, user_id, composio_account_id, service_name, external_user_id, created_at
                 FROM composio_connections WHERE user_id = ?1 AND service_name = ?2",
                params![user_id, service_name],
                row_to_connection,
            )
            .optional()?;
        Ok(row)
    }

    /// Remove the local mapping for an account. Returns whether a row existed.
    pub fn delete_connection(&self, user_id: i64, composio_account_id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM composio_connections WHERE user_id = ?1 AND composio_account_id = ?2",
            params![user_id, composio_account_id],
        )?;
        Ok(removed > 0)
    }
}
