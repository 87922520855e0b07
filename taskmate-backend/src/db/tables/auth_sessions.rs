//! Auth session database operations

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::db::{Database, DbResult};
use crate::models::Session;

/// Sessions slide forward by this much on every successful validation
pub const SESSION_TTL_HOURS: i64 = 24;

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Database {
    /// Create a new auth session for a logged-in user
    pub fn create_session(&self, user_id: i64) -> DbResult<Session> {
        let conn = self.conn()?;
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + Duration::hours(SESSION_TTL_HOURS);

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, ts(created_at), ts(expires_at)],
        )?;

        Ok(Session {
            id: conn.last_insert_rowid(),
            token,
            user_id,
            created_at,
            expires_at,
        })
    }

    /// Validate a session token and extend its expiry if valid
    pub fn validate_session(&self, token: &str) -> DbResult<Option<Session>> {
        let conn = self.conn()?;
        let now = Utc::now();

        let session = conn
            .query_row(
                "SELECT id, token, user_id, created_at, expires_at FROM auth_sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, ts(now)],
                |row| {
                    let created_at: String = row.get(3)?;
                    let expires_at: String = row.get(4)?;
                    Ok(Session {
                        id: row.get(0)?,
                        token: row.get(1)?,
                        user_id: row.get(2)?,
                        created_at: parse_ts(&created_at),
                        expires_at: parse_ts(&expires_at),
                    })
                },
            )
            .optional()?;

        // Keep active sessions alive
        let session = match session {
            Some(mut s) => {
                let new_expires = now + Duration::hours(SESSION_TTL_HOURS);
                conn.execute(
                    "UPDATE auth_sessions SET expires_at = ?1 WHERE id = ?2",
                    params![ts(new_expires), s.id],
                )?;
                s.expires_at = new_expires;
                Some(s)
            }
            None => None,
        };

        Ok(session)
    }

    /// Delete a session (logout)
    pub fn delete_session(&self, token: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows_affected = conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
        Ok(rows_affected > 0)
    }

    pub fn purge_expired_sessions(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?1",
            [ts(Utc::now())],
        )?;
        Ok(removed)
    }
}
