//! Users and their linked OAuth identities

use rusqlite::{params, OptionalExtension, Row};

use crate::db::{now_str, Database, DbResult};
use crate::models::{GithubProfile, Identity, User};

const USER_COLUMNS: &str = "user_id, email, email_verified, username, first_name, avatar_url, \
                            created_at, updated_at, last_login_at";

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        email: row.get(1)?,
        email_verified: row.get(2)?,
        username: row.get(3)?,
        first_name: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        last_login_at: row.get(8)?,
    })
}

impl Database {
    pub fn get_user(&self, user_id: i64) -> DbResult<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
                [user_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Record a GitHub login. An existing identity gets a fresh token and
    /// login time; otherwise a new user and identity are created.
    pub fn upsert_github_user(
        &self,
        profile: &GithubProfile,
        access_token: &str,
        scopes: Option<&str>,
    ) -> DbResult<User> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_str();
        let provider_user_id = profile.id.to_string();

        let existing: Option<(i64, i64)> = tx
            .query_row(
                "SELECT identity_id, user_id FROM identities WHERE provider = 'github' AND provider_user_id = ?1",
                [&provider_user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let user_id = match existing {
            Some((identity_id, user_id)) => {
                tx.execute(
                    "UPDATE identities SET access_token_encrypted = ?1, linked_at = ?2, avatar_url = ?3, provider_username = ?4 WHERE identity_id = ?5",
                    params![access_token, now, profile.avatar_url, profile.login, identity_id],
                )?;
                tx.execute(
                    "UPDATE users SET last_login_at = ?1 WHERE user_id = ?2",
                    params![now, user_id],
                )?;
                user_id
            }
            None => {
                let taken: bool = tx
                    .query_row(
                        "SELECT COUNT(*) FROM users WHERE username = ?1",
                        [&profile.login],
                        |row| row.get::<_, i64>(0),
                    )
                    .map(|c| c > 0)?;
                let username = if taken {
                    format!("{}-{}", profile.login, profile.id)
                } else {
                    profile.login.clone()
                };

                tx.execute(
                    "INSERT INTO users (username, first_name, avatar_url, created_at, updated_at, last_login_at) VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
                    params![username, profile.name, profile.avatar_url, now],
                )?;
                let user_id = tx.last_insert_rowid();

                let profile_json = serde_json::to_string(profile).unwrap_or_default();
                tx.execute(
                    "INSERT INTO identities (user_id, provider, provider_user_id, provider_username, avatar_url, access_token_encrypted, scopes, profile_json, linked_at) VALUES (?1, 'github', ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        user_id,
                        provider_user_id,
                        profile.login,
                        profile.avatar_url,
                        access_token,
                        scopes,
                        profile_json,
                        now
                    ],
                )?;
                log::info!("[Auth] Created user {} for GitHub account {}", user_id, profile.login);
                user_id
            }
        };

        let user = tx.query_row(
            &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
            [user_id],
            row_to_user,
        )?;
        tx.commit()?;
        Ok(user)
    }

    pub fn list_identities(&self, user_id: i64) -> DbResult<Vec<Identity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT identity_id, user_id, provider, provider_user_id, provider_username, avatar_url, scopes, linked_at
             FROM identities WHERE user_id = ?1 ORDER BY identity_id",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(Identity {
                    identity_id: row.get(0)?,
                    user_id: row.get(1)?,
                    provider: row.get(2)?,
                    provider_user_id: row.get(3)?,
                    provider_username: row.get(4)?,
                    avatar_url: row.get(5)?,
                    scopes: row.get(6)?,
                    linked_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
