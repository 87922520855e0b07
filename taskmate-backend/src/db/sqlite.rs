use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Current time in the format every timestamp column uses
pub fn now_str() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

const TABLES_IN_DROP_ORDER: &[&str] = &[
    "auth_sessions",
    "email_summaries",
    "assignment_metadata",
    "tasks",
    "categories",
    "composio_connections",
    "integrations",
    "identities",
    "users",
];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE,
    email_verified INTEGER NOT NULL DEFAULT 0,
    username TEXT UNIQUE,
    first_name TEXT,
    avatar_url TEXT,
    password_hash TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    last_login_at TEXT
);

CREATE TRIGGER IF NOT EXISTS users_set_timestamp
AFTER UPDATE ON users
FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE users SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
    WHERE user_id = NEW.user_id;
END;

CREATE TABLE IF NOT EXISTS identities (
    identity_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    provider_user_id TEXT NOT NULL,
    provider_username TEXT,
    avatar_url TEXT,
    access_token_encrypted TEXT,
    refresh_token_encrypted TEXT,
    token_expires_at TEXT,
    scopes TEXT,
    profile_json TEXT,
    linked_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (provider, provider_user_id)
);

CREATE TABLE IF NOT EXISTS integrations (
    integration_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    service_name TEXT NOT NULL,
    auth_token TEXT,
    last_synced_at TEXT,
    UNIQUE (user_id, service_name)
);

CREATE TABLE IF NOT EXISTS composio_connections (
    connection_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    composio_account_id TEXT NOT NULL UNIQUE,
    service_name TEXT NOT NULL,
    external_user_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (user_id, service_name)
);

CREATE TABLE IF NOT EXISTS categories (
    category_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    color TEXT
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    category_id INTEGER REFERENCES categories(category_id) ON DELETE SET NULL,
    category TEXT,
    title TEXT NOT NULL,
    description TEXT,
    due_date TEXT,
    due_time TEXT,
    has_no_due_date INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    source TEXT,
    source_id TEXT,
    synced_to_google INTEGER NOT NULL DEFAULT 0,
    google_event_id TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_tasks_user_due ON tasks(user_id, due_date);

CREATE TABLE IF NOT EXISTS assignment_metadata (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    assignment_id TEXT NOT NULL,
    priority TEXT,
    estimated_hours REAL,
    status TEXT,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (user_id, assignment_id)
);

CREATE TABLE IF NOT EXISTS email_summaries (
    email_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    original_email_id TEXT NOT NULL,
    sender TEXT,
    subject TEXT,
    summary_text TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'normal',
    category TEXT NOT NULL DEFAULT 'Other',
    received_at TEXT,
    UNIQUE (user_id, original_email_id)
);

CREATE TABLE IF NOT EXISTS auth_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_auth_sessions_expires ON auth_sessions(expires_at);
"#;

/// Connection pool plus schema management. Table operations live in `db::tables`.
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) the database at `path`. `:memory:` gives a
    /// private single-connection database.
    pub fn new(path: &str) -> DbResult<Self> {
        let pool = if path == ":memory:" {
            let manager = SqliteConnectionManager::memory()
                .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(1).build(manager)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let manager = SqliteConnectionManager::file(path).with_init(|c| {
                c.execute_batch(
                    "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;",
                )
            });
            Pool::builder().max_size(8).build(manager)?
        };

        let db = Self { pool };
        db.init()?;
        log::info!("[DB] Opened database at {}", path);
        Ok(db)
    }

    pub fn conn(&self) -> DbResult<DbConn> {
        Ok(self.pool.get()?)
    }

    fn init(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Drop every table and recreate the schema
    pub fn reset(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        for table in TABLES_IN_DROP_ORDER {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
            log::info!("[DB] Dropped table {}", table);
        }
        conn.execute_batch("DROP TRIGGER IF EXISTS users_set_timestamp;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("[DB] Schema recreated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_all_tables() {
        let db = Database::new(":memory:").unwrap();
        let conn = db.conn().unwrap();
        for table in TABLES_IN_DROP_ORDER {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::new(":memory:").unwrap();
        let conn = db.conn().unwrap();
        let result = conn.execute(
            "INSERT INTO tasks (user_id, title) VALUES (999, 'orphan')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reset_clears_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskmate.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        db.conn()
            .unwrap()
            .execute("INSERT INTO users (username) VALUES ('ada')", [])
            .unwrap();
        db.reset().unwrap();
        let count: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_updated_at_trigger() {
        let db = Database::new(":memory:").unwrap();
        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT INTO users (username, updated_at) VALUES ('ada', '2000-01-01T00:00:00.000Z')",
            [],
        )
        .unwrap();
        conn.execute("UPDATE users SET first_name = 'Ada' WHERE username = 'ada'", [])
            .unwrap();
        let updated: String = conn
            .query_row("SELECT updated_at FROM users WHERE username = 'ada'", [], |row| row.get(0))
            .unwrap();
        assert_ne!(updated, "2000-01-01T00:00:00.000Z");
    }
}
