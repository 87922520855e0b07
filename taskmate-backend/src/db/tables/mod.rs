//! Table operations, one `impl Database` block per table or table group.

mod assignment_metadata;
mod auth_sessions;
mod categories;
mod composio_connections;
mod email_summaries;
mod integrations;
mod tasks;
mod users;

pub use auth_sessions::SESSION_TTL_HOURS;
