pub mod sqlite;
pub mod tables;

pub use sqlite::{now_str, Database, DbConn, DbError, DbResult};
