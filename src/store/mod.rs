//! Persistence layer — libSQL-backed storage for accounts, sessions and
//! profile data.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, StoredSession};
