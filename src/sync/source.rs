//! Source of contact rows for the import job.

use std::path::Path;

use async_trait::async_trait;
use libsql::Connection;
use tracing::warn;

use crate::error::SyncError;

/// One row from the source system. Phone or email may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub external_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Anything that can produce the rows to import.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>, SyncError>;
}

/// Runs a configured query against a libSQL database. The query must return
/// `(external_id, phone, email)` columns in that order.
pub struct SqlContactSource {
    /// Keeps a file-backed database alive for the connection's lifetime.
    _db: Option<libsql::Database>,
    conn: Connection,
    sql: String,
}

impl SqlContactSource {
    pub async fn open(path: &Path, sql: impl Into<String>) -> Result<Self, SyncError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SyncError::Source(format!("failed to open {}: {e}", path.display())))?;
        let conn = db
            .connect()
            .map_err(|e| SyncError::Source(format!("failed to connect: {e}")))?;
        Ok(Self {
            _db: Some(db),
            conn,
            sql: sql.into(),
        })
    }

    pub fn from_connection(conn: Connection, sql: impl Into<String>) -> Self {
        Self {
            _db: None,
            conn,
            sql: sql.into(),
        }
    }
}

#[async_trait]
impl ContactSource for SqlContactSource {
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>, SyncError> {
        let mut rows = self
            .conn
            .query(&self.sql, ())
            .await
            .map_err(|e| SyncError::Source(e.to_string()))?;

        let mut records = Vec::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(SyncError::Source(e.to_string())),
            };
            match row.get::<String>(0) {
                Ok(external_id) => records.push(SourceRecord {
                    external_id,
                    phone: row.get(1).ok(),
                    email: row.get(2).ok(),
                }),
                Err(e) => warn!(error = %e, "Skipping source row without an external id"),
            }
        }
        Ok(records)
    }
}
