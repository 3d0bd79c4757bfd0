//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::accounts::{
    Account, ContactInformation, DirectoryInformation, MaintenanceNotice, UpsertOutcome,
};
use crate::error::DatabaseError;
use crate::onboarding::ProvisioningStatus;
use crate::store::migrations;
use crate::store::traits::{Database, StoredSession};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
/// Fixed-width UTC timestamp, so session ages compare correctly as text.
fn session_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, psu_id, password_hash, provisioning_status, directory_published";

const DIRECTORY_COLUMNS: &str =
    "account_id, company, job_title, department, telephone, office_building, office_room";

/// Map a libsql Row to an Account. Column order matches ACCOUNT_COLUMNS.
fn row_to_account(row: &libsql::Row) -> Result<Account, libsql::Error> {
    let status_str: String = row.get(4)?;
    let published: i64 = row.get(5)?;
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        psu_id: row.get(2)?,
        password_hash: row.get(3)?,
        provisioning_status: status_str
            .parse()
            .unwrap_or(ProvisioningStatus::NeedsPassword),
        directory_published: published != 0,
    })
}

/// Map a libsql Row to DirectoryInformation. Column order matches DIRECTORY_COLUMNS.
fn row_to_directory(row: &libsql::Row) -> Result<DirectoryInformation, libsql::Error> {
    Ok(DirectoryInformation {
        account_id: row.get(0)?,
        company: row.get(1)?,
        job_title: row.get(2).ok(),
        department: row.get(3).ok(),
        telephone: row.get(4).ok(),
        office_building: row.get(5).ok(),
        office_room: row.get(6).ok(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Accounts ────────────────────────────────────────────────────

    async fn upsert_account(&self, account: &Account) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO accounts (id, username, psu_id, password_hash, provisioning_status, directory_published, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (id) DO UPDATE SET username = ?2, psu_id = ?3, password_hash = ?4,
                     provisioning_status = ?5, directory_published = ?6, updated_at = ?7",
                params![
                    account.id.as_str(),
                    account.username.as_str(),
                    account.psu_id.as_str(),
                    account.password_hash.as_str(),
                    account.provisioning_status.to_string(),
                    account.directory_published as i64,
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_account: {e}")))?;

        debug!(account_id = %account.id, "Account upserted");
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_account: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_account(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_account row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_account: {e}"))),
        }
    }

    async fn find_account_by_login(&self, login: &str) -> Result<Option<Account>, DatabaseError> {
        let login = login.trim().to_lowercase();
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE lower(username) = ?1 OR psu_id = ?1"
                ),
                params![login],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_account_by_login: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_account(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("find_account_by_login row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_account_by_login: {e}"))),
        }
    }

    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE accounts SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
                params![hash, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_password_hash: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "account".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_provisioning_status(
        &self,
        id: &str,
        status: ProvisioningStatus,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE accounts SET provisioning_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_provisioning_status: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "account".to_string(),
                id: id.to_string(),
            });
        }
        debug!(account_id = %id, status = %status, "Provisioning status updated");
        Ok(())
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(&self, session: &StoredSession) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sessions (token, account_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    session.token.as_str(),
                    session.account_id.as_str(),
                    session_timestamp(session.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_session: {e}")))?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT token, account_id, created_at FROM sessions WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let parse = |row: &libsql::Row| -> Result<StoredSession, libsql::Error> {
                    let created: String = row.get(2)?;
                    Ok(StoredSession {
                        token: row.get(0)?,
                        account_id: row.get(1)?,
                        created_at: parse_datetime(&created),
                    })
                };
                parse(&row)
                    .map(Some)
                    .map_err(|e| DatabaseError::Query(format!("get_session row parse: {e}")))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(count > 0)
    }

    async fn delete_other_sessions(
        &self,
        account_id: &str,
        keep_token: &str,
    ) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE account_id = ?1 AND token != ?2",
                params![account_id, keep_token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_other_sessions: {e}")))?;
        Ok(count as usize)
    }

    async fn delete_expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE created_at < ?1",
                params![session_timestamp(cutoff)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_expired_sessions: {e}")))?;
        Ok(count as usize)
    }

    // ── Contact information ─────────────────────────────────────────

    async fn get_contact(
        &self,
        account_id: &str,
    ) -> Result<Option<ContactInformation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT account_id, cell_phone, alternate_email FROM contact_information WHERE account_id = ?1",
                params![account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_contact: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let account_id: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_contact row parse: {e}")))?;
                Ok(Some(ContactInformation {
                    account_id,
                    cell_phone: row.get(1).ok(),
                    alternate_email: row.get(2).ok(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_contact: {e}"))),
        }
    }

    async fn upsert_contact(
        &self,
        contact: &ContactInformation,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        let inserted = conn
            .execute(
                "INSERT INTO contact_information (account_id, cell_phone, alternate_email, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (account_id) DO NOTHING",
                params![
                    contact.account_id.as_str(),
                    opt_text(contact.cell_phone.as_deref()),
                    opt_text(contact.alternate_email.as_deref()),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_contact insert: {e}")))?;

        if inserted > 0 {
            debug!(account_id = %contact.account_id, "Contact information created");
            return Ok(UpsertOutcome::Created);
        }

        conn.execute(
            "UPDATE contact_information SET cell_phone = ?1, alternate_email = ?2, updated_at = ?3
             WHERE account_id = ?4",
            params![
                opt_text(contact.cell_phone.as_deref()),
                opt_text(contact.alternate_email.as_deref()),
                now.as_str(),
                contact.account_id.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_contact update: {e}")))?;

        debug!(account_id = %contact.account_id, "Contact information updated");
        Ok(UpsertOutcome::Updated)
    }

    // ── Directory information ───────────────────────────────────────

    async fn get_directory(
        &self,
        account_id: &str,
    ) -> Result<Option<DirectoryInformation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {DIRECTORY_COLUMNS} FROM directory_information WHERE account_id = ?1"
                ),
                params![account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_directory: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_directory(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_directory row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_directory: {e}"))),
        }
    }

    async fn upsert_directory(
        &self,
        info: &DirectoryInformation,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let conn = self.conn();
        let existed = self.get_directory(&info.account_id).await?.is_some();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO directory_information (account_id, company, job_title, department, telephone, office_building, office_room, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (account_id) DO UPDATE SET company = ?2, job_title = ?3, department = ?4,
                 telephone = ?5, office_building = ?6, office_room = ?7, updated_at = ?8",
            params![
                info.account_id.as_str(),
                info.company.as_str(),
                opt_text(info.job_title.as_deref()),
                opt_text(info.department.as_deref()),
                opt_text(info.telephone.as_deref()),
                opt_text(info.office_building.as_deref()),
                opt_text(info.office_room.as_deref()),
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_directory: {e}")))?;

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    // ── Departments ─────────────────────────────────────────────────

    async fn add_department(&self, name: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO departments (name) VALUES (?1)",
                params![name],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_department: {e}")))?;
        Ok(())
    }

    async fn list_departments(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT name FROM departments ORDER BY name", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_departments: {e}")))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_departments: {e}")))?
        {
            let name = row
                .get::<String>(0)
                .map_err(|e| DatabaseError::Query(format!("list_departments row parse: {e}")))?;
            names.push(name);
        }
        Ok(names)
    }

    async fn count_departments(&self) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM departments", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_departments: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_departments: {e}"))),
        }
    }

    async fn clear_departments(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM departments", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_departments: {e}")))?;
        Ok(count as usize)
    }

    // ── Maintenance notices ─────────────────────────────────────────

    async fn insert_notice(&self, notice: &MaintenanceNotice) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO maintenance_notices (id, message, start_display, end_display)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    notice.id.as_str(),
                    notice.message.as_str(),
                    notice.start_display.to_rfc3339(),
                    notice.end_display.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_notice: {e}")))?;
        Ok(())
    }

    async fn active_notices(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceNotice>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, message, start_display, end_display FROM maintenance_notices",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("active_notices: {e}")))?;

        // Timestamps are compared after parsing; stored RFC 3339 strings do
        // not sort lexically once fractional seconds vary in length.
        let mut notices = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("active_notices: {e}")))?
        {
            let parsed = (|| -> Result<MaintenanceNotice, libsql::Error> {
                let start: String = row.get(2)?;
                let end: String = row.get(3)?;
                Ok(MaintenanceNotice {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    start_display: parse_datetime(&start),
                    end_display: parse_datetime(&end),
                })
            })();
            let notice =
                parsed.map_err(|e| DatabaseError::Query(format!("active_notices row parse: {e}")))?;
            if notice.is_visible_at(now) {
                notices.push(notice);
            }
        }
        notices.sort_by_key(|n| n.start_display);
        Ok(notices)
    }
}
