//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::accounts::{
    Account, ContactInformation, DirectoryInformation, MaintenanceNotice, UpsertOutcome,
};
use crate::error::DatabaseError;
use crate::onboarding::ProvisioningStatus;

/// A persisted login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering accounts, sessions and profile data.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Insert or replace an account record (identity-system provisioning).
    async fn upsert_account(&self, account: &Account) -> Result<(), DatabaseError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError>;

    /// Look up an account by Odin username or PSU ID number.
    async fn find_account_by_login(&self, login: &str) -> Result<Option<Account>, DatabaseError>;

    /// Replace the stored credential hash.
    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), DatabaseError>;

    async fn set_provisioning_status(
        &self,
        id: &str,
        status: ProvisioningStatus,
    ) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(&self, session: &StoredSession) -> Result<(), DatabaseError>;

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, DatabaseError>;

    /// Delete one session. Returns whether it existed.
    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError>;

    /// Delete every session of `account_id` except `keep_token`.
    /// Returns the number of sessions removed.
    async fn delete_other_sessions(
        &self,
        account_id: &str,
        keep_token: &str,
    ) -> Result<usize, DatabaseError>;

    /// Delete every session created before `cutoff`. Returns the number removed.
    async fn delete_expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError>;

    // ── Contact information ─────────────────────────────────────────

    async fn get_contact(&self, account_id: &str)
    -> Result<Option<ContactInformation>, DatabaseError>;

    /// Overwrite both contact fields for the account, creating the row if needed.
    async fn upsert_contact(
        &self,
        contact: &ContactInformation,
    ) -> Result<UpsertOutcome, DatabaseError>;

    // ── Directory information ───────────────────────────────────────

    async fn get_directory(
        &self,
        account_id: &str,
    ) -> Result<Option<DirectoryInformation>, DatabaseError>;

    async fn upsert_directory(
        &self,
        info: &DirectoryInformation,
    ) -> Result<UpsertOutcome, DatabaseError>;

    // ── Departments ─────────────────────────────────────────────────

    async fn add_department(&self, name: &str) -> Result<(), DatabaseError>;

    async fn list_departments(&self) -> Result<Vec<String>, DatabaseError>;

    async fn count_departments(&self) -> Result<i64, DatabaseError>;

    async fn clear_departments(&self) -> Result<usize, DatabaseError>;

    // ── Maintenance notices ─────────────────────────────────────────

    async fn insert_notice(&self, notice: &MaintenanceNotice) -> Result<(), DatabaseError>;

    /// Notices whose display window contains `now`.
    async fn active_notices(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceNotice>, DatabaseError>;
}
