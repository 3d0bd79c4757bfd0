//! Account and profile records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::onboarding::ProvisioningStatus;

/// A provisioned identity. Created by the identity system, never deleted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable PSU UUID.
    pub id: String,
    /// Odin username.
    pub username: String,
    /// Nine-digit PSU ID number.
    pub psu_id: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub provisioning_status: ProvisioningStatus,
    pub directory_published: bool,
}

impl Account {
    /// Status with the directory flag applied.
    pub fn effective_status(&self) -> ProvisioningStatus {
        self.provisioning_status.effective(self.directory_published)
    }
}

/// Contact methods used for password resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInformation {
    pub account_id: String,
    pub cell_phone: Option<String>,
    pub alternate_email: Option<String>,
}

impl ContactInformation {
    /// Whether at least one contact method is on file.
    pub fn has_contact_method(&self) -> bool {
        self.cell_phone.is_some() || self.alternate_email.is_some()
    }
}

/// Published directory attributes for employees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryInformation {
    #[serde(skip)]
    pub account_id: String,
    pub company: String,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub telephone: Option<String>,
    pub office_building: Option<String>,
    pub office_room: Option<String>,
}

/// A scheduled maintenance banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceNotice {
    pub id: String,
    pub message: String,
    pub start_display: DateTime<Utc>,
    pub end_display: DateTime<Utc>,
}

impl MaintenanceNotice {
    /// New notice with a generated id.
    pub fn new(message: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            start_display: start,
            end_display: end,
        }
    }

    /// Visible when `start_display <= now < end_display`.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.start_display <= now && now < self.end_display
    }
}

/// Outcome of an upsert keyed by account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Updated => write!(f, "Updated"),
        }
    }
}
