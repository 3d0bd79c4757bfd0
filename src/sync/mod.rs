//! Contact import job — pulls password-reset contact methods from the
//! source system and upserts them keyed by PSU UUID.
//!
//! The job is sequential and idempotent. A failure on one record is logged
//! and counted; it never stops the batch.

pub mod resolver;
pub mod source;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::accounts::{ContactInformation, UpsertOutcome};
use crate::error::SyncError;
use crate::store::Database;

pub use resolver::{HttpIdentityResolver, IdentityResolver};
pub use source::{ContactSource, SourceRecord, SqlContactSource};

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Upserted {
        account_id: String,
        outcome: UpsertOutcome,
    },
    /// The resolver knows no account for the external id.
    NoAccount,
}

pub struct ContactImportJob {
    source: Arc<dyn ContactSource>,
    resolver: Arc<dyn IdentityResolver>,
    db: Arc<dyn Database>,
}

impl ContactImportJob {
    pub fn new(
        source: Arc<dyn ContactSource>,
        resolver: Arc<dyn IdentityResolver>,
        db: Arc<dyn Database>,
    ) -> Self {
        Self {
            source,
            resolver,
            db,
        }
    }

    /// Import every source record. Only a failure to read the source itself
    /// is returned as an error.
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let records = self.source.fetch_records().await?;
        info!(records = records.len(), "Starting contact import");

        let mut summary = SyncSummary::default();
        for record in &records {
            match self.import_record(record).await {
                Ok(RecordOutcome::Upserted {
                    account_id,
                    outcome,
                }) => {
                    info!(account_id = %account_id, "{outcome} record");
                    match outcome {
                        UpsertOutcome::Created => summary.created += 1,
                        UpsertOutcome::Updated => summary.updated += 1,
                    }
                }
                Ok(RecordOutcome::NoAccount) => {
                    info!(
                        external_id = %record.external_id,
                        "No PSU_UUID was available"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(
                        external_id = %record.external_id,
                        cell_phone = record.phone.as_deref(),
                        email = record.email.as_deref(),
                        error = %e,
                        "Contact import failed for record"
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.failed > 0 {
            warn!(failed = summary.failed, "Contact import finished with failures");
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Contact import complete"
        );
        Ok(summary)
    }

    /// Resolve and upsert a single record.
    pub async fn import_record(&self, record: &SourceRecord) -> Result<RecordOutcome, SyncError> {
        let Some(account_id) = self.resolver.resolve(&record.external_id).await? else {
            return Ok(RecordOutcome::NoAccount);
        };

        let contact = ContactInformation {
            account_id: account_id.clone(),
            cell_phone: record.phone.clone(),
            alternate_email: record.email.clone(),
        };
        let outcome = self.db.upsert_contact(&contact).await?;
        Ok(RecordOutcome::Upserted {
            account_id,
            outcome,
        })
    }
}
