//! Batch import of password-reset contact methods from the registration
//! system into the portal database.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use myinfo::config::{PortalConfig, SyncConfig};
use myinfo::store::{Database, LibSqlBackend};
use myinfo::sync::{ContactImportJob, HttpIdentityResolver, SqlContactSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = myinfo::logging::init("import-contacts");

    let portal = PortalConfig::from_env();
    let config = SyncConfig::from_env().context("incomplete import configuration")?;

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(Path::new(&portal.db_path))
            .await
            .with_context(|| format!("failed to open database at {}", portal.db_path))?,
    );
    let source = SqlContactSource::open(Path::new(&config.source_db_path), config.source_sql.clone())
        .await
        .context("failed to open contact source")?;
    let resolver = HttpIdentityResolver::from_config(&config)?;

    let job = ContactImportJob::new(Arc::new(source), Arc::new(resolver), db);
    let summary = job.run().await?;

    eprintln!(
        "Imported {} records: {} created, {} updated, {} skipped, {} failed",
        summary.total(),
        summary.created,
        summary.updated,
        summary.skipped,
        summary.failed
    );
    Ok(())
}
