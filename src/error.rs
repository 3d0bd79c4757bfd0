//! Error types for MyInfo.

use std::time::Duration;

/// Top-level error type for the portal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Password hashing and verification errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored credential for account {account_id} is malformed")]
    MalformedHash { account_id: String },
}

/// Per-record failures of the contact import job.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Identity resolution for {external_id} failed: {reason}")]
    Resolution { external_id: String, reason: String },

    #[error("Identity resolution for {external_id} timed out after {timeout:?}")]
    Timeout {
        external_id: String,
        timeout: Duration,
    },

    #[error("Unexpected resolver response for {external_id}: {reason}")]
    InvalidResponse { external_id: String, reason: String },

    #[error("Source query failed: {0}")]
    Source(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias for the portal.
pub type Result<T> = std::result::Result<T, Error>;
