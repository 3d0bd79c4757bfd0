//! Accounts and the profile data attached to them.

pub mod credentials;
pub mod model;

pub use model::{
    Account, ContactInformation, DirectoryInformation, MaintenanceNotice, UpsertOutcome,
};
