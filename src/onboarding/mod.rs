//! Onboarding — the fixed sequence of steps a newly provisioned account
//! walks through before reaching the action picker.

pub mod state;

pub use state::{Destination, ProvisioningStatus};
