//! MyInfo — university identity self-service portal.
//!
//! Account claiming, password setup, directory and password-reset contact
//! information, plus a batch job importing contact methods from the
//! registration system.

pub mod accounts;
pub mod config;
pub mod error;
pub mod logging;
pub mod onboarding;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod sync;
pub mod validation;
pub mod web;
