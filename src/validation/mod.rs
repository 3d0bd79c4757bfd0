//! Form validation — explicit per-form field declarations and checks.
//!
//! Each validator takes the raw submission and returns either cleaned data
//! or a [`FormErrors`] map keyed by field name. Validation failures are
//! never fatal; the caller re-renders the form with the errors attached.

pub mod contact;
pub mod credential;
pub mod directory;

use std::collections::BTreeMap;

use serde::Serialize;

pub use contact::{ContactForm, ContactInfoValidator};
pub use credential::{CredentialValidator, PasswordForm, PasswordFormKind};
pub use directory::{DirectoryForm, DirectoryInfoValidator};

/// Key used for errors that belong to the whole form.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const REQUIRED: &str = "This field is required.";

/// Field name → messages. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_form_error(&mut self, message: impl Into<String>) {
        self.add(NON_FIELD_ERRORS, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Trim a submitted value, mapping blank input to `None`.
pub fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
