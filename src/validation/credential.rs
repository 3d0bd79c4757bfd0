//! Password set/change validation.

use serde::Deserialize;
use tracing::warn;

use super::{FormErrors, REQUIRED};
use crate::accounts::Account;
use crate::accounts::credentials::verify_password_async;

/// Longest password the identity store accepts.
pub const MAX_PASSWORD_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

pub const MISMATCH: &str = "The two passwords didn't match.";
pub const BAD_CURRENT: &str = "Your current password was entered incorrectly.";
pub const SAME_AS_CURRENT: &str = "Your new password must differ from your current password.";

/// Which password form applies to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordFormKind {
    /// First-time set during onboarding: no current password.
    Set,
    /// Change an existing password: current password required.
    Change,
}

impl PasswordFormKind {
    pub fn for_account(account: &Account) -> Self {
        if account.effective_status() == crate::onboarding::ProvisioningStatus::NeedsPassword {
            Self::Set
        } else {
            Self::Change
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Set => "set_password",
            Self::Change => "change_password",
        }
    }
}

/// Raw password form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
}

/// Validates password submissions against policy and the stored credential.
#[derive(Debug, Clone, Default)]
pub struct CredentialValidator;

impl CredentialValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a submission. On success returns the accepted new password.
    pub async fn validate(
        &self,
        kind: PasswordFormKind,
        form: &PasswordForm,
        account: &Account,
    ) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();

        // Passwords are never trimmed; only fully empty input counts as missing.
        let new_password = required(&mut errors, "new_password", form.new_password.as_deref());
        let confirm = required(&mut errors, "confirm_password", form.confirm_password.as_deref());
        let current = match kind {
            PasswordFormKind::Set => None,
            PasswordFormKind::Change => {
                required(&mut errors, "current_password", form.current_password.as_deref())
            }
        };

        let (Some(new_password), Some(confirm)) = (new_password, confirm) else {
            return Err(errors);
        };

        if new_password != confirm {
            errors.add("confirm_password", MISMATCH);
        } else {
            for problem in policy_violations(new_password, &account.username) {
                errors.add("new_password", problem);
            }
        }

        if let Some(current) = current {
            let matches = match verify_password_async(
                account.id.clone(),
                current.to_string(),
                account.password_hash.clone(),
            )
            .await
            {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "Current password check failed");
                    false
                }
            };
            if !matches {
                errors.add("current_password", BAD_CURRENT);
            } else if current == new_password {
                errors.add("new_password", SAME_AS_CURRENT);
            }
        }

        errors.into_result(new_password.to_string())
    }
}

fn required<'a>(errors: &mut FormErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        Some(v) if !v.is_empty() => {
            if v.chars().count() > MAX_PASSWORD_LEN {
                errors.add(
                    field,
                    format!("Ensure this value has at most {MAX_PASSWORD_LEN} characters."),
                );
            }
            Some(v)
        }
        _ => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

/// Password policy checks, returning one message per violated rule.
pub fn policy_violations(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "Your password must be at least {MIN_PASSWORD_LEN} characters long."
        ));
    }

    let classes = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_alphanumeric()),
    ]
    .iter()
    .filter(|present| **present)
    .count();
    if classes < 3 {
        problems.push(
            "Your password must contain three of: lowercase letters, uppercase letters, digits, symbols."
                .to_string(),
        );
    }

    let username = username.trim().to_lowercase();
    if username.len() >= 3 && password.to_lowercase().contains(&username) {
        problems.push("Your password may not contain your username.".to_string());
    }

    problems
}
