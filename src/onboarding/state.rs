//! Onboarding state machine — where an account is in the provisioning
//! sequence and which step it must visit next.

use serde::{Deserialize, Serialize};

/// An account's position in the onboarding sequence.
///
/// Progresses linearly: NeedsPassword → NeedsDirectory → NeedsContact →
/// Complete. NeedsDirectory only applies to directory-published accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    NeedsPassword,
    NeedsDirectory,
    NeedsContact,
    Complete,
}

/// A destination the router can send an authenticated client to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    SetPassword,
    SetDirectory,
    SetContact,
    PickAction,
}

impl ProvisioningStatus {
    /// Normalize a stored status against the account's directory flag.
    ///
    /// Unpublished accounts never stop at NeedsDirectory.
    pub fn effective(self, directory_published: bool) -> Self {
        match self {
            Self::NeedsDirectory if !directory_published => Self::NeedsContact,
            other => other,
        }
    }

    /// The next required step after `self` has been satisfied.
    pub fn advance(self, directory_published: bool) -> Self {
        use ProvisioningStatus::*;
        match self.effective(directory_published) {
            NeedsPassword if directory_published => NeedsDirectory,
            NeedsPassword => NeedsContact,
            NeedsDirectory => NeedsContact,
            NeedsContact | Complete => Complete,
        }
    }

    /// Status after `step` was submitted successfully.
    ///
    /// Only the current (effective) step moves the account forward; editing
    /// an already-satisfied step leaves the status alone.
    pub fn complete_step(self, step: ProvisioningStatus, directory_published: bool) -> Self {
        let current = self.effective(directory_published);
        if current == step && !current.is_terminal() {
            current.advance(directory_published)
        } else {
            current
        }
    }

    /// Where the next-step resolver sends an account in this status.
    pub fn destination(self, directory_published: bool) -> Destination {
        match self.effective(directory_published) {
            Self::NeedsPassword => Destination::SetPassword,
            Self::NeedsDirectory => Destination::SetDirectory,
            Self::NeedsContact => Destination::SetContact,
            Self::Complete => Destination::PickAction,
        }
    }

    /// Whether onboarding is done.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NeedsPassword => "needs_password",
            Self::NeedsDirectory => "needs_directory",
            Self::NeedsContact => "needs_contact",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProvisioningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "needs_password" => Ok(Self::NeedsPassword),
            "needs_directory" => Ok(Self::NeedsDirectory),
            "needs_contact" => Ok(Self::NeedsContact),
            "complete" => Ok(Self::Complete),
            other => Err(format!("unknown provisioning status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProvisioningStatus::*;

    #[test]
    fn advance_walks_published_sequence() {
        let mut current = NeedsPassword;
        for expected in [NeedsDirectory, NeedsContact, Complete] {
            current = current.advance(true);
            assert_eq!(current, expected);
        }
        assert_eq!(current.advance(true), Complete);
    }

    #[test]
    fn unpublished_skips_directory() {
        assert_eq!(NeedsPassword.advance(false), NeedsContact);
        assert_eq!(NeedsDirectory.effective(false), NeedsContact);
        assert_eq!(NeedsDirectory.destination(false), Destination::SetContact);
        assert_eq!(NeedsDirectory.destination(true), Destination::SetDirectory);
    }

    #[test]
    fn password_step_always_first() {
        for published in [true, false] {
            assert_eq!(NeedsPassword.destination(published), Destination::SetPassword);
        }
    }

    #[test]
    fn complete_step_only_advances_current() {
        assert_eq!(NeedsPassword.complete_step(NeedsPassword, true), NeedsDirectory);
        assert_eq!(NeedsPassword.complete_step(NeedsPassword, false), NeedsContact);
        // Submitting contact info early does not skip the password step.
        assert_eq!(NeedsPassword.complete_step(NeedsContact, true), NeedsPassword);
        // Editing after completion stays complete.
        assert_eq!(Complete.complete_step(NeedsContact, true), Complete);
        assert_eq!(NeedsContact.complete_step(NeedsContact, false), Complete);
    }

    #[test]
    fn complete_routes_to_pick_action() {
        assert!(Complete.is_terminal());
        assert_eq!(Complete.destination(true), Destination::PickAction);
        assert_eq!(Complete.destination(false), Destination::PickAction);
    }

    #[test]
    fn display_matches_serde_and_parses_back() {
        for status in [NeedsPassword, NeedsDirectory, NeedsContact, Complete] {
            let display = status.to_string();
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{display}\""), json);
            assert_eq!(display.parse::<ProvisioningStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<ProvisioningStatus>().is_err());
    }
}
