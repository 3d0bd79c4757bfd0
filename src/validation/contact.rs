//! Contact information (password-reset contact methods) validation.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{FormErrors, clean};
use crate::accounts::ContactInformation;

pub const NO_CONTACT_METHOD: &str = "At least one contact method is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_PHONE: &str = "Enter a valid phone number.";

const MAX_EMAIL_LEN: usize = 254;
const MAX_PHONE_LEN: usize = 32;

/// Raw contact form submission. Omitted fields count as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub cell_phone: Option<String>,
    #[serde(default)]
    pub alternate_email: Option<String>,
}

/// Values shown in an unbound contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactInitial {
    pub alternate_email: String,
    pub cell_phone: String,
}

impl From<Option<&ContactInformation>> for ContactInitial {
    fn from(info: Option<&ContactInformation>) -> Self {
        Self {
            alternate_email: info
                .and_then(|i| i.alternate_email.clone())
                .unwrap_or_default(),
            cell_phone: info.and_then(|i| i.cell_phone.clone()).unwrap_or_default(),
        }
    }
}

/// Validates contact submissions.
#[derive(Debug, Clone)]
pub struct ContactInfoValidator {
    institutional_suffix: String,
    email: Regex,
    phone: Regex,
}

impl ContactInfoValidator {
    /// `institutional_suffix` is the address ending (e.g. `@pdx.edu`) that
    /// may not be used as an alternate email.
    pub fn new(institutional_suffix: &str) -> Self {
        Self {
            institutional_suffix: institutional_suffix.to_lowercase(),
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid email pattern"),
            phone: Regex::new(r"^\+?[0-9 ().\-]{7,}$").expect("valid phone pattern"),
        }
    }

    /// Validate a submission for `account_id`. The accepted record carries
    /// both fields explicitly; it replaces whatever was stored before.
    pub fn validate(
        &self,
        account_id: &str,
        form: &ContactForm,
    ) -> Result<ContactInformation, FormErrors> {
        let mut errors = FormErrors::new();

        let alternate_email = clean(form.alternate_email.as_deref());
        if let Some(email) = &alternate_email {
            if email.len() > MAX_EMAIL_LEN || !self.email.is_match(email) {
                errors.add("alternate_email", INVALID_EMAIL);
            } else if email.to_lowercase().ends_with(&self.institutional_suffix) {
                errors.add(
                    "alternate_email",
                    format!(
                        "Alternate Email can not be an {} address.",
                        self.institutional_suffix
                    ),
                );
            }
        }

        let cell_phone = clean(form.cell_phone.as_deref());
        if let Some(phone) = &cell_phone {
            if phone.len() > MAX_PHONE_LEN || !self.phone.is_match(phone) {
                errors.add("cell_phone", INVALID_PHONE);
            }
        }

        if alternate_email.is_none() && cell_phone.is_none() {
            errors.add_form_error(NO_CONTACT_METHOD);
        }

        errors.into_result(ContactInformation {
            account_id: account_id.to_string(),
            cell_phone,
            alternate_email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::NON_FIELD_ERRORS;

    fn validator() -> ContactInfoValidator {
        ContactInfoValidator::new("@pdx.edu")
    }

    fn form(email: Option<&str>, phone: Option<&str>) -> ContactForm {
        ContactForm {
            alternate_email: email.map(Into::into),
            cell_phone: phone.map(Into::into),
        }
    }

    #[test]
    fn institutional_suffix_is_rejected() {
        for email in ["someone@pdx.edu", "SOMEONE@PDX.EDU", "a.b@pdx.edu"] {
            let errors = validator()
                .validate("u1", &form(Some(email), Some("503-867-5309")))
                .unwrap_err();
            assert_eq!(
                errors.get("alternate_email").unwrap(),
                ["Alternate Email can not be an @pdx.edu address."]
            );
        }
    }

    #[test]
    fn other_domains_are_accepted() {
        for email in ["a@test.com", "first.last@gmail.com", "x@pdx.edu.example.org"] {
            let info = validator().validate("u1", &form(Some(email), None)).unwrap();
            assert_eq!(info.alternate_email.as_deref(), Some(email));
        }
    }

    #[test]
    fn malformed_email_is_rejected() {
        let errors = validator()
            .validate("u1", &form(Some("not-an-email"), None))
            .unwrap_err();
        assert_eq!(errors.get("alternate_email").unwrap(), [INVALID_EMAIL]);
    }

    #[test]
    fn both_empty_is_rejected() {
        for f in [form(None, None), form(Some(""), Some("  "))] {
            let errors = validator().validate("u1", &f).unwrap_err();
            assert_eq!(errors.get(NON_FIELD_ERRORS).unwrap(), [NO_CONTACT_METHOD]);
        }
    }

    #[test]
    fn one_method_is_enough() {
        let info = validator().validate("u1", &form(Some("a@test.com"), None)).unwrap();
        assert_eq!(info.cell_phone, None);

        let info = validator().validate("u1", &form(None, Some("503-867-5309"))).unwrap();
        assert_eq!(info.alternate_email, None);
        assert_eq!(info.cell_phone.as_deref(), Some("503-867-5309"));
    }

    #[test]
    fn bad_phone_is_rejected() {
        let errors = validator()
            .validate("u1", &form(None, Some("call me maybe")))
            .unwrap_err();
        assert_eq!(errors.get("cell_phone").unwrap(), [INVALID_PHONE]);
    }

    #[test]
    fn initial_uses_empty_strings() {
        let info = ContactInformation {
            account_id: "u1".into(),
            cell_phone: None,
            alternate_email: Some("a@test.com".into()),
        };
        let initial = ContactInitial::from(Some(&info));
        assert_eq!(initial.alternate_email, "a@test.com");
        assert_eq!(initial.cell_phone, "");
        assert_eq!(ContactInitial::from(None), ContactInitial::default());
    }
}
