//! Directory information validation.

use serde::{Deserialize, Serialize};

use super::{FormErrors, REQUIRED, clean};
use crate::accounts::DirectoryInformation;

pub const UNKNOWN_DEPARTMENT: &str = "Select a valid department.";

const MAX_FIELD_LEN: usize = 128;

/// Raw directory form submission.
///
/// There is deliberately no account field: the owning account always comes
/// from the session.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DirectoryForm {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub office_building: Option<String>,
    #[serde(default)]
    pub office_room: Option<String>,
}

impl From<Option<&DirectoryInformation>> for DirectoryForm {
    fn from(info: Option<&DirectoryInformation>) -> Self {
        match info {
            Some(i) => Self {
                company: Some(i.company.clone()),
                job_title: i.job_title.clone(),
                department: i.department.clone(),
                telephone: i.telephone.clone(),
                office_building: i.office_building.clone(),
                office_room: i.office_room.clone(),
            },
            None => Self::default(),
        }
    }
}

/// Validates directory submissions against the allowed organizations.
#[derive(Debug, Clone)]
pub struct DirectoryInfoValidator {
    allowed_companies: Vec<String>,
}

impl DirectoryInfoValidator {
    pub fn new(allowed_companies: Vec<String>) -> Self {
        Self { allowed_companies }
    }

    /// Validate a submission. `departments` lists the known department
    /// names; an empty department is always allowed.
    pub fn validate(
        &self,
        account_id: &str,
        form: &DirectoryForm,
        departments: &[String],
    ) -> Result<DirectoryInformation, FormErrors> {
        let mut errors = FormErrors::new();

        let company = clean(form.company.as_deref());
        match &company {
            None => errors.add("company", REQUIRED),
            Some(c) if !self.allowed_companies.iter().any(|a| a == c) => errors.add(
                "company",
                format!("Select a valid choice. {c} is not one of the available choices."),
            ),
            Some(_) => {}
        }

        let department = clean(form.department.as_deref());
        if let Some(dept) = &department {
            if !departments.iter().any(|d| d == dept) {
                errors.add("department", UNKNOWN_DEPARTMENT);
            }
        }

        let mut bounded = |field: &str, value: Option<&str>| {
            let value = clean(value);
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
                errors.add(
                    field,
                    format!("Ensure this value has at most {MAX_FIELD_LEN} characters."),
                );
            }
            value
        };
        let job_title = bounded("job_title", form.job_title.as_deref());
        let telephone = bounded("telephone", form.telephone.as_deref());
        let office_building = bounded("office_building", form.office_building.as_deref());
        let office_room = bounded("office_room", form.office_room.as_deref());

        errors.into_result(DirectoryInformation {
            account_id: account_id.to_string(),
            company: company.unwrap_or_default(),
            job_title,
            department,
            telephone,
            office_building,
            office_room,
        })
    }
}
