//! Validation of the badge endpoint's query parameters.

use crate::application::use_cases::generate_badge::GenerateBadgeUseCaseInput;
use crate::domain::models::repository::RepositoryRef;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing {0} key")]
    Missing(&'static str),
    #[error("Invalid repo key")]
    InvalidRepo,
}

/// Decoded query pairs in request order.
#[derive(Debug, Clone, Default)]
pub struct FormValues(pub Vec<(String, String)>);

impl FormValues {
    /// First value for `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map_or("", |(_, v)| v.as_str())
    }

    fn required(&self, key: &'static str) -> Result<String, ValidationError> {
        match self.get(key) {
            "" => Err(ValidationError::Missing(key)),
            value => Ok(value.to_string()),
        }
    }
}

impl TryFrom<&FormValues> for GenerateBadgeUseCaseInput {
    type Error = ValidationError;

    fn try_from(form: &FormValues) -> Result<Self, Self::Error> {
        let repo = form.required("repo")?;
        let repo = RepositoryRef::parse(&repo).ok_or(ValidationError::InvalidRepo)?;

        Ok(Self {
            repo,
            branch: form.required("branch")?,
            run: form.required("run")?,
            badge: form.required("badge")?,
            subject: form.required("subject")?,
            color: form.get("color").to_string(),
            label: form.get("label").to_string(),
            list: form.get("list").to_string(),
            icon: form.get("icon").to_string(),
        })
    }
}
