//! Per-field validation results surfaced to the UI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a single field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldError {
    /// Field is required but empty
    Required,
    /// Field does not match the expected format
    InvalidFormat,
    /// National ID already belongs to another active client
    NationalIdTaken,
    /// Email already belongs to another active client
    EmailTaken,
}

impl FieldError {
    /// Key the UI form layer binds its messages to.
    pub fn key(&self) -> &'static str {
        match self {
            FieldError::Required => "required",
            FieldError::InvalidFormat => "pattern",
            FieldError::NationalIdTaken => "cedulaTomada",
            FieldError::EmailTaken => "emailTomado",
        }
    }
}

/// Field name → error, at most one error per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; the first error recorded for a field wins.
    pub fn add(&mut self, field: &str, error: FieldError) {
        self.errors.entry(field.to_string()).or_insert(error);
    }

    pub fn get(&self, field: &str) -> Option<FieldError> {
        self.errors.get(field).copied()
    }

    /// True when `error` was recorded anywhere.
    pub fn has(&self, error: FieldError) -> bool {
        self.errors.values().any(|e| *e == error)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldError)> {
        self.errors.iter().map(|(field, error)| (field.as_str(), *error))
    }

    /// Fold another set of errors into this one.
    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, error) in other.errors {
            self.errors.entry(field).or_insert(error);
        }
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, error)| format!("{}: {}", field, error.key()))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("email", FieldError::InvalidFormat);
        errors.add("email", FieldError::EmailTaken);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("email"), Some(FieldError::InvalidFormat));
    }

    #[test]
    fn test_display_uses_ui_keys() {
        let mut errors = ValidationErrors::new();
        errors.add("national_id", FieldError::NationalIdTaken);
        errors.add("email", FieldError::EmailTaken);

        assert_eq!(errors.to_string(), "email: emailTomado, national_id: cedulaTomada");
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add("first_name", FieldError::Required);
        assert!(errors.into_result().is_err());
    }
}
