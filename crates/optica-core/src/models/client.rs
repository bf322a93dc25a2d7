//! Client models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{FieldError, ValidationErrors};

fn default_active() -> bool {
    true
}

/// A shop client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    /// Document ID
    pub id: String,
    /// Given names
    pub first_name: String,
    /// Surnames
    pub last_name: String,
    /// National ID (cédula / RUC), unique among active clients
    pub national_id: String,
    /// Email, unique among active clients
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
    /// Soft-delete flag; inactive clients are hidden from default listings
    #[serde(default = "default_active")]
    pub active: bool,
    /// Creation timestamp (absent on some legacy records)
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
}

/// Partial client update; `None` leaves a field unchanged and an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ClientUpdate::default()
    }
}

/// Trim; empty becomes `None`.
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Emails compare case-insensitively, so they are stored lowercase.
pub fn normalize_email(value: Option<String>) -> Option<String> {
    clean_optional(value).map(|v| v.to_lowercase())
}

/// National IDs are stored without spaces or dashes.
pub fn normalize_national_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Cédula (10 digits) or RUC (13 digits).
pub fn is_valid_national_id(value: &str) -> bool {
    matches!(value.len(), 10 | 13) && value.chars().all(|c| c.is_ascii_digit())
}

/// Minimal structural email check: `local@domain.tld`.
pub fn is_valid_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !value.contains(char::is_whitespace)
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        _ => false,
    }
}

fn validate_fields(
    first_name: &str,
    last_name: &str,
    national_id: &str,
    email: Option<&str>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if first_name.trim().is_empty() {
        errors.add("first_name", FieldError::Required);
    }
    if last_name.trim().is_empty() {
        errors.add("last_name", FieldError::Required);
    }
    if national_id.is_empty() {
        errors.add("national_id", FieldError::Required);
    } else if !is_valid_national_id(national_id) {
        errors.add("national_id", FieldError::InvalidFormat);
    }
    if let Some(email) = email {
        if !is_valid_email(email) {
            errors.add("email", FieldError::InvalidFormat);
        }
    }

    errors
}

impl NewClient {
    /// Canonical form used for validation and storage.
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            national_id: normalize_national_id(&self.national_id),
            email: normalize_email(self.email),
            phone: clean_optional(self.phone),
            address: clean_optional(self.address),
            birth_date: self.birth_date,
            occupation: clean_optional(self.occupation),
            notes: clean_optional(self.notes),
        }
    }

    /// Format checks (uniqueness is checked against the store separately).
    pub fn validate(&self) -> ValidationErrors {
        validate_fields(
            &self.first_name,
            &self.last_name,
            &self.national_id,
            self.email.as_deref(),
        )
    }

    /// Build the stored client.
    pub fn into_client(self, id: String, now: DateTime<Utc>) -> Client {
        Client {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            national_id: self.national_id,
            email: self.email,
            phone: self.phone,
            address: self.address,
            birth_date: self.birth_date,
            occupation: self.occupation,
            notes: self.notes,
            active: true,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

impl Client {
    /// "Given names Surnames".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Apply the fields present in `update`.
    pub fn apply(&mut self, update: ClientUpdate) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(national_id) = update.national_id {
            self.national_id = normalize_national_id(&national_id);
        }
        if update.email.is_some() {
            self.email = normalize_email(update.email);
        }
        if update.phone.is_some() {
            self.phone = clean_optional(update.phone);
        }
        if update.address.is_some() {
            self.address = clean_optional(update.address);
        }
        if update.birth_date.is_some() {
            self.birth_date = update.birth_date;
        }
        if update.occupation.is_some() {
            self.occupation = clean_optional(update.occupation);
        }
        if update.notes.is_some() {
            self.notes = clean_optional(update.notes);
        }
    }

    /// Format checks on the current field values.
    pub fn validate(&self) -> ValidationErrors {
        validate_fields(
            &self.first_name,
            &self.last_name,
            &self.national_id,
            self.email.as_deref(),
        )
    }
}
