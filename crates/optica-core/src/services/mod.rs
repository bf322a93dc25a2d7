//! Application services over the document store.
//!
//! Each service borrows the [`Database`](crate::db::Database) and holds no
//! state of its own.

mod clients;
mod clinical;
mod invoices;
mod products;
mod register;
mod workflow;

pub use clients::*;
pub use clinical::*;
pub use invoices::*;
pub use products::*;
pub use register::*;
pub use workflow::*;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::DbError;
use crate::models::{FieldError, Totals, ValidationErrors};

/// Service errors.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] DbError),

    #[error("Invoice totals do not match line items: expected {expected:?}, got {claimed:?}")]
    InvalidTotals { expected: Totals, claimed: Totals },

    #[error("Insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: u32,
    },

    #[error("No cash register session is open")]
    RegisterClosed,

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Invalid operation: {0}")]
    InvalidState(String),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UniqueViolation {
                field: "business_date",
                ..
            } => ServiceError::InvalidState("register already open for this business date".into()),
            // Sequential IDs are assigned inside the write; a collision means
            // another writer got there first and the caller should retry.
            e @ DbError::UniqueViolation {
                field: "internal_id",
                ..
            } => ServiceError::WriteFailed(e),
            DbError::UniqueViolation { field, .. } => {
                let mut errors = ValidationErrors::new();
                let error = match field {
                    "national_id" => FieldError::NationalIdTaken,
                    "email" => FieldError::EmailTaken,
                    _ => FieldError::InvalidFormat,
                };
                errors.add(field, error);
                ServiceError::ValidationFailed(errors)
            }
            DbError::NotFound(path) => ServiceError::NotFound {
                collection: "document",
                id: path,
            },
            other => ServiceError::WriteFailed(other),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::WriteFailed(DbError::Json(e))
    }
}

impl ServiceError {
    pub(crate) fn not_found(collection: &'static str, id: &str) -> Self {
        ServiceError::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_field(field: &str, error: FieldError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        ServiceError::ValidationFailed(errors)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Reject non-positive money amounts.
pub(crate) fn require_positive(field: &str, amount: Decimal) -> ServiceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::invalid_field(field, FieldError::InvalidFormat));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_becomes_field_error() {
        let err: ServiceError = DbError::UniqueViolation {
            collection: "clients",
            field: "national_id",
        }
        .into();

        match err {
            ServiceError::ValidationFailed(errors) => {
                assert_eq!(errors.get("national_id"), Some(FieldError::NationalIdTaken));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_lost_register_race_is_invalid_state() {
        let err: ServiceError = DbError::UniqueViolation {
            collection: "register_sessions",
            field: "business_date",
        }
        .into();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn test_internal_id_collision_is_write_failure() {
        let err: ServiceError = DbError::UniqueViolation {
            collection: "products",
            field: "internal_id",
        }
        .into();
        assert!(matches!(
            err,
            ServiceError::WriteFailed(DbError::UniqueViolation {
                field: "internal_id",
                ..
            })
        ));
    }

    #[test]
    fn test_other_db_errors_are_write_failures() {
        let err: ServiceError = DbError::Constraint("boom".into()).into();
        assert!(matches!(err, ServiceError::WriteFailed(_)));
    }
}
