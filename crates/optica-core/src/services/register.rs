//! Cash register sessions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::db::{collections, Database};
use crate::models::{FieldError, RegisterSession};

/// Proof that a register session was open when it was looked up.
///
/// Only [`RegisterService`] hands these out; sale creation takes one as a
/// parameter and re-checks the session inside its atomic scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRegister {
    session_id: String,
    business_date: NaiveDate,
    opened_by: String,
}

impl OpenRegister {
    fn from_session(session: &RegisterSession) -> Self {
        Self {
            session_id: session.id.clone(),
            business_date: session.business_date,
            opened_by: session.opened_by.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn business_date(&self) -> NaiveDate {
        self.business_date
    }

    pub fn opened_by(&self) -> &str {
        &self.opened_by
    }
}

/// Opens and closes register sessions.
pub struct RegisterService<'a> {
    db: &'a Database,
}

impl<'a> RegisterService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Open today's session. Only one session per business date may be open.
    #[tracing::instrument(skip(self))]
    pub fn open(&self, operator: &str, opening_balance: Decimal) -> ServiceResult<OpenRegister> {
        if operator.trim().is_empty() {
            return Err(ServiceError::invalid_field("operator", FieldError::Required));
        }
        if opening_balance < Decimal::ZERO {
            return Err(ServiceError::invalid_field(
                "opening_balance",
                FieldError::InvalidFormat,
            ));
        }

        let now = self.db.now();
        let business_date = now.date_naive();

        let already_open = self
            .sessions_for(business_date)?
            .into_iter()
            .any(|s| s.is_open());
        if already_open {
            warn!(%business_date, "register already open");
            return Err(ServiceError::InvalidState(format!(
                "register already open for {}",
                business_date
            )));
        }

        let session = RegisterSession {
            id: uuid::Uuid::new_v4().to_string(),
            business_date,
            opened_by: operator.trim().to_string(),
            opened_at: now,
            opening_balance,
            closed_at: None,
            closed_by: None,
        };
        self.db
            .insert_as(collections::REGISTER_SESSIONS, &session.id, &session)?;

        info!(session_id = %session.id, %business_date, "register opened");
        Ok(OpenRegister::from_session(&session))
    }

    fn sessions_for(&self, business_date: NaiveDate) -> ServiceResult<Vec<RegisterSession>> {
        Ok(self.db.find_as::<RegisterSession>(
            collections::REGISTER_SESSIONS,
            "business_date",
            &json!(business_date),
        )?)
    }

    /// The most recently opened session that is still open.
    pub fn current(&self) -> ServiceResult<Option<OpenRegister>> {
        let open = self
            .db
            .list_as::<RegisterSession>(collections::REGISTER_SESSIONS)?
            .into_iter()
            .filter(RegisterSession::is_open)
            .max_by_key(|s| s.opened_at);
        Ok(open.as_ref().map(OpenRegister::from_session))
    }

    /// Sales require an open register.
    pub fn require_open(&self) -> ServiceResult<OpenRegister> {
        self.current()?.ok_or(ServiceError::RegisterClosed)
    }

    /// Close the session. The token is consumed; sales against it fail
    /// from now on.
    #[tracing::instrument(skip(self, register), fields(session_id = %register.session_id))]
    pub fn close(&self, register: OpenRegister, operator: &str) -> ServiceResult<RegisterSession> {
        let mut session = self
            .db
            .get_as::<RegisterSession>(collections::REGISTER_SESSIONS, &register.session_id)?
            .ok_or_else(|| {
                ServiceError::not_found(collections::REGISTER_SESSIONS, &register.session_id)
            })?;
        if !session.is_open() {
            return Err(ServiceError::RegisterClosed);
        }

        session.closed_at = Some(self.db.now());
        session.closed_by = Some(operator.trim().to_string());
        self.db
            .set_as(collections::REGISTER_SESSIONS, &session.id, &session)?;

        info!("register closed");
        Ok(session)
    }
}
