//! Cash register session models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day's cash register session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterSession {
    pub id: String,
    /// Day the session belongs to (at most one open session per day)
    pub business_date: NaiveDate,
    pub opened_by: String,
    pub opened_at: DateTime<Utc>,
    /// Cash in the drawer at opening
    pub opening_balance: Decimal,
    /// `None` while the register is open
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
}

impl RegisterSession {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
