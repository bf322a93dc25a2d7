//! Sale persistence.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    require_positive, ClinicalHistoryService, OpenRegister, ProductService, ServiceError,
    ServiceResult,
};
use crate::db::{collections, Database};
use crate::models::{
    is_whole_cents, Client, ClientSnapshot, DebtSummary, FieldError, Invoice, NewInvoice,
    PaymentStatus, RegisterSession, Totals,
};

/// Creates invoices and tracks what clients owe.
pub struct InvoiceService<'a> {
    db: &'a Database,
}

impl<'a> InvoiceService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Persist a sale.
    ///
    /// Totals are recomputed from the line items and must match the ones
    /// the caller computed. The client and clinical snapshots, the stock
    /// decrements and the invoice itself are written in one atomic scope.
    #[tracing::instrument(skip(self, register, new), fields(client_id = %new.client_id))]
    pub fn create(&self, register: &OpenRegister, new: NewInvoice) -> ServiceResult<Invoice> {
        if new.items.is_empty() {
            return Err(ServiceError::invalid_field("items", FieldError::Required));
        }
        if new
            .items
            .iter()
            .any(|item| !item.is_consistent() || !is_whole_cents(item.unit_price))
        {
            return Err(ServiceError::invalid_field("items", FieldError::InvalidFormat));
        }
        if new.tax_rate < Decimal::ZERO {
            return Err(ServiceError::invalid_field("tax_rate", FieldError::InvalidFormat));
        }
        if new.amount_paid < Decimal::ZERO {
            return Err(ServiceError::invalid_field(
                "amount_paid",
                FieldError::InvalidFormat,
            ));
        }

        let expected = Totals::compute(&new.items, new.tax_rate)
            .map_err(|_| ServiceError::invalid_field("items", FieldError::InvalidFormat))?;
        let claimed = new.claimed_totals();
        if expected != claimed {
            warn!(?expected, ?claimed, "invoice totals mismatch");
            return Err(ServiceError::InvalidTotals { expected, claimed });
        }

        let invoice = self.db.atomically(|db| {
            let session = db
                .get_as::<RegisterSession>(collections::REGISTER_SESSIONS, register.session_id())?;
            if !session.map_or(false, |s| s.is_open()) {
                return Err(ServiceError::RegisterClosed);
            }

            let client = db
                .get_as::<Client>(collections::CLIENTS, &new.client_id)?
                .ok_or_else(|| ServiceError::not_found(collections::CLIENTS, &new.client_id))?;
            if !client.active {
                return Err(ServiceError::InvalidState(format!(
                    "client {} is deactivated",
                    client.id
                )));
            }
            let clinical_snapshot = ClinicalHistoryService::new(db).get(&client.id)?;

            // Same product on several lines is checked against the summed quantity
            let mut quantities: BTreeMap<&str, i64> = BTreeMap::new();
            for item in &new.items {
                *quantities.entry(item.product_id.as_str()).or_default() += i64::from(item.quantity);
            }
            let products = ProductService::new(db);
            for (product_id, quantity) in quantities {
                products.adjust_stock(product_id, -quantity)?;
            }

            let invoice = Invoice {
                id: uuid::Uuid::new_v4().to_string(),
                client_id: client.id.clone(),
                client: ClientSnapshot {
                    full_name: client.full_name(),
                    national_id: client.national_id.clone(),
                    email: client.email.clone(),
                    phone: client.phone.clone(),
                    address: client.address.clone(),
                },
                clinical_snapshot,
                payment_status: PaymentStatus::derive(expected.total, new.amount_paid),
                items: new.items,
                subtotal: expected.subtotal,
                tax_rate: new.tax_rate,
                tax: expected.tax,
                total: expected.total,
                payment_method: new.payment_method,
                amount_paid: new.amount_paid,
                register_session_id: register.session_id().to_string(),
                operator: new.operator,
                created_at: db.now(),
                voided: false,
            };
            db.insert_as(collections::INVOICES, &invoice.id, &invoice)?;
            Ok::<_, ServiceError>(invoice)
        })?;

        info!(
            invoice_id = %invoice.id,
            total = %invoice.total,
            status = ?invoice.payment_status,
            "invoice created"
        );
        Ok(invoice)
    }

    pub fn get(&self, id: &str) -> ServiceResult<Invoice> {
        self.db
            .get_as::<Invoice>(collections::INVOICES, id)?
            .ok_or_else(|| ServiceError::not_found(collections::INVOICES, id))
    }

    /// The client's invoices, newest first (voided ones included).
    pub fn list_for_client(&self, client_id: &str) -> ServiceResult<Vec<Invoice>> {
        let mut invoices =
            self.db
                .find_as::<Invoice>(collections::INVOICES, "client_id", &json!(client_id))?;
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(client_id, count = invoices.len(), "listed client invoices");
        Ok(invoices)
    }

    /// Every invoice, newest first.
    pub fn list_all(&self) -> ServiceResult<Vec<Invoice>> {
        let mut invoices = self.db.list_as::<Invoice>(collections::INVOICES)?;
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    /// Add a payment towards the outstanding balance.
    #[tracing::instrument(skip(self))]
    pub fn record_payment(&self, id: &str, amount: Decimal) -> ServiceResult<Invoice> {
        require_positive("amount", amount)?;

        let mut invoice = self.get(id)?;
        if invoice.voided {
            return Err(ServiceError::InvalidState(format!("invoice {} is voided", id)));
        }
        if invoice.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::InvalidState(format!(
                "invoice {} is already paid",
                id
            )));
        }

        invoice.amount_paid += amount;
        invoice.payment_status = PaymentStatus::derive(invoice.total, invoice.amount_paid);
        self.db.set_as(collections::INVOICES, id, &invoice)?;

        info!(
            balance = %invoice.balance(),
            status = ?invoice.payment_status,
            "payment recorded"
        );
        Ok(invoice)
    }

    /// Void a sale and put its units back in stock.
    #[tracing::instrument(skip(self))]
    pub fn void(&self, id: &str, confirmed: bool) -> ServiceResult<Invoice> {
        let mut invoice = self.get(id)?;
        if invoice.voided {
            return Err(ServiceError::InvalidState(format!(
                "invoice {} is already voided",
                id
            )));
        }
        if !confirmed {
            return Err(ServiceError::ConfirmationRequired(format!(
                "void invoice {} for {}",
                id, invoice.total
            )));
        }

        self.db.atomically(|db| {
            let products = ProductService::new(db);
            for item in &invoice.items {
                match products.adjust_stock(&item.product_id, i64::from(item.quantity)) {
                    Ok(_) => {}
                    Err(ServiceError::NotFound { .. }) => {
                        warn!(product_id = %item.product_id, "product gone, stock not restored");
                    }
                    Err(e) => return Err(e),
                }
            }

            invoice.voided = true;
            db.set_as(collections::INVOICES, &invoice.id, &invoice)?;
            Ok::<_, ServiceError>(())
        })?;

        info!("invoice voided");
        Ok(invoice)
    }

    /// Outstanding balance over the client's unvoided, unpaid invoices.
    pub fn debt_summary(&self, client_id: &str) -> ServiceResult<DebtSummary> {
        let summary = self
            .list_for_client(client_id)?
            .iter()
            .filter(|invoice| !invoice.voided && invoice.payment_status.is_outstanding())
            .fold(DebtSummary::default(), |mut acc, invoice| {
                acc.total_owed += invoice.balance();
                acc.pending_count += 1;
                acc
            });
        Ok(summary)
    }
}
