//! Sales export for accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::models::{Invoice, PaymentMethod, PaymentStatus};
use crate::services::{InvoiceService, ServiceResult};

/// Export of a single sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleExport {
    pub metadata: SaleMetadata,
    pub line_items: Vec<SaleLineItem>,
}

/// Sale-level fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleMetadata {
    pub invoice_id: String,
    pub client_id: String,
    pub client_name: String,
    /// Client national ID at sale time
    pub national_id: String,
    pub register_session_id: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub voided: bool,
}

/// One exported line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineItem {
    pub product_id: String,
    /// Legacy sequential product number
    pub product_internal_id: Option<u64>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

const CSV_HEADER: &str = "invoice_id,created_at,client_name,national_id,product_internal_id,description,quantity,unit_price,line_total,invoice_total,payment_method,payment_status,operator\n";

impl SaleExport {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        let line_items = invoice
            .items
            .iter()
            .map(|item| SaleLineItem {
                product_id: item.product_id.clone(),
                product_internal_id: item.product_internal_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect();

        Self {
            metadata: SaleMetadata {
                invoice_id: invoice.id.clone(),
                client_id: invoice.client_id.clone(),
                client_name: invoice.client.full_name.clone(),
                national_id: invoice.client.national_id.clone(),
                register_session_id: invoice.register_session_id.clone(),
                operator: invoice.operator.clone(),
                created_at: invoice.created_at,
                payment_method: invoice.payment_method,
                payment_status: invoice.payment_status,
                subtotal: invoice.subtotal,
                tax: invoice.tax,
                total: invoice.total,
                amount_paid: invoice.amount_paid,
                voided: invoice.voided,
            },
            line_items,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// CSV with one row per line item.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        self.write_rows(&mut csv);
        csv
    }

    fn write_rows(&self, csv: &mut String) {
        let meta = &self.metadata;
        for item in &self.line_items {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&meta.invoice_id),
                meta.created_at.to_rfc3339(),
                escape_csv(&meta.client_name),
                escape_csv(&meta.national_id),
                item.product_internal_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                escape_csv(&item.description),
                item.quantity,
                item.unit_price,
                item.total,
                meta.total,
                meta.payment_method.as_str(),
                meta.payment_status.as_str(),
                escape_csv(&meta.operator),
            ));
        }
    }
}

/// Several sales exported together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReport {
    pub exported_at: DateTime<Utc>,
    pub sales: Vec<SaleExport>,
    pub total_items: usize,
    /// Sum of invoice totals
    pub grand_total: Decimal,
    /// Sum of outstanding balances
    pub outstanding: Decimal,
}

impl SalesReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        for sale in &self.sales {
            sale.write_rows(&mut csv);
        }
        csv
    }
}

/// Builds sales exports from stored invoices. Voided invoices are left out
/// of reports.
pub struct SalesExporter<'a> {
    db: &'a Database,
}

impl<'a> SalesExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn export_invoice(&self, invoice_id: &str) -> ServiceResult<SaleExport> {
        let invoice = InvoiceService::new(self.db).get(invoice_id)?;
        Ok(SaleExport::from_invoice(&invoice))
    }

    pub fn export_all(&self) -> ServiceResult<SalesReport> {
        self.report(|_| true)
    }

    /// Sales created at or after `since`.
    pub fn export_since(&self, since: DateTime<Utc>) -> ServiceResult<SalesReport> {
        self.report(|invoice| invoice.created_at >= since)
    }

    /// Sales of one register session.
    pub fn export_session(&self, session_id: &str) -> ServiceResult<SalesReport> {
        self.report(|invoice| invoice.register_session_id == session_id)
    }

    fn report<F>(&self, keep: F) -> ServiceResult<SalesReport>
    where
        F: Fn(&Invoice) -> bool,
    {
        let mut invoices = InvoiceService::new(self.db).list_all()?;
        invoices.retain(|invoice| !invoice.voided && keep(invoice));
        // Oldest first reads better in a ledger
        invoices.reverse();

        let grand_total = invoices.iter().map(|i| i.total).sum();
        let outstanding = invoices.iter().map(Invoice::balance).sum();
        let sales: Vec<SaleExport> = invoices.iter().map(SaleExport::from_invoice).collect();
        let total_items = sales.iter().map(|s| s.line_items.len()).sum();

        Ok(SalesReport {
            exported_at: self.db.now(),
            sales,
            total_items,
            grand_total,
            outstanding,
        })
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
