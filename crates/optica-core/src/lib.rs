//! Optica Core Library
//!
//! Local-first records for an optics shop: clients, their optometry
//! history, the product catalog and point-of-sale invoicing.
//!
//! # Architecture
//!
//! ```text
//!   Client form ──► ClientWorkflow ──┬──► clients
//!                   (one atomic      └──► clinical_histories
//!                    scope)                    └──► clinical_history_entries
//!
//!   Cart ──► NewInvoice ──► InvoiceService ──┬──► invoices (client + Rx snapshot)
//!                           (register open)  └──► products (stock)
//!                                                   │
//!                                   ┌───────────────┴──────────────┐
//!                                   ▼                              ▼
//!                              Receipt text                 Sales CSV/JSON
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite-backed document store with field-level merge and
//!   unique indexes
//! - [`models`]: Domain types (Client, ClinicalHistory, Product, Invoice, ...)
//! - [`services`]: Client, clinical history, product, register and invoice
//!   services
//! - [`cart`]: Line-item editing for a sale in progress
//! - [`listing`]: Recency sort, fuzzy search and pagination for list views
//! - [`migrations`]: Backfill runner and admin scripts
//! - [`export`]: Receipt rendering and sales export
//! - [`config`]: Startup configuration
//! - [`clock`]: Time source

pub mod cart;
pub mod clock;
pub mod config;
pub mod db;
pub mod export;
mod ffi;
pub mod listing;
pub mod migrations;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use cart::{Cart, CartError, CartState};
pub use config::AppConfig;
pub use db::Database;
pub use ffi::*;
pub use models::{
    Client, ClientUpdate, ClinicalHistory, ClinicalHistoryFields, Invoice, LineItem, NewClient,
    NewInvoice, NewProduct, Product, Totals,
};
pub use services::{
    ClientService, ClientWorkflow, ClinicalHistoryService, InvoiceService, ProductService,
    RegisterService, ServiceError,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use crate::models::{money_from_f64, rate_from_f64, PaymentMethod};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum OpticaError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Field name → form error key
    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: HashMap<String, String> },

    #[error("Invalid totals: {0}")]
    InvalidTotals(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("No cash register session is open")]
    RegisterClosed,

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Invalid operation: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for OpticaError {
    fn from(e: db::DbError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<ServiceError> for OpticaError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound { collection, id } => {
                OpticaError::NotFound(format!("{}/{}", collection, id))
            }
            ServiceError::ValidationFailed(errors) => OpticaError::ValidationFailed {
                errors: ffi::field_errors(&errors),
            },
            ServiceError::WriteFailed(e) => OpticaError::DatabaseError(e.to_string()),
            e @ ServiceError::InvalidTotals { .. } => OpticaError::InvalidTotals(e.to_string()),
            e @ ServiceError::InsufficientStock { .. } => {
                OpticaError::InsufficientStock(e.to_string())
            }
            ServiceError::RegisterClosed => OpticaError::RegisterClosed,
            ServiceError::ConfirmationRequired(message) => {
                OpticaError::ConfirmationRequired(message)
            }
            ServiceError::InvalidState(message) => OpticaError::InvalidState(message),
        }
    }
}

impl From<CartError> for OpticaError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::UnknownItem(id) => OpticaError::NotFound(format!("cart item {}", id)),
            other => OpticaError::InvalidInput(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for OpticaError {
    fn from(e: config::ConfigError) -> Self {
        OpticaError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for OpticaError {
    fn from(e: serde_json::Error) -> Self {
        OpticaError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for OpticaError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        OpticaError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

fn wrap_database(db: Database, tax_rate: Decimal) -> Arc<OpticaCore> {
    Arc::new(OpticaCore {
        db: Arc::new(Mutex::new(db)),
        tax_rate,
    })
}

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<OpticaCore>, OpticaError> {
    let db = Database::open(&path)?;
    Ok(wrap_database(db, AppConfig::default_tax_rate()))
}

/// Open the database named by `OPTICA_DATABASE` (a `.env` file is honoured),
/// with the tax rate from `OPTICA_TAX_RATE`.
#[uniffi::export]
pub fn open_database_from_env() -> Result<Arc<OpticaCore>, OpticaError> {
    let config = AppConfig::from_env()?;
    let db = Database::open(&config.database_path)?;
    Ok(wrap_database(db, config.tax_rate))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<OpticaCore>, OpticaError> {
    let db = Database::open_in_memory()?;
    Ok(wrap_database(db, AppConfig::default_tax_rate()))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct OpticaCore {
    db: Arc<Mutex<Database>>,
    tax_rate: Decimal,
}

#[uniffi::export]
impl OpticaCore {
    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Active clients, most recently created first.
    pub fn list_clients(&self) -> Result<Vec<FfiClient>, OpticaError> {
        let db = self.db.lock()?;
        let clients = ClientService::new(&db).list()?;
        Ok(clients.into_iter().map(Into::into).collect())
    }

    /// One page of active clients matching `query` (blank = all).
    pub fn search_clients(
        &self,
        query: String,
        page: u32,
        per_page: u32,
    ) -> Result<FfiClientPage, OpticaError> {
        let db = self.db.lock()?;
        let clients = ClientService::new(&db).list()?;
        let matches = listing::search(clients, &query);
        Ok(listing::paginate(matches, page as usize, per_page as usize).into())
    }

    pub fn get_client(&self, id: String) -> Result<FfiClient, OpticaError> {
        let db = self.db.lock()?;
        Ok(ClientService::new(&db).get_by_id(&id)?.into())
    }

    pub fn create_client(&self, client: FfiNewClient) -> Result<FfiClient, OpticaError> {
        let db = self.db.lock()?;
        let created = ClientService::new(&db).create(client.try_into()?)?;
        Ok(created.into())
    }

    pub fn update_client(
        &self,
        id: String,
        update: FfiClientUpdate,
    ) -> Result<FfiClient, OpticaError> {
        let db = self.db.lock()?;
        let updated = ClientService::new(&db).update(&id, update.try_into()?)?;
        Ok(updated.into())
    }

    /// Live form check: field → error key for a taken national ID or email.
    /// Advisory only; the store's unique index has the final word.
    pub fn validate_client_uniqueness(
        &self,
        national_id: String,
        email: Option<String>,
        exclude_id: Option<String>,
    ) -> Result<HashMap<String, String>, OpticaError> {
        let db = self.db.lock()?;
        let errors = ClientService::new(&db).validate_uniqueness(
            &national_id,
            email.as_deref(),
            exclude_id.as_deref(),
        )?;
        Ok(ffi::field_errors(&errors))
    }

    pub fn client_deactivation_check(&self, id: String) -> Result<FfiDebtSummary, OpticaError> {
        let db = self.db.lock()?;
        Ok(ClientService::new(&db).deactivation_check(&id)?.into())
    }

    pub fn deactivate_client(&self, id: String, confirmed: bool) -> Result<FfiClient, OpticaError> {
        let db = self.db.lock()?;
        Ok(ClientService::new(&db).deactivate(&id, confirmed)?.into())
    }

    pub fn reactivate_client(&self, id: String) -> Result<FfiClient, OpticaError> {
        let db = self.db.lock()?;
        Ok(ClientService::new(&db).reactivate(&id)?.into())
    }

    // =========================================================================
    // Client Form (client + clinical history)
    // =========================================================================

    /// Create a client and its history in one step; neither is stored if
    /// either fails.
    pub fn create_client_with_history(
        &self,
        client: FfiNewClient,
        history: FfiClinicalHistoryFields,
    ) -> Result<FfiSavedClient, OpticaError> {
        let db = self.db.lock()?;
        let saved = ClientWorkflow::new(&db)
            .create_client_with_history(client.try_into()?, &history.into())?;
        Ok(saved.into())
    }

    pub fn save_client_with_history(
        &self,
        client_id: String,
        update: FfiClientUpdate,
        history: FfiClinicalHistoryFields,
    ) -> Result<FfiSavedClient, OpticaError> {
        let db = self.db.lock()?;
        let saved = ClientWorkflow::new(&db).save_client_with_history(
            &client_id,
            update.try_into()?,
            &history.into(),
        )?;
        Ok(saved.into())
    }

    // =========================================================================
    // Clinical History Operations
    // =========================================================================

    /// Merge `fields` into the client's history; absent fields keep their
    /// stored values.
    pub fn save_clinical_history(
        &self,
        client_id: String,
        fields: FfiClinicalHistoryFields,
    ) -> Result<FfiClinicalHistory, OpticaError> {
        let db = self.db.lock()?;
        let history = ClinicalHistoryService::new(&db).save(&client_id, &fields.into())?;
        Ok(history.into())
    }

    pub fn get_clinical_history(
        &self,
        client_id: String,
    ) -> Result<Option<FfiClinicalHistory>, OpticaError> {
        let db = self.db.lock()?;
        let history = ClinicalHistoryService::new(&db).get(&client_id)?;
        Ok(history.map(Into::into))
    }

    /// Dated consultations, newest first.
    pub fn list_clinical_entries(
        &self,
        client_id: String,
    ) -> Result<Vec<FfiClinicalHistoryEntry>, OpticaError> {
        let db = self.db.lock()?;
        let entries = ClinicalHistoryService::new(&db).list_all(&client_id)?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Product Operations
    // =========================================================================

    pub fn list_products(&self) -> Result<Vec<FfiProduct>, OpticaError> {
        let db = self.db.lock()?;
        let products = ProductService::new(&db).list()?;
        Ok(products.into_iter().map(Into::into).collect())
    }

    pub fn search_products(&self, query: String) -> Result<Vec<FfiProduct>, OpticaError> {
        let db = self.db.lock()?;
        let products = ProductService::new(&db).list()?;
        Ok(listing::search(products, &query)
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub fn get_product(&self, id: String) -> Result<FfiProduct, OpticaError> {
        let db = self.db.lock()?;
        Ok(ProductService::new(&db).get(&id)?.into())
    }

    pub fn create_product(&self, product: FfiNewProduct) -> Result<FfiProduct, OpticaError> {
        let db = self.db.lock()?;
        let created = ProductService::new(&db).create(product.try_into()?)?;
        Ok(created.into())
    }

    pub fn update_product(
        &self,
        id: String,
        update: FfiProductUpdate,
    ) -> Result<FfiProduct, OpticaError> {
        let db = self.db.lock()?;
        let updated = ProductService::new(&db).update(&id, update.try_into()?)?;
        Ok(updated.into())
    }

    pub fn deactivate_product(&self, id: String) -> Result<FfiProduct, OpticaError> {
        let db = self.db.lock()?;
        Ok(ProductService::new(&db).deactivate(&id)?.into())
    }

    /// Restock (positive) or write off (negative).
    pub fn adjust_stock(&self, id: String, delta: i64) -> Result<FfiProduct, OpticaError> {
        let db = self.db.lock()?;
        Ok(ProductService::new(&db).adjust_stock(&id, delta)?.into())
    }

    // =========================================================================
    // Register Operations
    // =========================================================================

    pub fn open_register(
        &self,
        operator: String,
        opening_balance: f64,
    ) -> Result<FfiOpenRegister, OpticaError> {
        let opening_balance = ffi::money_in("opening_balance", opening_balance)?;
        let db = self.db.lock()?;
        let register = RegisterService::new(&db).open(&operator, opening_balance)?;
        Ok(register.into())
    }

    pub fn current_register(&self) -> Result<Option<FfiOpenRegister>, OpticaError> {
        let db = self.db.lock()?;
        let register = RegisterService::new(&db).current()?;
        Ok(register.map(Into::into))
    }

    pub fn close_register(&self, operator: String) -> Result<(), OpticaError> {
        let db = self.db.lock()?;
        let service = RegisterService::new(&db);
        let register = service.require_open()?;
        service.close(register, &operator)?;
        Ok(())
    }

    // =========================================================================
    // Sale Operations
    // =========================================================================

    /// Start an empty cart at the configured tax rate.
    pub fn new_cart(&self) -> Arc<FfiCart> {
        Arc::new(FfiCart {
            db: Arc::clone(&self.db),
            cart: Mutex::new(Cart::new(self.tax_rate)),
        })
    }

    pub fn get_invoice(&self, id: String) -> Result<FfiInvoice, OpticaError> {
        let db = self.db.lock()?;
        Ok(InvoiceService::new(&db).get(&id)?.into())
    }

    /// A client's invoices, newest first.
    pub fn list_client_invoices(&self, client_id: String) -> Result<Vec<FfiInvoice>, OpticaError> {
        let db = self.db.lock()?;
        let invoices = InvoiceService::new(&db).list_for_client(&client_id)?;
        Ok(invoices.into_iter().map(Into::into).collect())
    }

    pub fn record_payment(&self, invoice_id: String, amount: f64) -> Result<FfiInvoice, OpticaError> {
        let amount = ffi::money_in("amount", amount)?;
        let db = self.db.lock()?;
        Ok(InvoiceService::new(&db).record_payment(&invoice_id, amount)?.into())
    }

    /// Void a sale and put its stock back. Needs `confirmed`.
    pub fn void_invoice(&self, invoice_id: String, confirmed: bool) -> Result<FfiInvoice, OpticaError> {
        let db = self.db.lock()?;
        Ok(InvoiceService::new(&db).void(&invoice_id, confirmed)?.into())
    }

    pub fn client_debt(&self, client_id: String) -> Result<FfiDebtSummary, OpticaError> {
        let db = self.db.lock()?;
        Ok(InvoiceService::new(&db).debt_summary(&client_id)?.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Fixed-width receipt text for the print view.
    pub fn render_receipt(&self, invoice_id: String, width: u32) -> Result<String, OpticaError> {
        let db = self.db.lock()?;
        let invoice = InvoiceService::new(&db).get(&invoice_id)?;
        Ok(export::render_receipt(&invoice, width as usize))
    }

    pub fn export_sales_json(&self) -> Result<String, OpticaError> {
        let db = self.db.lock()?;
        let report = export::SalesExporter::new(&db).export_all()?;
        Ok(report.to_json()?)
    }

    pub fn export_sales_csv(&self) -> Result<String, OpticaError> {
        let db = self.db.lock()?;
        let report = export::SalesExporter::new(&db).export_all()?;
        Ok(report.to_csv())
    }

    /// Sales of one register session as CSV.
    pub fn export_session_csv(&self, session_id: String) -> Result<String, OpticaError> {
        let db = self.db.lock()?;
        let report = export::SalesExporter::new(&db).export_session(&session_id)?;
        Ok(report.to_csv())
    }
}

// =========================================================================
// Cart Object
// =========================================================================

/// Snapshot of a cart after each edit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCartView {
    /// `Empty`, `Building` or `ReadyToSave`
    pub state: String,
    pub items: Vec<FfiLineItem>,
    pub totals: FfiTotals,
    pub tax_rate: f64,
    pub client_id: Option<String>,
    pub payment_method: Option<String>,
}

impl From<&Cart> for FfiCartView {
    fn from(cart: &Cart) -> Self {
        Self {
            state: format!("{:?}", cart.state()),
            items: cart.items().iter().cloned().map(Into::into).collect(),
            totals: cart.totals().into(),
            tax_rate: models::money_to_f64(cart.tax_rate()),
            client_id: cart.client_id().map(str::to_string),
            payment_method: cart.payment_method().map(|m| m.as_str().to_string()),
        }
    }
}

/// A sale being built in the UI.
#[derive(uniffi::Object)]
pub struct FfiCart {
    db: Arc<Mutex<Database>>,
    cart: Mutex<Cart>,
}

#[uniffi::export]
impl FfiCart {
    pub fn view(&self) -> Result<FfiCartView, OpticaError> {
        let cart = self.cart.lock()?;
        Ok(FfiCartView::from(&*cart))
    }

    /// Add one unit of a product; a product already in the cart gets its
    /// quantity bumped.
    pub fn add_product(&self, product_id: String) -> Result<FfiCartView, OpticaError> {
        let db = self.db.lock()?;
        let product = ProductService::new(&db).get(&product_id)?;
        if !product.active {
            return Err(OpticaError::InvalidState(format!(
                "product {} is inactive",
                product.name
            )));
        }
        let mut cart = self.cart.lock()?;
        cart.add_product(&product)?;
        Ok(FfiCartView::from(&*cart))
    }

    /// Values below 1 become 1.
    pub fn set_quantity(&self, product_id: String, quantity: i64) -> Result<FfiCartView, OpticaError> {
        let mut cart = self.cart.lock()?;
        cart.set_quantity(&product_id, quantity)?;
        Ok(FfiCartView::from(&*cart))
    }

    pub fn set_unit_price(
        &self,
        product_id: String,
        unit_price: f64,
    ) -> Result<FfiCartView, OpticaError> {
        let unit_price = ffi::money_in("unit_price", unit_price)?;
        let mut cart = self.cart.lock()?;
        cart.set_unit_price(&product_id, unit_price)?;
        Ok(FfiCartView::from(&*cart))
    }

    pub fn remove_item(&self, product_id: String) -> Result<FfiCartView, OpticaError> {
        let mut cart = self.cart.lock()?;
        cart.remove_item(&product_id)?;
        Ok(FfiCartView::from(&*cart))
    }

    pub fn set_client(&self, client_id: Option<String>) -> Result<FfiCartView, OpticaError> {
        let mut cart = self.cart.lock()?;
        cart.set_client(client_id);
        Ok(FfiCartView::from(&*cart))
    }

    /// `cash`, `card`, `transfer` or `credit`; `None` clears the choice.
    pub fn set_payment_method(&self, method: Option<String>) -> Result<FfiCartView, OpticaError> {
        let method = method
            .map(|raw| {
                PaymentMethod::parse(&raw)
                    .ok_or_else(|| OpticaError::InvalidInput(format!("unknown payment method: {}", raw)))
            })
            .transpose()?;
        let mut cart = self.cart.lock()?;
        cart.set_payment_method(method);
        Ok(FfiCartView::from(&*cart))
    }

    pub fn set_tax_rate(&self, tax_rate: f64) -> Result<FfiCartView, OpticaError> {
        let rate = rate_from_f64(tax_rate)
            .ok_or_else(|| OpticaError::InvalidInput(format!("invalid tax rate: {}", tax_rate)))?;
        let mut cart = self.cart.lock()?;
        cart.set_tax_rate(rate)?;
        Ok(FfiCartView::from(&*cart))
    }

    pub fn clear(&self) -> Result<FfiCartView, OpticaError> {
        let mut cart = self.cart.lock()?;
        cart.clear();
        Ok(FfiCartView::from(&*cart))
    }

    /// Save the cart as an invoice against the open register session.
    /// The cart is emptied only when the invoice is stored.
    pub fn save(&self, operator: String, amount_paid: f64) -> Result<FfiInvoice, OpticaError> {
        let amount_paid = money_from_f64(amount_paid)
            .ok_or_else(|| OpticaError::InvalidInput("amount_paid: not a valid amount".into()))?;
        let db = self.db.lock()?;
        let mut cart = self.cart.lock()?;

        let register = RegisterService::new(&db).require_open()?;
        let new_invoice = cart.clone().into_new_invoice(&operator, amount_paid)?;
        let invoice = InvoiceService::new(&db).create(&register, new_invoice)?;

        *cart = Cart::new(cart.tax_rate());
        Ok(invoice.into())
    }
}
