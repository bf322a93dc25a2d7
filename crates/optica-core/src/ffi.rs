//! FFI-safe records exchanged with the desktop shell.
//!
//! Money crosses the boundary as `f64` and is rounded to cents on the way
//! in; dates and timestamps cross as ISO-8601 strings.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::listing::Page;
use crate::models::{
    money_from_f64, money_to_f64, Client, ClientUpdate, ClinicalHistory, ClinicalHistoryEntry,
    ClinicalHistoryFields, DebtSummary, EyeRefraction, Invoice, LineItem, NewClient, NewProduct,
    Product, ProductCategory, ProductUpdate, Totals, ValidationErrors,
};
use crate::services::{DeactivationCheck, OpenRegister, SavedClient};
use crate::OpticaError;

pub(crate) fn money_in(field: &str, value: f64) -> Result<rust_decimal::Decimal, OpticaError> {
    money_from_f64(value)
        .ok_or_else(|| OpticaError::InvalidInput(format!("{}: not a valid amount", field)))
}

fn optional_money_in(
    field: &str,
    value: Option<f64>,
) -> Result<Option<rust_decimal::Decimal>, OpticaError> {
    value.map(|v| money_in(field, v)).transpose()
}

fn date_in(value: Option<String>) -> Result<Option<NaiveDate>, OpticaError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| OpticaError::InvalidInput(format!("birth_date: expected YYYY-MM-DD, got {}", raw))),
    }
}

fn category_in(value: &str) -> Result<ProductCategory, OpticaError> {
    ProductCategory::parse(value)
        .ok_or_else(|| OpticaError::InvalidInput(format!("unknown category: {}", value)))
}

/// Field name → form error key (`required`, `pattern`, `cedulaTomada`, ...).
pub(crate) fn field_errors(errors: &ValidationErrors) -> HashMap<String, String> {
    errors
        .iter()
        .map(|(field, error)| (field.to_string(), error.key().to_string()))
        .collect()
}

// =========================================================================
// Clients
// =========================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub national_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<Client> for FfiClient {
    fn from(client: Client) -> Self {
        Self {
            full_name: client.full_name(),
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            national_id: client.national_id,
            email: client.email,
            phone: client.phone,
            address: client.address,
            birth_date: client.birth_date.map(|d| d.to_string()),
            occupation: client.occupation,
            notes: client.notes,
            active: client.active,
            created_at: client.created_at.map(|t| t.to_rfc3339()),
            updated_at: client.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Client form contents.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewClient {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// YYYY-MM-DD
    pub birth_date: Option<String>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiNewClient> for NewClient {
    type Error = OpticaError;

    fn try_from(client: FfiNewClient) -> Result<Self, Self::Error> {
        Ok(NewClient {
            first_name: client.first_name,
            last_name: client.last_name,
            national_id: client.national_id,
            email: client.email,
            phone: client.phone,
            address: client.address,
            birth_date: date_in(client.birth_date)?,
            occupation: client.occupation,
            notes: client.notes,
        })
    }
}

/// Changed client fields; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiClientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiClientUpdate> for ClientUpdate {
    type Error = OpticaError;

    fn try_from(update: FfiClientUpdate) -> Result<Self, Self::Error> {
        Ok(ClientUpdate {
            first_name: update.first_name,
            last_name: update.last_name,
            national_id: update.national_id,
            email: update.email,
            phone: update.phone,
            address: update.address,
            birth_date: date_in(update.birth_date)?,
            occupation: update.occupation,
            notes: update.notes,
        })
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClientPage {
    pub items: Vec<FfiClient>,
    pub page: u32,
    pub per_page: u32,
    pub total: u32,
    pub total_pages: u32,
}

impl From<Page<Client>> for FfiClientPage {
    fn from(page: Page<Client>) -> Self {
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            page: page.page as u32,
            per_page: page.per_page as u32,
            total: page.total as u32,
            total_pages: page.total_pages as u32,
        }
    }
}

/// Outstanding balance shown before deactivating a client.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDebtSummary {
    pub total_owed: f64,
    pub pending_count: u32,
    pub requires_confirmation: bool,
}

impl From<DebtSummary> for FfiDebtSummary {
    fn from(debt: DebtSummary) -> Self {
        Self {
            requires_confirmation: debt.has_debt(),
            total_owed: money_to_f64(debt.total_owed),
            pending_count: debt.pending_count,
        }
    }
}

impl From<DeactivationCheck> for FfiDebtSummary {
    fn from(check: DeactivationCheck) -> Self {
        Self {
            total_owed: money_to_f64(check.debt.total_owed),
            pending_count: check.debt.pending_count,
            requires_confirmation: check.requires_confirmation,
        }
    }
}

// =========================================================================
// Clinical history
// =========================================================================

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiEyeRefraction {
    pub sphere: Option<f64>,
    pub cylinder: Option<f64>,
    pub axis: Option<u16>,
    pub addition: Option<f64>,
    pub acuity_uncorrected: Option<String>,
    pub acuity_corrected: Option<String>,
}

impl From<EyeRefraction> for FfiEyeRefraction {
    fn from(eye: EyeRefraction) -> Self {
        Self {
            sphere: eye.sphere,
            cylinder: eye.cylinder,
            axis: eye.axis,
            addition: eye.addition,
            acuity_uncorrected: eye.acuity_uncorrected,
            acuity_corrected: eye.acuity_corrected,
        }
    }
}

impl From<FfiEyeRefraction> for EyeRefraction {
    fn from(eye: FfiEyeRefraction) -> Self {
        Self {
            sphere: eye.sphere,
            cylinder: eye.cylinder,
            axis: eye.axis,
            addition: eye.addition,
            acuity_uncorrected: eye.acuity_uncorrected,
            acuity_corrected: eye.acuity_corrected,
        }
    }
}

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiClinicalHistoryFields {
    pub right_eye: Option<FfiEyeRefraction>,
    pub left_eye: Option<FfiEyeRefraction>,
    pub pupillary_distance: Option<f64>,
    pub frame_material: Option<String>,
    pub frame_color: Option<String>,
    pub lens_type: Option<String>,
    pub diagnosis: Option<String>,
    pub observations: Option<String>,
}

impl From<ClinicalHistoryFields> for FfiClinicalHistoryFields {
    fn from(fields: ClinicalHistoryFields) -> Self {
        Self {
            right_eye: fields.right_eye.map(Into::into),
            left_eye: fields.left_eye.map(Into::into),
            pupillary_distance: fields.pupillary_distance,
            frame_material: fields.frame_material,
            frame_color: fields.frame_color,
            lens_type: fields.lens_type,
            diagnosis: fields.diagnosis,
            observations: fields.observations,
        }
    }
}

impl From<FfiClinicalHistoryFields> for ClinicalHistoryFields {
    fn from(fields: FfiClinicalHistoryFields) -> Self {
        Self {
            right_eye: fields.right_eye.map(Into::into),
            left_eye: fields.left_eye.map(Into::into),
            pupillary_distance: fields.pupillary_distance,
            frame_material: fields.frame_material,
            frame_color: fields.frame_color,
            lens_type: fields.lens_type,
            diagnosis: fields.diagnosis,
            observations: fields.observations,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClinicalHistory {
    pub client_id: String,
    pub fields: FfiClinicalHistoryFields,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ClinicalHistory> for FfiClinicalHistory {
    fn from(history: ClinicalHistory) -> Self {
        Self {
            client_id: history.client_id,
            fields: history.fields.into(),
            created_at: history.created_at.to_rfc3339(),
            updated_at: history.updated_at.to_rfc3339(),
        }
    }
}

/// One dated consultation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClinicalHistoryEntry {
    pub id: String,
    pub client_id: String,
    pub recorded_at: String,
    pub fields: FfiClinicalHistoryFields,
}

impl From<ClinicalHistoryEntry> for FfiClinicalHistoryEntry {
    fn from(entry: ClinicalHistoryEntry) -> Self {
        Self {
            id: entry.id,
            client_id: entry.client_id,
            recorded_at: entry.recorded_at.to_rfc3339(),
            fields: entry.fields.into(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSavedClient {
    pub client: FfiClient,
    pub history: Option<FfiClinicalHistory>,
}

impl From<SavedClient> for FfiSavedClient {
    fn from(saved: SavedClient) -> Self {
        Self {
            client: saved.client.into(),
            history: saved.history.map(Into::into),
        }
    }
}

// =========================================================================
// Products
// =========================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProduct {
    pub id: String,
    pub internal_id: Option<u64>,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub unlimited_stock: bool,
    pub cost: f64,
    pub price: f64,
    pub stock: i64,
    pub active: bool,
}

impl From<Product> for FfiProduct {
    fn from(product: Product) -> Self {
        Self {
            unlimited_stock: product.stock_control() == crate::models::StockControl::Unlimited,
            id: product.id,
            internal_id: product.internal_id,
            name: product.name,
            brand: product.brand,
            category: product.category.as_str().to_string(),
            cost: money_to_f64(product.cost),
            price: money_to_f64(product.price),
            stock: product.stock,
            active: product.active,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewProduct {
    pub name: String,
    pub brand: Option<String>,
    /// e.g. `FRAMES`, `SERVICES`
    pub category: String,
    pub cost: f64,
    pub price: f64,
    pub stock: i64,
}

impl TryFrom<FfiNewProduct> for NewProduct {
    type Error = OpticaError;

    fn try_from(product: FfiNewProduct) -> Result<Self, Self::Error> {
        Ok(NewProduct {
            category: category_in(&product.category)?,
            cost: money_in("cost", product.cost)?,
            price: money_in("price", product.price)?,
            name: product.name,
            brand: product.brand,
            stock: product.stock,
        })
    }
}

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiProductUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub cost: Option<f64>,
    pub price: Option<f64>,
}

impl TryFrom<FfiProductUpdate> for ProductUpdate {
    type Error = OpticaError;

    fn try_from(update: FfiProductUpdate) -> Result<Self, Self::Error> {
        Ok(ProductUpdate {
            category: update.category.as_deref().map(category_in).transpose()?,
            cost: optional_money_in("cost", update.cost)?,
            price: optional_money_in("price", update.price)?,
            name: update.name,
            brand: update.brand,
        })
    }
}

// =========================================================================
// Sales
// =========================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLineItem {
    pub product_id: String,
    pub product_internal_id: Option<u64>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

impl From<LineItem> for FfiLineItem {
    fn from(item: LineItem) -> Self {
        Self {
            product_id: item.product_id,
            product_internal_id: item.product_internal_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: money_to_f64(item.unit_price),
            total: money_to_f64(item.total),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl From<Totals> for FfiTotals {
    fn from(totals: Totals) -> Self {
        Self {
            subtotal: money_to_f64(totals.subtotal),
            tax: money_to_f64(totals.tax),
            total: money_to_f64(totals.total),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoice {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub national_id: String,
    pub items: Vec<FfiLineItem>,
    pub tax_rate: f64,
    pub totals: FfiTotals,
    pub payment_method: String,
    pub amount_paid: f64,
    pub balance: f64,
    pub payment_status: String,
    pub register_session_id: String,
    pub operator: String,
    pub created_at: String,
    pub voided: bool,
    /// The sale carries the prescription in force when it was made
    pub has_prescription: bool,
}

impl From<Invoice> for FfiInvoice {
    fn from(invoice: Invoice) -> Self {
        Self {
            totals: invoice.totals().into(),
            balance: money_to_f64(invoice.balance()),
            has_prescription: invoice.clinical_snapshot.is_some(),
            id: invoice.id,
            client_id: invoice.client_id,
            client_name: invoice.client.full_name,
            national_id: invoice.client.national_id,
            items: invoice.items.into_iter().map(Into::into).collect(),
            tax_rate: money_to_f64(invoice.tax_rate),
            payment_method: invoice.payment_method.as_str().to_string(),
            amount_paid: money_to_f64(invoice.amount_paid),
            payment_status: invoice.payment_status.as_str().to_string(),
            register_session_id: invoice.register_session_id,
            operator: invoice.operator,
            created_at: invoice.created_at.to_rfc3339(),
            voided: invoice.voided,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOpenRegister {
    pub session_id: String,
    /// YYYY-MM-DD
    pub business_date: String,
    pub opened_by: String,
}

impl From<OpenRegister> for FfiOpenRegister {
    fn from(register: OpenRegister) -> Self {
        Self {
            session_id: register.session_id().to_string(),
            business_date: register.business_date().to_string(),
            opened_by: register.opened_by().to_string(),
        }
    }
}
