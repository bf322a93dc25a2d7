//! Invoice and line-item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{round_money, AmountOverflow, ClinicalHistory, Product, Totals};

/// One product-quantity-price entry of a sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Product document ID
    pub product_id: String,
    /// Product sequential ID (legacy cross-reference)
    pub product_internal_id: Option<u64>,
    /// Description printed on the receipt
    pub description: String,
    /// Units, at least 1
    pub quantity: u32,
    /// Price per unit at sale time
    pub unit_price: Decimal,
    /// quantity × unit_price
    pub total: Decimal,
}

/// Most units of one product a single line may carry.
pub const MAX_QUANTITY: u32 = 10_000;

impl LineItem {
    /// A single unit of `product` at its current price, rounded to cents.
    pub fn from_product(product: &Product) -> Self {
        let unit_price = round_money(product.price);
        Self {
            product_id: product.id.clone(),
            product_internal_id: product.internal_id,
            description: product.name.clone(),
            quantity: 1,
            unit_price,
            total: unit_price,
        }
    }

    /// Set the quantity, clamped to `1..=MAX_QUANTITY`, and refresh the total.
    ///
    /// The line is left untouched when the new total would overflow.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), AmountOverflow> {
        let clamped = quantity.clamp(1, i64::from(MAX_QUANTITY));
        let quantity = u32::try_from(clamped).unwrap_or(MAX_QUANTITY);
        self.total = line_total(quantity, self.unit_price)?;
        self.quantity = quantity;
        Ok(())
    }

    /// Set the unit price, rounded to cents, and refresh the total.
    pub fn set_unit_price(&mut self, unit_price: Decimal) -> Result<(), AmountOverflow> {
        let unit_price = round_money(unit_price);
        self.total = line_total(self.quantity, unit_price)?;
        self.unit_price = unit_price;
        Ok(())
    }

    pub fn recompute(&mut self) -> Result<(), AmountOverflow> {
        self.total = self.expected_total()?;
        Ok(())
    }

    pub fn expected_total(&self) -> Result<Decimal, AmountOverflow> {
        line_total(self.quantity, self.unit_price)
    }

    /// True when the stored total is exactly quantity × unit price.
    pub fn is_consistent(&self) -> bool {
        self.quantity >= 1 && self.expected_total() == Ok(self.total)
    }
}

fn line_total(quantity: u32, unit_price: Decimal) -> Result<Decimal, AmountOverflow> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or(AmountOverflow)
}

/// How the client paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    /// Store credit: paid in installments
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Credit => "credit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cash" | "efectivo" => Some(PaymentMethod::Cash),
            "card" | "tarjeta" => Some(PaymentMethod::Card),
            "transfer" | "transferencia" => Some(PaymentMethod::Transfer),
            "credit" | "credito" | "crédito" => Some(PaymentMethod::Credit),
            _ => None,
        }
    }
}

/// Settlement state derived from the amount paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Pending,
}

impl PaymentStatus {
    pub fn derive(total: Decimal, amount_paid: Decimal) -> Self {
        if amount_paid >= total {
            PaymentStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Pending => "pending",
        }
    }

    pub fn is_outstanding(&self) -> bool {
        matches!(self, PaymentStatus::Partial | PaymentStatus::Pending)
    }
}

/// Client identity as it was at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSnapshot {
    pub full_name: String,
    pub national_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A persisted sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub client_id: String,
    pub client: ClientSnapshot,
    /// Copy of the clinical history at sale time; later edits to the
    /// history never change it
    pub clinical_snapshot: Option<ClinicalHistory>,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub register_session_id: String,
    /// Who made the sale
    pub operator: String,
    pub created_at: DateTime<Utc>,
    /// Voided invoices stay stored but no longer count
    #[serde(default)]
    pub voided: bool,
}

impl Invoice {
    /// Amount still owed.
    pub fn balance(&self) -> Decimal {
        (self.total - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Total units sold.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

/// A sale ready to be persisted, as computed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInvoice {
    pub client_id: String,
    pub items: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub amount_paid: Decimal,
    pub operator: String,
}

impl NewInvoice {
    pub fn claimed_totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }
}

/// Outstanding balance of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebtSummary {
    pub total_owed: Decimal,
    pub pending_count: u32,
}

impl DebtSummary {
    pub fn has_debt(&self) -> bool {
        self.pending_count > 0 && self.total_owed > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductCategory;

    fn product(price: i64) -> Product {
        Product {
            id: "p1".into(),
            internal_id: Some(3),
            name: "Acetate frame".into(),
            brand: None,
            category: ProductCategory::Frames,
            cost: Decimal::ZERO,
            price: Decimal::from(price),
            stock: 5,
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_line_item_from_product() {
        let item = LineItem::from_product(&product(10));
        assert_eq!(item.quantity, 1);
        assert_eq!(item.total, Decimal::from(10));
        assert_eq!(item.product_internal_id, Some(3));
    }

    #[test]
    fn test_set_quantity_clamps() {
        let mut item = LineItem::from_product(&product(10));

        item.set_quantity(3).unwrap();
        assert_eq!(item.total, Decimal::from(30));

        item.set_quantity(0).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.total, Decimal::from(10));

        item.set_quantity(-4).unwrap();
        assert_eq!(item.quantity, 1);
        assert!(item.is_consistent());

        item.set_quantity(i64::MAX).unwrap();
        assert_eq!(item.quantity, MAX_QUANTITY);
        assert!(item.is_consistent());
    }

    #[test]
    fn test_set_unit_price_recomputes() {
        let mut item = LineItem::from_product(&product(10));
        item.set_quantity(2).unwrap();
        item.set_unit_price("7.50".parse().unwrap()).unwrap();
        assert_eq!(item.total, Decimal::from(15));
    }

    #[test]
    fn test_sub_cent_price_is_rounded_on_entry() {
        let mut priced = product(0);
        priced.price = "0.125".parse().unwrap();

        let mut item = LineItem::from_product(&priced);
        assert_eq!(item.unit_price, "0.13".parse::<Decimal>().unwrap());
        assert_eq!(item.total, item.unit_price);

        item.set_quantity(3).unwrap();
        item.set_unit_price("2.005".parse().unwrap()).unwrap();
        assert_eq!(item.unit_price, "2.01".parse::<Decimal>().unwrap());
        assert_eq!(item.total, Decimal::from(item.quantity) * item.unit_price);
        assert!(item.is_consistent());
    }

    #[test]
    fn test_overflowing_total_leaves_line_untouched() {
        let mut item = LineItem::from_product(&product(10));
        item.set_quantity(4).unwrap();
        let before = item.clone();

        assert_eq!(item.set_unit_price(Decimal::MAX), Err(AmountOverflow));
        assert_eq!(item, before);
    }

    #[test]
    fn test_stored_rounding_is_inconsistent() {
        let item = LineItem {
            product_id: "p1".into(),
            product_internal_id: None,
            description: "Lens cloth".into(),
            quantity: 1,
            unit_price: "0.125".parse().unwrap(),
            total: "0.13".parse().unwrap(),
        };
        assert!(!item.is_consistent());
    }

    #[test]
    fn test_payment_status_derivation() {
        let total = Decimal::from(100);
        assert_eq!(PaymentStatus::derive(total, Decimal::from(100)), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(total, Decimal::from(40)), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::derive(total, Decimal::ZERO), PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("Efectivo"), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::parse("card"), Some(PaymentMethod::Card));
        assert_eq!(PaymentMethod::parse("cheque"), None);
    }
}
