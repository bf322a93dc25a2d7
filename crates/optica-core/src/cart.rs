//! In-memory sale under construction.
//!
//! A cart moves through three states:
//!
//! - `Empty`: no line items
//! - `Building`: has items, but no client or no payment method yet
//! - `ReadyToSave`: has items, a client and a payment method
//!
//! Totals are recomputed from scratch after every mutation, so they can
//! never drift from the line items.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    AmountOverflow, LineItem, NewInvoice, PaymentMethod, Product, Totals, MAX_PRICE, MAX_QUANTITY,
};

/// Cart errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CartError {
    #[error("No line item for product {0}")]
    UnknownItem(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Cart is not ready to save (state: {0:?})")]
    NotReady(CartState),

    #[error(transparent)]
    Overflow(#[from] AmountOverflow),
}

pub type CartResult<T> = Result<T, CartError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartState {
    Empty,
    Building,
    ReadyToSave,
}

/// Line items of one sale plus the choices needed to save it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    items: Vec<LineItem>,
    client_id: Option<String>,
    payment_method: Option<PaymentMethod>,
    tax_rate: Decimal,
    totals: Totals,
}

impl Cart {
    pub fn new(tax_rate: Decimal) -> Self {
        Self {
            items: Vec::new(),
            client_id: None,
            payment_method: None,
            tax_rate,
            totals: Totals::default(),
        }
    }

    pub fn state(&self) -> CartState {
        if self.items.is_empty() {
            CartState::Empty
        } else if self.client_id.is_some() && self.payment_method.is_some() {
            CartState::ReadyToSave
        } else {
            CartState::Building
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    /// One more unit of `product`: bumps its line if present, otherwise
    /// appends a new line with quantity 1.
    pub fn add_product(&mut self, product: &Product) -> CartResult<()> {
        match self.position(&product.id) {
            Some(index) => {
                let quantity = self.items[index].quantity;
                if quantity >= MAX_QUANTITY {
                    return Err(CartError::InvalidAmount(Decimal::from(quantity) + Decimal::ONE));
                }
                self.edit_line(index, |item| item.set_quantity(i64::from(quantity) + 1))
            }
            None => {
                let mut items = self.items.clone();
                items.push(LineItem::from_product(product));
                self.commit(items)
            }
        }
    }

    /// Set a line's quantity; anything below 1 becomes 1.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CartResult<()> {
        let index = self.require_position(product_id)?;
        if quantity > i64::from(MAX_QUANTITY) {
            return Err(CartError::InvalidAmount(Decimal::from(quantity)));
        }
        self.edit_line(index, |item| item.set_quantity(quantity))
    }

    /// Override a line's unit price (discounts, negotiated prices).
    /// The price is rounded to cents.
    pub fn set_unit_price(&mut self, product_id: &str, unit_price: Decimal) -> CartResult<()> {
        if unit_price < Decimal::ZERO || unit_price > MAX_PRICE {
            return Err(CartError::InvalidAmount(unit_price));
        }
        let index = self.require_position(product_id)?;
        self.edit_line(index, |item| item.set_unit_price(unit_price))
    }

    pub fn remove_item(&mut self, product_id: &str) -> CartResult<LineItem> {
        let index = self.require_position(product_id)?;
        let mut items = self.items.clone();
        let removed = items.remove(index);
        self.commit(items)?;
        Ok(removed)
    }

    pub fn set_client(&mut self, client_id: Option<String>) {
        self.client_id = client_id.filter(|id| !id.trim().is_empty());
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.payment_method = method;
    }

    pub fn set_tax_rate(&mut self, tax_rate: Decimal) -> CartResult<()> {
        if tax_rate < Decimal::ZERO {
            return Err(CartError::InvalidAmount(tax_rate));
        }
        self.totals = Totals::compute(&self.items, tax_rate)?;
        self.tax_rate = tax_rate;
        Ok(())
    }

    /// Drop every line; client and payment choices are kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.totals = Totals::default();
    }

    /// Turn a ready cart into a sale for the invoice service.
    ///
    /// Check [`Cart::state`] first: a cart that is not ready is consumed
    /// by the failed call.
    pub fn into_new_invoice(self, operator: &str, amount_paid: Decimal) -> CartResult<NewInvoice> {
        if amount_paid < Decimal::ZERO {
            return Err(CartError::InvalidAmount(amount_paid));
        }
        let state = self.state();
        match (self.client_id, self.payment_method) {
            (Some(client_id), Some(payment_method)) if state == CartState::ReadyToSave => {
                Ok(NewInvoice {
                    client_id,
                    items: self.items,
                    tax_rate: self.tax_rate,
                    subtotal: self.totals.subtotal,
                    tax: self.totals.tax,
                    total: self.totals.total,
                    payment_method,
                    amount_paid,
                    operator: operator.to_string(),
                })
            }
            _ => Err(CartError::NotReady(state)),
        }
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.product_id == product_id)
    }

    fn require_position(&self, product_id: &str) -> CartResult<usize> {
        self.position(product_id)
            .ok_or_else(|| CartError::UnknownItem(product_id.to_string()))
    }

    /// Apply `edit` to one line; nothing changes if the new amounts overflow.
    fn edit_line<F>(&mut self, index: usize, edit: F) -> CartResult<()>
    where
        F: FnOnce(&mut LineItem) -> Result<(), AmountOverflow>,
    {
        let mut items = self.items.clone();
        edit(&mut items[index])?;
        self.commit(items)
    }

    fn commit(&mut self, items: Vec<LineItem>) -> CartResult<()> {
        self.totals = Totals::compute(&items, self.tax_rate)?;
        self.items = items;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductCategory;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(id: &str, price: &str) -> Product {
        Product {
            id: id.into(),
            internal_id: None,
            name: format!("Product {}", id),
            brand: None,
            category: ProductCategory::Frames,
            cost: Decimal::ZERO,
            price: dec(price),
            stock: 10,
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_add_same_product_twice() {
        let mut cart = Cart::new(dec("0.15"));
        let a = product("a", "10");

        cart.add_product(&a).unwrap();
        cart.add_product(&a).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.items()[0].total, dec("20"));
    }

    #[test]
    fn test_reference_totals() {
        let mut cart = Cart::new(dec("0.15"));
        let a = product("a", "10");
        let b = product("b", "5");

        cart.add_product(&a).unwrap();
        cart.add_product(&a).unwrap();
        cart.add_product(&b).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.subtotal, dec("25"));
        assert_eq!(totals.tax, dec("3.75"));
        assert_eq!(totals.total, dec("28.75"));
    }

    #[test]
    fn test_set_quantity_zero_clamps_to_one() {
        let mut cart = Cart::new(dec("0.15"));
        cart.add_product(&product("a", "10")).unwrap();
        cart.set_quantity("a", 4).unwrap();
        assert_eq!(cart.totals().subtotal, dec("40"));

        cart.set_quantity("a", 0).unwrap();
        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.totals().subtotal, dec("10"));
    }

    #[test]
    fn test_unknown_item() {
        let mut cart = Cart::new(dec("0.15"));
        assert_eq!(
            cart.set_quantity("x", 2),
            Err(CartError::UnknownItem("x".into()))
        );
        assert!(cart.remove_item("x").is_err());
    }

    #[test]
    fn test_remove_recomputes() {
        let mut cart = Cart::new(dec("0.12"));
        cart.add_product(&product("a", "10")).unwrap();
        cart.add_product(&product("b", "5")).unwrap();

        let removed = cart.remove_item("a").unwrap();
        assert_eq!(removed.product_id, "a");
        assert_eq!(cart.totals().subtotal, dec("5"));
        assert_eq!(cart.totals().tax, dec("0.60"));
        assert_eq!(cart.totals().total, dec("5.60"));
    }

    #[test]
    fn test_state_transitions() {
        let mut cart = Cart::new(dec("0.15"));
        assert_eq!(cart.state(), CartState::Empty);

        cart.add_product(&product("a", "10")).unwrap();
        assert_eq!(cart.state(), CartState::Building);

        cart.set_client(Some("c1".into()));
        assert_eq!(cart.state(), CartState::Building);

        cart.set_payment_method(Some(PaymentMethod::Card));
        assert_eq!(cart.state(), CartState::ReadyToSave);

        cart.remove_item("a").unwrap();
        assert_eq!(cart.state(), CartState::Empty);
    }

    #[test]
    fn test_into_new_invoice() {
        let mut cart = Cart::new(dec("0.15"));
        cart.add_product(&product("a", "10")).unwrap();
        cart.set_client(Some("c1".into()));
        cart.set_payment_method(Some(PaymentMethod::Cash));

        let new = cart.into_new_invoice("maria", dec("11.50")).unwrap();
        assert_eq!(new.client_id, "c1");
        assert_eq!(new.total, dec("11.50"));
        assert_eq!(
            Ok(new.claimed_totals()),
            Totals::compute(&new.items, new.tax_rate)
        );
    }

    #[test]
    fn test_into_new_invoice_requires_ready() {
        let mut cart = Cart::new(dec("0.15"));
        cart.add_product(&product("a", "10")).unwrap();

        assert_eq!(
            cart.into_new_invoice("maria", Decimal::ZERO),
            Err(CartError::NotReady(CartState::Building))
        );
    }

    #[test]
    fn test_blank_client_id_is_no_client() {
        let mut cart = Cart::new(dec("0.15"));
        cart.set_client(Some("  ".into()));
        assert_eq!(cart.client_id(), None);
    }

    #[test]
    fn test_price_override() {
        let mut cart = Cart::new(Decimal::ZERO);
        cart.add_product(&product("a", "10")).unwrap();
        cart.set_quantity("a", 3).unwrap();
        cart.set_unit_price("a", dec("8.25")).unwrap();

        assert_eq!(cart.totals().subtotal, dec("24.75"));
        assert!(cart.set_unit_price("a", dec("-1")).is_err());
    }

    #[test]
    fn test_price_override_rounds_to_cents() {
        let mut cart = Cart::new(Decimal::ZERO);
        cart.add_product(&product("a", "10")).unwrap();
        cart.set_quantity("a", 3).unwrap();
        cart.set_unit_price("a", dec("0.125")).unwrap();

        let item = &cart.items()[0];
        assert_eq!(item.unit_price, dec("0.13"));
        assert_eq!(item.total, Decimal::from(item.quantity) * item.unit_price);
        assert_eq!(cart.totals().subtotal, dec("0.39"));
    }

    #[test]
    fn test_oversized_amounts_rejected_without_changes() {
        let mut cart = Cart::new(dec("0.15"));
        cart.add_product(&product("a", "10")).unwrap();
        cart.set_quantity("a", 2).unwrap();
        let before = cart.clone();

        assert_eq!(
            cart.set_quantity("a", i64::MAX),
            Err(CartError::InvalidAmount(Decimal::from(i64::MAX)))
        );
        assert!(cart.set_unit_price("a", dec("100000000000000000000")).is_err());
        assert_eq!(cart, before);

        cart.set_quantity("a", i64::from(MAX_QUANTITY)).unwrap();
        assert!(cart.add_product(&product("a", "10")).is_err());
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);
        assert!(cart.items()[0].is_consistent());
    }

    #[test]
    fn test_huge_catalogue_price_overflow_is_an_error() {
        let mut cart = Cart::new(dec("0.15"));
        cart.add_product(&product("a", "10000000000000000000000000")).unwrap();
        let before = cart.clone();

        assert_eq!(
            cart.set_quantity("a", i64::from(MAX_QUANTITY)),
            Err(CartError::Overflow(AmountOverflow))
        );
        assert_eq!(cart, before);
    }
}
