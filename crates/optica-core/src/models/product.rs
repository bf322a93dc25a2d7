//! Inventory product models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    Frames,
    OphthalmicLenses,
    ContactLenses,
    Sunglasses,
    Accessories,
    /// Eye exams, adjustments, repairs
    Services,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Frames => "FRAMES",
            ProductCategory::OphthalmicLenses => "OPHTHALMIC_LENSES",
            ProductCategory::ContactLenses => "CONTACT_LENSES",
            ProductCategory::Sunglasses => "SUNGLASSES",
            ProductCategory::Accessories => "ACCESSORIES",
            ProductCategory::Services => "SERVICES",
        }
    }

    /// Parse the stored form (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "FRAMES" => Some(ProductCategory::Frames),
            "OPHTHALMIC_LENSES" => Some(ProductCategory::OphthalmicLenses),
            "CONTACT_LENSES" => Some(ProductCategory::ContactLenses),
            "SUNGLASSES" => Some(ProductCategory::Sunglasses),
            "ACCESSORIES" => Some(ProductCategory::Accessories),
            "SERVICES" => Some(ProductCategory::Services),
            _ => None,
        }
    }
}

/// How stock is tracked for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockControl {
    /// Stock counter is decremented on sale and may not go negative
    Normal,
    /// No counter (services)
    Unlimited,
}

/// A catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Document ID
    pub id: String,
    /// Sequential number used to cross-reference legacy records
    pub internal_id: Option<u64>,
    pub name: String,
    pub brand: Option<String>,
    pub category: ProductCategory,
    /// Purchase cost
    pub cost: Decimal,
    /// Sale price
    pub price: Decimal,
    /// Units on hand (ignored for unlimited products)
    pub stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Stock-control mode derived from the category.
    pub fn stock_control(&self) -> StockControl {
        match self.category {
            ProductCategory::Services => StockControl::Unlimited,
            _ => StockControl::Normal,
        }
    }

    /// Whether `quantity` units can be sold right now.
    pub fn can_sell(&self, quantity: u32) -> bool {
        match self.stock_control() {
            StockControl::Unlimited => true,
            StockControl::Normal => self.stock >= i64::from(quantity),
        }
    }

    pub fn margin(&self) -> Decimal {
        self.price - self.cost
    }
}

/// Fields for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub brand: Option<String>,
    pub category: ProductCategory,
    pub cost: Decimal,
    pub price: Decimal,
    pub stock: i64,
}

/// Partial product update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<ProductCategory>,
    pub cost: Option<Decimal>,
    pub price: Option<Decimal>,
}

impl Product {
    /// Apply the fields present in `update`.
    pub fn apply(&mut self, update: ProductUpdate) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(brand) = update.brand {
            let brand = brand.trim().to_string();
            self.brand = if brand.is_empty() { None } else { Some(brand) };
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(cost) = update.cost {
            self.cost = cost;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
    }
}
