//! Product catalog and stock service.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{ServiceError, ServiceResult};
use crate::db::{collections, Database};
use crate::listing::sort_by_recency;
use crate::models::{
    is_whole_cents, FieldError, NewProduct, Product, ProductUpdate, StockControl,
    ValidationErrors, MAX_PRICE,
};

/// CRUD and stock movements over product documents.
pub struct ProductService<'a> {
    db: &'a Database,
}

fn validate_product(name: &str, cost: Decimal, price: Decimal, stock: i64) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if name.trim().is_empty() {
        errors.add("name", FieldError::Required);
    }
    if !valid_amount(cost) {
        errors.add("cost", FieldError::InvalidFormat);
    }
    if !valid_amount(price) {
        errors.add("price", FieldError::InvalidFormat);
    }
    if stock < 0 {
        errors.add("stock", FieldError::InvalidFormat);
    }
    errors
}

/// Whole cents between zero and [`MAX_PRICE`].
fn valid_amount(amount: Decimal) -> bool {
    amount >= Decimal::ZERO && amount <= MAX_PRICE && is_whole_cents(amount)
}

impl<'a> ProductService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Active products, newest first.
    pub fn list(&self) -> ServiceResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .db
            .list_as::<Product>(collections::PRODUCTS)?
            .into_iter()
            .filter(|p| p.active)
            .collect();
        sort_by_recency(&mut products);
        debug!(count = products.len(), "listed active products");
        Ok(products)
    }

    pub fn get(&self, id: &str) -> ServiceResult<Product> {
        self.db
            .get_as::<Product>(collections::PRODUCTS, id)?
            .ok_or_else(|| ServiceError::not_found(collections::PRODUCTS, id))
    }

    /// Store a new product under the next sequential internal ID.
    #[tracing::instrument(skip(self, fields))]
    pub fn create(&self, fields: NewProduct) -> ServiceResult<Product> {
        let errors = validate_product(&fields.name, fields.cost, fields.price, fields.stock);
        if !errors.is_empty() {
            warn!(%errors, "product rejected");
            return Err(ServiceError::ValidationFailed(errors));
        }

        let product = self.db.atomically(|db| {
            let next_internal_id = db
                .max_integer_field(collections::PRODUCTS, "internal_id")?
                .map_or(1, |max| max.max(0) + 1);

            let now = db.now();
            let brand = fields
                .brand
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty());
            let product = Product {
                id: uuid::Uuid::new_v4().to_string(),
                internal_id: u64::try_from(next_internal_id).ok(),
                name: fields.name.trim().to_string(),
                brand,
                category: fields.category,
                cost: fields.cost,
                price: fields.price,
                stock: fields.stock,
                active: true,
                created_at: Some(now),
                updated_at: Some(now),
            };
            db.insert_as(collections::PRODUCTS, &product.id, &product)?;
            Ok::<_, ServiceError>(product)
        })?;

        info!(
            product_id = %product.id,
            internal_id = ?product.internal_id,
            "product created"
        );
        Ok(product)
    }

    #[tracing::instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: ProductUpdate) -> ServiceResult<Product> {
        let mut product = self.get(id)?;
        product.apply(update);

        let errors = validate_product(&product.name, product.cost, product.price, product.stock);
        if !errors.is_empty() {
            return Err(ServiceError::ValidationFailed(errors));
        }

        product.updated_at = Some(self.db.now());
        self.db.set_as(collections::PRODUCTS, id, &product)?;

        info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Hide a product from the catalog. Invoices keep referring to it.
    pub fn deactivate(&self, id: &str) -> ServiceResult<Product> {
        let mut product = self.get(id)?;
        if !product.active {
            return Ok(product);
        }
        product.active = false;
        product.updated_at = Some(self.db.now());
        self.db.set_as(collections::PRODUCTS, id, &product)?;

        info!(product_id = %id, "product deactivated");
        Ok(product)
    }

    /// Move stock by `delta` units. Unlimited products are left untouched.
    pub fn adjust_stock(&self, id: &str, delta: i64) -> ServiceResult<Product> {
        let mut product = self.get(id)?;
        if product.stock_control() == StockControl::Unlimited || delta == 0 {
            return Ok(product);
        }

        let stock = product.stock.saturating_add(delta);
        if stock < 0 {
            return Err(ServiceError::InsufficientStock {
                product: product.name,
                available: product.stock,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
            });
        }

        product.stock = stock;
        product.updated_at = Some(self.db.now());
        self.db.set_as(collections::PRODUCTS, id, &product)?;

        debug!(product_id = %id, delta, stock, "stock adjusted");
        Ok(product)
    }
}
