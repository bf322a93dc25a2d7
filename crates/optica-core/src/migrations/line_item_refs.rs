//! `product_internal_id` on invoice line items.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::warn;

use super::{Backfill, MigrationResult};
use crate::db::{collections, Database, Document};

/// Copies each product's `internal_id` onto the line items referring to it.
#[derive(Debug, Default)]
pub struct BackfillLineItemRefs {
    internal_ids: HashMap<String, u64>,
    /// Line items whose product is gone or was never numbered
    pub unresolved: usize,
}

impl BackfillLineItemRefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backfill for BackfillLineItemRefs {
    fn name(&self) -> &'static str {
        "backfill-line-item-refs"
    }

    fn collection(&self) -> &'static str {
        collections::INVOICES
    }

    fn prepare(&mut self, db: &Database, _snapshot: &mut Vec<Document>) -> MigrationResult<()> {
        self.internal_ids = db
            .list_documents(collections::PRODUCTS)?
            .into_iter()
            .filter_map(|product| {
                let internal_id = product.data.get("internal_id").and_then(Value::as_u64)?;
                Some((product.id, internal_id))
            })
            .collect();
        Ok(())
    }

    fn patch(&mut self, document: &Document) -> Option<Value> {
        let items = document.data.get("items")?.as_array()?;

        let mut changed = false;
        let mut patched = Vec::with_capacity(items.len());
        for item in items {
            let mut item = item.clone();
            let missing = item
                .get("product_internal_id")
                .map_or(true, Value::is_null);
            if missing {
                let product_id = item.get("product_id").and_then(Value::as_str);
                match product_id.and_then(|id| self.internal_ids.get(id)) {
                    Some(internal_id) => {
                        item["product_internal_id"] = json!(internal_id);
                        changed = true;
                    }
                    None => {
                        warn!(invoice_id = %document.id, ?product_id, "line item product not resolved");
                        self.unresolved += 1;
                    }
                }
            }
            patched.push(item);
        }

        // Arrays replace on merge, so the whole list is written back
        changed.then(|| json!({ "items": patched }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_backfill;

    #[test]
    fn test_fills_known_products() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document("products", "p1", &json!({"internal_id": 11}))
            .unwrap();
        db.insert_document(
            "invoices",
            "i1",
            &json!({"items": [
                {"product_id": "p1", "quantity": 1},
                {"product_id": "gone", "quantity": 2},
                {"product_id": "p1", "product_internal_id": 11, "quantity": 3}
            ]}),
        )
        .unwrap();
        db.insert_document("invoices", "i2", &json!({"items": []}))
            .unwrap();

        let mut backfill = BackfillLineItemRefs::new();
        let report = run_backfill(&db, &mut backfill, 500).unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(backfill.unresolved, 1);

        let invoice = db.get_document("invoices", "i1").unwrap().unwrap();
        let items = invoice.data["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["product_internal_id"], json!(11));
        assert_eq!(items[0]["quantity"], json!(1));
        assert!(items[1].get("product_internal_id").is_none());
    }
}
