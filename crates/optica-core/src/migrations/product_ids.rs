//! Sequential `internal_id` for products created before it existed.

use serde_json::{json, Value};

use super::{Backfill, MigrationResult};
use crate::db::{collections, Database, Document};

/// Numbers products missing an `internal_id` in creation order, continuing
/// after the highest ID already assigned.
#[derive(Debug, Default)]
pub struct BackfillProductIds {
    next: u64,
}

impl BackfillProductIds {
    pub fn new() -> Self {
        Self::default()
    }
}

fn internal_id(document: &Document) -> Option<u64> {
    document.data.get("internal_id").and_then(Value::as_u64)
}

/// Creation time as stored on the record, falling back to the store's.
fn created_key(document: &Document) -> &str {
    document
        .data
        .get("created_at")
        .and_then(Value::as_str)
        .unwrap_or(document.created_at.as_str())
}

impl Backfill for BackfillProductIds {
    fn name(&self) -> &'static str {
        "backfill-product-ids"
    }

    fn collection(&self) -> &'static str {
        collections::PRODUCTS
    }

    fn prepare(&mut self, _db: &Database, snapshot: &mut Vec<Document>) -> MigrationResult<()> {
        self.next = snapshot.iter().filter_map(internal_id).max().unwrap_or(0) + 1;
        snapshot.sort_by(|a, b| {
            created_key(a)
                .cmp(created_key(b))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(())
    }

    fn patch(&mut self, document: &Document) -> Option<Value> {
        if internal_id(document).is_some() {
            return None;
        }
        let id = self.next;
        self.next += 1;
        Some(json!({ "internal_id": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_backfill;

    #[test]
    fn test_numbers_in_creation_order_after_max() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(
            "products",
            "late",
            &json!({"name": "late", "created_at": "2023-05-01T00:00:00Z"}),
        )
        .unwrap();
        db.insert_document(
            "products",
            "numbered",
            &json!({"name": "numbered", "internal_id": 4}),
        )
        .unwrap();
        db.insert_document(
            "products",
            "early",
            &json!({"name": "early", "created_at": "2021-01-01T00:00:00Z"}),
        )
        .unwrap();

        let report = run_backfill(&db, &mut BackfillProductIds::new(), 500).unwrap();
        assert_eq!(report.updated, 2);
        assert_eq!(report.skipped, 1);

        let id_of = |id: &str| {
            db.get_document("products", id).unwrap().unwrap().data["internal_id"].as_u64()
        };
        assert_eq!(id_of("early"), Some(5));
        assert_eq!(id_of("late"), Some(6));
        assert_eq!(id_of("numbered"), Some(4));

        // Idempotent
        let again = run_backfill(&db, &mut BackfillProductIds::new(), 500).unwrap();
        assert_eq!(again.updated, 0);
    }
}
