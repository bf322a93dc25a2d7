//! `active=true` for clients stored before soft delete existed.
//!
//! Reads already treat a missing flag as active, but the uniqueness indexes
//! only cover documents with the flag stored.

use serde_json::{json, Value};

use super::Backfill;
use crate::db::{collections, Document};

#[derive(Debug, Default)]
pub struct BackfillClientActive;

impl Backfill for BackfillClientActive {
    fn name(&self) -> &'static str {
        "backfill-client-active"
    }

    fn collection(&self) -> &'static str {
        collections::CLIENTS
    }

    fn patch(&mut self, document: &Document) -> Option<Value> {
        match document.data.get("active") {
            Some(Value::Bool(_)) => None,
            _ => Some(json!({ "active": true })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::migrations::run_backfill;

    #[test]
    fn test_sets_missing_flag_only() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document("clients", "legacy", &json!({"national_id": "1"}))
            .unwrap();
        db.insert_document(
            "clients",
            "inactive",
            &json!({"national_id": "2", "active": false}),
        )
        .unwrap();

        let report = run_backfill(&db, &mut BackfillClientActive, 500).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.committed, vec!["legacy".to_string()]);

        let inactive = db.get_document("clients", "inactive").unwrap().unwrap();
        assert_eq!(inactive.data["active"], json!(false));
    }
}
