//! Legacy role strings to the canonical role set.

use serde_json::{Map, Value};
use tracing::warn;

use super::Backfill;
use crate::db::{collections, Document};
use crate::models::Role;

/// Rewrites `role` (and a `role` claim) from legacy spellings such as
/// `administrador` or `vendedor`.
#[derive(Debug, Default)]
pub struct RemapRoles {
    /// Users left alone because their role matched nothing known
    pub unknown: Vec<String>,
}

impl RemapRoles {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The canonical spelling when `raw` is a legacy one.
fn remap(raw: &str) -> Option<Role> {
    if Role::parse(raw).is_some() {
        return None;
    }
    Role::from_legacy(raw)
}

impl Backfill for RemapRoles {
    fn name(&self) -> &'static str {
        "remap-roles"
    }

    fn collection(&self) -> &'static str {
        collections::USERS
    }

    fn patch(&mut self, document: &Document) -> Option<Value> {
        let mut patch = Map::new();

        if let Some(raw) = document.data.get("role").and_then(Value::as_str) {
            match remap(raw) {
                Some(role) => {
                    patch.insert("role".into(), Value::from(role.as_str()));
                }
                None if Role::parse(raw).is_none() => {
                    warn!(user_id = %document.id, role = raw, "unknown role left as is");
                    self.unknown.push(document.id.clone());
                }
                None => {}
            }
        }

        let claim = document
            .data
            .get("claims")
            .and_then(|claims| claims.get("role"))
            .and_then(Value::as_str);
        if let Some(role) = claim.and_then(remap) {
            let mut claims = Map::new();
            claims.insert("role".into(), Value::from(role.as_str()));
            patch.insert("claims".into(), Value::Object(claims));
        }

        if patch.is_empty() {
            None
        } else {
            Some(Value::Object(patch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::migrations::run_backfill;
    use serde_json::json;

    #[test]
    fn test_remaps_legacy_roles() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document(
            "users",
            "u1",
            &json!({"role": "Administrador", "claims": {"role": "administrador", "branch": "norte"}}),
        )
        .unwrap();
        db.insert_document("users", "u2", &json!({"role": "seller"}))
            .unwrap();
        db.insert_document("users", "u3", &json!({"role": "conserje"}))
            .unwrap();

        let mut remap = RemapRoles::new();
        let report = run_backfill(&db, &mut remap, 500).unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(remap.unknown, vec!["u3".to_string()]);

        let u1 = db.get_document("users", "u1").unwrap().unwrap();
        assert_eq!(u1.data["role"], json!("admin"));
        assert_eq!(u1.data["claims"]["role"], json!("admin"));
        // Other claims survive the merge
        assert_eq!(u1.data["claims"]["branch"], json!("norte"));
    }
}
