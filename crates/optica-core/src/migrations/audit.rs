//! Collection size audit.

use super::{MigrationError, MigrationResult};
use crate::db::{collections, CollectionSize, Database};

/// Document count and JSON payload size per collection.
///
/// With `collection` set, only that collection is reported (zero counts
/// included); otherwise every known collection is.
pub fn audit_sizes(db: &Database, collection: Option<&str>) -> MigrationResult<Vec<CollectionSize>> {
    let wanted: Vec<&str> = match collection {
        Some(name) => {
            let known = collections::ALL
                .iter()
                .find(|known| **known == name)
                .ok_or_else(|| {
                    MigrationError::InvalidArgument(format!("unknown collection: {}", name))
                })?;
            vec![*known]
        }
        None => collections::ALL.to_vec(),
    };

    let measured = db.collection_sizes()?;
    let sizes = wanted
        .into_iter()
        .map(|name| {
            measured
                .iter()
                .find(|size| size.collection == name)
                .cloned()
                .unwrap_or_else(|| CollectionSize {
                    collection: name.to_string(),
                    documents: 0,
                    bytes: 0,
                })
        })
        .collect();
    Ok(sizes)
}
