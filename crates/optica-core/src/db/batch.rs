//! Capped write batches.

use serde_json::Value;

use super::{Database, DbError, DbResult};

/// Most operations a single batch may carry.
pub const MAX_BATCH_OPERATIONS: usize = 500;

/// A single queued write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole field map
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Deep-merge into the existing field map
    Merge {
        collection: String,
        id: String,
        patch: Value,
    },
}

impl WriteOp {
    /// ID of the document this operation writes.
    pub fn document_id(&self) -> &str {
        match self {
            WriteOp::Set { id, .. } | WriteOp::Merge { id, .. } => id,
        }
    }
}

/// Writes issued together and committed atomically.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    limit: usize,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new(MAX_BATCH_OPERATIONS)
    }
}

impl WriteBatch {
    /// Create an empty batch holding at most `limit` operations
    /// (never more than [`MAX_BATCH_OPERATIONS`]).
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_BATCH_OPERATIONS);
        Self {
            ops: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Queue a full replace.
    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> DbResult<()> {
        self.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        })
    }

    /// Queue a merge.
    pub fn merge(&mut self, collection: &str, id: &str, patch: Value) -> DbResult<()> {
        self.push(WriteOp::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        })
    }

    fn push(&mut self, op: WriteOp) -> DbResult<()> {
        if self.is_full() {
            return Err(DbError::BatchFull(self.limit));
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ops.len() >= self.limit
    }

    /// IDs of the documents written by this batch, in order.
    pub fn document_ids(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.document_id().to_string()).collect()
    }

    /// Drain queued operations, leaving the batch empty and reusable.
    pub fn take(&mut self) -> Vec<WriteOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Database {
    /// Commit every operation of `batch` atomically, emptying it.
    ///
    /// Returns the number of operations written.
    pub fn commit_batch(&self, batch: &mut WriteBatch) -> DbResult<usize> {
        let ops = batch.take();
        let count = ops.len();

        self.atomically(|db| {
            for op in &ops {
                match op {
                    WriteOp::Set {
                        collection,
                        id,
                        data,
                    } => db.set_document(collection, id, data)?,
                    WriteOp::Merge {
                        collection,
                        id,
                        patch,
                    } => {
                        db.merge_document(collection, id, patch)?;
                    }
                }
            }
            Ok::<_, DbError>(())
        })?;

        tracing::debug!(operations = count, "batch committed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_limit_enforced() {
        let mut batch = WriteBatch::new(2);
        batch.set("products", "p1", json!({})).unwrap();
        batch.set("products", "p2", json!({})).unwrap();

        assert!(batch.is_full());
        assert!(matches!(
            batch.set("products", "p3", json!({})),
            Err(DbError::BatchFull(2))
        ));
    }

    #[test]
    fn test_limit_capped_at_maximum() {
        let batch = WriteBatch::new(10_000);
        assert_eq!(batch.limit, MAX_BATCH_OPERATIONS);

        let batch = WriteBatch::new(0);
        assert_eq!(batch.limit, 1);
    }

    #[test]
    fn test_commit_batch() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document("clients", "c1", &json!({"name": "Ana"})).unwrap();

        let mut batch = WriteBatch::default();
        batch.merge("clients", "c1", json!({"active": true})).unwrap();
        batch.set("clients", "c2", json!({"name": "Luis", "active": true})).unwrap();
        assert_eq!(batch.document_ids(), vec!["c1", "c2"]);

        let written = db.commit_batch(&mut batch).unwrap();
        assert_eq!(written, 2);
        assert!(batch.is_empty());

        let c1 = db.get_document("clients", "c1").unwrap().unwrap();
        assert_eq!(c1.data, json!({"name": "Ana", "active": true}));
        assert!(db.document_exists("clients", "c2").unwrap());
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document("users", "u1", &json!({"email": "a@b.com"})).unwrap();

        let mut batch = WriteBatch::default();
        batch.set("users", "u2", json!({"email": "c@d.com"})).unwrap();
        // Violates uq_users_email
        batch.set("users", "u3", json!({"email": "a@b.com"})).unwrap();

        assert!(db.commit_batch(&mut batch).is_err());
        assert!(!db.document_exists("users", "u2").unwrap());
    }
}
