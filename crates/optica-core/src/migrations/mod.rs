//! One-off data migrations and admin scripts.
//!
//! Backfills share one runner: snapshot a collection, let the script decide
//! a patch for each document (or skip it when it is already migrated), and
//! commit the patches in capped atomic batches. Because migrated documents
//! are skipped, re-running a script after a failure only touches what the
//! failed run did not commit.

mod audit;
mod client_active;
mod line_item_refs;
mod product_ids;
mod roles;
mod users;

pub use audit::*;
pub use client_active::*;
pub use line_item_refs::*;
pub use product_ids::*;
pub use roles::*;
pub use users::*;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{Database, DbError, Document, WriteBatch};

/// Migration errors.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{script} aborted after committing {} document(s): {source}", .committed.len())]
    Aborted {
        script: &'static str,
        /// Documents written by batches that committed before the failure
        committed: Vec<String>,
        #[source]
        source: DbError,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// A per-document field backfill.
pub trait Backfill {
    /// Script name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Collection the backfill walks.
    fn collection(&self) -> &'static str;

    /// Look at the whole snapshot before any patch is computed. May reorder
    /// it; patches are computed in the resulting order.
    fn prepare(&mut self, _db: &Database, _snapshot: &mut Vec<Document>) -> MigrationResult<()> {
        Ok(())
    }

    /// Fields to merge into `document`, or `None` when it needs no change.
    fn patch(&mut self, document: &Document) -> Option<Value>;
}

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub script: String,
    pub scanned: usize,
    pub updated: usize,
    pub skipped: usize,
    pub batches: usize,
    pub committed: Vec<String>,
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: scanned {}, updated {}, skipped {}, batches {}",
            self.script, self.scanned, self.updated, self.skipped, self.batches
        )
    }
}

/// One committed batch of a running backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub script: &'static str,
    /// 1-based batch number
    pub batch: usize,
    /// Documents written by this batch
    pub documents: usize,
    /// Documents written so far, this batch included
    pub updated: usize,
}

impl std::fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: batch {} committed, {} document(s), {} so far",
            self.script, self.batch, self.documents, self.updated
        )
    }
}

/// Run `backfill` over its collection, committing at most `batch_limit`
/// writes per atomic batch.
pub fn run_backfill<B: Backfill>(
    db: &Database,
    backfill: &mut B,
    batch_limit: usize,
) -> MigrationResult<MigrationReport> {
    run_backfill_with_progress(db, backfill, batch_limit, |_| {})
}

/// [`run_backfill`], calling `on_batch` after every committed batch.
pub fn run_backfill_with_progress<B, P>(
    db: &Database,
    backfill: &mut B,
    batch_limit: usize,
    mut on_batch: P,
) -> MigrationResult<MigrationReport>
where
    B: Backfill,
    P: FnMut(&BatchProgress),
{
    let script = backfill.name();
    let collection = backfill.collection();

    let mut snapshot = db.list_documents(collection)?;
    backfill.prepare(db, &mut snapshot)?;

    let mut report = MigrationReport {
        script: script.to_string(),
        scanned: snapshot.len(),
        ..Default::default()
    };
    info!(script, collection, documents = snapshot.len(), "backfill started");

    let mut batch = WriteBatch::new(batch_limit);
    for document in &snapshot {
        let Some(patch) = backfill.patch(document) else {
            report.skipped += 1;
            continue;
        };
        batch.merge(collection, &document.id, patch)?;
        if batch.is_full() {
            commit(db, &mut batch, &mut report, script, &mut on_batch)?;
        }
    }
    if !batch.is_empty() {
        commit(db, &mut batch, &mut report, script, &mut on_batch)?;
    }

    info!(
        script,
        updated = report.updated,
        skipped = report.skipped,
        batches = report.batches,
        "backfill finished"
    );
    Ok(report)
}

fn commit(
    db: &Database,
    batch: &mut WriteBatch,
    report: &mut MigrationReport,
    script: &'static str,
    on_batch: &mut impl FnMut(&BatchProgress),
) -> MigrationResult<()> {
    let ids = batch.document_ids();
    match db.commit_batch(batch) {
        Ok(count) => {
            report.batches += 1;
            report.updated += count;
            info!(script, batch = report.batches, operations = count, "batch committed");
            debug!(script, ids = ?ids, "committed documents");
            report.committed.extend(ids);
            on_batch(&BatchProgress {
                script,
                batch: report.batches,
                documents: count,
                updated: report.updated,
            });
            Ok(())
        }
        Err(source) => Err(MigrationError::Aborted {
            script,
            committed: std::mem::take(&mut report.committed),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Sets `flag=true` where missing.
    struct FlagBackfill;

    impl Backfill for FlagBackfill {
        fn name(&self) -> &'static str {
            "flag"
        }

        fn collection(&self) -> &'static str {
            "things"
        }

        fn patch(&mut self, document: &Document) -> Option<Value> {
            if document.data.get("flag").is_some() {
                return None;
            }
            Some(json!({"flag": true}))
        }
    }

    /// Gives every product the same internal ID, which the unique index
    /// rejects from the second write on.
    struct ClashingIds;

    impl Backfill for ClashingIds {
        fn name(&self) -> &'static str {
            "clashing-ids"
        }

        fn collection(&self) -> &'static str {
            "products"
        }

        fn patch(&mut self, _document: &Document) -> Option<Value> {
            Some(json!({"internal_id": 7}))
        }
    }

    fn seed(db: &Database, count: usize) {
        for i in 0..count {
            db.insert_document("things", &format!("t{:03}", i), &json!({"n": i}))
                .unwrap();
        }
    }

    #[test]
    fn test_batches_respect_limit() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 7);

        let report = run_backfill(&db, &mut FlagBackfill, 3).unwrap();

        assert_eq!(report.scanned, 7);
        assert_eq!(report.updated, 7);
        assert_eq!(report.batches, 3);
        assert_eq!(report.committed.len(), 7);
    }

    #[test]
    fn test_progress_after_each_batch() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 7);

        let mut progress = Vec::new();
        let report =
            run_backfill_with_progress(&db, &mut FlagBackfill, 3, |p| progress.push(*p)).unwrap();

        let sizes: Vec<usize> = progress.iter().map(|p| p.documents).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(progress.len(), report.batches);
        assert_eq!(progress[2].updated, 7);
        assert_eq!(
            progress[0].to_string(),
            "flag: batch 1 committed, 3 document(s), 3 so far"
        );
    }

    #[test]
    fn test_rerun_skips_migrated() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 4);

        run_backfill(&db, &mut FlagBackfill, 500).unwrap();
        let second = run_backfill(&db, &mut FlagBackfill, 500).unwrap();

        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 4);
        assert_eq!(second.batches, 0);
    }

    #[test]
    fn test_report_display() {
        let report = MigrationReport {
            script: "flag".into(),
            scanned: 3,
            updated: 2,
            skipped: 1,
            batches: 1,
            committed: vec![],
        };
        assert_eq!(
            report.to_string(),
            "flag: scanned 3, updated 2, skipped 1, batches 1"
        );
    }

    #[test]
    fn test_failure_reports_committed_ids() {
        let db = Database::open_in_memory().unwrap();
        for id in ["p1", "p2", "p3"] {
            db.insert_document("products", id, &json!({"name": id})).unwrap();
        }

        match run_backfill(&db, &mut ClashingIds, 1) {
            Err(MigrationError::Aborted {
                script, committed, ..
            }) => {
                assert_eq!(script, "clashing-ids");
                assert_eq!(committed, vec!["p1".to_string()]);
            }
            other => panic!("expected abort, got {:?}", other),
        }

        // The failed batch left nothing behind
        let p2 = db.get_document("products", "p2").unwrap().unwrap();
        assert!(p2.data.get("internal_id").is_none());
    }
}
