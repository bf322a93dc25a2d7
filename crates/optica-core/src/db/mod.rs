//! Document store for optica.
//!
//! Named collections of JSON field-map documents addressed by
//! `(collection, id)`, kept in a single SQLite table. Uniqueness rules the
//! application depends on live in the schema as partial unique indexes.

mod batch;
mod documents;
mod merge;
mod schema;

pub use batch::*;
pub use documents::*;
pub use merge::*;
pub use schema::*;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unique constraint violated on {collection}.{field}")]
    UniqueViolation {
        collection: &'static str,
        field: &'static str,
    },

    #[error("Write batch is full ({0} operations)")]
    BatchFull(usize),
}

impl DbError {
    /// Classify an error raised by a write statement.
    pub(crate) fn from_write(error: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &error {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    if let Some(index) = UNIQUE_INDEXES
                        .iter()
                        .find(|index| message.contains(index.name))
                    {
                        return DbError::UniqueViolation {
                            collection: index.collection,
                            field: index.field,
                        };
                    }
                    return DbError::Constraint(message.clone());
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => {
                    return DbError::Constraint(message.clone());
                }
                _ => {}
            }
        }
        DbError::Sqlite(error)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            clock: Arc::new(SystemClock),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Create in-memory database with a caller-controlled clock.
    pub fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn, clock };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Store-assigned timestamp for the write about to happen.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `f` inside one atomic scope.
    ///
    /// Every write issued through `self` while `f` runs commits together or
    /// not at all. Scopes nest: an inner failure only rolls back the inner
    /// scope, and the outer scope decides what happens next.
    pub fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        let outermost = self.conn.is_autocommit();
        self.conn
            .execute_batch("SAVEPOINT optica_atomic")
            .map_err(DbError::from)?;

        match f(self) {
            Ok(value) => {
                // Releasing the outermost savepoint commits, which can fail
                // (SQLITE_BUSY). The scope must not stay open when it does.
                if let Err(release) = self.conn.execute_batch("RELEASE optica_atomic") {
                    self.abandon_scope(outermost);
                    return Err(DbError::from(release).into());
                }
                Ok(value)
            }
            Err(err) => {
                self.abandon_scope(outermost);
                Err(err)
            }
        }
    }

    fn abandon_scope(&self, outermost: bool) {
        let sql = if outermost {
            "ROLLBACK"
        } else {
            "ROLLBACK TO optica_atomic; RELEASE optica_atomic"
        };
        if let Err(rollback) = self.conn.execute_batch(sql) {
            tracing::error!(error = %rollback, "rollback of atomic scope failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn test_atomically_commits_on_success() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.atomically(|db| {
            db.insert_document("products", "p1", &json!({"name": "Frame"}))?;
            db.insert_document("products", "p2", &json!({"name": "Lens"}))?;
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(db.count_documents("products").unwrap(), 2);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.atomically(|db| {
            db.insert_document("products", "p1", &json!({"name": "Frame"}))?;
            Err(DbError::NotFound("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(db.count_documents("products").unwrap(), 0);
    }

    #[test]
    fn test_nested_scope_failure_keeps_outer_writes() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.atomically(|db| {
            db.insert_document("products", "p1", &json!({"name": "Frame"}))?;
            let inner: DbResult<()> = db.atomically(|db| {
                db.insert_document("products", "p2", &json!({"name": "Lens"}))?;
                Err(DbError::NotFound("inner".into()))
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert!(result.is_ok());
        assert!(db.document_exists("products", "p1").unwrap());
        assert!(!db.document_exists("products", "p2").unwrap());
    }

    #[test]
    fn test_failed_commit_closes_scope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optica.db");
        let writer = Database::open(&path).unwrap();
        let reader = Database::open(&path).unwrap();
        writer
            .conn()
            .busy_timeout(std::time::Duration::ZERO)
            .unwrap();

        // An open read transaction holds a shared lock, so the commit is refused.
        reader.conn().execute_batch("BEGIN").unwrap();
        assert_eq!(reader.count_documents("products").unwrap(), 0);

        let result: DbResult<()> = writer.atomically(|db| {
            db.insert_document("products", "p1", &json!({"name": "Frame"}))?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(writer.conn().is_autocommit());

        reader.conn().execute_batch("COMMIT").unwrap();
        assert!(!writer.document_exists("products", "p1").unwrap());

        let result: DbResult<()> = writer.atomically(|db| {
            db.insert_document("products", "p2", &json!({"name": "Lens"}))?;
            Ok(())
        });
        assert!(result.is_ok());
        assert!(reader.document_exists("products", "p2").unwrap());
    }
}
