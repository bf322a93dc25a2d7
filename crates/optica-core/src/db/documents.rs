//! Collection and document operations.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{deep_merge, Database, DbError, DbResult};

/// A stored document with its store-managed timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID (unique within its collection)
    pub id: String,
    /// Field map
    pub data: Value,
    /// First write (store clock)
    pub created_at: String,
    /// Last write (store clock)
    pub updated_at: String,
}

impl Document {
    /// Decode the field map into a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> DbResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Document count and payload size of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSize {
    /// Collection name
    pub collection: String,
    /// Number of documents
    pub documents: u64,
    /// Total JSON payload in bytes
    pub bytes: u64,
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_document(raw: (String, String, String, String)) -> DbResult<Document> {
    let (id, data, created_at, updated_at) = raw;
    Ok(Document {
        id,
        data: serde_json::from_str(&data)?,
        created_at,
        updated_at,
    })
}

/// Bind a JSON scalar the way `json_extract` returns it.
fn sql_scalar(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn field_path(field: &str) -> String {
    format!("$.{}", field)
}

impl Database {
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    /// Insert a new document. Fails if the ID is already taken.
    pub fn insert_document(&self, collection: &str, id: &str, data: &Value) -> DbResult<()> {
        let now = self.timestamp();
        self.conn
            .execute(
                r#"
                INSERT INTO documents (collection, id, data, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                "#,
                params![collection, id, serde_json::to_string(data)?, now],
            )
            .map_err(DbError::from_write)?;
        tracing::debug!(collection, id, "document inserted");
        Ok(())
    }

    /// Write a document, replacing any existing field map.
    pub fn set_document(&self, collection: &str, id: &str, data: &Value) -> DbResult<()> {
        let now = self.timestamp();
        self.conn
            .execute(
                r#"
                INSERT INTO documents (collection, id, data, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(collection, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                "#,
                params![collection, id, serde_json::to_string(data)?, now],
            )
            .map_err(DbError::from_write)?;
        tracing::debug!(collection, id, "document set");
        Ok(())
    }

    /// Merge `patch` into a document, creating it when absent.
    ///
    /// Returns the merged field map.
    pub fn merge_document(&self, collection: &str, id: &str, patch: &Value) -> DbResult<Value> {
        let mut merged = match self.get_document(collection, id)? {
            Some(existing) => existing.data,
            None => Value::Object(serde_json::Map::new()),
        };
        deep_merge(&mut merged, patch);
        self.set_document(collection, id, &merged)?;
        Ok(merged)
    }

    /// Get a document by ID.
    pub fn get_document(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        self.conn
            .query_row(
                r#"
                SELECT id, data, created_at, updated_at
                FROM documents
                WHERE collection = ?1 AND id = ?2
                "#,
                params![collection, id],
                row_to_document,
            )
            .optional()?
            .map(into_document)
            .transpose()
    }

    /// Check whether a document exists.
    pub fn document_exists(&self, collection: &str, id: &str) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
            params![collection, id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Snapshot of a whole collection, oldest first.
    pub fn list_documents(&self, collection: &str) -> DbResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ?
            ORDER BY created_at, id
            "#,
        )?;

        let rows = stmt.query_map([collection], row_to_document)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(into_document(row?)?);
        }
        Ok(documents)
    }

    /// Documents whose top-level `field` equals `value`, oldest first.
    pub fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> DbResult<Vec<Document>> {
        let sql = if value.is_null() {
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ?1 AND json_extract(data, ?2) IS ?3
            ORDER BY created_at, id
            "#
        } else {
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ?1 AND json_extract(data, ?2) = ?3
            ORDER BY created_at, id
            "#
        };
        let mut stmt = self.conn.prepare(sql)?;

        let rows = stmt.query_map(
            params![collection, field_path(field), sql_scalar(value)],
            row_to_document,
        )?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(into_document(row?)?);
        }
        Ok(documents)
    }

    /// Largest integer value of `field` in a collection.
    pub fn max_integer_field(&self, collection: &str, field: &str) -> DbResult<Option<i64>> {
        let max: Option<i64> = self.conn.query_row(
            r#"
            SELECT MAX(CAST(json_extract(data, ?2) AS INTEGER))
            FROM documents
            WHERE collection = ?1 AND json_extract(data, ?2) IS NOT NULL
            "#,
            params![collection, field_path(field)],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// Number of documents in a collection.
    pub fn count_documents(&self, collection: &str) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            [collection],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Document counts and payload sizes for every non-empty collection.
    pub fn collection_sizes(&self) -> DbResult<Vec<CollectionSize>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT collection, COUNT(*), COALESCE(SUM(LENGTH(data)), 0)
            FROM documents
            GROUP BY collection
            ORDER BY collection
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let documents: i64 = row.get(1)?;
            let bytes: i64 = row.get(2)?;
            Ok(CollectionSize {
                collection: row.get(0)?,
                documents: u64::try_from(documents).unwrap_or_default(),
                bytes: u64::try_from(bytes).unwrap_or_default(),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// Insert a serializable model as a new document.
    pub fn insert_as<T: Serialize>(&self, collection: &str, id: &str, model: &T) -> DbResult<()> {
        self.insert_document(collection, id, &serde_json::to_value(model)?)
    }

    /// Replace a document with a serializable model.
    pub fn set_as<T: Serialize>(&self, collection: &str, id: &str, model: &T) -> DbResult<()> {
        self.set_document(collection, id, &serde_json::to_value(model)?)
    }

    /// Get a document decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> DbResult<Option<T>> {
        self.get_document(collection, id)?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Get a document decoded as `T`, failing with `NotFound` when absent.
    pub fn require_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> DbResult<T> {
        self.get_as(collection, id)?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))
    }

    /// Whole collection decoded as `T`.
    pub fn list_as<T: DeserializeOwned>(&self, collection: &str) -> DbResult<Vec<T>> {
        self.list_documents(collection)?
            .iter()
            .map(Document::decode)
            .collect()
    }

    /// Documents matching `field == value` decoded as `T`.
    pub fn find_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> DbResult<Vec<T>> {
        self.find_by_field(collection, field, value)?
            .iter()
            .map(Document::decode)
            .collect()
    }
}
