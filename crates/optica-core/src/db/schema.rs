//! SQLite schema definition.

/// Collection names used by the application.
pub mod collections {
    pub const CLIENTS: &str = "clients";
    pub const CLINICAL_HISTORIES: &str = "clinical_histories";
    pub const CLINICAL_HISTORY_ENTRIES: &str = "clinical_history_entries";
    pub const PRODUCTS: &str = "products";
    pub const INVOICES: &str = "invoices";
    pub const REGISTER_SESSIONS: &str = "register_sessions";
    pub const USERS: &str = "users";

    /// Every collection the application writes to.
    pub const ALL: &[&str] = &[
        CLIENTS,
        CLINICAL_HISTORIES,
        CLINICAL_HISTORY_ENTRIES,
        PRODUCTS,
        INVOICES,
        REGISTER_SESSIONS,
        USERS,
    ];
}

/// A partial unique index over one document field.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    /// Index name as it appears in SQLite error messages
    pub name: &'static str,
    /// Collection the index covers
    pub collection: &'static str,
    /// Document field that must be unique
    pub field: &'static str,
}

/// Unique indexes declared in [`SCHEMA`].
pub const UNIQUE_INDEXES: &[UniqueIndex] = &[
    UniqueIndex {
        name: "uq_clients_national_id",
        collection: collections::CLIENTS,
        field: "national_id",
    },
    UniqueIndex {
        name: "uq_clients_email",
        collection: collections::CLIENTS,
        field: "email",
    },
    UniqueIndex {
        name: "uq_products_internal_id",
        collection: collections::PRODUCTS,
        field: "internal_id",
    },
    UniqueIndex {
        name: "uq_users_email",
        collection: collections::USERS,
        field: "email",
    },
    UniqueIndex {
        name: "uq_register_open_day",
        collection: collections::REGISTER_SESSIONS,
        field: "business_date",
    },
];

/// Complete database schema for optica.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL CHECK (json_valid(data) AND json_type(data) = 'object'),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(collection, created_at);

-- ============================================================================
-- Uniqueness (only live records participate)
-- ============================================================================

CREATE UNIQUE INDEX IF NOT EXISTS uq_clients_national_id
    ON documents(json_extract(data, '$.national_id'))
    WHERE collection = 'clients' AND json_extract(data, '$.active') = 1;

CREATE UNIQUE INDEX IF NOT EXISTS uq_clients_email
    ON documents(json_extract(data, '$.email'))
    WHERE collection = 'clients' AND json_extract(data, '$.active') = 1;

CREATE UNIQUE INDEX IF NOT EXISTS uq_products_internal_id
    ON documents(json_extract(data, '$.internal_id'))
    WHERE collection = 'products';

CREATE UNIQUE INDEX IF NOT EXISTS uq_users_email
    ON documents(json_extract(data, '$.email'))
    WHERE collection = 'users';

-- At most one open register session per business day
CREATE UNIQUE INDEX IF NOT EXISTS uq_register_open_day
    ON documents(json_extract(data, '$.business_date'))
    WHERE collection = 'register_sessions' AND json_extract(data, '$.closed_at') IS NULL;

-- ============================================================================
-- Lookups
-- ============================================================================

CREATE INDEX IF NOT EXISTS idx_invoices_client
    ON documents(json_extract(data, '$.client_id'))
    WHERE collection = 'invoices';

CREATE INDEX IF NOT EXISTS idx_history_entries_client
    ON documents(json_extract(data, '$.client_id'))
    WHERE collection = 'clinical_history_entries';
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn insert(conn: &Connection, collection: &str, id: &str, data: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            [collection, id, data],
        )
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_data_must_be_object() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        assert!(insert(&conn, "clients", "c1", "[1, 2]").is_err());
        assert!(insert(&conn, "clients", "c1", "not json").is_err());
        assert!(insert(&conn, "clients", "c1", r#"{"name": "Ana"}"#).is_ok());
    }

    #[test]
    fn test_active_client_national_id_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        insert(&conn, "clients", "c1", r#"{"national_id": "1234567890", "active": true}"#).unwrap();

        let duplicate = insert(&conn, "clients", "c2", r#"{"national_id": "1234567890", "active": true}"#);
        assert!(duplicate.is_err());

        // Inactive clients do not hold the national ID
        let inactive = insert(&conn, "clients", "c3", r#"{"national_id": "1234567890", "active": false}"#);
        assert!(inactive.is_ok());
    }

    #[test]
    fn test_missing_email_not_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        insert(&conn, "clients", "c1", r#"{"national_id": "1", "active": true}"#).unwrap();
        let second = insert(&conn, "clients", "c2", r#"{"national_id": "2", "active": true}"#);
        assert!(second.is_ok());
    }

    #[test]
    fn test_one_open_register_per_day() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        insert(&conn, "register_sessions", "r1", r#"{"business_date": "2024-01-15", "closed_at": null}"#).unwrap();
        let second = insert(&conn, "register_sessions", "r2", r#"{"business_date": "2024-01-15"}"#);
        assert!(second.is_err());

        let closed = insert(&conn, "register_sessions", "r3", r#"{"business_date": "2024-01-15", "closed_at": "2024-01-15T20:00:00Z"}"#);
        assert!(closed.is_ok());
    }
}
