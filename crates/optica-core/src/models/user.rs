//! Staff user models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Seller,
    Optometrist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Optometrist => "optometrist",
        }
    }

    /// Parse the canonical stored form only.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "seller" => Some(Role::Seller),
            "optometrist" => Some(Role::Optometrist),
            _ => None,
        }
    }

    /// Map legacy role strings (any casing, Spanish or English) to a role.
    pub fn from_legacy(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        if let Some(role) = Role::parse(&lowered) {
            return Some(role);
        }
        match lowered.as_str() {
            "administrador" | "administrator" | "superadmin" | "owner" | "dueño" => {
                Some(Role::Admin)
            }
            "vendedor" | "vendedora" | "cajero" | "cajera" | "ventas" | "sales" => {
                Some(Role::Seller)
            }
            "optometra" | "optómetra" | "optometrista" | "doctor" | "medico" | "médico" => {
                Some(Role::Optometrist)
            }
            _ => None,
        }
    }
}

/// A staff account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    /// Login email, unique
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Custom claims handed to the UI shell at sign-in
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    /// SHA-256 (hex) of the access token; the token itself is never stored
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_roles() {
        assert_eq!(Role::from_legacy("Administrador"), Some(Role::Admin));
        assert_eq!(Role::from_legacy(" vendedor "), Some(Role::Seller));
        assert_eq!(Role::from_legacy("OPTOMETRA"), Some(Role::Optometrist));
        assert_eq!(Role::from_legacy("seller"), Some(Role::Seller));
        assert_eq!(Role::from_legacy("janitor"), None);
    }

    #[test]
    fn test_parse_is_strict() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("vendedor"), None);
    }
}
