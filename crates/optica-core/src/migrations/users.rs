//! Staff account scripts: user creation and custom claims.

use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{MigrationError, MigrationResult};
use crate::db::{collections, Database};
use crate::models::{is_valid_email, Role, User};

/// Claim key mirrored into [`User::role`].
pub const ROLE_CLAIM: &str = "role";

/// A freshly created user and the access token to hand over.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: User,
    /// Shown once; only its hash is stored
    pub token: String,
}

fn generate_token() -> String {
    format!(
        "op_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// SHA-256 of an access token, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> MigrationResult<String> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(MigrationError::InvalidArgument(format!(
            "invalid email: {}",
            email
        )));
    }
    Ok(email)
}

/// Look a user up by email.
pub fn find_user(db: &Database, email: &str) -> MigrationResult<Option<User>> {
    let email = normalize_email(email)?;
    let mut users = db.find_as::<User>(collections::USERS, "email", &json!(email))?;
    Ok(users.pop())
}

/// Create a staff account with a one-time access token.
pub fn create_user(
    db: &Database,
    email: &str,
    display_name: Option<&str>,
    role: Role,
) -> MigrationResult<CreatedUser> {
    let email = normalize_email(email)?;
    if find_user(db, &email)?.is_some() {
        return Err(MigrationError::InvalidArgument(format!(
            "user already exists: {}",
            email
        )));
    }

    let token = generate_token();
    let display_name = display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(
            || email.split('@').next().unwrap_or_default().to_string(),
            str::to_string,
        );

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        display_name,
        role,
        claims: BTreeMap::from([(ROLE_CLAIM.to_string(), role.as_str().to_string())]),
        token_hash: hash_token(&token),
        created_at: db.now(),
    };
    db.insert_as(collections::USERS, &user.id, &user)?;

    info!(user_id = %user.id, role = role.as_str(), "user created");
    Ok(CreatedUser { user, token })
}

/// Parse `key=value` claim arguments.
pub fn parse_claims<S: AsRef<str>>(pairs: &[S]) -> MigrationResult<BTreeMap<String, String>> {
    let mut claims = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| {
                MigrationError::InvalidArgument(format!("expected key=value, got {:?}", pair))
            })?;
        claims.insert(key.to_string(), value.to_string());
    }
    Ok(claims)
}

/// Merge `claims` into the user's custom claims. A `role` claim must name a
/// known role (legacy spellings accepted) and also updates the user's role.
pub fn set_claims(
    db: &Database,
    email: &str,
    claims: BTreeMap<String, String>,
) -> MigrationResult<User> {
    let mut user = find_user(db, email)?
        .ok_or_else(|| MigrationError::NotFound(format!("user {}", email.trim())))?;

    for (key, value) in claims {
        if key == ROLE_CLAIM {
            let role = Role::from_legacy(&value).ok_or_else(|| {
                MigrationError::InvalidArgument(format!("unknown role: {}", value))
            })?;
            user.role = role;
            user.claims.insert(key, role.as_str().to_string());
        } else {
            user.claims.insert(key, value);
        }
    }

    db.set_as(collections::USERS, &user.id, &user)?;
    info!(user_id = %user.id, claims = user.claims.len(), "claims set");
    Ok(user)
}
