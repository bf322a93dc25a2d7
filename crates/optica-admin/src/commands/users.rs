//! Staff account subcommands.

use std::io::Write;

use anyhow::anyhow;
use optica_core::db::Database;
use optica_core::migrations::{self, ROLE_CLAIM};
use optica_core::models::Role;

pub fn create_user(
    db: &Database,
    email: &str,
    name: Option<&str>,
    role: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let role = Role::from_legacy(role).ok_or_else(|| anyhow!("unknown role: {}", role))?;
    let created = migrations::create_user(db, email, name, role)?;

    writeln!(
        out,
        "created {} ({}) as {}",
        created.user.email,
        created.user.id,
        created.user.role.as_str()
    )?;
    writeln!(out, "access token (shown once): {}", created.token)?;
    Ok(())
}

pub fn set_claims<S: AsRef<str>>(
    db: &Database,
    email: &str,
    pairs: &[S],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let claims = migrations::parse_claims(pairs)?;
    let user = migrations::set_claims(db, email, claims)?;

    writeln!(out, "claims for {}:", user.email)?;
    for (key, value) in &user.claims {
        writeln!(out, "  {}={}", key, value)?;
    }
    if let Some(role) = user.claims.get(ROLE_CLAIM) {
        writeln!(out, "role is now {}", role)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optica_core::migrations::{find_user, hash_token};

    #[test]
    fn test_create_user_prints_token_once() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        create_user(&db, "ana@optica.ec", Some("Ana"), "optometra", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("as optometrist"));
        let token = text
            .lines()
            .find_map(|line| line.strip_prefix("access token (shown once): "))
            .unwrap();
        let user = find_user(&db, "ana@optica.ec").unwrap().unwrap();
        assert_eq!(user.token_hash, hash_token(token));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        assert!(create_user(&db, "ana@optica.ec", None, "janitor", &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_set_claims_lists_result() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        create_user(&db, "ana@optica.ec", None, "seller", &mut out).unwrap();

        let mut out = Vec::new();
        set_claims(&db, "ana@optica.ec", &["role=administrador", "branch=norte"], &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  branch=norte"));
        assert!(text.contains("role is now admin"));
    }
}
