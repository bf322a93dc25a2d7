//! Subcommand dispatch.

mod audit;
mod backfill;
mod users;

pub use audit::audit_sizes;
pub use backfill::{backfill_client_active, backfill_line_item_refs, backfill_product_ids, remap_roles};
pub use users::{create_user, set_claims};

use std::io::Write;

use anyhow::Context;
use optica_core::{AppConfig, Database};
use tracing::info;

use crate::cli::{Cli, Command};

/// Open the configured database and run the chosen script, writing its
/// report to `out`.
pub fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let config = AppConfig::for_scripts(&cli.database, cli.batch_limit)?;
    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    info!(database = %config.database_path.display(), "database opened");

    match cli.command {
        Command::BackfillProductIds => backfill_product_ids(&db, config.batch_limit, out),
        Command::BackfillClientActive => backfill_client_active(&db, config.batch_limit, out),
        Command::BackfillLineItemRefs => backfill_line_item_refs(&db, config.batch_limit, out),
        Command::RemapRoles => remap_roles(&db, config.batch_limit, out),
        Command::CreateUser { email, name, role } => {
            create_user(&db, &email, name.as_deref(), &role, out)
        }
        Command::SetClaims { email, claims } => set_claims(&db, &email, &claims, out),
        Command::AuditSizes { collection } => audit_sizes(&db, collection.as_deref(), out),
    }
}
