//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use optica_core::config::{BATCH_LIMIT_ENV, DATABASE_ENV};
use optica_core::db::MAX_BATCH_OPERATIONS;

/// One-shot administrative scripts for the optica document store
#[derive(Debug, Parser)]
#[command(name = "optica-admin", about, long_about = None)]
pub struct Cli {
    /// Path to the SQLite database file (must already exist)
    #[arg(long, env = DATABASE_ENV)]
    pub database: PathBuf,

    /// Maximum writes per atomic batch
    #[arg(long, env = BATCH_LIMIT_ENV, default_value_t = MAX_BATCH_OPERATIONS)]
    pub batch_limit: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Give products without one a sequential internal id
    BackfillProductIds,

    /// Mark clients without an `active` flag as active
    BackfillClientActive,

    /// Copy product internal ids onto invoice line items
    BackfillLineItemRefs,

    /// Rewrite legacy role names to the canonical ones
    RemapRoles,

    /// Create a staff user and print its one-time access token
    CreateUser {
        email: String,

        /// Display name (defaults to the email's local part)
        #[arg(long)]
        name: Option<String>,

        /// admin, seller or optometrist (legacy spellings accepted)
        #[arg(long, default_value = "seller")]
        role: String,
    },

    /// Set custom claims on a user
    SetClaims {
        email: String,

        /// Claims as key=value; `role` also changes the user's role
        #[arg(required = true)]
        claims: Vec<String>,
    },

    /// Document count and JSON size per collection
    AuditSizes {
        /// Only report this collection
        collection: Option<String>,
    },
}

impl Cli {
    /// Parse arguments, reading a `.env` file first if present.
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}
