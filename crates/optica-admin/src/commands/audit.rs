//! Collection size audit subcommand.

use std::io::Write;

use optica_core::db::Database;
use optica_core::migrations;

pub fn audit_sizes(
    db: &Database,
    collection: Option<&str>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let sizes = migrations::audit_sizes(db, collection)?;

    writeln!(out, "{:<26} {:>10} {:>12}", "collection", "documents", "bytes")?;
    for size in &sizes {
        writeln!(
            out,
            "{:<26} {:>10} {:>12}",
            size.collection, size.documents, size.bytes
        )?;
    }
    if sizes.len() > 1 {
        let documents: u64 = sizes.iter().map(|s| s.documents).sum();
        let bytes: u64 = sizes.iter().map(|s| s.bytes).sum();
        writeln!(out, "{:<26} {:>10} {:>12}", "total", documents, bytes)?;
    }
    Ok(())
}
