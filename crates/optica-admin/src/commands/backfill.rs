//! Backfill subcommands.

use std::io::Write;

use optica_core::db::Database;
use optica_core::migrations::{
    run_backfill_with_progress, Backfill, BackfillClientActive, BackfillLineItemRefs,
    BackfillProductIds, MigrationError, MigrationReport, RemapRoles,
};

fn run_and_report<B: Backfill>(
    db: &Database,
    backfill: &mut B,
    batch_limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<MigrationReport> {
    // Progress goes out as each batch commits; the first failed write stops it
    let mut progress_error = None;
    let result = run_backfill_with_progress(db, backfill, batch_limit, |progress| {
        if progress_error.is_none() {
            progress_error = writeln!(out, "{}", progress).err();
        }
    });
    if let Some(e) = progress_error {
        return Err(e.into());
    }

    match result {
        Ok(report) => {
            writeln!(out, "{}", report)?;
            Ok(report)
        }
        Err(MigrationError::Aborted {
            script, committed, ..
        }) if !committed.is_empty() => {
            // Tell the operator what is already written before failing
            writeln!(out, "{}: committed before failure:", script)?;
            for id in &committed {
                writeln!(out, "  {}", id)?;
            }
            Err(run_backfill_error(script, committed.len()))
        }
        Err(e) => Err(e.into()),
    }
}

fn run_backfill_error(script: &str, committed: usize) -> anyhow::Error {
    anyhow::anyhow!(
        "{} aborted after {} committed document(s); re-run to continue",
        script,
        committed
    )
}

pub fn backfill_product_ids(
    db: &Database,
    batch_limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    run_and_report(db, &mut BackfillProductIds::new(), batch_limit, out)?;
    Ok(())
}

pub fn backfill_client_active(
    db: &Database,
    batch_limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    run_and_report(db, &mut BackfillClientActive, batch_limit, out)?;
    Ok(())
}

pub fn backfill_line_item_refs(
    db: &Database,
    batch_limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut backfill = BackfillLineItemRefs::new();
    run_and_report(db, &mut backfill, batch_limit, out)?;
    if backfill.unresolved > 0 {
        writeln!(
            out,
            "{} line item(s) reference products without an internal id",
            backfill.unresolved
        )?;
    }
    Ok(())
}

pub fn remap_roles(db: &Database, batch_limit: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let mut backfill = RemapRoles::new();
    run_and_report(db, &mut backfill, batch_limit, out)?;
    for user in &backfill.unknown {
        writeln!(out, "unknown role left unchanged: {}", user)?;
    }
    Ok(())
}
