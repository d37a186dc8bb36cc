//! `sg products`: list product ids with their progress under an owner.

use super::{Context, owner_ref};
use crate::output::{pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stagegate_core::progress::ProcessProgress;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ProductsArgs {
    /// Order code (or warranty claim code with `--warranty`).
    pub owner: String,

    /// Treat OWNER as a warranty claim code.
    #[arg(long)]
    pub warranty: bool,
}

#[derive(Debug, Serialize)]
struct ProductRow {
    product_id: String,
    progress: ProcessProgress,
}

/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn run_products(args: &ProductsArgs, ctx: &Context<'_>) -> Result<()> {
    let owner = owner_ref(&args.owner, args.warranty);
    let tracker = ctx.open_tracker()?;

    let mut rows = Vec::new();
    for product_id in tracker.list_products(&owner)? {
        let view = tracker.tracking_view(&owner, &product_id)?;
        rows.push(ProductRow {
            product_id,
            progress: view.progress,
        });
    }

    render_mode(
        ctx.output,
        &rows,
        |rows, w| {
            for row in rows {
                writeln!(w, "{}\t{}", row.product_id, row.progress)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Products of {owner}"))?;
            if rows.is_empty() {
                writeln!(w, "(none)")?;
            }
            for row in rows {
                let current = row
                    .progress
                    .current_stage
                    .as_ref()
                    .map_or("", |cursor| cursor.name.as_str());
                writeln!(w, "{:<16} {:<12} {current}", row.product_id, row.progress.to_string())?;
            }
            Ok(())
        },
    )
}
