//! `sg check` / `sg uncheck`: toggle one task on a product's process.
//!
//! A locked stage is rejected before anything is written; re-checking an
//! already checked task succeeds without a write.

use super::{Context, ProductArgs, render_outcome};
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct ToggleArgs {
    #[command(flatten)]
    pub product: ProductArgs,

    /// Stage id as shown by `sg show`.
    pub stage: String,

    /// Task id within the stage.
    pub task: String,
}

/// # Errors
///
/// Returns the tracker's error; `StageLocked` and not-found errors are
/// rejections, the rest are faults.
pub fn run_toggle(args: &ToggleArgs, checked: bool, ctx: &Context<'_>) -> Result<()> {
    let actor = ctx.actor()?;
    let tracker = ctx.open_tracker()?;
    let outcome = tracker.toggle_task(
        &args.product.owner_ref(),
        &args.product.product,
        &args.stage,
        &args.task,
        checked,
        &actor,
    )?;
    render_outcome(
        ctx.output,
        if checked { "checked" } else { "unchecked" },
        &outcome,
    )
}
