//! `sg assign`: replace the members assigned to a stage.

use super::{Context, ProductArgs, render_outcome};
use anyhow::Result;
use clap::Args;
use stagegate_core::model::MemberRef;
use std::collections::BTreeSet;

#[derive(Args, Debug)]
pub struct AssignArgs {
    #[command(flatten)]
    pub product: ProductArgs,

    /// Stage id as shown by `sg show`.
    pub stage: String,

    /// Member references; pass none to clear the assignment.
    #[arg(value_name = "MEMBER")]
    pub members: Vec<String>,
}

/// Duplicate member arguments collapse into one assignment.
///
/// # Errors
///
/// Returns an error for an unknown product or stage, or a store fault.
pub fn run_assign(args: &AssignArgs, ctx: &Context<'_>) -> Result<()> {
    let members: BTreeSet<MemberRef> = args
        .members
        .iter()
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(MemberRef::new)
        .collect();

    let tracker = ctx.open_tracker()?;
    let outcome = tracker.assign_members(
        &args.product.owner_ref(),
        &args.product.product,
        &args.stage,
        members,
    )?;
    render_outcome(ctx.output, "assigned", &outcome)
}
