//! `sg defect report|resolve`: flag or clear a defect on a stage.

use super::{Context, ProductArgs, render_outcome};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum DefectCommand {
    /// Flag a stage as defective; it shows as `error` until resolved.
    Report(ReportArgs),
    /// Clear a stage's defect flag.
    Resolve(StageArgs),
}

#[derive(Args, Debug)]
pub struct StageArgs {
    #[command(flatten)]
    pub product: ProductArgs,

    /// Stage id as shown by `sg show`.
    pub stage: String,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub target: StageArgs,

    /// Free-text description of the defect.
    #[arg(long)]
    pub note: Option<String>,
}

/// # Errors
///
/// Returns an error for an unknown product or stage, a missing actor, or a
/// store fault.
pub fn run_defect(command: &DefectCommand, ctx: &Context<'_>) -> Result<()> {
    let actor = ctx.actor()?;
    let tracker = ctx.open_tracker()?;
    match command {
        DefectCommand::Report(args) => {
            let target = &args.target;
            let outcome = tracker.report_defect(
                &target.product.owner_ref(),
                &target.product.product,
                &target.stage,
                &actor,
                args.note.clone(),
            )?;
            render_outcome(ctx.output, "defect reported", &outcome)
        }
        DefectCommand::Resolve(target) => {
            let outcome = tracker.resolve_defect(
                &target.product.owner_ref(),
                &target.product.product,
                &target.stage,
                &actor,
            )?;
            render_outcome(ctx.output, "defect resolved", &outcome)
        }
    }
}
